use crate::error::TransportError;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

const SOCKET_PATH: &str = "/ws";

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: Url,
    pub reconnect_delay: Duration,
}

impl TransportConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Reads `HOPLINE_SERVER` and `HOPLINE_RECONNECT`.
    pub fn from_env() -> Result<Self, TransportError> {
        let server = std::env::var("HOPLINE_SERVER").unwrap_or_else(|_| DEFAULT_SERVER.to_string());
        let base_url = Url::parse(server.trim())?;
        Ok(Self {
            base_url,
            reconnect_delay: parse_duration_env("HOPLINE_RECONNECT", DEFAULT_RECONNECT_DELAY),
        })
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Same-origin `/ws`; `wss` iff the server is `https`.
    pub fn socket_url(&self) -> Result<Url, TransportError> {
        let scheme = match self.base_url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(TransportError::UnsupportedScheme(other.to_string())),
        };
        let mut url = self.base_url.join(SOCKET_PATH)?;
        url.set_scheme(scheme)
            .map_err(|_| TransportError::UnsupportedScheme(scheme.to_string()))?;
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base_url.join(path)?)
    }
}

pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else {
        value.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn parse_duration_env(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|value| parse_duration(&value))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> TransportConfig {
        TransportConfig::new(Url::parse(base).unwrap())
    }

    #[test]
    fn socket_scheme_mirrors_server_scheme() {
        assert_eq!(
            config("http://127.0.0.1:8080").socket_url().unwrap().as_str(),
            "ws://127.0.0.1:8080/ws"
        );
        assert_eq!(
            config("https://trace.example.net/app/?tab=1").socket_url().unwrap().as_str(),
            "wss://trace.example.net/ws"
        );
    }

    #[test]
    fn socket_url_rejects_other_schemes() {
        assert!(matches!(
            config("ftp://example.net").socket_url(),
            Err(TransportError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
    }

    #[test]
    fn endpoints_are_same_origin() {
        let url = config("http://localhost:9000/ui/").endpoint("/api/start").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/start");
    }

    #[test]
    fn durations_accept_units() {
        assert_eq!(parse_duration("1500ms"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("2s"), Some(Duration::from_secs(2)));
        assert_eq!(parse_duration(" 3 "), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("soon"), None);
    }
}
