//! Browser-style fallback: REST for commands, one shared socket for events.

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::registry::{EventCallback, SubscriptionRegistry, Unlisten};
use crate::socket::EventSocket;
use crate::transport::{Transport, TransportMode};
use async_trait::async_trait;
use hopline_model::{COMMAND_START_TRACE, COMMAND_STOP_TRACE};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Fixed REST mapping for one command. Every mapped command is a POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRoute {
    pub path: &'static str,
    pub sends_body: bool,
}

pub fn route_command(command: &str) -> Option<CommandRoute> {
    match command {
        COMMAND_START_TRACE => Some(CommandRoute {
            path: "/api/start",
            sends_body: true,
        }),
        COMMAND_STOP_TRACE => Some(CommandRoute {
            path: "/api/stop",
            sends_body: false,
        }),
        _ => None,
    }
}

#[async_trait]
pub trait CommandClient: Send + Sync {
    async fn post(&self, url: Url, body: Option<Value>) -> Result<Value, TransportError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpCommandClient {
    client: reqwest::Client,
}

impl HttpCommandClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CommandClient for HttpCommandClient {
    async fn post(&self, url: Url, body: Option<Value>) -> Result<Value, TransportError> {
        let path = url.path().to_string();
        let mut request = self.client.post(url);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                path,
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        Ok(decode_body(&text))
    }
}

/// JSON when the body parses, `null` when empty, the raw text otherwise.
pub fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

pub struct WebTransport {
    config: TransportConfig,
    commands: Arc<dyn CommandClient>,
    socket: EventSocket,
}

impl WebTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        Self::with_command_client(config, Arc::new(HttpCommandClient::new()))
    }

    pub fn with_command_client(
        config: TransportConfig,
        commands: Arc<dyn CommandClient>,
    ) -> Result<Self, TransportError> {
        let socket = EventSocket::new(
            config.socket_url()?,
            config.reconnect_delay,
            SubscriptionRegistry::new(),
        );
        Ok(Self {
            config,
            commands,
            socket,
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn socket(&self) -> &EventSocket {
        &self.socket
    }

    pub fn shutdown(&self) {
        self.socket.shutdown();
    }
}

#[async_trait]
impl Transport for WebTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Web
    }

    async fn invoke(&self, command: &str, args: Value) -> Result<Option<Value>, TransportError> {
        let Some(route) = route_command(command) else {
            debug!(command, "command not available over the web transport");
            return Ok(None);
        };

        let url = self.config.endpoint(route.path)?;
        let body = if route.sends_body { Some(args) } else { None };
        self.commands.post(url, body).await.map(Some)
    }

    async fn listen(&self, event: &str, callback: EventCallback) -> Result<Unlisten, TransportError> {
        let handle = self.socket.registry().subscribe(event, callback);
        self.socket.connect();
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands_have_fixed_routes() {
        assert_eq!(
            route_command("start_trace"),
            Some(CommandRoute {
                path: "/api/start",
                sends_body: true
            })
        );
        assert_eq!(
            route_command("stop_trace"),
            Some(CommandRoute {
                path: "/api/stop",
                sends_body: false
            })
        );
        assert_eq!(route_command("set_theme"), None);
    }

    #[test]
    fn response_bodies_decode_leniently() {
        assert_eq!(decode_body(""), Value::Null);
        assert_eq!(decode_body("{\"ok\":true}"), serde_json::json!({ "ok": true }));
        assert_eq!(decode_body("started"), Value::String("started".to_string()));
    }
}
