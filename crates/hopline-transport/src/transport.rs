use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::native::{native_bridge, NativeTransport};
use crate::registry::{EventCallback, Unlisten};
use crate::web::WebTransport;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Native,
    Web,
}

/// Command and event access to the trace engine, whichever backend is active.
#[async_trait]
pub trait Transport: Send + Sync {
    fn mode(&self) -> TransportMode;

    /// Send a named command. `Ok(None)` means the command is not available
    /// in this mode; no request was made.
    async fn invoke(&self, command: &str, args: Value) -> Result<Option<Value>, TransportError>;

    /// Register `callback` for `event`. The returned handle removes exactly
    /// this registration.
    async fn listen(&self, event: &str, callback: EventCallback) -> Result<Unlisten, TransportError>;
}

pub fn detect_mode() -> TransportMode {
    if native_bridge().is_some() {
        TransportMode::Native
    } else {
        TransportMode::Web
    }
}

/// Pick the backend once, at startup.
pub fn select_transport(config: &TransportConfig) -> Result<Arc<dyn Transport>, TransportError> {
    match native_bridge() {
        Some(bridge) => {
            info!("native bridge detected");
            Ok(Arc::new(NativeTransport::new(bridge)))
        }
        None => {
            info!(server = %config.base_url, "using web transport");
            Ok(Arc::new(WebTransport::new(config.clone())?))
        }
    }
}
