//! Pass-through backend for hosts that embed an in-process command/event bridge.

use crate::error::TransportError;
use crate::registry::{EventCallback, Unlisten};
use crate::transport::{Transport, TransportMode};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// Command dispatch and event subscription provided by a host shell.
#[async_trait]
pub trait NativeBridge: Send + Sync {
    async fn invoke(&self, command: &str, args: Value) -> anyhow::Result<Value>;

    async fn listen(&self, event: &str, callback: EventCallback) -> anyhow::Result<Unlisten>;
}

static NATIVE_BRIDGE: OnceLock<Arc<dyn NativeBridge>> = OnceLock::new();

/// Mark this process as running inside a host shell. Can only happen once.
pub fn install_native_bridge(bridge: Arc<dyn NativeBridge>) -> Result<(), TransportError> {
    NATIVE_BRIDGE
        .set(bridge)
        .map_err(|_| TransportError::BridgeAlreadyInstalled)
}

pub fn native_bridge() -> Option<Arc<dyn NativeBridge>> {
    NATIVE_BRIDGE.get().cloned()
}

pub struct NativeTransport {
    bridge: Arc<dyn NativeBridge>,
}

impl NativeTransport {
    pub fn new(bridge: Arc<dyn NativeBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl Transport for NativeTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Native
    }

    async fn invoke(&self, command: &str, args: Value) -> Result<Option<Value>, TransportError> {
        self.bridge
            .invoke(command, args)
            .await
            .map(Some)
            .map_err(|err| TransportError::Command(format!("{err:#}")))
    }

    async fn listen(&self, event: &str, callback: EventCallback) -> Result<Unlisten, TransportError> {
        self.bridge
            .listen(event, callback)
            .await
            .map_err(|err| TransportError::Command(format!("{err:#}")))
    }
}
