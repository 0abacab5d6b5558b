//! The single shared event socket of the web backend.

use crate::registry::SubscriptionRegistry;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

struct SocketShared {
    url: Url,
    reconnect_delay: Duration,
    registry: SubscriptionRegistry,
    state: Mutex<ConnectionState>,
    attempts: AtomicU64,
}

impl SocketShared {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }
}

/// Lazily started socket feeding a [`SubscriptionRegistry`].
///
/// One supervisor task owns the connection. After every close or failed
/// attempt it waits `reconnect_delay` and tries again, with no backoff growth
/// and no retry limit, until [`EventSocket::shutdown`] or drop.
pub struct EventSocket {
    shared: Arc<SocketShared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl EventSocket {
    pub fn new(url: Url, reconnect_delay: Duration, registry: SubscriptionRegistry) -> Self {
        Self {
            shared: Arc::new(SocketShared {
                url,
                reconnect_delay,
                registry,
                state: Mutex::new(ConnectionState::Disconnected),
                attempts: AtomicU64::new(0),
            }),
            supervisor: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &Url {
        &self.shared.url
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.shared.registry
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    pub fn connection_attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Start the supervisor unless it is already running. While it runs the
    /// socket is Open, Connecting, or waiting out the delay before its next
    /// attempt, so a second connect is always redundant.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut supervisor = self.supervisor.lock();
        if supervisor.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!(state = ?self.state(), "event socket already running");
            return;
        }
        *supervisor = Some(tokio::spawn(supervise(self.shared.clone())));
    }

    pub fn shutdown(&self) {
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
            info!(url = %self.shared.url, "event socket shut down");
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }
}

impl Drop for EventSocket {
    fn drop(&mut self) {
        if let Some(handle) = self.supervisor.get_mut().take() {
            handle.abort();
        }
    }
}

async fn supervise(shared: Arc<SocketShared>) {
    loop {
        let attempt = shared.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        shared.set_state(ConnectionState::Connecting);
        debug!(url = %shared.url, attempt, "connecting event socket");

        match connect_async(shared.url.as_str()).await {
            Ok((mut stream, _)) => {
                shared.set_state(ConnectionState::Open);
                info!(url = %shared.url, attempt, "event socket open");

                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            shared.registry.dispatch_text(text.as_str());
                        }
                        Ok(Message::Binary(bytes)) => {
                            warn!(len = bytes.len(), "dropping binary event message");
                        }
                        Ok(Message::Close(frame)) => {
                            info!(?frame, "event socket closed by server");
                            break;
                        }
                        Ok(_) => {}
                        Err(err) => {
                            warn!(%err, "event socket error");
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(url = %shared.url, attempt, %err, "event socket connect failed");
            }
        }

        shared.set_state(ConnectionState::Disconnected);
        debug!(
            delay_ms = shared.reconnect_delay.as_millis() as u64,
            "event socket reconnect scheduled"
        );
        tokio::time::sleep(shared.reconnect_delay).await;
    }
}
