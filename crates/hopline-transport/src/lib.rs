//! Command and event transport for the trace engine.
//!
//! Inside a host shell that installed a [`NativeBridge`], calls pass straight
//! through to it. Otherwise commands go out as REST calls and events arrive
//! over one shared, self-healing socket.

pub mod config;
pub mod error;
pub mod native;
pub mod registry;
pub mod socket;
pub mod transport;
pub mod web;

pub use config::{parse_duration, TransportConfig, DEFAULT_RECONNECT_DELAY, DEFAULT_SERVER};
pub use error::TransportError;
pub use native::{install_native_bridge, native_bridge, NativeBridge, NativeTransport};
pub use registry::{Event, EventCallback, SubscriptionRegistry, Unlisten};
pub use socket::{ConnectionState, EventSocket};
pub use transport::{detect_mode, select_transport, Transport, TransportMode};
pub use web::{decode_body, route_command, CommandClient, CommandRoute, HttpCommandClient, WebTransport};
