//! Realtime channel client.
//!
//! One background task owns the WebSocket: it decodes server events, flushes
//! queued client commands, answers pings, and drives reconnection with capped
//! exponential backoff. Everything the rest of the client needs comes out as
//! a single stream of [`GatewayNotice`]s — transport status transitions and
//! decoded events, in arrival order.

pub mod connection;
pub mod status;

pub use connection::{Gateway, GatewayError, GatewayHandle, GatewayNotice, gateway_url};
pub use status::{ConnectionStatus, StatusIndicator};
