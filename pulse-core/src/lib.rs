//! pulse-core: self-healing WebSocket session management
//!
//! This crate provides the client side of the pulse metrics feed:
//!
//! - **Session management** - [`SessionManager`] keeps one logical connection
//!   alive across drops, with capped exponential backoff and keep-alive probes
//! - **Transport** - [`Connector`] and [`SocketHandle`] adapt a concrete socket
//!   (WebSocket via [`WsConnector`], scripted via [`MockConnector`])
//! - **Timers** - [`TimerSet`] owns the cancellable timers of a session
//! - **Metrics** - [`MetricSample`] and [`MetricsWindow`] for the feed payload
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 SessionManager                    │
//! │  ┌──────────────┐  ┌───────────┐  ┌────────────┐ │
//! │  │ SocketHandle │  │ Keepalive │  │ Reconnect  │ │
//! │  │ (generation) │  │  (ping)   │  │ Scheduler  │ │
//! │  └──────┬───────┘  └─────┬─────┘  └─────┬──────┘ │
//! │         │        ┌───────┴──────────────┴──────┐ │
//! │         │        │           TimerSet          │ │
//! │         │        └──────────────┬──────────────┘ │
//! │         └────────► event loop ◄─┘                │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod keepalive;
pub mod metrics;
pub mod reconnect;
pub mod session;
pub mod timer;
pub mod transport;

pub use error::{HandlerError, PayloadError, TransportError};
pub use keepalive::{Keepalive, KeepaliveConfig, PING_PROBE};
pub use metrics::{MetricSample, MetricsWindow};
pub use reconnect::{ReconnectConfig, ReconnectScheduler};
pub use session::{
    ConnectionStatus, InboundHandler, SessionEvent, SessionManager, SessionOptions, SessionPhase,
};
pub use timer::{TimerFired, TimerKind, TimerSet};
pub use transport::{
    Connector, EventSink, HandleEvent, MockConnector, SocketHandle, TransportEvent, WsConnector,
};
