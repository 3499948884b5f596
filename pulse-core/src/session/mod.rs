//! Connection session management

mod machine;
mod manager;
mod options;
mod state;

pub use manager::{InboundHandler, SessionManager};
pub use options::SessionOptions;
pub use state::{ConnectionStatus, SessionEvent, SessionPhase};
