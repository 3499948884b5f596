//! WebSocket module for the metrics feed

mod connection;

pub use connection::ws_handler;
