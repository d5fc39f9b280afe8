//! WebSocket transport: per-connection outbound queue and socket loop.

pub mod connection;
pub mod socket;
