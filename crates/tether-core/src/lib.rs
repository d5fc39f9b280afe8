//! # tether-core
//!
//! Foundation types shared by every tether crate:
//!
//! - **Branded IDs**: `SessionId`, `ConnectionId` as UUID v7 newtypes
//! - **Epochs**: process-monotonic millisecond activity timestamps
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod epoch;
pub mod ids;
pub mod logging;

pub use epoch::Epoch;
pub use ids::{ConnectionId, SessionId};
pub use logging::{LogFormat, init_subscriber};
