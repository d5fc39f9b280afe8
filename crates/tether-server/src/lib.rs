//! # tether-server
//!
//! Services, WebSocket transport, and the HTTP surface for tether RPC.
//!
//! - **Service registry**: named services, each with its own method table
//!   and live sessions, reachable at `/ws/{service}`
//! - **WebSocket adapter**: bounded outbound queue, ping/pong liveness,
//!   sequential inbound dispatch
//! - **Built-in methods**: `version`, `login`, `logout`, `session`, `token`,
//!   `refresh`, `methods`
//! - HTTP endpoints: `/health`, Prometheus `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod websocket;

pub use config::{ServerConfig, token_config};
pub use errors::ServiceError;
pub use handlers::{BuiltinDeps, StaticDirectory, UserDirectory, UserRecord, register_builtin};
pub use registry::ServiceRegistry;
pub use server::TetherServer;
pub use service::{Service, ServiceOptions};
pub use shutdown::ShutdownCoordinator;
