//! Relay Daemon - Session registry and line broadcast server
//!
//! This crate provides the core infrastructure for the relay daemon:
//! - `registry` - Registry actor tracking authenticated sessions
//! - `session` - Per-connection state machine, outbound queue and write loop
//! - `broadcast` - Fan-out of chat lines and join/leave notices
//! - `server` - TCP listener, accept loop and graceful shutdown
//! - `config` / `logging` - Startup configuration and tracing setup
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        relayd daemon                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │   ChatServer    │     │      RegistryActor          │    │
//! │  │ (TcpListener)   │     │  (membership owner)         │    │
//! │  └────────┬────────┘     └──────────────▲──────────────┘    │
//! │           │ accept()                    │ add/remove/       │
//! │           ▼                             │ snapshot          │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐    │
//! │  │    Session      │────▶│       Broadcaster           │    │
//! │  │ read loop       │     │ (snapshot + enqueue)        │    │
//! │  │ write loop ◀────┼─────┤ OutboundQueue per member    │    │
//! │  └─────────────────┘     └─────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod broadcast;
pub mod config;
pub mod logging;
pub mod registry;
pub mod server;
pub mod session;
