//! WebSocket transport and binary for the bounce router.
//!
//! The router crate owns dispatch and broadcast; this crate accepts sockets,
//! feeds their frames to the [`Dispatcher`](bounce_router::Dispatcher) and
//! runs the periodic broadcast tasks for the lifetime of the server.

pub mod app;
pub mod demo;
pub mod http;
pub mod server;
pub mod ws;

pub use app::{build_router, AppState};
pub use server::{shutdown_signal, Gateway};
