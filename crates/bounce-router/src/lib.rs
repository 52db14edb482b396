//! `bounce-router`: event dispatch and broadcast for long-lived connections.
//!
//! # Overview
//!
//! Inbound frames are decoded into envelopes and routed by event name to a
//! registered [`Handler`], after a per-event staleness check drops anything
//! older than the last accepted message. Outbound traffic comes from
//! [`Sender`]s, each fanning one envelope out to its own set of connections,
//! either on demand (often triggered by a handler) or on a fixed period via
//! the [`BroadcastScheduler`].
//!
//! | Piece                 | Role                                               |
//! |-----------------------|----------------------------------------------------|
//! | [`EventRegistry`]     | event name → exactly one handler or sender         |
//! | [`StalenessGuard`]    | per-event last-accepted timestamp                  |
//! | [`ConnectionArena`]   | live handles by id; senders store ids only         |
//! | [`BroadcastScheduler`]| one cancellable periodic loop per timed sender     |
//! | [`Dispatcher`]        | wires the above; the only object callers hold      |

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod registry;
pub mod scheduler;
pub mod sender;
pub mod staleness;

#[cfg(test)]
mod testing;

pub use connection::{Connection, ConnectionArena, ConnectionSet};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::{ConflictReason, Result, RouterError};
pub use handler::Handler;
pub use registry::{EventRegistry, Participant};
pub use scheduler::{BroadcastScheduler, BroadcastTask, TaskState};
pub use sender::{framerate_period, DeliveryReport, Sender};
pub use staleness::{StalenessGuard, Verdict};
