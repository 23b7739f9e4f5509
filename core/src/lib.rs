//! Rotating remote backups with tiered, grandfather-father-son retention.
//!
//! The engine is split along the phases of one run: [`inventory`] turns a
//! raw store listing into classified [`snapshot::Snapshot`] records,
//! [`retention`] evaluates the configured period schedule into a purge
//! plan, and [`purge`] applies (or merely reports) that plan through the
//! [`transport::Transport`] collaborator. [`session`] is the upload half:
//! one dated backup attempt with marker and pointer maintenance.
//!
//! A run is sequential and blocking: list, evaluate (pure, in memory),
//! then purge. Concurrent runs against the same host's store must be
//! serialized by the caller.

pub mod config;
pub mod inventory;
pub mod purge;
pub mod retention;
pub mod session;
pub mod snapshot;
pub mod status;
pub mod transport;
