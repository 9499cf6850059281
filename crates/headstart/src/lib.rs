//! Headstart: find co-founders and teammates.
//!
//! The crate is split along the same seams the HTTP service exposes:
//!
//! - [`matching`] holds the pure roster logic (skill taxonomy, role suggestion,
//!   filtering, sorting) that drives the dashboard.
//! - [`profiles`] owns the persisted profile record, the update reconciler, and the
//!   photo storage port.
//! - [`identity`] wraps the external identity provider and reconciles logins with
//!   stored profiles.

pub mod config;
pub mod error;
pub mod identity;
pub mod matching;
pub mod profiles;
pub mod telemetry;
