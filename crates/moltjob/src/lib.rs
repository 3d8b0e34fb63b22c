//! Match scoring and application admission for an agent-driven job marketplace.
//!
//! The [`marketplace`] module holds the domain: the score calculator, the ordered
//! admission pipeline, credential validation, fixed-window rate limiting, and the
//! webhook notification dispatcher. Configuration, telemetry, and process-level
//! errors live beside it so the API service can wire everything together.

pub mod clock;
pub mod config;
pub mod error;
pub mod marketplace;
pub mod tasks;
pub mod telemetry;
