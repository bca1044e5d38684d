//! Retry module (ergonomic namespace)
//! - reason.rs: closed set of retry reasons and their metadata
//! - action.rs / strategy.rs: retry policies
//! - backoff.rs: backoff calculators
//! - request.rs: per-request retry bookkeeping
//! - orchestrator.rs: the retry decision function

pub mod action;
pub mod backoff;
pub mod orchestrator;
pub mod reason;
pub mod request;
pub mod strategy;

pub use action::*;
pub use backoff::*;
pub use orchestrator::*;
pub use reason::*;
pub use request::*;
pub use strategy::*;
