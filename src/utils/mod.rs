//! Utility modules for kvreliable
//!
//! This module contains various utility functions and types used throughout the library.

pub mod cancel;

pub use cancel::{ContextError, RequestContext};
