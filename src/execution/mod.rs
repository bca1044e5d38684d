//! Execution seams: the transport every remote call goes through.

pub mod transport;

pub use transport::*;
