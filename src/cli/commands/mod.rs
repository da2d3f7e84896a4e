//! CLI command implementations.

mod convert;

pub use convert::run_convert;
