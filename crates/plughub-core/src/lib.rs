//! # plughub-core
//!
//! Core crate for the PlugHub plugin kernel. Contains the error taxonomy,
//! the result alias, and the configuration schemas.
//!
//! This crate has **no** internal dependencies on other PlugHub crates.

pub mod config;
pub mod error;
pub mod result;

pub use config::KernelConfig;
pub use error::{ErrorKind, KernelError};
pub use result::KernelResult;
