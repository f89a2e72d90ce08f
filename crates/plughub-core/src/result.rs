//! Convenience result type alias for the kernel.

use crate::error::KernelError;

/// A specialized `Result` type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
