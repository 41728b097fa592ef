//! Kernel argument errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// An output slice does not match the length the kernel produces.
    #[error("{what}: expected length {expected}, got {actual}")]
    BadLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A scalar argument is out of its valid range.
    #[error("invalid argument: {0}")]
    BadArgument(String),
}

pub(crate) fn check_len(
    what: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), KernelError> {
    if expected != actual {
        return Err(KernelError::BadLength {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
