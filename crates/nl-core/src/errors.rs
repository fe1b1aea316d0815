//! Error types for nonlin-rs.
//!
//! The library distinguishes hard failures (violated preconditions, corrupt
//! or incompatible streams) from numerical and convergence failures: only the
//! former surface as [`Error`] values, the latter are reported through the
//! solver status so that the best state seen so far is always returned.

use thiserror::Error;

/// The top-level error type used throughout nonlin-rs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Precondition violated (dimension mismatch, descent direction not
    /// descending, constraint defined with incompatible shapes).
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// Invalid argument (parameter value outside its declared bounds,
    /// unknown factory id, malformed grid).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Stream corruption detected while reading or writing.
    #[error("stream error: {0}")]
    Stream(String),

    /// A serialized payload was produced by a newer library version.
    #[error("version mismatch: read {read}, running {current}")]
    VersionMismatch {
        /// The version triplet found in the stream.
        read: crate::stream::Version,
        /// The version triplet of the running library.
        current: crate::stream::Version,
    },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Stream(err.to_string())
    }
}

/// Shorthand `Result` type used throughout nonlin-rs.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Returns `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use nl_core::ensure;
/// fn positive(x: f64) -> nl_core::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::InvalidArgument(...))` immediately.
///
/// # Example
/// ```
/// use nl_core::fail;
/// fn always_err() -> nl_core::Result<()> {
///     fail!("something went wrong");
/// }
/// assert!(always_err().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::InvalidArgument(
            format!($($msg)*)
        ))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn needs_even(x: i64) -> Result<i64> {
        crate::ensure!(x % 2 == 0, "x must be even, got {x}");
        Ok(x)
    }

    #[test]
    fn ensure_macro() {
        assert_eq!(needs_even(4), Ok(4));
        assert!(matches!(needs_even(3), Err(Error::Precondition(_))));
    }

    #[test]
    fn io_error_maps_to_stream() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io.into();
        assert!(matches!(err, Error::Stream(_)));
    }
}
