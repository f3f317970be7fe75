use core::fmt;

/// Result alias for `arpath`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned during problem setup.
///
/// Everything that can go wrong after setup — hitting the iteration cap,
/// cooperative cancellation, an iterate overflowing — is reported as a
/// [`Status`](crate::solver::Status) alongside the partial path, never as an
/// `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid parameter or malformed input.
    InvalidInput {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: String,
    },

    /// Vector/matrix dimension mismatch (usize).
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Sparse factorization of the system matrix failed.
    LinAlg(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput { name, message } => {
                write!(f, "invalid input '{name}': {message}")
            }
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::LinAlg(msg) => write!(f, "linear algebra failure: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
