use core::fmt;

/// Result alias for `xmeans`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the clustering engine, the scoring functions and the
/// model searches.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty.
    EmptyInput,

    /// Point or centroid dimension mismatch.
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid number of clusters for the given number of points.
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
        /// Number of points.
        n_items: usize,
    },

    /// The assign/update loop did not stabilize within the iteration guard.
    ConvergenceFailure {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// A coordinate was NaN or infinite.
    NonFiniteValue {
        /// Row of the offending point.
        row: usize,
        /// Column of the offending coordinate.
        col: usize,
    },

    /// A search finished without a single scorable model.
    NoViableModel,
}

impl Error {
    /// True for the recoverable "did not converge" outcome that the
    /// searches absorb as a losing score.
    pub fn is_convergence_failure(&self) -> bool {
        matches!(self, Error::ConvergenceFailure { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::InvalidClusterCount { requested, n_items } => {
                write!(f, "cannot score {requested} clusters over {n_items} points")
            }
            Error::ConvergenceFailure { iterations } => {
                write!(f, "k-means did not converge in {iterations} iterations")
            }
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
            Error::NonFiniteValue { row, col } => {
                write!(f, "non-finite value at row {row}, column {col}")
            }
            Error::NoViableModel => write!(f, "no candidate model could be scored"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
