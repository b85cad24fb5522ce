//! Definition of errors.

use std::error::Error;
use std::fmt;

pub type Result<T, E = TagwiseError> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum TagwiseError {
    InvalidArgument(InvalidArgumentError),
    DegenerateDistribution(DegenerateDistributionError),
    CurvatureViolation(CurvatureViolationError),
    IOError(std::io::Error),
}

impl TagwiseError {
    pub(crate) fn invalid_argument<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidArgument(InvalidArgumentError {
            arg,
            msg: msg.into(),
        })
    }

    pub(crate) fn degenerate_distribution<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::DegenerateDistribution(DegenerateDistributionError { msg: msg.into() })
    }

    pub(crate) fn curvature_violation<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::CurvatureViolation(CurvatureViolationError { msg: msg.into() })
    }
}

impl fmt::Display for TagwiseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidArgument(e) => e.fmt(f),
            Self::DegenerateDistribution(e) => e.fmt(f),
            Self::CurvatureViolation(e) => e.fmt(f),
            Self::IOError(e) => e.fmt(f),
        }
    }
}

impl Error for TagwiseError {}

/// Error used when the argument is invalid.
#[derive(Debug)]
pub struct InvalidArgumentError {
    /// Name of the argument.
    pub(crate) arg: &'static str,

    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for InvalidArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidArgumentError: {}: {}", self.arg, self.msg)
    }
}

impl Error for InvalidArgumentError {}

/// Error used when a distribution cannot be normalized or is not a distribution.
///
/// Raised for empty or all-zero inputs to normalization, log-domain normalization of a map whose
/// entries are all `-inf`, logarithms of negative values, and softmax outputs that do not sum to
/// one.
#[derive(Debug)]
pub struct DegenerateDistributionError {
    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for DegenerateDistributionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DegenerateDistributionError: {}", self.msg)
    }
}

impl Error for DegenerateDistributionError {}

/// Error used when a quasi-Newton update meets a zero curvature pair.
#[derive(Debug)]
pub struct CurvatureViolationError {
    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for CurvatureViolationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CurvatureViolationError: {}", self.msg)
    }
}

impl Error for CurvatureViolationError {}

impl From<std::io::Error> for TagwiseError {
    fn from(error: std::io::Error) -> Self {
        Self::IOError(error)
    }
}
