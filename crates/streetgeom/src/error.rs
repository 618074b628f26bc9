use thiserror::Error;

/// Errors raised by geometry construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeomError {
    /// Buffer distances must be finite and non-negative.
    #[error("buffer radius must be finite and non-negative, got {0}")]
    InvalidRadius(f64),
    /// The polyline collapses to fewer than two distinct vertices.
    #[error("polyline needs at least two distinct vertices")]
    DegenerateLine,
    /// A mitre limit below 1 would clip the offset edges themselves.
    #[error("mitre limit must be at least 1.0, got {0}")]
    InvalidMitreLimit(f64),
}
