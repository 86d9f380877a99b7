//! Validation errors raised before any pipeline step runs.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Polygon has no coordinates")]
    EmptyPolygon,
    #[error("Polygon holes are not supported, got {0} interior rings")]
    InteriorRings(usize),
    #[error("Linestring has less than 3 different vertices")]
    TooFewVertices,
    #[error("Linestring is not closed")]
    UnclosedRing,
    #[error("Coordinate [{0}, {1}] is not a finite [lon, lat] pair")]
    InvalidCoordinate(f64, f64),
    #[error("Negative value not allowed for radius ({0})")]
    NegativeRadius(f64),
    #[error("Polygon approximation needs at least 3 edges, got {0}")]
    TooFewEdges(usize),
    #[error("Lower limit ({lower}) must not exceed upper limit ({upper})")]
    InvertedLimits { lower: f64, upper: f64 },
    #[error("{field}: start ({start}) must not be after end ({end})")]
    InvertedPeriod {
        field: &'static str,
        start: String,
        end: String,
    },
    #[error("{field}: {reason}")]
    Field { field: &'static str, reason: String },
}

impl ValidationError {
    pub(crate) fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Field {
            field,
            reason: reason.into(),
        }
    }
}
