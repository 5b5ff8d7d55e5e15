/// Boundary error type for input-validation failures: non-positive
/// trace widths, non-positive gaps, unknown layer names, empty polygons.
/// Algorithmic non-convergence (kind 2) is never represented here — it
/// surfaces as structured result fields instead. Invariant violations
/// (kind 3) panic; there is no recovery path and thus no variant for them.
#[derive(Debug, thiserror::Error)]
pub enum DesignCoreError {
    #[error("invalid parameter `{param}`: {reason}")]
    InvalidParameter { param: &'static str, reason: String },

    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    #[error("empty or degenerate polygon")]
    EmptyPolygon,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DesignCoreError>;

pub(crate) fn require_positive(param: &'static str, value: f64) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(DesignCoreError::InvalidParameter {
            param,
            reason: format!("must be > 0, got {value}"),
        })
    }
}
