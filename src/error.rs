//! Error types shared across the engine.
//!
//! Every fallible call returns [`EngineError`]. The outer ABI layer does not
//! care about the individual variants, only about the coarse [`ErrorKind`]
//! it maps to a return code, so each variant carries a `kind()`.

/// Coarse error classification for the outer ABI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed caller input: bad counts, mismatched lengths, unknown indices.
    InvalidArgument,
    /// Arithmetic overflow while computing a buffer size.
    CapacityExceeded,
    /// An allocation could not be satisfied.
    ResourceExhausted,
}

/// Errors produced by engine construction, dataset attachment, and scoring.
///
/// Numeric trouble during an update pass is never an error: the validation
/// metric is reported as `+inf` and the caller rejects the round.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("feature {feature_idx} has zero bins")]
    BinCountZero { feature_idx: usize },

    #[error("{what}: expected length {expected}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("target {value} at instance {instance} is out of range for {n_classes} classes")]
    TargetOutOfRange {
        instance: usize,
        value: usize,
        n_classes: usize,
    },

    #[error("bin {value} at instance {instance} exceeds the combination's {bin_count} bins")]
    BinOutOfRange {
        instance: usize,
        value: usize,
        bin_count: usize,
    },

    #[error("feature index {index} out of range ({count} features)")]
    UnknownFeature { index: usize, count: usize },

    #[error("combination index {index} out of range ({count} combinations)")]
    UnknownCombination { index: usize, count: usize },

    #[error("no {role} dataset attached")]
    DatasetMissing { role: &'static str },

    #[error("update tensor holds {got} values, combination needs {expected}")]
    UpdateShapeMismatch { expected: usize, got: usize },

    #[error("combination has {got} features, at most {max} supported")]
    TooManyDimensions { got: usize, max: usize },

    #[error("pack layout invalid: {items_per_word} items x {bits_per_item} bits exceeds the storage word")]
    InvalidPackLayout {
        items_per_word: usize,
        bits_per_item: usize,
    },

    #[error("size product overflows a machine word")]
    CapacityExceeded,

    #[error("allocation of {bytes} bytes failed")]
    ResourceExhausted { bytes: usize },
}

impl EngineError {
    /// The coarse kind the outer ABI maps to a return code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::BinCountZero { .. }
            | EngineError::LengthMismatch { .. }
            | EngineError::TargetOutOfRange { .. }
            | EngineError::BinOutOfRange { .. }
            | EngineError::UnknownFeature { .. }
            | EngineError::UnknownCombination { .. }
            | EngineError::DatasetMissing { .. }
            | EngineError::UpdateShapeMismatch { .. }
            | EngineError::TooManyDimensions { .. }
            | EngineError::InvalidPackLayout { .. } => ErrorKind::InvalidArgument,
            EngineError::CapacityExceeded => ErrorKind::CapacityExceeded,
            EngineError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
        }
    }
}

/// Reserve `len` elements in an empty `Vec`, reporting allocation failure
/// instead of aborting.
pub(crate) fn try_alloc<T: Clone>(len: usize, fill: T) -> Result<Vec<T>, EngineError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| EngineError::ResourceExhausted {
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    v.resize(len, fill);
    Ok(v)
}
