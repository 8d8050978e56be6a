//! Engine-wide numeric knobs.

/// Parameters that shape the engine's numeric behavior.
///
/// These are static for the lifetime of an engine instance. The outer
/// collaborator supplies them at creation; none of the kernels carry hidden
/// constants of their own.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// L2 smoothing (lambda) added to the hessian denominator of interaction
    /// gains.
    pub interaction_smoothing: f64,
    /// Floor applied to per-instance hessians when histogramming, so a fully
    /// saturated sigmoid cannot zero a denominator.
    pub min_hessian: f64,
    /// Subtract the per-instance max score before `exp` in the multiclass
    /// log-loss. Off by default: extreme scores may overflow to `+inf`, which
    /// the metric guard turns into a rejected round.
    pub stabilize_softmax: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interaction_smoothing: 1.0,
            min_hessian: 1e-16,
            stabilize_softmax: false,
        }
    }
}
