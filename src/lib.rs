//! ebm-core: the numerical kernel of an explainable boosting machine trainer.
//!
//! An EBM is an additive model `f(x) = sum_k T_k(x_{S_k})` where each shape
//! function `T_k` is a piecewise-constant tensor over a small feature subset.
//! This crate owns the tight loops under such a trainer:
//!
//! - [`data`]: bit-packed binned input, shape-function tensors, datasets
//! - update application: one boosting round's tensor applied to residuals or
//!   predictor scores, with the validation metric ([`Engine::apply_training_update`],
//!   [`Engine::apply_validation_update`])
//! - interaction scoring: ranking candidate feature pairs by the gain their
//!   joint partition buys ([`Engine::score_interaction`])
//!
//! The outer boosting loop (round selection, tree construction over the
//! histograms, best-model tracking, sampling sets, any foreign-function
//! surface) lives with the caller. The engine is single-threaded by
//! construction; run disjoint engines on disjoint threads for parallelism.

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod objective;

mod interaction;
mod update;

pub use config::EngineConfig;
pub use data::{
    BinnedColumn, DataSet, DatasetRole, Feature, FeatureCombination, PackLayout, SegmentedTensor,
    TargetValues, MAX_DIMENSIONS, WORD_BITS,
};
pub use engine::Engine;
pub use error::{EngineError, ErrorKind};
pub use objective::{LogitConvention, Objective};
