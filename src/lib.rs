//! Numerically stable log-space arithmetic for probability vectors.
//!
//! Natural logarithms are used for all internal arithmetic; entropy and the divergences
//! are reported in bits. The guarded `log` saturates to `0` below `1e-10` by default; use a
//! [`StableMath`] built with [`StableMath::ieee`] or a custom threshold to change that for
//! every operation at once.

pub mod information;
pub mod logspace;
pub mod normalize;
pub mod scalar;
mod utils;

pub use information::{entropy, entropy_map, jensen_shannon_divergence, kl_divergence};
pub use logspace::{logsumexp, subtract_log_prob, sum_two_log_probs};
pub use normalize::{
    exp_normalize, exp_normalize_inplace, normalize, normalize_inplace, normalize_log_prob,
    normalize_log_prob_inplace, NormalizeInplace,
};
pub use scalar::{exp, log};
pub use utils::{FloatOps, SaturationPolicy, StableMath, StableMathBuilder, DEFAULT_LOG_THRESHOLD};
