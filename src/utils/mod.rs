use std::fmt::Debug;

use anyhow::bail;
use num_traits::{Float, FloatConst, FromPrimitive};

/// Inputs to the guarded logarithm below this value saturate to `0` under the default policy.
pub const DEFAULT_LOG_THRESHOLD: f64 = 1e-10;

/// Floating point types the log-space routines operate on.
pub trait FloatOps: Float + FloatConst + FromPrimitive + Debug + Send + Sync + 'static {}

impl<T> FloatOps for T where T: Float + FloatConst + FromPrimitive + Debug + Send + Sync + 'static {}

/// How the guarded logarithm treats inputs at or near zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SaturationPolicy<T> {
    /// `log(x)` returns `0` for every `x < threshold`, keeping downstream sums finite.
    Saturate { threshold: T },
    /// Plain IEEE-754 natural log: `log(0) = -inf`, `log(x < 0) = NaN`.
    Ieee,
}

impl<T: FloatOps> Default for SaturationPolicy<T> {
    fn default() -> Self {
        SaturationPolicy::Saturate {
            threshold: default_threshold(),
        }
    }
}

fn default_threshold<T: FloatOps>() -> T {
    T::from_f64(DEFAULT_LOG_THRESHOLD).unwrap_or_else(T::min_positive_value)
}

/// Entry point carrying a single [`SaturationPolicy`].
///
/// Every policy-dependent operation in the crate is a method on this type, so one
/// instance applies the same near-zero semantics across `log`, the pairwise combinators,
/// the normalization family and the information measures. The crate-root free functions
/// all go through `StableMath::default()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StableMath<T> {
    policy: SaturationPolicy<T>,
}

impl<T: FloatOps> Default for StableMath<T> {
    fn default() -> Self {
        StableMath {
            policy: SaturationPolicy::default(),
        }
    }
}

impl<T: FloatOps> StableMath<T> {
    /// Rejects a saturation threshold outside `[0, 1)`.
    ///
    /// A threshold of one or more would saturate `log` at arguments every combinator
    /// produces for ordinary inputs (`log(1 + e^d)` in a pairwise sum, the shifted sum in
    /// `logsumexp`), so the primitives could no longer agree with each other.
    pub fn new(policy: SaturationPolicy<T>) -> anyhow::Result<Self> {
        if let SaturationPolicy::Saturate { threshold } = policy {
            if !threshold.is_finite() || threshold < T::zero() || threshold >= T::one() {
                bail!(
                    "Saturation threshold must lie in [0, 1), got {:?}",
                    threshold
                );
            }
        }
        Ok(StableMath { policy })
    }

    /// Exact IEEE semantics everywhere; infinities and NaN propagate.
    pub fn ieee() -> Self {
        StableMath {
            policy: SaturationPolicy::Ieee,
        }
    }

    pub fn builder() -> StableMathBuilder<T> {
        StableMathBuilder::new()
    }

    pub fn policy(&self) -> SaturationPolicy<T> {
        self.policy
    }
}

pub struct StableMathBuilder<T> {
    threshold: Option<T>,
    ieee: bool,
}

impl<T: FloatOps> Default for StableMathBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatOps> StableMathBuilder<T> {
    pub fn new() -> Self {
        StableMathBuilder {
            threshold: None,
            ieee: false,
        }
    }

    pub fn threshold(mut self, threshold: T) -> Self {
        self.threshold = Some(threshold);
        self.ieee = false;
        self
    }

    pub fn ieee(mut self) -> Self {
        self.ieee = true;
        self.threshold = None;
        self
    }

    pub fn build(self) -> anyhow::Result<StableMath<T>> {
        if self.ieee {
            return Ok(StableMath::ieee());
        }
        let threshold = self.threshold.unwrap_or_else(default_threshold);
        StableMath::new(SaturationPolicy::Saturate { threshold })
    }
}
