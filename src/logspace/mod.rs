use anyhow::bail;
use log::debug;

use crate::utils::{FloatOps, StableMath};

impl<T: FloatOps> StableMath<T> {
    /// `log(Σ exp(xi))`, shifted by the maximum so the largest exponentiated term is `exp(0)`.
    ///
    /// `-inf` terms are zero probability and are skipped. An all `-inf` input yields `-inf`,
    /// a `+inf` term yields `+inf`. Empty input and NaN are rejected.
    pub fn logsumexp(&self, x: &[T]) -> anyhow::Result<T> {
        if x.is_empty() {
            debug!("logsumexp called with an empty sequence");
            bail!("logsumexp of an empty sequence is undefined");
        }
        if let Some(pos) = x.iter().position(|v| v.is_nan()) {
            bail!("logsumexp input contains NaN at position {}", pos);
        }

        let max = x.iter().copied().fold(T::neg_infinity(), T::max);
        if max.is_infinite() {
            return Ok(max);
        }

        let sum = x
            .iter()
            .filter(|&&xi| xi > T::neg_infinity())
            .fold(T::zero(), |acc, &xi| acc + self.exp(xi - max));
        Ok(self.log(sum) + max)
    }

    /// `log(e^a + e^b)` as `max + log(1 + exp(min - max))`.
    ///
    /// The exponent is never positive, so nothing overflows. `ln_1p` keeps precision when
    /// the smaller term is many orders of magnitude below the larger one. Its argument
    /// `1 + e^d` is at least one and every accepted saturation threshold is below one, so
    /// the result matches the guarded `log` under any policy.
    pub fn sum_two_log_probs(&self, a: T, b: T) -> T {
        let (hi, lo) = if b < a { (a, b) } else { (b, a) };
        if hi.is_infinite() {
            return hi;
        }
        hi + self.exp(lo - hi).ln_1p()
    }

    /// `log(|e^a - e^b|)` as `max + log(1 - exp(min - max))`.
    ///
    /// Only meaningful when the caller knows which term dominates. At `a == b` the inner
    /// value is exactly `0`: the saturating policy turns `log(0)` into `0` and the result is
    /// `a`, while the IEEE policy returns `-inf`.
    pub fn subtract_log_prob(&self, a: T, b: T) -> T {
        let (hi, lo) = if b < a { (a, b) } else { (b, a) };
        if hi == T::neg_infinity() {
            return hi;
        }
        // 1 - exp(d) == -expm1(d), exact near d = 0
        hi + self.log(-(lo - hi).exp_m1())
    }
}

/// Log-sum-exp with the default policy.
pub fn logsumexp<T: FloatOps>(x: &[T]) -> anyhow::Result<T> {
    StableMath::<T>::default().logsumexp(x)
}

pub fn sum_two_log_probs<T: FloatOps>(a: T, b: T) -> T {
    StableMath::<T>::default().sum_two_log_probs(a, b)
}

pub fn subtract_log_prob<T: FloatOps>(a: T, b: T) -> T {
    StableMath::<T>::default().subtract_log_prob(a, b)
}
