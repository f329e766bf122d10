use crate::utils::{FloatOps, SaturationPolicy, StableMath};

impl<T: FloatOps> StableMath<T> {
    /// `e^x`. Overflow yields `+inf`, never a panic.
    #[inline]
    pub fn exp(&self, x: T) -> T {
        x.exp()
    }

    /// Natural logarithm under this instance's [`SaturationPolicy`].
    ///
    /// With `Saturate { threshold }` any `x < threshold` (negative input included) maps to `0`
    /// rather than a large negative number or `-inf`. This keeps sums finite but is not exact:
    /// a tiny positive probability reads as `log(1)`.
    #[inline]
    pub fn log(&self, x: T) -> T {
        match self.policy() {
            SaturationPolicy::Saturate { threshold } if x < threshold => T::zero(),
            _ => x.ln(),
        }
    }
}

/// Guarded `e^x` with the default policy.
pub fn exp<T: FloatOps>(x: T) -> T {
    StableMath::<T>::default().exp(x)
}

/// Guarded natural log with the default policy (saturates below `1e-10`).
pub fn log<T: FloatOps>(x: T) -> T {
    StableMath::<T>::default().log(x)
}
