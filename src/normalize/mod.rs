use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use anyhow::bail;
use log::{debug, trace};
use ndarray::{Array1, ArrayBase, DataMut, Ix1};

use crate::utils::{FloatOps, StableMath};

/// In-place rescaling of a container of probabilities (or log-magnitudes) to sum to one.
///
/// Implemented once per container capability: slices (and therefore `Vec`), 1-D `ndarray`
/// arrays, `HashMap` and `BTreeMap`. Every implementation hands its values to the same
/// numeric routine through [`NormalizeInplace::update_values`], so a map and a sequence
/// holding the same numbers end up with the same results. On error the container is left
/// untouched.
pub trait NormalizeInplace<T: FloatOps> {
    /// Runs `op` over all values of the container, in the container's iteration order.
    fn update_values<F>(&mut self, op: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut [T]) -> anyhow::Result<()>;

    /// Divides every value by the sum of all values.
    fn normalize_inplace(&mut self) -> anyhow::Result<()> {
        self.update_values(normalize_values)
    }

    /// Softmax: shifts by the maximum, exponentiates, then normalizes.
    fn exp_normalize_inplace(&mut self) -> anyhow::Result<()> {
        StableMath::<T>::default().exp_normalize_inplace(self)
    }

    /// Renormalizes log-probabilities so the underlying probabilities sum to one.
    fn normalize_log_prob_inplace(&mut self) -> anyhow::Result<()> {
        StableMath::<T>::default().normalize_log_prob_inplace(self)
    }
}

impl<T: FloatOps> NormalizeInplace<T> for [T] {
    fn update_values<F>(&mut self, op: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut [T]) -> anyhow::Result<()>,
    {
        op(self)
    }
}

impl<T, S> NormalizeInplace<T> for ArrayBase<S, Ix1>
where
    T: FloatOps,
    S: DataMut<Elem = T>,
{
    fn update_values<F>(&mut self, op: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut [T]) -> anyhow::Result<()>,
    {
        if let Some(values) = self.as_slice_mut() {
            return op(values);
        }
        // Strided view
        update_slots(self.iter_mut(), op)
    }
}

impl<K, T, S> NormalizeInplace<T> for HashMap<K, T, S>
where
    T: FloatOps,
    S: BuildHasher,
{
    fn update_values<F>(&mut self, op: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut [T]) -> anyhow::Result<()>,
    {
        update_slots(self.values_mut(), op)
    }
}

impl<K, T> NormalizeInplace<T> for BTreeMap<K, T>
where
    T: FloatOps,
{
    fn update_values<F>(&mut self, op: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut [T]) -> anyhow::Result<()>,
    {
        update_slots(self.values_mut(), op)
    }
}

/// Copies the values behind `slots` into a contiguous buffer, runs `op` on it and writes
/// the results back through the same references. Nothing is written if `op` fails.
fn update_slots<'a, T, I, F>(slots: I, op: F) -> anyhow::Result<()>
where
    T: FloatOps,
    I: Iterator<Item = &'a mut T>,
    F: FnOnce(&mut [T]) -> anyhow::Result<()>,
{
    let slots: Vec<&mut T> = slots.collect();
    let mut buffer: Vec<T> = slots.iter().map(|slot| **slot).collect();
    op(&mut buffer)?;
    for (slot, value) in slots.into_iter().zip(buffer) {
        *slot = value;
    }
    Ok(())
}

fn normalize_values<T: FloatOps>(values: &mut [T]) -> anyhow::Result<()> {
    let sum = values.iter().fold(T::zero(), |acc, &v| acc + v);
    if !sum.is_finite() || sum <= T::zero() {
        debug!(
            "refusing to normalize {} values with sum {:?}",
            values.len(),
            sum
        );
        bail!(
            "Cannot normalize: sum of values must be finite and positive, got {:?}",
            sum
        );
    }
    trace!("normalizing {} values by {:?}", values.len(), sum);
    for v in values.iter_mut() {
        *v = *v / sum;
    }
    Ok(())
}

/// Maximum of a vector of log-magnitudes; must exist and be finite.
fn finite_max<T: FloatOps>(values: &[T]) -> anyhow::Result<T> {
    if values.is_empty() {
        bail!("Cannot exp-normalize an empty sequence");
    }
    if let Some(pos) = values.iter().position(|v| v.is_nan()) {
        bail!("Cannot exp-normalize: NaN at position {}", pos);
    }
    let max = values.iter().copied().fold(T::neg_infinity(), T::max);
    if !max.is_finite() {
        debug!("exp-normalize rejected: maximum log-magnitude is {:?}", max);
        bail!(
            "Cannot exp-normalize: maximum log-magnitude must be finite, got {:?}",
            max
        );
    }
    Ok(max)
}

impl<T: FloatOps> StableMath<T> {
    fn exp_normalize_values(&self, values: &mut [T]) -> anyhow::Result<()> {
        let max = finite_max(values)?;
        for v in values.iter_mut() {
            *v = self.exp(*v - max);
        }
        // The maximum contributes exp(0) = 1, so the sum is at least one
        normalize_values(values)
    }

    fn normalize_log_prob_values(&self, values: &mut [T]) -> anyhow::Result<()> {
        self.exp_normalize_values(values)?;
        for v in values.iter_mut() {
            *v = self.log(*v);
        }
        Ok(())
    }

    /// Numerically stable softmax of `x`, returned as a new vector.
    pub fn exp_normalize(&self, x: &[T]) -> anyhow::Result<Array1<T>> {
        let mut out = x.to_vec();
        self.exp_normalize_values(&mut out)?;
        Ok(Array1::from(out))
    }

    /// `[log a, log b, log c] -> [log a/Z, log b/Z, log c/Z]` with `Z = a + b + c`.
    ///
    /// The final log goes through the guarded `log`, so under the saturating policy any
    /// probability below the threshold comes back as `0` rather than a large negative value.
    pub fn normalize_log_prob(&self, x: &[T]) -> anyhow::Result<Array1<T>> {
        let mut out = x.to_vec();
        self.normalize_log_prob_values(&mut out)?;
        Ok(Array1::from(out))
    }

    pub fn exp_normalize_inplace<C>(&self, x: &mut C) -> anyhow::Result<()>
    where
        C: NormalizeInplace<T> + ?Sized,
    {
        x.update_values(|values| self.exp_normalize_values(values))
    }

    pub fn normalize_log_prob_inplace<C>(&self, x: &mut C) -> anyhow::Result<()>
    where
        C: NormalizeInplace<T> + ?Sized,
    {
        x.update_values(|values| self.normalize_log_prob_values(values))
    }
}

/// Divides each element by the sum of the elements. The sum must be finite and positive.
pub fn normalize<T: FloatOps>(x: &[T]) -> anyhow::Result<Array1<T>> {
    let mut out = x.to_vec();
    normalize_values(&mut out)?;
    Ok(Array1::from(out))
}

pub fn normalize_inplace<T, C>(x: &mut C) -> anyhow::Result<()>
where
    T: FloatOps,
    C: NormalizeInplace<T> + ?Sized,
{
    x.normalize_inplace()
}

pub fn exp_normalize<T: FloatOps>(x: &[T]) -> anyhow::Result<Array1<T>> {
    StableMath::<T>::default().exp_normalize(x)
}

pub fn exp_normalize_inplace<T, C>(x: &mut C) -> anyhow::Result<()>
where
    T: FloatOps,
    C: NormalizeInplace<T> + ?Sized,
{
    StableMath::<T>::default().exp_normalize_inplace(x)
}

pub fn normalize_log_prob<T: FloatOps>(x: &[T]) -> anyhow::Result<Array1<T>> {
    StableMath::<T>::default().normalize_log_prob(x)
}

pub fn normalize_log_prob_inplace<T, C>(x: &mut C) -> anyhow::Result<()>
where
    T: FloatOps,
    C: NormalizeInplace<T> + ?Sized,
{
    StableMath::<T>::default().normalize_log_prob_inplace(x)
}
