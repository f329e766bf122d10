use anyhow::bail;
use log::debug;

use crate::utils::{FloatOps, StableMath};

fn check_lengths(name: &str, p: usize, q: usize) -> anyhow::Result<()> {
    if p != q {
        bail!(
            "{}: distributions have different lengths ({} vs {})",
            name,
            p,
            q
        );
    }
    Ok(())
}

impl<T: FloatOps> StableMath<T> {
    fn entropy_of<'a, I>(&self, p: I) -> T
    where
        I: IntoIterator<Item = &'a T>,
    {
        let nats = p
            .into_iter()
            .filter(|&&pi| pi > T::zero())
            .fold(T::zero(), |acc, &pi| acc + pi * self.log(pi));
        -nats / T::LN_2()
    }

    /// Shannon entropy in bits, `-Σ pi log2 pi`. Zero entries contribute nothing.
    pub fn entropy(&self, p: &[T]) -> T {
        self.entropy_of(p)
    }

    /// Entropy of the values of a key-to-probability map (`HashMap`, `BTreeMap`, ...).
    /// Key order is irrelevant.
    pub fn entropy_map<'a, K, M>(&self, p: &'a M) -> T
    where
        K: 'a,
        M: ?Sized,
        &'a M: IntoIterator<Item = (&'a K, &'a T)>,
    {
        self.entropy_of(p.into_iter().map(|(_, pi)| pi))
    }

    /// `KL(p || q)` in bits, summed over indices where `pi != 0`.
    ///
    /// A zero in `q` opposite a non-zero `pi` makes the divergence `+inf`, under every
    /// policy. Finite ratios still go through the guarded `log`, so with the saturating
    /// policy a ratio `pi / qi` below the threshold contributes `0`.
    pub fn kl_divergence(&self, p: &[T], q: &[T]) -> anyhow::Result<T> {
        check_lengths("kl_divergence", p.len(), q.len())?;

        let mut kl = T::zero();
        for (i, (&pi, &qi)) in p.iter().zip(q).enumerate() {
            if pi == T::zero() {
                continue;
            }
            if qi == T::zero() {
                debug!(
                    "kl_divergence: q[{}] = 0 while p[{}] = {:?}, divergence is infinite",
                    i, i, pi
                );
                return Ok(T::infinity());
            }
            kl = kl + pi * self.log(pi / qi);
        }
        Ok(kl / T::LN_2())
    }

    /// Jensen-Shannon divergence in bits: `(KL(p || m) + KL(q || m)) / 2` with `m = (p + q) / 2`.
    ///
    /// Symmetric and bounded by one bit.
    pub fn jensen_shannon_divergence(&self, p: &[T], q: &[T]) -> anyhow::Result<T> {
        check_lengths("jensen_shannon_divergence", p.len(), q.len())?;

        let two = T::one() + T::one();
        let average: Vec<T> = p.iter().zip(q).map(|(&pi, &qi)| (pi + qi) / two).collect();
        Ok((self.kl_divergence(p, &average)? + self.kl_divergence(q, &average)?) / two)
    }
}

pub fn entropy<T: FloatOps>(p: &[T]) -> T {
    StableMath::<T>::default().entropy(p)
}

pub fn entropy_map<'a, K, T, M>(p: &'a M) -> T
where
    K: 'a,
    T: FloatOps,
    M: ?Sized,
    &'a M: IntoIterator<Item = (&'a K, &'a T)>,
{
    StableMath::<T>::default().entropy_map(p)
}

pub fn kl_divergence<T: FloatOps>(p: &[T], q: &[T]) -> anyhow::Result<T> {
    StableMath::<T>::default().kl_divergence(p, q)
}

pub fn jensen_shannon_divergence<T: FloatOps>(p: &[T], q: &[T]) -> anyhow::Result<T> {
    StableMath::<T>::default().jensen_shannon_divergence(p, q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use std::collections::{BTreeMap, HashMap};
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::distr::{Distribution, Uniform};
    use rand::{rngs::StdRng, SeedableRng};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn random_distribution(rng: &mut StdRng, len: usize) -> Vec<f64> {
        let dist = Uniform::try_from(0.01..1.0).unwrap();
        let raw: Vec<f64> = (0..len).map(|_| dist.sample(&mut *rng)).collect();
        normalize(&raw).unwrap().to_vec()
    }

    #[test]
    fn test_entropy_known_values() {
        assert_relative_eq!(entropy(&[0.5, 0.5]), 1.0);
        assert!((entropy(&[0.75_f64, 0.25]) - 0.8112781244).abs() < 1e-10);
        assert!((entropy(&[0.1_f64, 0.1, 0.8]) - 0.9219280948).abs() < 1e-10);
        assert_relative_eq!(entropy(&[0.25_f32; 4]), 2.0_f32, max_relative = 1e-6);
    }

    #[test]
    fn test_entropy_one_hot_is_zero() {
        assert_eq!(entropy(&[0.0, 1.0, 0.0]), 0.0);
        assert_eq!(entropy(&[1.0]), 0.0);
    }

    #[test]
    fn test_entropy_non_negative() {
        let mut rng = StdRng::seed_from_u64(5);
        for len in 2..40 {
            let p = random_distribution(&mut rng, len);
            let h = entropy(&p);
            assert!(h > 0.0);
            // Bounded by the uniform distribution
            assert!(h <= (len as f64).log2() + 1e-12);
        }
    }

    #[test]
    fn test_entropy_map_matches_sequence() {
        let p = [0.2, 0.3, 0.5];
        let map: HashMap<String, f64> = ["x", "y", "z"]
            .iter()
            .map(|k| k.to_string())
            .zip(p)
            .collect();
        assert_relative_eq!(entropy_map(&map), entropy(&p), max_relative = 1e-12);

        let tree: BTreeMap<char, f64> = ['a', 'b', 'c'].into_iter().zip(p).collect();
        assert_relative_eq!(entropy_map(&tree), entropy(&p), max_relative = 1e-12);

        let math = StableMath::<f64>::ieee();
        assert_relative_eq!(math.entropy_map(&tree), math.entropy(&p), max_relative = 1e-12);
    }

    #[test]
    fn test_kl_divergence() {
        let p = [0.5, 0.5];
        let q = [0.25, 0.75];
        let expected = 0.5 * (2.0_f64).log2() + 0.5 * (0.5_f64 / 0.75).log2();
        assert_relative_eq!(kl_divergence(&p, &q).unwrap(), expected, max_relative = 1e-12);

        // Zero entries in p are skipped
        let p = [0.0, 1.0];
        let q = [0.5, 0.5];
        assert_relative_eq!(kl_divergence(&p, &q).unwrap(), 1.0);
    }

    #[test]
    fn test_kl_divergence_properties() {
        let mut rng = StdRng::seed_from_u64(17);
        for len in 2..32 {
            let p = random_distribution(&mut rng, len);
            let q = random_distribution(&mut rng, len);
            assert!(kl_divergence(&p, &q).unwrap() > 0.0);
            assert_eq!(kl_divergence(&p, &p).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_kl_divergence_zero_reference_is_infinite() {
        init();
        let p = [0.5, 0.5];
        let q = [1.0, 0.0];
        assert_eq!(kl_divergence(&p, &q).unwrap(), f64::INFINITY);

        let math = StableMath::<f64>::ieee();
        assert_eq!(math.kl_divergence(&p, &q).unwrap(), f64::INFINITY);

        // Nothing to diverge where p is zero too
        let p = [1.0, 0.0];
        assert_eq!(kl_divergence(&p, &q).unwrap(), 0.0);
    }

    #[test]
    fn test_kl_divergence_saturated_ratio() {
        // p[1] / q[1] = 2e-11 falls under the saturation threshold
        let p = [1.0 - 1e-11, 1e-11];
        let q = [0.5, 0.5];
        let saturated = kl_divergence(&p, &q).unwrap();
        let exact = StableMath::<f64>::ieee().kl_divergence(&p, &q).unwrap();

        let ratio_term = 1e-11 * (2e-11_f64).ln() / std::f64::consts::LN_2;
        assert_relative_eq!(saturated - exact, -ratio_term, max_relative = 1e-4);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        init();
        let p = [0.5, 0.5];
        let q = [0.2, 0.3, 0.5];
        assert!(kl_divergence(&p, &q).is_err());
        assert!(jensen_shannon_divergence(&p, &q).is_err());
        assert!(jensen_shannon_divergence(&q, &p).is_err());
    }

    #[test]
    fn test_jensen_shannon_divergence() {
        // Disjoint supports are exactly one bit apart
        let p = [1.0, 0.0];
        let q = [0.0, 1.0];
        assert_relative_eq!(jensen_shannon_divergence(&p, &q).unwrap(), 1.0);

        let p = [0.3, 0.7];
        assert_eq!(jensen_shannon_divergence(&p, &p).unwrap(), 0.0);
    }

    #[test]
    fn test_jensen_shannon_divergence_symmetric_and_bounded() {
        let mut rng = StdRng::seed_from_u64(23);
        for len in 2..32 {
            let p = random_distribution(&mut rng, len);
            let q = random_distribution(&mut rng, len);
            let pq = jensen_shannon_divergence(&p, &q).unwrap();
            let qp = jensen_shannon_divergence(&q, &p).unwrap();
            assert_eq!(pq, qp);
            assert!(pq >= 0.0);
            assert!(pq <= 1.0);
        }

        let p = [0.1, 0.0, 0.9];
        let q = [0.0, 0.6, 0.4];
        assert_abs_diff_eq!(
            jensen_shannon_divergence(&p, &q).unwrap(),
            jensen_shannon_divergence(&q, &p).unwrap()
        );
    }
}
