//! Stretch-and-jitter for clustered scores.
//!
//! The oracle tends to hand out "safe" scores in a narrow 80–90 band. This
//! stretches that window onto [5, 95] and adds bounded uniform noise so that
//! identical inputs stop landing on identical outputs. The random source is
//! injected; pass a seeded `StdRng` for reproducible output.

use rand::Rng;

pub const DEFAULT_JITTER_FRACTION: f64 = 0.03;

const IN_LOW: f64 = 80.0;
const IN_HIGH: f64 = 90.0;
const OUT_LOW: f64 = 5.0;
const OUT_HIGH: f64 = 95.0;

/// Order- and length-preserving. Inputs outside [80, 90] are accepted; the
/// result is clamped to [5, 95] regardless. NaN maps to 5.
pub fn redistribute<R: Rng>(values: &[f64], jitter_fraction: f64, rng: &mut R) -> Vec<f64> {
    let span = OUT_HIGH - OUT_LOW;
    let amplitude = jitter_fraction.max(0.0) * span;

    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                return OUT_LOW;
            }
            let unit = (v - IN_LOW) / (IN_HIGH - IN_LOW);
            let stretched = unit * span + OUT_LOW;
            let jitter = if amplitude > 0.0 && amplitude.is_finite() {
                rng.random_range(-amplitude..=amplitude)
            } else {
                0.0
            };
            (stretched + jitter).clamp(OUT_LOW, OUT_HIGH)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn window_edges_map_exactly_without_jitter() {
        let mut rng = StdRng::seed_from_u64(7);
        let out = redistribute(&[80.0, 85.0, 90.0], 0.0, &mut rng);
        assert_eq!(out, vec![5.0, 50.0, 95.0]);
    }

    #[test]
    fn output_is_bounded_for_any_input() {
        let mut rng = StdRng::seed_from_u64(42);
        let values: Vec<f64> = (0..200).map(|i| i as f64 * 0.75 - 20.0).collect();
        for jitter in [0.0, 0.03, 0.5, 1.0] {
            let out = redistribute(&values, jitter, &mut rng);
            assert_eq!(out.len(), values.len());
            assert!(out.iter().all(|x| (5.0..=95.0).contains(x)), "jitter {jitter}");
        }
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let values = [81.0, 82.5, 88.0, 88.0];
        let a = redistribute(&values, 0.03, &mut StdRng::seed_from_u64(9));
        let b = redistribute(&values, 0.03, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn jitter_stays_within_amplitude() {
        let mut rng = StdRng::seed_from_u64(3);
        let out = redistribute(&[85.0; 50], DEFAULT_JITTER_FRACTION, &mut rng);
        // 85 → 50, noise at most 0.03 * 90 = 2.7
        assert!(out.iter().all(|x| (x - 50.0).abs() <= 2.7 + 1e-9));
        // ties get broken
        assert!(out.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn non_finite_inputs_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(11);
        let out = redistribute(&[f64::NAN, f64::INFINITY, f64::NEG_INFINITY], 0.03, &mut rng);
        assert_eq!(out, vec![5.0, 95.0, 5.0]);
    }

    #[test]
    fn order_is_preserved() {
        let out = redistribute(&[80.0, 90.0, 80.0], 0.0, &mut StdRng::seed_from_u64(1));
        assert_eq!(out, vec![5.0, 95.0, 5.0]);
    }
}
