//! # Population normalizer
//! Remaps raw oracle scores onto a comparable 0–100 scale using statistics of
//! the whole batch. Two strategies, selected by the caller, never composed:
//!
//! - **Z-score**: `out = clamp((z + 3) * 100/6, 0, 100)`, rounded to 2 decimals.
//!   Population σ (divide by N). Zero variance is a no-op.
//! - **Percentile**: rank among sorted scores, `p = rank / (N-1) * 100`
//!   (50 when N == 1), then an asymmetric curve that widens the middle:
//!   `p < 50 → 25 * (p/50)^0.8`, otherwise `75 + 25 * ((p-50)/50)^1.2`,
//!   rounded to an integer.
//!
//! Both are one-shot transforms: running them twice on the same batch moves the
//! scores again. Run once per raw-evaluation batch.

use serde::{Deserialize, Serialize};

use crate::record::StartupRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[serde(alias = "z-score", alias = "z")]
    ZScore,
    #[default]
    Percentile,
}

/// How tied raw scores are ranked in the percentile strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieRule {
    /// Index of the first occurrence in the sorted list (all ties share the lowest rank).
    #[default]
    FirstOccurrence,
    /// Mean of the tied positions.
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    EmptyBatch,
    ZeroVariance,
}

/// Result of a normalization pass. `NoOp` means nothing was changed; it is not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NormalizationOutcome {
    Applied { touched: Vec<usize> },
    NoOp { reason: NoOpReason },
}

impl NormalizationOutcome {
    pub fn touched(&self) -> &[usize] {
        match self {
            Self::Applied { touched } => touched,
            Self::NoOp { .. } => &[],
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp { .. })
    }
}

/// Normalize every scored record in `batch` in place.
///
/// Records without a score are skipped, not zeroed. Returns the indices that were rewritten.
pub fn normalize(
    batch: &mut [StartupRecord],
    strategy: Strategy,
    ties: TieRule,
) -> NormalizationOutcome {
    let (indices, raw): (Vec<usize>, Vec<f64>) = batch
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.score.map(|s| (i, s)))
        .unzip();

    if raw.is_empty() {
        tracing::debug!(target: "normalize", "no scores found to normalize");
        return NormalizationOutcome::NoOp {
            reason: NoOpReason::EmptyBatch,
        };
    }

    let scaled = match strategy {
        Strategy::ZScore => zscore_scale(&raw),
        Strategy::Percentile => percentile_scale(&raw, ties),
    };
    let Some(scaled) = scaled else {
        tracing::debug!(target: "normalize", n = raw.len(), "zero variance, scores unchanged");
        return NormalizationOutcome::NoOp {
            reason: NoOpReason::ZeroVariance,
        };
    };

    for (&i, &score) in indices.iter().zip(&scaled) {
        batch[i].score = Some(score);
    }

    tracing::info!(
        target: "normalize",
        ?strategy,
        n = indices.len(),
        "normalized batch scores"
    );

    NormalizationOutcome::Applied { touched: indices }
}

/// Population mean and standard deviation (divide by N).
pub fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Z-score mapped onto [0, 100]. `None` for an empty or zero-variance batch.
pub fn zscore_scale(values: &[f64]) -> Option<Vec<f64>> {
    let (mean, std_dev) = mean_and_std(values)?;
    if std_dev == 0.0 {
        return None;
    }
    Some(
        values
            .iter()
            .map(|x| {
                let z = (x - mean) / std_dev;
                round_to(((z + 3.0) * (100.0 / 6.0)).clamp(0.0, 100.0), 2)
            })
            .collect(),
    )
}

/// Percentile rank remapped through [`percentile_remap`]. `None` for an empty batch.
pub fn percentile_scale(values: &[f64], ties: TieRule) -> Option<Vec<f64>> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();

    Some(
        values
            .iter()
            .map(|&v| {
                let p = if n > 1 {
                    rank_of(&sorted, v, ties) / (n - 1) as f64 * 100.0
                } else {
                    50.0
                };
                percentile_remap(p).round()
            })
            .collect(),
    )
}

/// Asymmetric curve: lower half compressed toward 0–25, upper half toward 75–100.
pub fn percentile_remap(p: f64) -> f64 {
    let p = p.clamp(0.0, 100.0);
    if p < 50.0 {
        25.0 * (p / 50.0).powf(0.8)
    } else {
        75.0 + 25.0 * ((p - 50.0) / 50.0).powf(1.2)
    }
}

fn rank_of(sorted: &[f64], v: f64, ties: TieRule) -> f64 {
    // First index with sorted[i] >= v, i.e. the first occurrence of v.
    let first = sorted.partition_point(|x| x.total_cmp(&v).is_lt());
    match ties {
        TieRule::FirstOccurrence => first as f64,
        TieRule::Average => {
            let end = sorted.partition_point(|x| x.total_cmp(&v).is_le());
            (first + end - 1) as f64 / 2.0
        }
    }
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (x * f).round() / f
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(scores: &[Option<f64>]) -> Vec<StartupRecord> {
        scores
            .iter()
            .map(|s| StartupRecord {
                score: *s,
                funding: s.map(|_| 0),
                stage: s.map(|_| "seed".to_string()),
                ..Default::default()
            })
            .collect()
    }

    fn scores(b: &[StartupRecord]) -> Vec<Option<f64>> {
        b.iter().map(|r| r.score).collect()
    }

    #[test]
    fn zscore_reference_batch() {
        let out = zscore_scale(&[60.0, 70.0, 80.0, 90.0, 100.0]).unwrap();
        // mean 80, σ = √200; 60 → z ≈ -1.414 → ≈ 26.43
        assert!((out[0] - 26.43).abs() < 0.01, "{out:?}");
        assert_eq!(out[2], 50.0);
        assert!((out[4] - 73.57).abs() < 0.01);
    }

    #[test]
    fn zscore_bounds_and_saturation() {
        let mut values = vec![50.0; 99];
        values.push(100.0);
        let out = zscore_scale(&values).unwrap();
        assert!(out.iter().all(|x| (0.0..=100.0).contains(x)));
        // the outlier sits ~9.9σ above the mean
        assert_eq!(*out.last().unwrap(), 100.0);
    }

    #[test]
    fn zscore_zero_variance_is_noop() {
        let mut b = batch(&[Some(42.0), Some(42.0), Some(42.0)]);
        let outcome = normalize(&mut b, Strategy::ZScore, TieRule::default());
        assert_eq!(
            outcome,
            NormalizationOutcome::NoOp {
                reason: NoOpReason::ZeroVariance
            }
        );
        assert_eq!(scores(&b), vec![Some(42.0); 3]);
    }

    #[test]
    fn empty_batch_is_noop() {
        let mut b = batch(&[None, None]);
        for strategy in [Strategy::ZScore, Strategy::Percentile] {
            let outcome = normalize(&mut b, strategy, TieRule::default());
            assert!(outcome.is_noop());
        }
        assert_eq!(scores(&b), vec![None, None]);
    }

    #[test]
    fn percentile_reference_batch() {
        let out = percentile_scale(&[60.0, 70.0, 80.0, 90.0, 100.0], TieRule::FirstOccurrence)
            .unwrap();
        // percentiles 0, 25, 50, 75, 100
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], (25.0 * 0.5f64.powf(0.8)).round());
        assert_eq!(out[2], 75.0);
        assert_eq!(out[3], (75.0 + 25.0 * 0.5f64.powf(1.2)).round());
        assert_eq!(out[4], 100.0);
    }

    #[test]
    fn percentile_single_record_is_midpoint() {
        let out = percentile_scale(&[13.0], TieRule::FirstOccurrence).unwrap();
        assert_eq!(out, vec![75.0]);
    }

    #[test]
    fn percentile_ties_share_first_rank() {
        let values = [10.0, 20.0, 20.0, 30.0];
        let first = percentile_scale(&values, TieRule::FirstOccurrence).unwrap();
        assert_eq!(first[1], first[2]);
        // first-occurrence rank 1 of 3 → p ≈ 33.3
        assert_eq!(first[1], percentile_remap(100.0 / 3.0).round());

        let avg = percentile_scale(&values, TieRule::Average).unwrap();
        assert_eq!(avg[1], avg[2]);
        // average rank 1.5 of 3 → p = 50
        assert_eq!(avg[1], 75.0);
    }

    #[test]
    fn percentile_is_monotone_and_bounded() {
        let values: Vec<f64> = (0..40).map(|i| ((i * 37) % 101) as f64).collect();
        let out = percentile_scale(&values, TieRule::FirstOccurrence).unwrap();
        for (i, a) in values.iter().enumerate() {
            assert!((0.0..=100.0).contains(&out[i]));
            for (j, b) in values.iter().enumerate() {
                if a < b {
                    assert!(out[i] <= out[j], "{a} -> {} vs {b} -> {}", out[i], out[j]);
                }
            }
        }
    }

    #[test]
    fn unscored_records_are_skipped_not_zeroed() {
        let mut b = batch(&[Some(60.0), None, Some(100.0)]);
        let outcome = normalize(&mut b, Strategy::Percentile, TieRule::FirstOccurrence);
        assert_eq!(outcome.touched(), &[0, 2]);
        assert_eq!(scores(&b), vec![Some(0.0), None, Some(100.0)]);
        assert_eq!(b[0].stage.as_deref(), Some("seed"));
    }

    #[test]
    fn zscore_rerun_is_not_a_fixed_point() {
        // Saturation at the top end changes μ/σ on the second pass.
        let mut raw = vec![Some(1.0); 20];
        raw.extend([Some(50.0), Some(100.0)]);
        let mut b = batch(&raw);
        normalize(&mut b, Strategy::ZScore, TieRule::default());
        let once = scores(&b);
        normalize(&mut b, Strategy::ZScore, TieRule::default());
        assert_ne!(once, scores(&b));
    }
}
