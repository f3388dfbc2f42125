//! Score post-processing shared by every backend variant.

/// Numerically stable softmax: `exp(s_i - max) / sum_j exp(s_j - max)`.
///
/// Scores are expected to be finite; an empty slice yields an empty vector.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest score. Equal maxima resolve to the lowest index.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Probability distribution derived from one raw score vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub probabilities: Vec<f32>,
    /// Argmax of the raw scores.
    pub top_index: usize,
}

impl Distribution {
    /// Returns `None` for an empty score vector.
    pub fn from_scores(scores: &[f32]) -> Option<Self> {
        let top_index = argmax(scores)?;
        Some(Self {
            probabilities: softmax(scores),
            top_index,
        })
    }

    pub fn confidence(&self) -> f32 {
        self.probabilities[self.top_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_reference_values() {
        let probs = softmax(&[2.0, 1.0, 0.1]);
        assert!((probs[0] - 0.659).abs() < 1e-3);
        assert!((probs[1] - 0.242).abs() < 1e-3);
        assert!((probs[2] - 0.099).abs() < 1e-3);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[-3.5, 0.0, 12.25, 7.0, -0.5]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_softmax_is_translation_invariant() {
        let scores = [0.3f32, -1.2, 2.7, 0.0];
        let shifted: Vec<f32> = scores.iter().map(|s| s + 1000.0).collect();
        for (a, b) in softmax(&scores).iter().zip(softmax(&shifted)) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_softmax_handles_large_magnitudes() {
        let probs = softmax(&[1.0e4, 1.0e4 - 1.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[0] > probs[1]);
    }

    #[test]
    fn test_argmax_ties_pick_lowest_index() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmax(&[5.0, 5.0]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_distribution_confidence_is_top_probability() {
        let dist = Distribution::from_scores(&[2.0, 1.0, 0.1]).unwrap();
        assert_eq!(dist.top_index, 0);
        assert!((dist.confidence() - 0.659).abs() < 1e-3);
        assert!(Distribution::from_scores(&[]).is_none());
    }
}
