use serde::Serialize;

/// Ensemble vote outcome for one feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    /// Majority label; a tie resolves to out of scope.
    pub in_scope: bool,
    /// Fraction of trees voting for the majority label, in `[0, 1]`.
    pub confidence: f32,
    pub votes_in_scope: u32,
    pub votes_total: u32,
}

impl Prediction {
    pub(crate) fn from_votes(votes_in_scope: u32, votes_total: u32) -> Self {
        let votes_out = votes_total - votes_in_scope;
        let in_scope = votes_in_scope > votes_out;
        let majority = votes_in_scope.max(votes_out);
        let confidence = if votes_total == 0 {
            0.0
        } else {
            majority as f32 / votes_total as f32
        };
        Self {
            in_scope,
            confidence,
            votes_in_scope,
            votes_total,
        }
    }
}

/// Result of passing a question through the scope gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GateDecision {
    /// `true` only when the ensemble says in scope with confidence strictly
    /// above the threshold.
    pub admitted: bool,
    pub prediction: Prediction,
    pub threshold: f32,
}

impl GateDecision {
    pub fn new(prediction: Prediction, threshold: f32) -> Self {
        Self {
            admitted: prediction.in_scope && prediction.confidence > threshold,
            prediction,
            threshold,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.prediction.confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tie_resolves_out_of_scope() {
        let p = Prediction::from_votes(5, 10);
        assert!(!p.in_scope);
        assert_eq!(p.confidence, 0.5);
    }

    #[test]
    fn confidence_is_majority_fraction() {
        let p = Prediction::from_votes(2, 10);
        assert!(!p.in_scope);
        assert!((p.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn gate_requires_strictly_greater_confidence() {
        let at = Prediction::from_votes(6, 10);
        assert!(!GateDecision::new(at, 0.6).admitted);
        let above = Prediction::from_votes(7, 10);
        assert!(GateDecision::new(above, 0.6).admitted);
        let negative = Prediction::from_votes(1, 10);
        assert!(!GateDecision::new(negative, 0.6).admitted);
    }
}
