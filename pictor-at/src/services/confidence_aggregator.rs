//! Confidence Aggregator Service
//!
//! Combines per-source tag confidences (basic info, materialized path,
//! content analysis, tag keywords) into one calibrated score per tag path.
//!
//! The model is damped probability accumulation over weighted sources:
//! each present source is transformed by its importance exponent, the
//! transformed values accumulate like independent evidence slowed by a
//! damping factor, and a floor guarantees the result never drops below the
//! strongest single transformed source.

use thiserror::Error;

use crate::models::{SourceKind, SourceScores};

/// Confidence aggregation errors
#[derive(Debug, Error)]
pub enum AggregationError {
    /// Invalid input (out-of-range or non-finite confidence)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Confidence Aggregator
///
/// Weights are exponents applied to each source's confidence. For
/// confidences below 1.0 a smaller exponent yields a larger transformed
/// value, so the most influential source carries the smallest exponent.
/// Influence order, most to least: basic info, materialized path, content
/// analysis, tag keywords.
#[derive(Debug, Clone)]
pub struct ConfidenceAggregator {
    /// Basic info exponent (default 0.9, most influential)
    basic_info_weight: f64,

    /// Materialized path exponent (default 1.0)
    materialized_path_weight: f64,

    /// Content analysis exponent (default 1.2)
    content_analysis_weight: f64,

    /// Tag keywords exponent (default 1.4, least influential)
    tag_keywords_weight: f64,

    /// Damping factor in (0,1) slowing the approach to full confidence
    /// (default 0.8)
    damping_factor: f64,
}

impl ConfidenceAggregator {
    /// Create new aggregator with default weights and damping
    pub fn new() -> Self {
        Self {
            basic_info_weight: 0.9,
            materialized_path_weight: 1.0,
            content_analysis_weight: 1.2,
            tag_keywords_weight: 1.4,
            damping_factor: 0.8,
        }
    }

    /// Importance exponent for a source kind
    pub fn weight_for(&self, kind: SourceKind) -> f64 {
        match kind {
            SourceKind::BasicInfo => self.basic_info_weight,
            SourceKind::MaterializedPath => self.materialized_path_weight,
            SourceKind::ContentAnalysis => self.content_analysis_weight,
            SourceKind::TagKeywords => self.tag_keywords_weight,
        }
    }

    /// Aggregate per-source confidences into one final score
    ///
    /// For each present source: `enhanced = confidence ^ weight`. The
    /// enhanced values accumulate as `remaining *= 1 - enhanced * damping`
    /// starting from 1, giving `raw = 1 - remaining`. The result is
    /// `max(raw, strongest enhanced value)`.
    ///
    /// Properties:
    /// - Empty input yields 0.0
    /// - A single source yields exactly `confidence ^ weight`
    /// - The result never drops below any individual enhanced value
    /// - Raising any input never lowers the result
    ///
    /// # Errors
    /// Returns an error if any confidence is outside [0.0, 1.0] or not
    /// finite. Sources absent from the map are simply skipped.
    pub fn aggregate(&self, scores: &SourceScores) -> Result<f64, AggregationError> {
        let (raw, max_enhanced) = self.combine(scores)?;
        Ok(raw.max(max_enhanced))
    }

    /// Damped accumulation over the present sources
    ///
    /// Returns `(raw, max_enhanced)`. Iterates source kinds in canonical
    /// order so results are deterministic regardless of map layout.
    fn combine(&self, scores: &SourceScores) -> Result<(f64, f64), AggregationError> {
        let mut remaining = 1.0_f64;
        let mut max_enhanced = 0.0_f64;
        let mut any = false;

        for kind in SourceKind::ALL {
            let confidence = match scores.get(&kind) {
                Some(c) => *c,
                None => continue,
            };
            if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
                return Err(AggregationError::InvalidInput(format!(
                    "{} confidence out of range: {}",
                    kind.as_str(),
                    confidence
                )));
            }

            any = true;
            let enhanced = confidence.powf(self.weight_for(kind));
            if enhanced > max_enhanced {
                max_enhanced = enhanced;
            }
            remaining *= 1.0 - enhanced * self.damping_factor;
        }

        if !any {
            return Ok((0.0, 0.0));
        }

        Ok((1.0 - remaining, max_enhanced))
    }
}

impl Default for ConfidenceAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    fn scores(entries: &[(SourceKind, f64)]) -> SourceScores {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_empty_input_yields_zero() {
        let aggregator = ConfidenceAggregator::new();
        let result = aggregator.aggregate(&SourceScores::new()).unwrap();
        assert_eq!(result, 0.0);
    }

    #[test]
    fn test_single_source_reduces_to_weighted_power() {
        let aggregator = ConfidenceAggregator::new();

        for kind in SourceKind::ALL {
            let confidence = 0.7_f64;
            let expected = confidence.powf(aggregator.weight_for(kind));
            let result = aggregator.aggregate(&scores(&[(kind, confidence)])).unwrap();
            assert!(
                (result - expected).abs() < EPSILON,
                "{}: expected {}, got {}",
                kind.as_str(),
                expected,
                result
            );
        }
    }

    #[test]
    fn test_result_never_below_strongest_enhanced_source() {
        let aggregator = ConfidenceAggregator::new();

        let input = scores(&[
            (SourceKind::BasicInfo, 0.9),
            (SourceKind::MaterializedPath, 0.2),
            (SourceKind::ContentAnalysis, 0.5),
            (SourceKind::TagKeywords, 0.1),
        ]);
        let result = aggregator.aggregate(&input).unwrap();

        for (kind, confidence) in &input {
            let enhanced = confidence.powf(aggregator.weight_for(*kind));
            assert!(
                result >= enhanced - EPSILON,
                "result {} fell below {} for {}",
                result,
                enhanced,
                kind.as_str()
            );
        }
    }

    #[test]
    fn test_result_bounded_by_one() {
        let aggregator = ConfidenceAggregator::new();

        let input = scores(&[
            (SourceKind::BasicInfo, 1.0),
            (SourceKind::MaterializedPath, 1.0),
            (SourceKind::ContentAnalysis, 1.0),
            (SourceKind::TagKeywords, 1.0),
        ]);
        let result = aggregator.aggregate(&input).unwrap();
        assert!(result <= 1.0);
        // An input of exactly 1.0 saturates through the floor rule, matching
        // the single-source law (1.0 ^ weight = 1.0)
        assert_eq!(result, 1.0);
    }

    #[test]
    fn test_two_sources_beat_each_alone() {
        let aggregator = ConfidenceAggregator::new();

        let combined = aggregator
            .aggregate(&scores(&[
                (SourceKind::BasicInfo, 0.8),
                (SourceKind::ContentAnalysis, 0.9),
            ]))
            .unwrap();
        let basic_alone = aggregator
            .aggregate(&scores(&[(SourceKind::BasicInfo, 0.8)]))
            .unwrap();
        let content_alone = aggregator
            .aggregate(&scores(&[(SourceKind::ContentAnalysis, 0.9)]))
            .unwrap();

        assert!(combined > basic_alone, "{} <= {}", combined, basic_alone);
        assert!(combined > content_alone, "{} <= {}", combined, content_alone);
    }

    #[test]
    fn test_monotonicity_in_each_input() {
        let aggregator = ConfidenceAggregator::new();

        let base = [
            (SourceKind::BasicInfo, 0.5),
            (SourceKind::MaterializedPath, 0.6),
            (SourceKind::ContentAnalysis, 0.4),
            (SourceKind::TagKeywords, 0.3),
        ];
        let baseline = aggregator.aggregate(&scores(&base)).unwrap();

        for i in 0..base.len() {
            let mut raised = base;
            raised[i].1 += 0.2;
            let result = aggregator.aggregate(&scores(&raised)).unwrap();
            assert!(
                result >= baseline - EPSILON,
                "raising {} lowered the result: {} -> {}",
                raised[i].0.as_str(),
                baseline,
                result
            );
        }
    }

    #[test]
    fn test_damped_accumulation_never_saturates() {
        let aggregator = ConfidenceAggregator::new();

        // Even full-confidence inputs leave remaining probability mass in
        // the raw accumulation term (damping < 1)
        let (raw, _) = aggregator
            .combine(&scores(&[
                (SourceKind::BasicInfo, 1.0),
                (SourceKind::ContentAnalysis, 1.0),
            ]))
            .unwrap();
        assert!(raw < 1.0, "raw accumulation saturated: {}", raw);

        // Inputs strictly below 1.0 keep the final result strictly below 1.0
        let result = aggregator
            .aggregate(&scores(&[
                (SourceKind::BasicInfo, 0.99),
                (SourceKind::MaterializedPath, 0.99),
                (SourceKind::ContentAnalysis, 0.99),
                (SourceKind::TagKeywords, 0.99),
            ]))
            .unwrap();
        assert!(result < 1.0, "result saturated: {}", result);
    }

    #[test]
    fn test_influence_ordering_of_sources() {
        let aggregator = ConfidenceAggregator::new();

        // At equal confidence, a more influential source yields a higher
        // single-source result
        let c = 0.7;
        let basic = aggregator
            .aggregate(&scores(&[(SourceKind::BasicInfo, c)]))
            .unwrap();
        let path = aggregator
            .aggregate(&scores(&[(SourceKind::MaterializedPath, c)]))
            .unwrap();
        let content = aggregator
            .aggregate(&scores(&[(SourceKind::ContentAnalysis, c)]))
            .unwrap();
        let keywords = aggregator
            .aggregate(&scores(&[(SourceKind::TagKeywords, c)]))
            .unwrap();

        assert!(basic > path);
        assert!(path > content);
        assert!(content > keywords);
    }

    #[test]
    fn test_worked_example() {
        let aggregator = ConfidenceAggregator::new();

        // basicInfo 0.8 -> 0.8^0.9 ~ 0.81805; contentAnalysis 0.9 -> 0.9^1.2 ~ 0.88123
        // remaining = (1 - 0.8*0.81805)(1 - 0.8*0.88123) ~ 0.10195
        // raw ~ 0.89805 > max_enhanced, so final ~ 0.89805
        let result = aggregator
            .aggregate(&scores(&[
                (SourceKind::BasicInfo, 0.8),
                (SourceKind::ContentAnalysis, 0.9),
            ]))
            .unwrap();
        assert!((result - 0.898).abs() < 0.001, "got {}", result);
    }

    #[test]
    fn test_out_of_range_input_rejected() {
        let aggregator = ConfidenceAggregator::new();

        let too_large = scores(&[(SourceKind::BasicInfo, 1.5)]);
        assert!(aggregator.aggregate(&too_large).is_err());

        let negative = scores(&[(SourceKind::TagKeywords, -0.1)]);
        assert!(aggregator.aggregate(&negative).is_err());

        let not_finite = scores(&[(SourceKind::ContentAnalysis, f64::NAN)]);
        assert!(aggregator.aggregate(&not_finite).is_err());
    }

    #[test]
    fn test_zero_confidence_source_contributes_nothing() {
        let aggregator = ConfidenceAggregator::new();

        let with_zero = aggregator
            .aggregate(&scores(&[
                (SourceKind::BasicInfo, 0.8),
                (SourceKind::TagKeywords, 0.0),
            ]))
            .unwrap();
        let without = aggregator
            .aggregate(&scores(&[(SourceKind::BasicInfo, 0.8)]))
            .unwrap();

        assert!((with_zero - without).abs() < EPSILON);
    }
}
