use crate::mapping::RomeNafMapping;

use super::{ScoringConfig, round_one_decimal};

/// Re-derive an office score restricted to one occupation.
///
/// The aggregate score is turned back into a hiring volume, that volume is
/// scaled by the share the occupation holds in the sector's hirings, and the
/// result is converted to a score again.
///
/// Fallbacks, in order:
/// - no occupation context: aggregate unchanged;
/// - aggregate under `score_for_rome_minimum`: aggregate unchanged;
/// - sector absent from the mapping: aggregate unchanged;
/// - occupation absent under a mapped sector: 0.0.
///
/// Otherwise the score is floored at `score_for_rome_minimum`, rounded to one
/// decimal and never exceeds the aggregate.
pub fn score_for_rome(
    aggregate: f64,
    rome_code: Option<&str>,
    naf_code: &str,
    mapping: &RomeNafMapping,
    config: &ScoringConfig,
) -> f64 {
    let Some(rome_code) = rome_code else {
        return aggregate;
    };

    if aggregate < config.score_for_rome_minimum {
        return aggregate;
    }

    let total = mapping.total_naf_hirings(naf_code);
    if total == 0 {
        return aggregate;
    }

    let weight = mapping.naf_hirings_for_rome(naf_code, rome_code);
    if weight == 0 {
        return 0.0;
    }

    let curve = &config.curve;
    let office_hirings = curve.hirings_from_score(aggregate);
    let rome_hirings = office_hirings * f64::from(weight) / total as f64;
    let adjusted = curve
        .score_from_hirings(rome_hirings)
        .max(config.score_for_rome_minimum);

    round_one_decimal(adjusted).min(aggregate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::RomeNafMapping;
    use crate::scoring::ScoringCurve;
    use std::collections::BTreeMap;

    fn mapping() -> RomeNafMapping {
        let bulk = BTreeMap::from([
            (
                "7320Z".to_string(),
                BTreeMap::from([
                    ("D1405".to_string(), 52),
                    ("M1607".to_string(), 1200),
                    ("D1501".to_string(), 800),
                    ("M1805".to_string(), 5792),
                ]),
            ),
            (
                "6201Z".to_string(),
                BTreeMap::from([("M1805".to_string(), 100)]),
            ),
        ]);
        RomeNafMapping::new(bulk, BTreeMap::new())
    }

    fn config(floor: f64) -> ScoringConfig {
        ScoringConfig {
            curve: ScoringCurve::default(),
            score_for_rome_minimum: floor,
        }
    }

    #[test]
    fn keeps_score_without_rome_context() {
        assert_eq!(score_for_rome(71.0, None, "7320Z", &mapping(), &config(0.0)), 71.0);
    }

    #[test]
    fn redistributes_hirings_over_the_sector() {
        let cfg = config(0.0);
        let score = score_for_rome(71.0, Some("D1405"), "7320Z", &mapping(), &cfg);

        // 77.5 hirings * 52 / 7844
        let expected_hirings = 77.5 * 52.0 / 7844.0;
        let back = cfg.curve.hirings_from_score(score);
        assert!(score < 71.0);
        assert!((back - expected_hirings).abs() < 0.01, "{back} vs {expected_hirings}");
    }

    #[test]
    fn only_rome_of_the_sector_keeps_the_aggregate() {
        let score = score_for_rome(64.3, Some("M1805"), "6201Z", &mapping(), &config(0.0));
        assert_eq!(score, 64.3);
    }

    #[test]
    fn floor_lifts_tiny_contextual_scores() {
        let score = score_for_rome(71.0, Some("D1405"), "7320Z", &mapping(), &config(20.0));
        assert_eq!(score, 20.0);
    }

    #[test]
    fn low_aggregate_is_not_adjusted() {
        let score = score_for_rome(12.0, Some("D1405"), "7320Z", &mapping(), &config(20.0));
        assert_eq!(score, 12.0);
    }

    #[test]
    fn unmapped_sector_falls_back_to_aggregate() {
        let score = score_for_rome(71.0, Some("D1405"), "0000Z", &mapping(), &config(0.0));
        assert_eq!(score, 71.0);
    }

    #[test]
    fn unknown_rome_in_mapped_sector_scores_zero() {
        let score = score_for_rome(71.0, Some("K2503"), "7320Z", &mapping(), &config(20.0));
        assert_eq!(score, 0.0);
    }
}
