// Tier assignment against age-group cut points.

use reportcard_core::athlete::AgeGroup;
use serde::Serialize;

use crate::thresholds::{direction, Cut, Direction, ThresholdTable};

/// Performance tier for one metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Best,
    Good,
    Poor,
    Unknown,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Best => "best",
            Tier::Good => "good",
            Tier::Poor => "poor",
            Tier::Unknown => "unknown",
        }
    }

    /// Hex color renderers use for the tier.
    pub fn color(&self) -> &'static str {
        match self {
            Tier::Best => "#3498db",
            Tier::Good => "#2ecc71",
            Tier::Poor => "#f1c40f",
            Tier::Unknown => "#7f8c8d",
        }
    }
}

/// Classify `value` for `metric` against the cuts for `group`.
///
/// `Unknown` when the value is missing or there is no entry for
/// (group, metric). Otherwise a three-way comparison against `above_avg` and
/// `avg`; `below_avg` only matters for display.
pub fn classify(thresholds: &ThresholdTable, metric: &str, value: Option<f64>, group: AgeGroup) -> Tier {
    match (value, thresholds.get(group, metric)) {
        (Some(v), Some(cut)) => classify_cut(cut, direction(metric), v),
        _ => Tier::Unknown,
    }
}

/// Classify against a single cut with an explicit direction.
pub fn classify_cut(cut: &Cut, dir: Direction, value: f64) -> Tier {
    match dir {
        Direction::HigherIsBetter => {
            if value >= cut.above_avg {
                Tier::Best
            } else if value >= cut.avg {
                Tier::Good
            } else {
                Tier::Poor
            }
        }
        Direction::LowerIsBetter => {
            if value <= cut.above_avg {
                Tier::Best
            } else if value <= cut.avg {
                Tier::Good
            } else {
                Tier::Poor
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank(t: Tier) -> u8 {
        match t {
            Tier::Poor => 0,
            Tier::Good => 1,
            Tier::Best => 2,
            Tier::Unknown => panic!("unexpected unknown"),
        }
    }

    #[test]
    fn higher_is_better_boundaries() {
        let t = ThresholdTable::defaults();
        let g = AgeGroup::Jv;
        // Positional Throw Velocity: above 60, avg 50.
        assert_eq!(classify(&t, "Positional Throw Velocity", Some(60.0), g), Tier::Best);
        assert_eq!(classify(&t, "Positional Throw Velocity", Some(59.99), g), Tier::Good);
        assert_eq!(classify(&t, "Positional Throw Velocity", Some(50.0), g), Tier::Good);
        assert_eq!(classify(&t, "Positional Throw Velocity", Some(49.0), g), Tier::Poor);
    }

    #[test]
    fn lower_is_better_boundaries() {
        let t = ThresholdTable::defaults();
        let g = AgeGroup::Varsity;
        // 60yd Time: above 6.0, avg 6.5.
        assert_eq!(classify(&t, "60yd Time", Some(6.0), g), Tier::Best);
        assert_eq!(classify(&t, "60yd Time", Some(6.3), g), Tier::Good);
        assert_eq!(classify(&t, "60yd Time", Some(6.5), g), Tier::Good);
        assert_eq!(classify(&t, "60yd Time", Some(6.95), g), Tier::Poor);
    }

    #[test]
    fn missing_value_or_entry_is_unknown() {
        let t = ThresholdTable::defaults();
        assert_eq!(classify(&t, "60yd Time", None, AgeGroup::Jv), Tier::Unknown);
        assert_eq!(classify(&t, "Grip Strength", Some(50.0), AgeGroup::Jv), Tier::Unknown);
        assert_eq!(classify(&t, "60yd Time", Some(6.0), AgeGroup::Unknown), Tier::Unknown);
    }

    #[test]
    fn tier_is_monotonic_in_value() {
        let t = ThresholdTable::defaults();
        let g = AgeGroup::College;
        let values: Vec<f64> = (0..200).map(|i| i as f64 * 0.5).collect();

        for metric in ["Bat Speed (mph)", "Max EV (mph)", "Ankle"] {
            let tiers: Vec<u8> = values.iter().map(|v| rank(classify(&t, metric, Some(*v), g))).collect();
            assert!(tiers.windows(2).all(|w| w[0] <= w[1]), "{metric}");
        }

        let times: Vec<f64> = (0..200).map(|i| i as f64 * 0.05).collect();
        for metric in ["30yd Time", "60yd Time", "5-5-10 Shuttle Time"] {
            let tiers: Vec<u8> = times.iter().map(|v| rank(classify(&t, metric, Some(*v), g))).collect();
            assert!(tiers.windows(2).all(|w| w[0] >= w[1]), "{metric}");
        }
    }

    #[test]
    fn colors() {
        assert_eq!(Tier::Best.color(), "#3498db");
        assert_eq!(Tier::Unknown.color(), "#7f8c8d");
        assert_eq!(Tier::Poor.label(), "poor");
    }
}
