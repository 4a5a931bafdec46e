//! Pass/fail status messages per rule

use serde::Serialize;

use crate::checks::{Rule, RuleResult};
use crate::session::Report;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub rule: Rule,
    pub level: Level,
    pub text: String,
}

/// One message per rule result, in report order
///
/// Invalid geometries are errors since they break the other rules; every
/// other failing rule is a warning.
pub fn status_messages(report: &Report) -> Vec<StatusMessage> {
    let mut messages: Vec<StatusMessage> = report.results.iter().map(message).collect();
    if report.repaired > 0 {
        messages.insert(
            0,
            StatusMessage {
                rule: Rule::Invalid,
                level: Level::Success,
                text: format!("Invalid geometries fixed ({}).", report.repaired),
            },
        );
    }
    messages
}

fn message(result: &RuleResult) -> StatusMessage {
    let n = result.findings.len();
    let (level, text) = match (result.rule, result.passed()) {
        (Rule::Invalid, true) => (Level::Success, "No invalid geometries found.".to_string()),
        (Rule::Invalid, false) => (Level::Error, format!("Found {n} invalid geometries.")),
        (Rule::Duplicates, true) => (Level::Success, "No duplicate geometries found.".to_string()),
        (Rule::Duplicates, false) => (Level::Warning, format!("Found {n} duplicate geometries.")),
        (Rule::Gaps, true) => (Level::Success, "No gaps found.".to_string()),
        (Rule::Gaps, false) => (Level::Warning, format!("Found {n} gaps.")),
        (Rule::Overlaps, true) => (Level::Success, "No overlaps or intersections detected.".to_string()),
        (Rule::Overlaps, false) => (Level::Warning, format!("Found {n} overlaps/intersections.")),
        (Rule::CrossOverlaps, true) => (
            Level::Success,
            format!("No intersections between layers {}.", result.layer),
        ),
        (Rule::CrossOverlaps, false) => (
            Level::Warning,
            format!("Found {n} intersections between layers {}.", result.layer),
        ),
    };
    StatusMessage {
        rule: result.rule,
        level,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::Finding;
    use geo_types::MultiPolygon;

    fn finding() -> Finding {
        Finding {
            features: vec![0],
            geometry: MultiPolygon::new(Vec::new()),
            detail: String::new(),
        }
    }

    fn report(results: Vec<RuleResult>, repaired: usize) -> Report {
        Report {
            layer: "l".into(),
            crs: "EPSG:4326".into(),
            feature_count: 3,
            repaired,
            results,
        }
    }

    #[test]
    fn test_levels_follow_outcome() {
        let r = report(
            vec![
                RuleResult::new(Rule::Invalid, "l", vec![finding(), finding(), finding()]),
                RuleResult::new(Rule::Overlaps, "l", vec![]),
                RuleResult::new(Rule::Gaps, "l", vec![finding()]),
            ],
            0,
        );
        let messages = status_messages(&r);

        assert_eq!(messages[0].level, Level::Error);
        assert_eq!(messages[0].text, "Found 3 invalid geometries.");
        assert_eq!(messages[1].level, Level::Success);
        assert_eq!(messages[1].text, "No overlaps or intersections detected.");
        assert_eq!(messages[2].level, Level::Warning);
    }

    #[test]
    fn test_repair_is_announced_first() {
        let r = report(vec![RuleResult::new(Rule::Invalid, "l", vec![])], 2);
        let messages = status_messages(&r);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "Invalid geometries fixed (2).");
        assert_eq!(messages[1].text, "No invalid geometries found.");
    }
}
