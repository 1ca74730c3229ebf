//! Rule evaluation: accumulated fail votes → escalation action.
//!
//! Pure and deterministic. A [`RulePolicy`] is an ordered table of
//! `(threshold, action)` pairs; the default table reproduces the stock
//! thirds behaviour (ignore a minority, warn at half or more, cancel and
//! stop the queue when every round failed).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// What to do once a cycle's votes have been weighed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    #[serde(alias = "nothing")]
    None,
    Warn,
    Pause,
    Cancel,
    CancelStopQueue,
}

impl EscalationAction {
    /// Ordering used to pick between matching rules (higher wins).
    pub fn severity(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Warn => 1,
            Self::Pause => 2,
            Self::Cancel => 3,
            Self::CancelStopQueue => 4,
        }
    }

    /// Actions that touch the monitored process.
    pub fn is_critical(self) -> bool {
        matches!(self, Self::Pause | Self::Cancel | Self::CancelStopQueue)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Warn => "warn",
            Self::Pause => "pause",
            Self::Cancel => "cancel",
            Self::CancelStopQueue => "cancel_stop_queue",
        }
    }
}

impl fmt::Display for EscalationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum share of failing rounds, written `"n/d"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Threshold {
    numerator: u32,
    denominator: u32,
}

impl Threshold {
    pub fn new(numerator: u32, denominator: u32) -> Result<Self, MonitorError> {
        if denominator == 0 {
            return Err(MonitorError::Configuration(format!(
                "threshold {numerator}/0 has a zero denominator"
            )));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// `fail_count / rounds >= n / d`, compared without floating point.
    pub fn is_met(self, fail_count: u32, rounds: u32) -> bool {
        u64::from(fail_count) * u64::from(self.denominator)
            >= u64::from(self.numerator) * u64::from(rounds)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for Threshold {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MonitorError::Configuration(format!("invalid threshold '{s}'"));
        let (n, d) = s.trim().split_once('/').ok_or_else(invalid)?;
        let numerator = n.trim().parse().map_err(|_| invalid())?;
        let denominator = d.trim().parse().map_err(|_| invalid())?;
        Self::new(numerator, denominator)
    }
}

impl TryFrom<String> for Threshold {
    type Error = MonitorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Threshold> for String {
    fn from(value: Threshold) -> Self {
        value.to_string()
    }
}

/// One row of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRule {
    pub threshold: Threshold,
    pub action: EscalationAction,
}

/// Ordered rule table consulted after every vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulePolicy {
    rules: Vec<FailureRule>,
}

impl RulePolicy {
    /// Build a policy; an empty table means the default policy.
    pub fn new(mut rules: Vec<FailureRule>) -> Self {
        if rules.is_empty() {
            return Self::default();
        }
        rules.sort_by(|a, b| b.action.severity().cmp(&a.action.severity()));
        Self { rules }
    }

    /// Rules, most severe first.
    pub fn rules(&self) -> &[FailureRule] {
        &self.rules
    }

    pub fn evaluate(&self, fail_count: u32, rounds: u32) -> EscalationAction {
        if rounds == 0 || fail_count == 0 {
            return EscalationAction::None;
        }
        self.rules
            .iter()
            .find(|rule| rule.threshold.is_met(fail_count, rounds))
            .map(|rule| rule.action)
            .unwrap_or(EscalationAction::None)
    }
}

impl Default for RulePolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                FailureRule {
                    threshold: Threshold {
                        numerator: 1,
                        denominator: 1,
                    },
                    action: EscalationAction::CancelStopQueue,
                },
                FailureRule {
                    threshold: Threshold {
                        numerator: 1,
                        denominator: 2,
                    },
                    action: EscalationAction::Warn,
                },
            ],
        }
    }
}

/// The stock closed-form evaluator.
pub fn evaluate(fail_count: u32, rounds: u32) -> EscalationAction {
    if rounds == 0 || fail_count == 0 {
        return EscalationAction::None;
    }
    if fail_count >= rounds {
        return EscalationAction::CancelStopQueue;
    }
    if u64::from(fail_count) * 2 >= u64::from(rounds) {
        return EscalationAction::Warn;
    }
    EscalationAction::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_with_huge_counts() {
        assert_eq!(evaluate(u32::MAX / 2 + 1, u32::MAX), EscalationAction::Warn);
        assert_eq!(evaluate(u32::MAX / 2, u32::MAX), EscalationAction::None);
        assert_eq!(evaluate(u32::MAX, u32::MAX), EscalationAction::CancelStopQueue);
        assert_eq!(
            RulePolicy::default().evaluate(u32::MAX / 2 + 1, u32::MAX),
            EscalationAction::Warn
        );
    }

    #[test]
    fn test_no_fails_is_none() {
        for rounds in 1..=10 {
            assert_eq!(evaluate(0, rounds), EscalationAction::None);
        }
    }

    #[test]
    fn test_all_fail_cancels_and_stops_queue() {
        for rounds in 1..=10 {
            assert_eq!(evaluate(rounds, rounds), EscalationAction::CancelStopQueue);
        }
    }

    #[test]
    fn test_warn_iff_half_or_more_but_not_all() {
        for rounds in 1..=10u32 {
            for fails in 0..=rounds {
                let expect_warn = fails > 0 && fails < rounds && 2 * fails >= rounds;
                assert_eq!(
                    evaluate(fails, rounds) == EscalationAction::Warn,
                    expect_warn,
                    "fails={fails} rounds={rounds}"
                );
            }
        }
    }

    #[test]
    fn test_zero_rounds_is_none() {
        assert_eq!(evaluate(3, 0), EscalationAction::None);
        assert_eq!(RulePolicy::default().evaluate(3, 0), EscalationAction::None);
    }

    #[test]
    fn test_thirds() {
        assert_eq!(evaluate(1, 3), EscalationAction::None);
        assert_eq!(evaluate(2, 3), EscalationAction::Warn);
        assert_eq!(evaluate(3, 3), EscalationAction::CancelStopQueue);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let first = evaluate(2, 4);
        for _ in 0..100 {
            assert_eq!(evaluate(2, 4), first);
        }
    }

    #[test]
    fn test_default_policy_matches_closed_form() {
        let policy = RulePolicy::default();
        for rounds in 0..=12u32 {
            for fails in 0..=rounds + 1 {
                assert_eq!(
                    policy.evaluate(fails, rounds),
                    evaluate(fails, rounds),
                    "fails={fails} rounds={rounds}"
                );
            }
        }
    }

    #[test]
    fn test_empty_table_is_default() {
        assert_eq!(RulePolicy::new(Vec::new()), RulePolicy::default());
    }

    #[test]
    fn test_most_severe_matching_rule_wins() {
        let policy = RulePolicy::new(vec![
            FailureRule {
                threshold: "1/3".parse().unwrap(),
                action: EscalationAction::Warn,
            },
            FailureRule {
                threshold: "2/3".parse().unwrap(),
                action: EscalationAction::Pause,
            },
        ]);
        assert_eq!(policy.rules()[0].action, EscalationAction::Pause);
        assert_eq!(policy.evaluate(1, 3), EscalationAction::Warn);
        assert_eq!(policy.evaluate(2, 3), EscalationAction::Pause);
        assert_eq!(policy.evaluate(3, 3), EscalationAction::Pause);
    }

    #[test]
    fn test_nothing_rule_yields_none() {
        let policy = RulePolicy::new(vec![FailureRule {
            threshold: "1/3".parse().unwrap(),
            action: EscalationAction::None,
        }]);
        assert_eq!(policy.evaluate(3, 3), EscalationAction::None);
    }

    #[test]
    fn test_threshold_parsing() {
        let t: Threshold = " 2 / 3 ".parse().unwrap();
        assert_eq!(t.to_string(), "2/3");
        assert!(t.is_met(2, 3));
        assert!(!t.is_met(1, 3));
        assert!("2/0".parse::<Threshold>().is_err());
        assert!("half".parse::<Threshold>().is_err());
        assert!("1/x".parse::<Threshold>().is_err());
    }

    #[test]
    fn test_rule_serde_uses_settings_vocabulary() {
        let rules: Vec<FailureRule> = serde_json::from_str(
            r#"[{"threshold": "1/3", "action": "nothing"},
                {"threshold": "3/3", "action": "cancel_stop_queue"}]"#,
        )
        .unwrap();
        assert_eq!(rules[0].action, EscalationAction::None);
        assert_eq!(rules[1].action, EscalationAction::CancelStopQueue);

        let out = serde_json::to_value(rules[1]).unwrap();
        assert_eq!(out["threshold"], "3/3");
        assert_eq!(out["action"], "cancel_stop_queue");
    }

    #[test]
    fn test_bad_threshold_rejected_by_serde() {
        let res: Result<FailureRule, _> =
            serde_json::from_str(r#"{"threshold": "0.5", "action": "warn"}"#);
        assert!(res.is_err());
    }
}
