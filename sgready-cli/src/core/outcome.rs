use std::fmt::{Display, Formatter};

use itertools::Itertools;

/// Single evaluated predicate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Condition {
    pub matched: bool,
    pub message: String,
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.matched { "Match" } else { "No match" };
        write!(f, "{verdict}: {}", self.message)
    }
}

/// Explanation of a decision: the evaluated predicates in evaluation order,
/// root cause first and the final predicate last.
#[must_use]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConditionOutcome(Vec<Condition>);

impl ConditionOutcome {
    pub fn matched(message: impl Into<String>) -> Self {
        Self::default().and_matched(message)
    }

    pub fn not_matched(message: impl Into<String>) -> Self {
        Self::default().and_not_matched(message)
    }

    pub fn and_matched(self, message: impl Into<String>) -> Self {
        self.push(true, message.into())
    }

    pub fn and_not_matched(self, message: impl Into<String>) -> Self {
        self.push(false, message.into())
    }

    /// Append the conditions of a separately evaluated outcome.
    pub fn and(mut self, other: Self) -> Self {
        self.0.extend(other.0);
        self
    }

    fn push(mut self, matched: bool, message: String) -> Self {
        self.0.push(Condition { matched, message });
        self
    }

    /// Verdict of the final predicate.
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.0.last().is_some_and(|condition| condition.matched)
    }

    /// Whether every predicate matched, vacuously true for an empty outcome.
    #[must_use]
    pub fn all_matched(&self) -> bool {
        self.0.iter().all(|condition| condition.matched)
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.0
    }

    /// Human-readable trace for the status surface.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|condition| {
                let verdict = if condition.matched { "Did match" } else { "Did not match" };
                format!("{verdict}: {}", condition.message)
            })
            .collect()
    }
}

impl Display for ConditionOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.conditions().iter().join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_match_follows_last_condition() {
        let outcome = ConditionOutcome::not_matched("first").and_matched("second");
        assert!(outcome.is_match());
        assert!(!outcome.all_matched());
        assert!(!outcome.and_not_matched("third").is_match());
    }

    #[test]
    fn test_empty() {
        let outcome = ConditionOutcome::default();
        assert!(!outcome.is_match());
        assert!(outcome.all_matched());
        assert_eq!(outcome.to_string(), "");
    }

    #[test]
    fn test_and_keeps_order() {
        let outcome = ConditionOutcome::matched("root")
            .and(ConditionOutcome::not_matched("nested").and_matched("inner"))
            .and_not_matched("final");
        let messages = outcome.conditions().iter().map(|c| c.message.as_str()).collect_vec();
        assert_eq!(messages, ["root", "nested", "inner", "final"]);
    }

    #[test]
    fn test_display() {
        let outcome = ConditionOutcome::matched("power is fine").and_not_matched("too early");
        assert_eq!(outcome.to_string(), "Match: power is fine -> No match: too early");
    }

    #[test]
    fn test_messages() {
        let outcome = ConditionOutcome::matched("power is fine").and_not_matched("too early");
        assert_eq!(
            outcome.messages(),
            ["Did match: power is fine", "Did not match: too early"],
        );
    }
}
