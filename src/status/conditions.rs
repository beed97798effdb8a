//! Condition list merging
//!
//! Conditions are merged as values: the caller passes the current list and
//! gets a new one back. Persisting it is the caller's job.

use chrono::{DateTime, Utc};

use crate::crd::{ConditionStatus, OperatorCondition};

/// Suffix of the condition type that gates cluster upgrades
pub const UPGRADEABLE_SUFFIX: &str = "Upgradeable";

/// A new observation for one condition type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionUpdate {
    pub r#type: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
}

impl ConditionUpdate {
    pub fn new(
        r#type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            r#type: r#type.into(),
            status,
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Build the `<prefix>Upgradeable` update for a verdict
    pub fn upgradeable(
        prefix: &str,
        upgradeable: bool,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            format!("{prefix}{UPGRADEABLE_SUFFIX}"),
            upgradeable.into(),
            reason,
            message,
        )
    }
}

/// Merge `update` into `existing`.
///
/// The entry with the same type is updated in place, or appended if there
/// is none. `last_transition_time` moves to `now` only when the status
/// actually changes. Every other entry is returned untouched and in its
/// original position.
pub fn merge(
    existing: &[OperatorCondition],
    update: ConditionUpdate,
    now: DateTime<Utc>,
) -> Vec<OperatorCondition> {
    let mut conditions = existing.to_vec();

    match conditions.iter_mut().find(|c| c.r#type == update.r#type) {
        Some(current) => {
            if current.status != update.status {
                current.last_transition_time = Some(now);
            }
            current.status = update.status;
            current.reason = update.reason;
            current.message = update.message;
        }
        None => conditions.push(OperatorCondition {
            r#type: update.r#type,
            status: update.status,
            last_transition_time: Some(now),
            reason: update.reason,
            message: update.message,
        }),
    }

    conditions
}

/// Find a condition by type
pub fn find_condition<'a>(
    conditions: &'a [OperatorCondition],
    condition_type: &str,
) -> Option<&'a OperatorCondition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Check if a condition type is present and True
pub fn is_condition_true(conditions: &[OperatorCondition], condition_type: &str) -> bool {
    find_condition(conditions, condition_type).is_some_and(|c| c.status == ConditionStatus::True)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn condition(t: &str, status: ConditionStatus, secs: i64) -> OperatorCondition {
        OperatorCondition {
            r#type: t.into(),
            status,
            last_transition_time: Some(at(secs)),
            reason: format!("{t}Reason"),
            message: format!("{t} message"),
        }
    }

    #[test]
    fn test_merge_appends_to_empty_list() {
        let update = ConditionUpdate::upgradeable("", true, "AsExpected", "");
        let merged = merge(&[], update, at(100));

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].r#type, "Upgradeable");
        assert_eq!(merged[0].status, ConditionStatus::True);
        assert_eq!(merged[0].last_transition_time, Some(at(100)));
    }

    #[test]
    fn test_merge_preserves_unrelated_conditions() {
        let existing = vec![
            condition("UnrelatedAvailable", ConditionStatus::True, 10),
            condition("AnotherAvailable", ConditionStatus::False, 20),
        ];
        let update = ConditionUpdate::upgradeable("", true, "AsExpected", "");
        let merged = merge(&existing, update, at(100));

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], existing[0]);
        assert_eq!(merged[1], existing[1]);
        assert_eq!(merged[2].r#type, "Upgradeable");
    }

    #[test]
    fn test_merge_replaces_in_place() {
        let existing = vec![
            condition("First", ConditionStatus::True, 10),
            condition("SnapshotCRDControllerUpgradeable", ConditionStatus::True, 20),
            condition("Last", ConditionStatus::False, 30),
        ];
        let update = ConditionUpdate::upgradeable(
            "SnapshotCRDController",
            false,
            "AlphaDetected",
            "alpha CRDs found",
        );
        let merged = merge(&existing, update, at(100));

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], existing[0]);
        assert_eq!(merged[2], existing[2]);
        assert_eq!(merged[1].status, ConditionStatus::False);
        assert_eq!(merged[1].reason, "AlphaDetected");
        assert_eq!(merged[1].message, "alpha CRDs found");
        assert_eq!(merged[1].last_transition_time, Some(at(100)));
    }

    #[test]
    fn test_unchanged_status_keeps_transition_time() {
        let existing = vec![condition("Upgradeable", ConditionStatus::True, 20)];
        let update = ConditionUpdate::new("Upgradeable", ConditionStatus::True, "Other", "new text");
        let merged = merge(&existing, update, at(100));

        assert_eq!(merged[0].last_transition_time, Some(at(20)));
        assert_eq!(merged[0].reason, "Other");
        assert_eq!(merged[0].message, "new text");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = vec![condition("Available", ConditionStatus::True, 10)];
        let update = ConditionUpdate::upgradeable("Snapshot", false, "AlphaDetected", "x");

        let once = merge(&existing, update.clone(), at(100));
        let twice = merge(&once, update, at(200));

        assert_eq!(once, twice);
        assert_eq!(twice[1].last_transition_time, Some(at(100)));
    }

    #[test]
    fn test_condition_helpers() {
        let conditions = vec![
            condition("Available", ConditionStatus::True, 10),
            condition("Degraded", ConditionStatus::False, 10),
        ];
        assert!(is_condition_true(&conditions, "Available"));
        assert!(!is_condition_true(&conditions, "Degraded"));
        assert!(!is_condition_true(&conditions, "Missing"));
        assert_eq!(
            find_condition(&conditions, "Degraded").map(|c| c.reason.as_str()),
            Some("DegradedReason")
        );
    }
}
