//! Escalation policy — decides whether a classified communication opens a
//! staff follow-up task, and at what priority/category.
//!
//! Pure and total: no I/O, never fails, identical input always yields an
//! identical decision.

use crate::classify::Analysis;
use crate::model::{Intent, TaskCategory, TaskPriority};

/// Urgency above this opens a follow-up task.
pub const ESCALATION_THRESHOLD: u8 = 7;

/// Urgency above this makes the task `Urgent` instead of `High`.
pub const URGENT_THRESHOLD: u8 = 8;

/// Outcome of running a classification result through the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationDecision {
    pub should_escalate: bool,
    /// Only meaningful when `should_escalate` is true.
    pub priority: TaskPriority,
    pub category: TaskCategory,
}

/// Apply the escalation rules to a classification result.
pub fn decide(analysis: &Analysis) -> EscalationDecision {
    let priority = if analysis.urgency > URGENT_THRESHOLD {
        TaskPriority::Urgent
    } else {
        TaskPriority::High
    };

    EscalationDecision {
        should_escalate: analysis.urgency > ESCALATION_THRESHOLD,
        priority,
        category: category_for(analysis.intent.as_ref()),
    }
}

/// Map an intent onto the staff category that handles it.
///
/// Exhaustive over the closed intent set; booking-flow intents and
/// anything unrecognized route to `Other`.
pub fn category_for(intent: Option<&Intent>) -> TaskCategory {
    match intent {
        Some(Intent::Request) => TaskCategory::GuestRequest,
        Some(Intent::Complaint) => TaskCategory::FrontDesk,
        Some(Intent::Maintenance) => TaskCategory::Maintenance,
        Some(Intent::Housekeeping) => TaskCategory::Housekeeping,
        Some(Intent::Concierge) => TaskCategory::Concierge,
        Some(Intent::Booking)
        | Some(Intent::Cancellation)
        | Some(Intent::Modification)
        | Some(Intent::Information)
        | Some(Intent::Other(_))
        | None => TaskCategory::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sentiment;

    fn analysis(urgency: u8, intent: Option<Intent>) -> Analysis {
        Analysis {
            intent,
            sentiment: Sentiment::Neutral,
            urgency,
            summary: String::new(),
            actions: Vec::new(),
        }
    }

    #[test]
    fn threshold_boundary() {
        assert!(!decide(&analysis(7, None)).should_escalate);
        assert!(decide(&analysis(8, None)).should_escalate);
    }

    #[test]
    fn priority_boundary() {
        assert_eq!(decide(&analysis(8, None)).priority, TaskPriority::High);
        assert_eq!(decide(&analysis(9, None)).priority, TaskPriority::Urgent);
        assert_eq!(decide(&analysis(10, None)).priority, TaskPriority::Urgent);
    }

    #[test]
    fn zero_urgency_never_escalates() {
        let decision = decide(&analysis(0, Some(Intent::Complaint)));
        assert!(!decision.should_escalate);
    }

    #[test]
    fn decision_is_deterministic() {
        let a = analysis(9, Some(Intent::Maintenance));
        assert_eq!(decide(&a), decide(&a));
    }

    #[test]
    fn category_mapping_for_known_intents() {
        let cases = [
            (Intent::Request, TaskCategory::GuestRequest),
            (Intent::Complaint, TaskCategory::FrontDesk),
            (Intent::Maintenance, TaskCategory::Maintenance),
            (Intent::Housekeeping, TaskCategory::Housekeeping),
            (Intent::Concierge, TaskCategory::Concierge),
        ];
        for (intent, expected) in cases {
            assert_eq!(category_for(Some(&intent)), expected);
        }
    }

    #[test]
    fn category_mapping_falls_back_to_other() {
        for intent in [
            Intent::Booking,
            Intent::Cancellation,
            Intent::Modification,
            Intent::Information,
            Intent::Other("spa day".into()),
            Intent::Other(String::new()),
        ] {
            assert_eq!(category_for(Some(&intent)), TaskCategory::Other);
        }
        assert_eq!(category_for(None), TaskCategory::Other);
    }
}
