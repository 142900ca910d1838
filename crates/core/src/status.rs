//! Proposal status vocabulary and transition rules.
//!
//! Stored status labels are free-form legacy strings; this module is the only
//! place they are canonicalized. One alias table maps every known label
//! (including long-form "Proposal accepted"/"Proposal rejected" variants) to
//! a canonical state before any transition lookup.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
    FollowUp1,
    FollowUp2,
    FollowUp3,
    MeasurementScheduled,
    MeasurementDone,
    DesignDone,
    ProposalDone,
}

/// Canonical label plus legacy aliases, lowercase. Kept as one table so the
/// full mapping stays auditable in a single place.
const ALIASES: &[(&str, ProposalStatus)] = &[
    ("draft", ProposalStatus::Draft),
    ("sent", ProposalStatus::Sent),
    ("proposal sent", ProposalStatus::Sent),
    ("accepted", ProposalStatus::Accepted),
    ("proposal accepted", ProposalStatus::Accepted),
    ("rejected", ProposalStatus::Rejected),
    ("proposal rejected", ProposalStatus::Rejected),
    ("expired", ProposalStatus::Expired),
    ("follow up 1", ProposalStatus::FollowUp1),
    ("follow up 2", ProposalStatus::FollowUp2),
    ("follow up 3", ProposalStatus::FollowUp3),
    ("measurement scheduled", ProposalStatus::MeasurementScheduled),
    ("measurement done", ProposalStatus::MeasurementDone),
    ("design done", ProposalStatus::DesignDone),
    ("proposal done", ProposalStatus::ProposalDone),
];

impl ProposalStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        let folded = raw.trim().to_lowercase();
        ALIASES.iter().find(|(alias, _)| *alias == folded).map(|(_, status)| *status)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::FollowUp1 => "Follow up 1",
            Self::FollowUp2 => "Follow up 2",
            Self::FollowUp3 => "Follow up 3",
            Self::MeasurementScheduled => "Measurement Scheduled",
            Self::MeasurementDone => "Measurement done",
            Self::DesignDone => "Design done",
            Self::ProposalDone => "Proposal done",
        }
    }

    /// The granular sub-stages of active quoting, freely navigable among
    /// themselves and with `draft`.
    pub fn is_workflow_stage(&self) -> bool {
        matches!(
            self,
            Self::Draft
                | Self::FollowUp1
                | Self::FollowUp2
                | Self::FollowUp3
                | Self::MeasurementScheduled
                | Self::MeasurementDone
                | Self::DesignDone
                | Self::ProposalDone
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    fn table_allows(self, next: Self) -> bool {
        use ProposalStatus::{Accepted, Draft, Expired, Rejected, Sent};
        matches!(
            (self, next),
            (Draft, Sent)
                | (Draft, Rejected)
                | (Draft, Accepted)
                | (Sent, Accepted)
                | (Sent, Rejected)
                | (Sent, Expired)
                | (Rejected, Draft)
                | (Expired, Draft)
        )
    }
}

/// Decide whether a proposal may move between two raw status labels.
///
/// Rules, in priority order: identical labels are a no-op; `draft` may jump
/// straight to `accepted`; workflow stages move freely among themselves and
/// with `draft`; everything else consults the strict transition table.
/// Labels are alias-folded before lookup; unknown labels never transition.
pub fn is_valid_transition(current: &str, next: &str) -> bool {
    if current.trim().eq_ignore_ascii_case(next.trim()) {
        return true;
    }

    let (Some(from), Some(to)) = (ProposalStatus::parse(current), ProposalStatus::parse(next))
    else {
        return false;
    };

    if from == to {
        return true;
    }
    if from == ProposalStatus::Draft && to == ProposalStatus::Accepted {
        return true;
    }
    if from.is_workflow_stage() && to.is_workflow_stage() {
        return true;
    }

    from.table_allows(to)
}

#[cfg(test)]
mod tests {
    use super::{is_valid_transition, ProposalStatus};

    const STRICT: &[(&str, &[&str])] = &[
        ("draft", &["sent", "rejected", "accepted"]),
        ("sent", &["accepted", "rejected", "expired"]),
        ("accepted", &[]),
        ("rejected", &["draft"]),
        ("expired", &["draft"]),
    ];

    #[test]
    fn strict_table_matches_exactly() {
        let core = ["draft", "sent", "accepted", "rejected", "expired"];
        for (from, allowed) in STRICT {
            for to in core {
                let expected = *from == to || allowed.contains(&to);
                assert_eq!(
                    is_valid_transition(from, to),
                    expected,
                    "transition {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn self_transitions_are_always_allowed() {
        for raw in ["draft", "Draft", "sent", "accepted", "Follow up 2", "Proposal done"] {
            assert!(is_valid_transition(raw, raw), "{raw} -> {raw}");
        }
        // Unknown labels too: identical strings are a no-op, not a change.
        assert!(is_valid_transition("archived", "archived"));
    }

    #[test]
    fn draft_accepts_the_fast_path_bypass() {
        assert!(is_valid_transition("Draft", "accepted"));
        assert!(is_valid_transition("draft", "Proposal accepted"));
    }

    #[test]
    fn workflow_stages_move_freely_among_themselves_and_draft() {
        let stages = [
            "Follow up 1",
            "Follow up 2",
            "Follow up 3",
            "Measurement Scheduled",
            "Measurement done",
            "Design done",
            "Proposal done",
            "draft",
        ];
        for from in stages {
            for to in stages {
                assert!(is_valid_transition(from, to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn workflow_stages_do_not_leak_into_terminal_states() {
        assert!(!is_valid_transition("Follow up 1", "accepted"));
        assert!(!is_valid_transition("Proposal done", "sent"));
        assert!(!is_valid_transition("Measurement done", "expired"));
    }

    #[test]
    fn accepted_is_terminal() {
        for to in ["draft", "sent", "rejected", "expired", "Follow up 1"] {
            assert!(!is_valid_transition("accepted", to), "accepted -> {to}");
        }
        assert!(ProposalStatus::Accepted.is_terminal());
    }

    #[test]
    fn legacy_labels_fold_before_table_lookup() {
        assert!(is_valid_transition("sent", "Proposal accepted"));
        assert!(is_valid_transition("SENT", "Rejected"));
        assert!(is_valid_transition("Proposal rejected", "draft"));
        assert_eq!(ProposalStatus::parse(" Proposal Accepted "), Some(ProposalStatus::Accepted));
    }

    #[test]
    fn unknown_labels_never_transition() {
        assert!(!is_valid_transition("draft", "archived"));
        assert!(!is_valid_transition("archived", "draft"));
    }
}
