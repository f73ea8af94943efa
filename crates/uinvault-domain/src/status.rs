use serde::{Deserialize, Serialize};

/// Generation mode recorded on every persisted UIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UinMode {
    Foundational,
    Random,
    Structured,
    SectorToken,
}

impl std::fmt::Display for UinMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UinMode::Foundational => "foundational",
            UinMode::Random => "random",
            UinMode::Structured => "structured",
            UinMode::SectorToken => "sector_token",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle state of a `uin_pool` row.
///
/// Transitions (see the lifecycle engine for enforcement):
///   (none) --pre-generate--> Available --claim--> Preassigned
///   Preassigned --assign--> Assigned
///   Preassigned --release--> Available
///   {Available, Preassigned, Assigned} --retire--> Retired
///   {Available, Preassigned, Assigned} --revoke--> Revoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UinStatus {
    Available,
    Preassigned,
    Assigned,
    Retired,
    Revoked,
}

impl UinStatus {
    /// Whether `self` is a terminal state (no further transitions are legal).
    pub fn is_terminal(&self) -> bool {
        matches!(self, UinStatus::Retired | UinStatus::Revoked)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle transition.
    ///
    /// Retire and revoke are allowed from any non-terminal state per the
    /// open question in the design notes: the source allows administrative
    /// termination from `Available` or `Preassigned`, not only `Assigned`.
    pub fn can_transition_to(&self, next: UinStatus) -> bool {
        use UinStatus::*;
        match (*self, next) {
            (Available, Preassigned) => true,
            (Preassigned, Assigned) => true,
            (Preassigned, Available) => true,
            (s, Retired) | (s, Revoked) => !s.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for UinStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UinStatus::Available => "AVAILABLE",
            UinStatus::Preassigned => "PREASSIGNED",
            UinStatus::Assigned => "ASSIGNED",
            UinStatus::Retired => "RETIRED",
            UinStatus::Revoked => "REVOKED",
        };
        write!(f, "{s}")
    }
}

/// Kind of an append-only audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Generated,
    Preassigned,
    Assigned,
    Released,
    Retired,
    Revoked,
    StatusChanged,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventType::Generated => "GENERATED",
            EventType::Preassigned => "PREASSIGNED",
            EventType::Assigned => "ASSIGNED",
            EventType::Released => "RELEASED",
            EventType::Retired => "RETIRED",
            EventType::Revoked => "REVOKED",
            EventType::StatusChanged => "STATUS_CHANGED",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use UinStatus::*;

    #[test]
    fn claim_assign_release_matrix() {
        assert!(Available.can_transition_to(Preassigned));
        assert!(Preassigned.can_transition_to(Assigned));
        assert!(Preassigned.can_transition_to(Available));
        assert!(!Available.can_transition_to(Assigned));
        assert!(!Assigned.can_transition_to(Available));
    }

    #[test]
    fn retire_and_revoke_allowed_from_any_nonterminal() {
        for s in [Available, Preassigned, Assigned] {
            assert!(s.can_transition_to(Retired));
            assert!(s.can_transition_to(Revoked));
        }
    }

    #[test]
    fn terminal_states_accept_no_further_transitions() {
        for terminal in [Retired, Revoked] {
            for next in [Available, Preassigned, Assigned, Retired, Revoked] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn assigned_on_assigned_row_is_illegal() {
        assert!(!Assigned.can_transition_to(Assigned));
    }
}
