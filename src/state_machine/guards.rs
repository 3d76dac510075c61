use super::states::{InvocationState, ManagedStatus};

/// Guard for applying a freshly fetched remote state to a handle.
///
/// Terminal states are sticky: once a handle has observed SUCCEEDED, FAILED or
/// CANCELLED it keeps that state even if a later read disagrees. A known
/// state never falls back to UNKNOWN, and RUNNING never returns to PENDING.
pub fn invocation_transition_allowed(from: InvocationState, to: InvocationState) -> bool {
    use InvocationState::*;

    if from.is_terminal() {
        return from == to;
    }
    match (from, to) {
        (Running, Pending) => false,
        (Pending | Running, Unknown) => false,
        _ => true,
    }
}

/// Guard for local managed-entry status changes.
pub fn managed_transition_allowed(from: ManagedStatus, to: ManagedStatus) -> bool {
    use ManagedStatus::*;

    matches!(
        (from, to),
        (Queued, Running) | (Queued, Failed) | (Running, Done) | (Running, Failed) | (Running, Queued)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_invocation_states_never_revert() {
        for terminal in [
            InvocationState::Succeeded,
            InvocationState::Failed,
            InvocationState::Cancelled,
        ] {
            for next in InvocationState::all() {
                assert_eq!(invocation_transition_allowed(terminal, next), terminal == next);
            }
        }
    }

    #[test]
    fn test_forward_invocation_transitions() {
        assert!(invocation_transition_allowed(
            InvocationState::Pending,
            InvocationState::Running
        ));
        assert!(invocation_transition_allowed(
            InvocationState::Running,
            InvocationState::Succeeded
        ));
        assert!(invocation_transition_allowed(
            InvocationState::Unknown,
            InvocationState::Running
        ));
        assert!(!invocation_transition_allowed(
            InvocationState::Running,
            InvocationState::Pending
        ));
    }

    #[test]
    fn test_known_states_never_fall_back_to_unknown() {
        assert!(!invocation_transition_allowed(
            InvocationState::Running,
            InvocationState::Unknown
        ));
        assert!(!invocation_transition_allowed(
            InvocationState::Pending,
            InvocationState::Unknown
        ));
        assert!(invocation_transition_allowed(
            InvocationState::Unknown,
            InvocationState::Unknown
        ));
        assert!(invocation_transition_allowed(
            InvocationState::Unknown,
            InvocationState::Pending
        ));
    }

    #[test]
    fn test_managed_transitions() {
        assert!(managed_transition_allowed(ManagedStatus::Queued, ManagedStatus::Running));
        assert!(managed_transition_allowed(ManagedStatus::Running, ManagedStatus::Queued));
        assert!(managed_transition_allowed(ManagedStatus::Queued, ManagedStatus::Failed));
        assert!(!managed_transition_allowed(ManagedStatus::Done, ManagedStatus::Queued));
        assert!(!managed_transition_allowed(ManagedStatus::Failed, ManagedStatus::Running));
        assert!(!managed_transition_allowed(ManagedStatus::Queued, ManagedStatus::Done));
    }
}
