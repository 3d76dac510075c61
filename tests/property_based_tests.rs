mod common;

use common::strategies::*;
use dataform_core::config::DataformConfig;
use dataform_core::constants::MIN_POLL_INTERVAL;
use dataform_core::orchestration::clamp_poll_interval;
use dataform_core::state_machine::invocation_transition_allowed;
use dataform_core::InvocationState;
use proptest::prelude::*;

/// Apply remote states the way a handle does and return the observed sequence
fn observe(sequence: &[InvocationState]) -> Vec<InvocationState> {
    let mut current = InvocationState::Pending;
    let mut observed = Vec::with_capacity(sequence.len());
    for next in sequence {
        if invocation_transition_allowed(current, *next) {
            current = *next;
        }
        observed.push(current);
    }
    observed
}

proptest! {
    /// Property: completion is exactly the terminal states
    #[test]
    fn completion_matches_terminal_states(state in invocation_state_strategy()) {
        let terminal = matches!(
            state,
            InvocationState::Succeeded | InvocationState::Failed | InvocationState::Cancelled
        );
        prop_assert_eq!(state.is_terminal(), terminal);
        prop_assert!(!state.is_successful() || state.is_terminal());
    }

    /// Property: once a terminal state is observed it never changes
    #[test]
    fn observed_terminal_state_is_sticky(sequence in state_sequence_strategy()) {
        let observed = observe(&sequence);
        if let Some(first) = observed.iter().position(|state| state.is_terminal()) {
            let terminal = observed[first];
            prop_assert!(observed[first..].iter().all(|state| *state == terminal));
        }
    }

    /// Property: after PENDING or RUNNING has been observed, UNKNOWN never is
    #[test]
    fn known_state_never_reverts_to_unknown(sequence in state_sequence_strategy()) {
        let observed = observe(&sequence);
        prop_assert!(!observed.contains(&InvocationState::Unknown));
    }

    /// Property: clamped poll intervals are never below the minimum and never shrink
    #[test]
    fn clamped_poll_interval_respects_minimum(requested in poll_interval_strategy()) {
        let clamped = clamp_poll_interval(requested);
        prop_assert!(clamped >= MIN_POLL_INTERVAL);
        prop_assert!(clamped >= requested);
        if requested >= MIN_POLL_INTERVAL {
            prop_assert_eq!(clamped, requested);
        }
    }

    /// Property: valid identifiers always build a config whose repo uri embeds them
    #[test]
    fn repo_uri_embeds_identifiers(project in identifier_strategy(), repo in identifier_strategy()) {
        let config = DataformConfig::new(project.clone(), repo.clone()).unwrap();
        prop_assert_eq!(
            config.repo_uri(),
            format!("projects/{project}/locations/us-central1/repositories/{repo}")
        );
    }

    /// Property: state names round-trip through Display and FromStr
    #[test]
    fn state_names_round_trip(state in invocation_state_strategy()) {
        let parsed: InvocationState = state.to_string().to_lowercase().parse().unwrap();
        prop_assert_eq!(parsed, state);
    }
}
