use proptest::prelude::*;
use std::time::Duration;

use dataform_core::InvocationState;

/// Any invocation state, terminal or not
pub fn invocation_state_strategy() -> impl Strategy<Value = InvocationState> {
    prop::sample::select(InvocationState::all().to_vec())
}

/// Poll intervals from zero up to a few minutes, millisecond resolution
pub fn poll_interval_strategy() -> impl Strategy<Value = Duration> {
    (0u64..300_000).prop_map(Duration::from_millis)
}

/// Valid GCP-style identifiers
pub fn identifier_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,29}"
}

/// Sequences of remote states, as a fake API might report them
pub fn state_sequence_strategy() -> impl Strategy<Value = Vec<InvocationState>> {
    prop::collection::vec(invocation_state_strategy(), 1..12)
}
