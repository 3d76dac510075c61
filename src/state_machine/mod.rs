// State types for remote invocations and locally managed entries
//
// Remote states mirror the Dataform API; managed statuses are the manager's own
// bookkeeping. Guards encode which transitions each side accepts.

pub mod guards;
pub mod states;

pub use guards::{invocation_transition_allowed, managed_transition_allowed};
pub use states::{InvocationState, ManagedStatus};
