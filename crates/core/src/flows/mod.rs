pub mod outcome;

pub use outcome::{
    determine_assignment, disposition_required, is_required, resolve_verdict, OutcomeInputs,
};
