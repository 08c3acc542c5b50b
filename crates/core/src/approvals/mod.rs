pub mod human_input;
pub mod policy;
pub mod rendezvous;

pub use human_input::{HumanInputError, HumanInputService};
pub use policy::{parse_currency, ApprovalPolicy};
pub use rendezvous::{Registration, Rendezvous, RendezvousError, WaitOutcome, Waiter};
