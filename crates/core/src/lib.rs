pub mod approvals;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use approvals::{
    ApprovalPolicy, HumanInputError, HumanInputService, Registration, Rendezvous,
    RendezvousError, WaitOutcome, Waiter,
};
pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use domain::car::{CarInfo, CarNumber, CarStatus, ReturnFeedback, ReturnSource};
pub use domain::conditions::{ApprovalOutcome, CarAssignment, CarConditions};
pub use domain::proposal::{
    ApprovalProposal, DecisionSource, DispositionAction, FleetVerdict, HumanDecision,
    ProposalDraft, ProposalId, ProposalStatus,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
