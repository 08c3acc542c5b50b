//! Fleet agents - LLM-backed feedback analysis and car-return orchestration
//!
//! This crate turns free-text return feedback into fleet actions:
//! - Analyzes feedback with three concurrent analyzers (cleaning, maintenance, disposition)
//! - Prices cars that may leave the fleet and proposes what to do with them
//! - Parks high-value disposals on a human reviewer (`approval`)
//! - Executes the resulting actions through tools (`tools`)
//!
//! # Architecture
//!
//! 1. **Feedback analysis** (`workflow::FeedbackWorkflow`) - NL feedback → requests
//! 2. **Supervision** (`workflow::FleetSupervisor`) - deterministic routing over agent answers
//! 3. **Approval** (`approval::ApprovalService`) - persisted proposal + rendezvous wait
//! 4. **Persistence** (`service::CarManagementService`) - new condition and status
//!
//! # Safety Principle
//!
//! The LLM translates feedback into requests and recommendations. Routing,
//! the approval threshold, timeouts, and the final status are decided in code.

pub mod agents;
pub mod approval;
pub mod llm;
pub mod prompts;
pub mod rules;
pub mod service;
pub mod tools;
pub mod workflow;

pub use agents::FleetAgents;
pub use approval::ApprovalService;
pub use llm::{client_from_config, AgentRole, LlmClient, OfflineLlmClient};
pub use service::{CarManagementService, ReturnOutcome};
pub use workflow::CarProcessingWorkflow;
