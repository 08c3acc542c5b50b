//! Rules that turn analyzer output and the approval result into a car assignment.

use crate::domain::conditions::{ApprovalOutcome, CarAssignment};
use crate::domain::proposal::{FleetVerdict, HumanDecision};

/// Analyzer outputs use `*_NOT_REQUIRED` markers; anything else that is not
/// blank is a request.
pub fn is_required(request: &str) -> bool {
    let trimmed = request.trim();
    !trimmed.is_empty() && !trimmed.to_ascii_uppercase().contains("NOT_REQUIRED")
}

/// Disposition analyzer output asks for the car to leave the fleet.
pub fn disposition_required(request: &str) -> bool {
    let upper = request.to_ascii_uppercase();
    upper.contains("DISPOSITION_REQUIRED") && !upper.contains("NOT_REQUIRED")
}

/// Final verdict once a reviewer has answered a proposal.
///
/// An explicit keep/dispose choice is taken as-is. Otherwise an approval
/// confirms the proposed verdict and a rejection keeps the car, whatever was
/// proposed. Timeout and error defaults are rejections, so an unanswered
/// proposal never disposes of a car.
pub fn resolve_verdict(
    proposed: FleetVerdict,
    decision: &HumanDecision,
) -> (FleetVerdict, ApprovalOutcome) {
    if let Some(choice) = decision.choice {
        return (choice, ApprovalOutcome::Approved);
    }
    if decision.approved {
        (proposed, ApprovalOutcome::Approved)
    } else {
        (FleetVerdict::KeepCar, ApprovalOutcome::Rejected)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutcomeInputs<'a> {
    pub cleaning_request: &'a str,
    pub maintenance_request: &'a str,
    pub disposition_request: &'a str,
    /// `None` when no disposition was requested.
    pub verdict: Option<FleetVerdict>,
    pub approval: ApprovalOutcome,
}

pub fn determine_assignment(inputs: &OutcomeInputs<'_>) -> CarAssignment {
    let disposition_requested = disposition_required(inputs.disposition_request);

    if disposition_requested {
        match inputs.verdict {
            Some(FleetVerdict::DisposeCar) => return CarAssignment::Disposition,
            // A car someone wanted gone but a reviewer kept gets inspected first.
            Some(FleetVerdict::KeepCar) if inputs.approval == ApprovalOutcome::Rejected => {
                return CarAssignment::Maintenance
            }
            _ => {}
        }
    }

    if is_required(inputs.maintenance_request) {
        CarAssignment::Maintenance
    } else if is_required(inputs.cleaning_request) {
        CarAssignment::Cleaning
    } else {
        CarAssignment::None
    }
}
