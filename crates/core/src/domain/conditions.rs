use serde::{Deserialize, Serialize};

use crate::domain::car::CarStatus;

/// Where a processed car goes next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CarAssignment {
    Disposition,
    Maintenance,
    Cleaning,
    None,
}

impl CarAssignment {
    pub fn status(self) -> CarStatus {
        match self {
            Self::Disposition => CarStatus::PendingDisposition,
            Self::Maintenance => CarStatus::InMaintenance,
            Self::Cleaning => CarStatus::AtCleaning,
            Self::None => CarStatus::Available,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalOutcome {
    Approved,
    Rejected,
    NotRequired,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarConditions {
    pub general_condition: String,
    pub assignment: CarAssignment,
    pub disposition_status: ApprovalOutcome,
    pub disposition_reason: Option<String>,
}
