use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarNumber(pub i64);

impl fmt::Display for CarNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CarStatus {
    Rented,
    AtCleaning,
    InMaintenance,
    Available,
    PendingDisposition,
}

impl CarStatus {
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Rented => "rented",
            Self::AtCleaning => "at_cleaning",
            Self::InMaintenance => "in_maintenance",
            Self::Available => "available",
            Self::PendingDisposition => "pending_disposition",
        }
    }

    pub fn parse_key(value: &str) -> Result<Self, DomainError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rented" => Ok(Self::Rented),
            "at_cleaning" => Ok(Self::AtCleaning),
            "in_maintenance" => Ok(Self::InMaintenance),
            "available" => Ok(Self::Available),
            "pending_disposition" => Ok(Self::PendingDisposition),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown car status `{other}`")))
            }
        }
    }

    /// Human-facing label shown on the fleet board.
    pub fn label(self) -> &'static str {
        match self {
            Self::Rented => "rented",
            Self::AtCleaning => "at cleaning",
            Self::InMaintenance => "in maintenance",
            Self::Available => "available to rent",
            Self::PendingDisposition => "pending disposition",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarInfo {
    pub number: CarNumber,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub condition: String,
    pub status: CarStatus,
    pub disposition_date: Option<NaiveDate>,
}

impl CarInfo {
    /// `Toyota Corolla (2021)` style description used in prompts and tool summaries.
    pub fn description(&self) -> String {
        format!("{} {} ({})", self.make, self.model, self.year)
    }

    pub fn age_in_years(&self, current_year: i32) -> i32 {
        (current_year - self.year).max(0)
    }
}

/// Where a car came back from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnSource {
    Rental,
    Cleaning,
    Maintenance,
}

impl ReturnSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rental => "rental",
            Self::Cleaning => "cleaning",
            Self::Maintenance => "maintenance",
        }
    }
}

/// Free-text feedback collected at return time. Only one slot is filled per return.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnFeedback {
    pub rental: String,
    pub cleaning: String,
    pub maintenance: String,
}

impl ReturnFeedback {
    pub fn from_source(source: ReturnSource, text: impl Into<String>) -> Self {
        let text = text.into();
        match source {
            ReturnSource::Rental => Self { rental: text, ..Self::default() },
            ReturnSource::Cleaning => Self { cleaning: text, ..Self::default() },
            ReturnSource::Maintenance => Self { maintenance: text, ..Self::default() },
        }
    }

    /// All non-empty feedback joined for keyword scanning.
    pub fn combined(&self) -> String {
        [self.rental.as_str(), self.cleaning.as_str(), self.maintenance.as_str()]
            .into_iter()
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
