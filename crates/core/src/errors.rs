use thiserror::Error;

use crate::domain::proposal::ProposalStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid proposal transition from {from:?} to {to:?}")]
    InvalidProposalTransition { from: ProposalStatus, to: ProposalStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested resource does not exist.",
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Internal { .. } => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            // An already-decided proposal is a bad-state request, not a server fault.
            ApplicationError::Conflict(message) => Self::BadRequest { message, correlation_id },
            ApplicationError::NotFound(message) => Self::NotFound { message, correlation_id },
            ApplicationError::Persistence(message)
            | ApplicationError::Integration(message)
            | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::InvariantViolation(
            "missing required field".to_owned(),
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(interface.http_status(), 400);
    }

    #[test]
    fn conflict_maps_to_bad_request() {
        let interface = ApplicationError::Conflict("proposal PROP-1 is already decided".to_owned())
            .into_interface("req-2");

        assert_eq!(interface.http_status(), 400);
        assert_eq!(interface.message(), "proposal PROP-1 is already decided");
    }

    #[test]
    fn not_found_maps_to_404_with_user_safe_message() {
        let interface = ApplicationError::NotFound("car 99".to_owned()).into_interface("req-3");

        assert_eq!(interface.http_status(), 404);
        assert_eq!(interface.user_message(), "The requested resource does not exist.");
        assert_eq!(interface.correlation_id(), "req-3");
    }

    #[test]
    fn persistence_error_maps_to_internal() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
        assert_eq!(interface.http_status(), 500);
    }
}
