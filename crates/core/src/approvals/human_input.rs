use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::approvals::rendezvous::{Rendezvous, WaitOutcome, Waiter};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HumanInputError {
    #[error("no pending input request `{request_id}`")]
    NotPending { request_id: String },
}

/// Free-form prompt/answer exchange with an operator, keyed by request id.
///
/// A request lives until it is answered, cancelled or its deadline passes.
/// Expired requests are dropped before every lookup, so they are neither listed
/// nor answerable.
#[derive(Default)]
pub struct HumanInputService {
    requests: Rendezvous<String, String, String>,
}

impl HumanInputService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `prompt` under `request_id` and returns a handle to wait on. A
    /// second request for the same id shares the first one's prompt and answer.
    pub fn request_input(
        &self,
        request_id: impl Into<String>,
        prompt: impl Into<String>,
        timeout: Duration,
    ) -> Waiter<String, String> {
        let request_id = request_id.into();
        tracing::info!(
            event_name = "human_input.requested",
            request_id = %request_id,
            timeout_secs = timeout.as_secs(),
            "waiting for operator input"
        );
        self.requests.open_or_join(request_id, prompt.into(), timeout).into_waiter()
    }

    /// Registers the request and waits for the answer. A request that times
    /// out is withdrawn before this returns.
    pub async fn wait_for_input(
        &self,
        request_id: impl Into<String>,
        prompt: impl Into<String>,
        timeout: Duration,
    ) -> WaitOutcome<String> {
        let request_id = request_id.into();
        let outcome = self.request_input(request_id.clone(), prompt, timeout).wait().await;
        if outcome == WaitOutcome::TimedOut {
            self.prune();
            tracing::warn!(
                event_name = "human_input.timed_out",
                request_id = %request_id,
                timeout_secs = timeout.as_secs(),
                "no operator input before the deadline"
            );
        }
        outcome
    }

    pub fn provide_input(
        &self,
        request_id: &str,
        input: impl Into<String>,
    ) -> Result<(), HumanInputError> {
        self.prune();
        let request_id = request_id.to_string();
        self.requests
            .resolve(&request_id, input.into())
            .map(|_| ())
            .map_err(|_| HumanInputError::NotPending { request_id })
    }

    pub fn pending_requests(&self) -> BTreeMap<String, String> {
        self.prune();
        self.requests.pending().into_iter().collect()
    }

    pub fn has_pending_request(&self, request_id: &str) -> bool {
        self.prune();
        self.requests.is_pending(&request_id.to_string())
    }

    pub fn cancel_request(&self, request_id: &str) -> bool {
        self.requests.abandon(&request_id.to_string())
    }

    fn prune(&self) {
        let expired = self.requests.prune_expired();
        if expired > 0 {
            tracing::debug!(event_name = "human_input.expired", expired, "dropped expired input");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{HumanInputError, HumanInputService};
    use crate::approvals::rendezvous::WaitOutcome;

    #[tokio::test]
    async fn provided_input_reaches_the_waiting_request() {
        let service = HumanInputService::new();
        let waiter = service.request_input("car-12", "Keep or dispose?", Duration::from_secs(5));

        assert_eq!(
            service.pending_requests().get("car-12").map(String::as_str),
            Some("Keep or dispose?")
        );
        service.provide_input("car-12", "KEEP_CAR").expect("pending request");

        assert_eq!(waiter.wait().await, WaitOutcome::Resolved("KEEP_CAR".to_string()));
        assert!(!service.has_pending_request("car-12"));
    }

    #[tokio::test]
    async fn input_for_unknown_request_is_rejected() {
        let service = HumanInputService::new();
        assert_eq!(
            service.provide_input("car-404", "KEEP_CAR"),
            Err(HumanInputError::NotPending { request_id: "car-404".to_string() })
        );
    }

    #[tokio::test]
    async fn timed_out_request_is_withdrawn() {
        let service = HumanInputService::new();
        let outcome = service.wait_for_input("car-7", "Keep?", Duration::from_millis(10)).await;

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(service.pending_requests().is_empty());
        assert!(!service.has_pending_request("car-7"));
        assert_eq!(
            service.provide_input("car-7", "KEEP_CAR"),
            Err(HumanInputError::NotPending { request_id: "car-7".to_string() })
        );
    }

    #[tokio::test]
    async fn expired_request_is_not_listed_even_without_a_waiter() {
        let service = HumanInputService::new();
        let waiter = service.request_input("car-9", "Dispose?", Duration::from_millis(10));
        drop(waiter);
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(service.pending_requests().is_empty());
        assert!(service.provide_input("car-9", "DISPOSE_CAR").is_err());
    }

    #[tokio::test]
    async fn answered_wait_returns_the_input() {
        let service = std::sync::Arc::new(HumanInputService::new());
        let asking = std::sync::Arc::clone(&service);
        let handle = tokio::spawn(async move {
            asking.wait_for_input("car-2", "Keep?", Duration::from_secs(5)).await
        });
        while !service.has_pending_request("car-2") {
            tokio::task::yield_now().await;
        }

        service.provide_input("car-2", "KEEP_CAR").expect("pending request");
        assert_eq!(handle.await.expect("join"), WaitOutcome::Resolved("KEEP_CAR".to_string()));
    }

    #[tokio::test]
    async fn cancelled_request_releases_its_waiter() {
        let service = HumanInputService::new();
        let waiter = service.request_input("car-3", "Anything?", Duration::from_secs(5));

        assert!(service.cancel_request("car-3"));
        assert_eq!(waiter.wait().await, WaitOutcome::Abandoned);
        assert!(service.pending_requests().is_empty());
    }
}
