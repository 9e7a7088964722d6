//! In-process collaborators for mock mode and tests.
//!
//! They simulate the external services deterministically: verification
//! completes after a configurable number of pending checks, ledgers hand out
//! synthetic identifiers.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::content::{ContentRef, OwnerRef, TrackMetadata};
use crate::models::ledger::{
    AttestationClaim, AttestationReceipt, RegistrationReceipt, RegistrationRequest,
};
use crate::models::verification::{RequestHandle, VerificationCheck, VerificationOutcome};
use crate::services::attestation::{Attestor, LedgerError};
use crate::services::registration::Registrar;
use crate::services::verification::{VerificationError, Verifier};

#[derive(Debug, Clone, Copy, PartialEq)]
enum VerifierBehavior {
    Decide { passed: bool },
    FailStatus,
    FailSubmit,
    Panic,
}

/// Simulated verification service.
pub struct MockVerifier {
    behavior: VerifierBehavior,
    confidence_score: f64,
    pending_checks: u32,
    latency: Duration,
    submissions: AtomicU32,
    status_checks: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockVerifier {
    fn with_behavior(behavior: VerifierBehavior) -> Self {
        Self {
            behavior,
            confidence_score: 0.92,
            pending_checks: 0,
            latency: Duration::ZERO,
            submissions: AtomicU32::new(0),
            status_checks: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every request is verified.
    pub fn passing() -> Self {
        Self::with_behavior(VerifierBehavior::Decide { passed: true })
    }

    /// Every request completes with a negative decision.
    pub fn rejecting() -> Self {
        let mut mock = Self::with_behavior(VerifierBehavior::Decide { passed: false });
        mock.confidence_score = 0.18;
        mock
    }

    /// Status checks report a terminal service-side failure.
    pub fn failing_status() -> Self {
        Self::with_behavior(VerifierBehavior::FailStatus)
    }

    /// Submission itself is refused.
    pub fn failing_submit() -> Self {
        Self::with_behavior(VerifierBehavior::FailSubmit)
    }

    /// Status checks panic, simulating a bug inside the stage.
    pub fn panicking() -> Self {
        Self::with_behavior(VerifierBehavior::Panic)
    }

    /// Report `checks` pending status checks before the decision.
    pub fn ready_after(mut self, checks: u32) -> Self {
        self.pending_checks = checks;
        self
    }

    /// Add simulated network latency to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn submissions(&self) -> u32 {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn status_checks(&self) -> u32 {
        self.status_checks.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate_call(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Verifier for MockVerifier {
    async fn submit(
        &self,
        content: &ContentRef,
        _metadata: &TrackMetadata,
    ) -> Result<RequestHandle, VerificationError> {
        self.simulate_call().await;
        if self.behavior == VerifierBehavior::FailSubmit {
            return Err(VerificationError::Unavailable(
                "mock verification service refused the request".to_string(),
            ));
        }
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RequestHandle(format!("mock_req_{}_{}", content.id, n)))
    }

    async fn check_status(
        &self,
        _handle: &RequestHandle,
    ) -> Result<VerificationCheck, VerificationError> {
        self.simulate_call().await;
        let checks = self.status_checks.fetch_add(1, Ordering::SeqCst) + 1;

        match self.behavior {
            VerifierBehavior::Panic => panic!("mock verifier crashed"),
            VerifierBehavior::FailStatus => Ok(VerificationCheck::Failed(
                "analysis engine rejected the audio".to_string(),
            )),
            _ if checks <= self.pending_checks => Ok(VerificationCheck::Pending),
            VerifierBehavior::Decide { passed } => Ok(VerificationCheck::Completed(
                VerificationOutcome {
                    passed,
                    confidence_score: self.confidence_score,
                    detail: serde_json::json!({ "engine": "mock" }),
                },
            )),
            VerifierBehavior::FailSubmit => Err(VerificationError::Unavailable(
                "no request was accepted".to_string(),
            )),
        }
    }
}

/// Simulated attestation ledger.
pub struct MockAttestor {
    fail: bool,
    created: AtomicU32,
}

impl MockAttestor {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            created: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            created: AtomicU32::new(0),
        }
    }

    pub fn created(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Attestor for MockAttestor {
    async fn create(
        &self,
        _owner: &OwnerRef,
        claim: &AttestationClaim,
    ) -> Result<AttestationReceipt, LedgerError> {
        if self.fail {
            return Err(LedgerError::Rejected("mock ledger out of gas".to_string()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(AttestationReceipt {
            attestation_id: format!("0x{}", Uuid::new_v4().simple()),
            ledger_ref: format!("0x{}", Uuid::new_v4().simple()),
            claim: claim.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RegistrarBehavior {
    Succeed,
    Fail,
    Offline,
}

/// Simulated rights registrar.
pub struct MockRegistrar {
    behavior: RegistrarBehavior,
    registered: AtomicU32,
}

impl MockRegistrar {
    fn with_behavior(behavior: RegistrarBehavior) -> Self {
        Self {
            behavior,
            registered: AtomicU32::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::with_behavior(RegistrarBehavior::Succeed)
    }

    pub fn failing() -> Self {
        Self::with_behavior(RegistrarBehavior::Fail)
    }

    /// Present but reporting itself unavailable.
    pub fn offline() -> Self {
        Self::with_behavior(RegistrarBehavior::Offline)
    }

    pub fn registered(&self) -> u32 {
        self.registered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registrar for MockRegistrar {
    fn is_available(&self) -> bool {
        self.behavior != RegistrarBehavior::Offline
    }

    async fn register(
        &self,
        _owner: &OwnerRef,
        request: &RegistrationRequest,
        _attestation_id: &str,
    ) -> Result<RegistrationReceipt, LedgerError> {
        match self.behavior {
            RegistrarBehavior::Succeed => {
                let token = self.registered.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(RegistrationReceipt {
                    registration_id: token.to_string(),
                    ledger_ref: format!("0x{}", Uuid::new_v4().simple()),
                    token_uri: Some(format!(
                        "mock://rights/{}",
                        request.properties.content_id
                    )),
                })
            }
            RegistrarBehavior::Fail => Err(LedgerError::Rejected(
                "mock registrar reverted the transaction".to_string(),
            )),
            RegistrarBehavior::Offline => Err(LedgerError::Unavailable(
                "mock registrar offline".to_string(),
            )),
        }
    }
}
