// Payment step of the booking dialog.
//
// AwaitingConfirmation -> Processing -> Completed, driven by whatever
// `PaymentGateway` the host wires in. A gateway failure sends the flow back
// to AwaitingConfirmation with the reason so the user can try again.

use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub reference: String,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub amount: f64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &PaymentRequest) -> anyhow::Result<PaymentReceipt>;
}

// Stand-in gateway that approves every charge after a fixed delay
pub struct SimulatedGateway {
    delay: Duration,
}

impl SimulatedGateway {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(Duration::from_millis(1200))
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &PaymentRequest) -> anyhow::Result<PaymentReceipt> {
        tokio::time::sleep(self.delay).await;
        Ok(PaymentReceipt {
            transaction_id: format!("sim-{:08x}", rand::random::<u32>()),
            amount: request.amount,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentState {
    AwaitingConfirmation { last_error: Option<String> },
    Processing,
    Completed(PaymentReceipt),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Payment is already being processed")]
    InProgress,

    #[error("Payment already completed")]
    AlreadyCompleted,

    #[error("Payment failed: {0}")]
    Declined(String),
}

pub struct PaymentFlow {
    request: PaymentRequest,
    state: PaymentState,
}

impl PaymentFlow {
    pub fn new(request: PaymentRequest) -> Self {
        Self {
            request,
            state: PaymentState::AwaitingConfirmation { last_error: None },
        }
    }

    pub fn state(&self) -> &PaymentState {
        &self.state
    }

    pub fn request(&self) -> &PaymentRequest {
        &self.request
    }

    // Moves to Processing and stays there until the gateway answers
    pub async fn confirm<G>(&mut self, gateway: &G) -> Result<PaymentReceipt, PaymentError>
    where
        G: PaymentGateway + ?Sized,
    {
        match self.state {
            PaymentState::Processing => return Err(PaymentError::InProgress),
            PaymentState::Completed(_) => return Err(PaymentError::AlreadyCompleted),
            PaymentState::AwaitingConfirmation { .. } => {}
        }

        self.state = PaymentState::Processing;
        info!(
            reference = %self.request.reference,
            amount = self.request.amount,
            "processing payment"
        );

        let outcome = gateway
            .charge(&self.request)
            .await
            .with_context(|| format!("charging {}", self.request.reference));

        match outcome {
            Ok(receipt) => {
                info!(transaction_id = %receipt.transaction_id, "payment completed");
                self.state = PaymentState::Completed(receipt.clone());
                Ok(receipt)
            }
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(error = %reason, "payment failed");
                self.state = PaymentState::AwaitingConfirmation {
                    last_error: Some(reason.clone()),
                };
                Err(PaymentError::Declined(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DecliningGateway;

    #[async_trait]
    impl PaymentGateway for DecliningGateway {
        async fn charge(&self, _request: &PaymentRequest) -> anyhow::Result<PaymentReceipt> {
            anyhow::bail!("card declined")
        }
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            reference: "booking-42".to_string(),
            amount: 899.0,
            currency: "INR".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_only_after_gateway_resolves() {
        let gateway = SimulatedGateway::default();
        let mut flow = PaymentFlow::new(request());
        assert!(matches!(
            flow.state(),
            PaymentState::AwaitingConfirmation { last_error: None }
        ));

        let receipt = flow.confirm(&gateway).await.unwrap();
        assert_eq!(receipt.amount, 899.0);
        assert!(receipt.transaction_id.starts_with("sim-"));
        assert_eq!(flow.state(), &PaymentState::Completed(receipt));

        assert_eq!(
            flow.confirm(&gateway).await.unwrap_err(),
            PaymentError::AlreadyCompleted
        );
    }

    #[tokio::test]
    async fn test_decline_returns_to_awaiting_confirmation() {
        let mut flow = PaymentFlow::new(request());
        let error = flow.confirm(&DecliningGateway).await.unwrap_err();

        match error {
            PaymentError::Declined(reason) => {
                assert!(reason.contains("card declined"));
                assert!(reason.contains("booking-42"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(
            flow.state(),
            PaymentState::AwaitingConfirmation { last_error: Some(_) }
        ));

        // a retry with a working gateway goes through
        let gateway = SimulatedGateway::new(Duration::from_millis(1));
        tokio_test::assert_ok!(flow.confirm(&gateway).await);
    }
}
