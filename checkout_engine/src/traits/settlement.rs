use async_trait::async_trait;
use chrono::{DateTime, Utc};
use checkout_common::MicroUsdc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("The settlement provider could not be reached. {0}")]
    Transport(String),
    #[error("The settlement provider rejected the request. {0}")]
    Rejected(String),
    #[error("The settlement provider returned an unexpected response. {0}")]
    InvalidResponse(String),
    #[error("The settlement provider is not configured for this operation. {0}")]
    NotConfigured(String),
}

/// A transfer on the settlement account, as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerTransaction {
    pub id: String,
    /// `None` when the provider did not report an execution time.
    pub executed_at: Option<DateTime<Utc>>,
    pub amount: MicroUsdc,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FiatQuote {
    pub amount: f64,
    pub currency_code: String,
}

/// The fixed bank account that receives every payout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRecipient {
    pub bank_name: String,
    pub bank_account_owner: String,
    pub fiat_symbol: String,
    pub fiat_rail_code: String,
    pub phone_number: String,
    pub account_type: String,
    pub bank_account_number: String,
    pub document_number: String,
    pub document_type: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub address1: String,
    pub address2: Option<String>,
    pub country: String,
    pub state: String,
    pub city: String,
    pub zip: String,
}

impl Default for PayoutRecipient {
    fn default() -> Self {
        Self {
            bank_name: "Bancolombia".into(),
            bank_account_owner: "Demo Recipient S.A.S.".into(),
            fiat_symbol: "COP".into(),
            fiat_rail_code: "cop".into(),
            phone_number: "+573001234567".into(),
            account_type: "CHECKING".into(),
            bank_account_number: "1234567890".into(),
            document_number: "9001234568".into(),
            document_type: "RUC".into(),
            recipient_name: "Demo Recipient S.A.S.".into(),
            recipient_email: "demo-recipient@example.com".into(),
            address1: "Calle 123 #45-67".into(),
            address2: None,
            country: "CO".into(),
            state: "ANT".into(),
            city: "Medellín".into(),
            zip: "050021".into(),
        }
    }
}

/// Everything the provider needs to create a single payout request.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutInstruction {
    pub source_account_id: String,
    pub memo: String,
    pub amount: MicroUsdc,
    pub token_symbol: String,
    pub recipient: PayoutRecipient,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRecord {
    pub id: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// How the engine interprets a provider payout status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutState {
    AwaitingExecution,
    Executed,
    Failed,
    /// Anything else, e.g. `PENDING`. Nothing to do but wait.
    InProgress,
}

impl PayoutState {
    pub const AWAITING_EXECUTION: &'static str = "AWAITING_EXECUTION";
    pub const CANCELED: &'static str = "CANCELED";
    pub const EXECUTED: &'static str = "EXECUTED";
    pub const FAILED: &'static str = "FAILED";

    pub fn from_provider_status(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            Self::AWAITING_EXECUTION => Self::AwaitingExecution,
            Self::EXECUTED => Self::Executed,
            Self::FAILED | Self::CANCELED => Self::Failed,
            _ => Self::InProgress,
        }
    }
}

/// The settlement provider, as seen by the payment lifecycle.
///
/// Implementations must be cheap to share between lifecycle workers.
#[async_trait]
pub trait SettlementProvider: Send + Sync {
    /// Most recent transactions on the given settlement account.
    async fn search_transactions(
        &self,
        account_id: &str,
        page_size: usize,
    ) -> Result<Vec<LedgerTransaction>, SettlementError>;

    /// Estimates of what `amount` of `token_symbol` pays out on the given fiat rail.
    async fn quote_to_fiat(
        &self,
        amount: MicroUsdc,
        token_symbol: &str,
        fiat_rail_code: &str,
    ) -> Result<Vec<FiatQuote>, SettlementError>;

    async fn create_payout(&self, instruction: &PayoutInstruction) -> Result<PayoutRecord, SettlementError>;

    async fn execute_payout(&self, payout_id: &str, tolerance_mode: &str) -> Result<PayoutRecord, SettlementError>;

    async fn fetch_payout(&self, payout_id: &str) -> Result<PayoutRecord, SettlementError>;
}
