//! Glue between the checkout engine and the Mural Pay API.
//!
//! [`MuralSettlement`] implements the engine's [`SettlementProvider`] on top of [`MuralApi`]. The rest of this module
//! runs once at start-up: it resolves the settlement account, organization and deposit wallet, and makes sure the
//! balance-activity webhook points at this server.
use async_trait::async_trait;
use checkout_engine::{
    db_types::MicroUsdc,
    lifecycle::SettlementContext,
    traits::{
        FiatQuote,
        LedgerTransaction,
        PayoutInstruction,
        PayoutRecord,
        SettlementError,
        SettlementProvider,
    },
};
use log::*;
use mural_tools::{
    Account,
    BusinessRecipientInfo,
    CopDetails,
    FiatPayoutDetails,
    MuralApi,
    MuralApiError,
    NewPayoutRequest,
    PayoutInfo,
    PayoutRequest,
    PhysicalAddress,
    TokenAmount,
    Webhook,
    BALANCE_ACTIVITY_EVENT,
    WEBHOOK_STATUS_ACTIVE,
};

pub const MAIN_ACCOUNT_NAME: &str = "Main Account";
pub const WEBHOOK_PATH: &str = "/api/webhooks/mural";
/// The provider refuses to register more webhooks than this.
pub const MAX_WEBHOOKS: usize = 5;

#[derive(Clone)]
pub struct MuralSettlement {
    api: MuralApi,
}

impl MuralSettlement {
    pub fn new(api: MuralApi) -> Self {
        Self { api }
    }

    pub async fn fetch_account(&self, account_id: &str) -> Result<Account, MuralApiError> {
        self.api.fetch_account(account_id).await
    }
}

pub fn to_settlement_error(e: MuralApiError) -> SettlementError {
    match e {
        MuralApiError::MissingTransferKey => SettlementError::NotConfigured(e.to_string()),
        MuralApiError::JsonError(_) => SettlementError::InvalidResponse(e.to_string()),
        e if e.status().is_some() => SettlementError::Rejected(e.to_string()),
        e => SettlementError::Transport(e.to_string()),
    }
}

fn to_payout_record(payout: PayoutRequest) -> PayoutRecord {
    PayoutRecord { id: payout.id, status: payout.status, created_at: payout.created_at, updated_at: payout.updated_at }
}

/// Builds the provider's payout request for a single COP bank payout to a business recipient.
pub fn new_payout_request(instruction: &PayoutInstruction) -> NewPayoutRequest {
    let r = &instruction.recipient;
    let payout = PayoutInfo {
        amount: TokenAmount::new(instruction.amount.as_usdc_f64(), instruction.token_symbol.as_str()),
        payout_details: FiatPayoutDetails {
            payout_type: "fiat".into(),
            bank_name: r.bank_name.clone(),
            bank_account_owner: r.bank_account_owner.clone(),
            fiat_and_rail_details: CopDetails {
                rail_type: r.fiat_rail_code.clone(),
                symbol: r.fiat_symbol.clone(),
                phone_number: r.phone_number.clone(),
                account_type: r.account_type.clone(),
                bank_account_number: r.bank_account_number.clone(),
                document_number: r.document_number.clone(),
                document_type: r.document_type.clone(),
            },
        },
        recipient_info: BusinessRecipientInfo {
            recipient_type: "business".into(),
            name: r.recipient_name.clone(),
            email: r.recipient_email.clone(),
            physical_address: PhysicalAddress {
                address1: r.address1.clone(),
                address2: r.address2.clone(),
                country: r.country.clone(),
                state: r.state.clone(),
                city: r.city.clone(),
                zip: r.zip.clone(),
            },
        },
    };
    NewPayoutRequest {
        source_account_id: instruction.source_account_id.clone(),
        memo: Some(instruction.memo.clone()).filter(|m| !m.is_empty()),
        payouts: vec![payout],
    }
}

#[async_trait]
impl SettlementProvider for MuralSettlement {
    async fn search_transactions(
        &self,
        account_id: &str,
        page_size: usize,
    ) -> Result<Vec<LedgerTransaction>, SettlementError> {
        let response = self.api.search_transactions(account_id, page_size).await.map_err(to_settlement_error)?;
        let transactions = response
            .transactions
            .into_iter()
            .filter_map(|tx| match MicroUsdc::from_usdc_f64(tx.token_amount.token_amount) {
                Ok(amount) => Some(LedgerTransaction {
                    id: tx.id,
                    executed_at: tx.executed_at,
                    amount,
                    symbol: tx.token_amount.token_symbol,
                }),
                Err(e) => {
                    warn!("🏦️ Skipping transaction {} with an unusable amount. {e}", tx.id);
                    None
                },
            })
            .collect();
        Ok(transactions)
    }

    async fn quote_to_fiat(
        &self,
        amount: MicroUsdc,
        token_symbol: &str,
        fiat_rail_code: &str,
    ) -> Result<Vec<FiatQuote>, SettlementError> {
        let quotes =
            self.api.quote_token_to_fiat(amount, token_symbol, fiat_rail_code).await.map_err(to_settlement_error)?;
        Ok(quotes
            .into_iter()
            .map(|q| FiatQuote {
                amount: q.estimated_fiat_amount.amount,
                currency_code: q.estimated_fiat_amount.currency_code,
            })
            .collect())
    }

    async fn create_payout(&self, instruction: &PayoutInstruction) -> Result<PayoutRecord, SettlementError> {
        let request = new_payout_request(instruction);
        let payout = self
            .api
            .create_payout_request(&request, instruction.idempotency_key.as_deref())
            .await
            .map_err(to_settlement_error)?;
        Ok(to_payout_record(payout))
    }

    async fn execute_payout(&self, payout_id: &str, tolerance_mode: &str) -> Result<PayoutRecord, SettlementError> {
        let mode = Some(tolerance_mode).filter(|m| !m.is_empty());
        let payout = self.api.execute_payout_request(payout_id, mode).await.map_err(to_settlement_error)?;
        Ok(to_payout_record(payout))
    }

    async fn fetch_payout(&self, payout_id: &str) -> Result<PayoutRecord, SettlementError> {
        let payout = self.api.fetch_payout_request(payout_id).await.map_err(to_settlement_error)?;
        Ok(to_payout_record(payout))
    }
}

//----------------------------------------------   Discovery  ----------------------------------------------------

/// Prefers the account named "Main Account", then the first active, API-enabled account, then the first account.
pub fn select_account(accounts: &[Account]) -> Option<&Account> {
    accounts
        .iter()
        .find(|a| a.name == MAIN_ACCOUNT_NAME)
        .or_else(|| accounts.iter().find(|a| a.is_api_enabled && a.is_active()))
        .or_else(|| accounts.first())
}

/// Resolves the settlement account, its organization and deposit wallet.
///
/// Returns a client scoped to the organization, if one was found. Whatever cannot be resolved stays unset, and the
/// deposit address and network fall back to the supplied defaults.
pub async fn discover_settlement_context(
    api: &MuralApi,
    configured_account: Option<&str>,
    default_address: &str,
    default_network: &str,
) -> (MuralApi, SettlementContext) {
    let account = match configured_account {
        Some(id) => match api.fetch_account(id).await {
            Ok(account) => Some(account),
            Err(e) => {
                warn!("🏦️ Could not fetch the configured account {id}. {e}");
                Some(Account { id: id.to_string(), ..Default::default() })
            },
        },
        None => match api.fetch_accounts().await {
            Ok(accounts) if accounts.is_empty() => {
                warn!("🏦️ No accounts were returned for this API key");
                None
            },
            Ok(accounts) => select_account(&accounts).cloned(),
            Err(e) => {
                warn!("🏦️ Could not list accounts. {e}");
                None
            },
        },
    };
    let mut context = SettlementContext {
        account_id: account.as_ref().map(|a| a.id.clone()),
        deposit_address: default_address.to_string(),
        network: default_network.to_string(),
        ..Default::default()
    };
    match account.as_ref() {
        Some(a) => {
            info!("🏦️ Using account {} ({}) for deposits and payouts", a.id, a.name);
            if let Some(wallet) = a.wallet_details() {
                context.deposit_address = wallet.wallet_address.clone();
                context.network = wallet.blockchain.clone();
            }
        },
        None => warn!("🏦️ No settlement account. Deposits will not be watched and payouts cannot be made."),
    }
    let scoped = match api.search_organizations(None).await {
        Ok(response) => match response.organizations.into_iter().next() {
            Some(org) => {
                info!("🏦️ Acting on behalf of organization {} ({})", org.id, org.name);
                context.organization_id = Some(org.id.clone());
                api.with_organization(org.id)
            },
            None => {
                info!("🏦️ No organizations found. Requests will not be scoped to an organization.");
                api.clone()
            },
        },
        Err(e) => {
            warn!("🏦️ Could not search organizations. {e}");
            api.clone()
        },
    };
    info!("🏦️ Customers will deposit to {} on {}", context.deposit_address, context.network);
    (scoped, context)
}

pub fn webhook_callback_url(backend_base_url: &str) -> String {
    format!("{}{WEBHOOK_PATH}", backend_base_url.trim_end_matches('/'))
}

/// Finds or creates the balance-activity webhook for `callback_url` and makes sure it is active.
pub async fn ensure_webhook(api: &MuralApi, callback_url: &str) -> Option<Webhook> {
    let webhooks = match api.fetch_webhooks().await {
        Ok(w) => w,
        Err(e) => {
            warn!("🏦️ Could not list webhooks. {e}");
            return None;
        },
    };
    let webhook = match webhooks.iter().find(|w| w.url == callback_url) {
        Some(w) => w.clone(),
        None if webhooks.len() >= MAX_WEBHOOKS => {
            warn!("🏦️ Cannot create a webhook for {callback_url}. {MAX_WEBHOOKS} webhooks already exist.");
            return None;
        },
        None => match api.create_webhook(callback_url, &[BALANCE_ACTIVITY_EVENT]).await {
            Ok(w) => w,
            Err(e) => {
                warn!("🏦️ Could not create a webhook for {callback_url}. {e}");
                return None;
            },
        },
    };
    if webhook.is_active() {
        return Some(webhook);
    }
    match api.update_webhook_status(&webhook.id, WEBHOOK_STATUS_ACTIVE).await {
        Ok(w) => {
            info!("🏦️ Activated webhook {}", w.id);
            Some(w)
        },
        Err(e) => {
            warn!("🏦️ Could not activate webhook {}. {e}", webhook.id);
            Some(webhook)
        },
    }
}
