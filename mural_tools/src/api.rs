use std::sync::Arc;

use checkout_common::MicroUsdc;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
    Response,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use crate::{
    config::MuralConfig,
    data_objects::{
        Account,
        ExecutePayoutRequest,
        NewPayoutRequest,
        NewWebhook,
        PayoutRequest,
        SearchOrganizationsResponse,
        SearchPayinsResponse,
        SearchTransactionsResponse,
        TokenAmount,
        TokenFeeRequest,
        TokenToFiatQuote,
        TokenToFiatQuoteRequest,
        UpdateWebhookStatus,
        Webhook,
    },
    MuralApiError,
};

pub const ON_BEHALF_OF_HEADER: &str = "on-behalf-of";
pub const TRANSFER_KEY_HEADER: &str = "transfer-api-key";
const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Mural API client.
///
/// The client is cheap to clone. The organization scope is fixed per instance; use [`MuralApi::with_organization`]
/// to derive a scoped copy once the organization is known.
#[derive(Clone)]
pub struct MuralApi {
    config: MuralConfig,
    organization_id: Option<String>,
    client: Arc<Client>,
}

impl MuralApi {
    pub fn new(config: MuralConfig) -> Result<Self, MuralApiError> {
        if config.api_key.is_empty() {
            return Err(MuralApiError::Initialization("A Mural API key is required".into()));
        }
        reqwest::Url::parse(&config.base_url)
            .map_err(|e| MuralApiError::Initialization(format!("Invalid Mural base url: {e}")))?;
        let mut headers = HeaderMap::with_capacity(3);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
            .map_err(|e| MuralApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MuralApiError::Initialization(e.to_string()))?;
        Ok(Self { config, organization_id: None, client: Arc::new(client) })
    }

    /// Returns a copy of this client that scopes every call to the given organization.
    pub fn with_organization<S: Into<String>>(&self, organization_id: S) -> Self {
        let organization_id = Some(organization_id.into()).filter(|s: &String| !s.is_empty());
        Self { config: self.config.clone(), organization_id, client: Arc::clone(&self.client) }
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    pub fn config(&self) -> &MuralConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn send_request<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<Response, MuralApiError> {
        let url = self.url(path);
        trace!("🏦️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(org) = &self.organization_id {
            req = req.header(ON_BEHALF_OF_HEADER, org);
        }
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| MuralApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("🏦️ REST query successful. {}", response.status());
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| MuralApiError::RestResponseError(e.to_string()))?;
            debug!("🏦️ REST query failed. {status}: {body}");
            Err(MuralApiError::from_response(status, body))
        }
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, MuralApiError> {
        let response = self.send_request(method, path, params, headers, body).await?;
        response.json::<T>().await.map_err(|e| MuralApiError::JsonError(e.to_string()))
    }

    //------------------------------------------   Accounts   --------------------------------------------------------

    pub async fn fetch_accounts(&self) -> Result<Vec<Account>, MuralApiError> {
        debug!("🏦️ Fetching accounts");
        let accounts = self.rest_query::<Vec<Account>, ()>(Method::GET, "/api/accounts", &[], &[], None).await?;
        info!("🏦️ Fetched {} accounts", accounts.len());
        Ok(accounts)
    }

    pub async fn fetch_account(&self, account_id: &str) -> Result<Account, MuralApiError> {
        let path = format!("/api/accounts/{account_id}");
        debug!("🏦️ Fetching account {account_id}");
        self.rest_query::<Account, ()>(Method::GET, &path, &[], &[], None).await
    }

    pub async fn search_organizations(
        &self,
        name_filter: Option<&str>,
    ) -> Result<SearchOrganizationsResponse, MuralApiError> {
        let body = match name_filter {
            Some(name) if !name.is_empty() => json!({ "name": name }),
            _ => json!({}),
        };
        debug!("🏦️ Searching organizations");
        self.rest_query::<SearchOrganizationsResponse, Value>(
            Method::POST,
            "/api/organizations/search",
            &[],
            &[],
            Some(body),
        )
        .await
    }

    //------------------------------------------ Transactions --------------------------------------------------------

    pub async fn search_transactions(
        &self,
        account_id: &str,
        limit: usize,
    ) -> Result<SearchTransactionsResponse, MuralApiError> {
        let path = format!("/api/transactions/search/account/{account_id}");
        let limit = limit.to_string();
        trace!("🏦️ Searching transactions for account {account_id}");
        self.rest_query::<SearchTransactionsResponse, Value>(
            Method::POST,
            &path,
            &[("limit", limit.as_str())],
            &[],
            Some(json!({})),
        )
        .await
    }

    pub async fn search_payins(&self, limit: usize) -> Result<SearchPayinsResponse, MuralApiError> {
        let limit = limit.to_string();
        self.rest_query::<SearchPayinsResponse, Value>(
            Method::POST,
            "/api/payins/search",
            &[("limit", limit.as_str())],
            &[],
            Some(json!({})),
        )
        .await
    }

    //------------------------------------------    Payouts   --------------------------------------------------------

    /// Requests an estimate of what `amount` of `token_symbol` would pay out on the given fiat rail.
    pub async fn quote_token_to_fiat(
        &self,
        amount: MicroUsdc,
        token_symbol: &str,
        fiat_and_rail_code: &str,
    ) -> Result<Vec<TokenToFiatQuote>, MuralApiError> {
        let body = TokenToFiatQuoteRequest {
            token_fee_requests: vec![TokenFeeRequest {
                amount: TokenAmount::new(amount.as_usdc_f64(), token_symbol),
                fiat_and_rail_code: fiat_and_rail_code.to_string(),
            }],
        };
        debug!("🏦️ Requesting {fiat_and_rail_code} quote for {amount}");
        self.rest_query::<Vec<TokenToFiatQuote>, TokenToFiatQuoteRequest>(
            Method::POST,
            "/api/payouts/fees/token-to-fiat",
            &[],
            &[],
            Some(body),
        )
        .await
    }

    pub async fn create_payout_request(
        &self,
        request: &NewPayoutRequest,
        idempotency_key: Option<&str>,
    ) -> Result<PayoutRequest, MuralApiError> {
        let headers = idempotency_key.map(|k| vec![(IDEMPOTENCY_KEY_HEADER, k)]).unwrap_or_default();
        debug!("🏦️ Creating payout request from account {}", request.source_account_id);
        let result = self
            .rest_query::<PayoutRequest, &NewPayoutRequest>(
                Method::POST,
                "/api/payouts/payout",
                &[],
                &headers,
                Some(request),
            )
            .await?;
        info!("🏦️ Created payout request {} with status {}", result.id, result.status);
        Ok(result)
    }

    /// Executes a previously created payout request. This needs the transfer key on top of the API key.
    pub async fn execute_payout_request(
        &self,
        payout_request_id: &str,
        exchange_rate_tolerance_mode: Option<&str>,
    ) -> Result<PayoutRequest, MuralApiError> {
        if self.config.transfer_key.is_empty() {
            return Err(MuralApiError::MissingTransferKey);
        }
        let path = format!("/api/payouts/payout/{payout_request_id}/execute");
        let body = ExecutePayoutRequest { exchange_rate_tolerance_mode: exchange_rate_tolerance_mode.map(String::from) };
        let key = self.config.transfer_key.reveal().as_str();
        debug!("🏦️ Executing payout request {payout_request_id}");
        let result = self
            .rest_query::<PayoutRequest, ExecutePayoutRequest>(
                Method::POST,
                &path,
                &[],
                &[(TRANSFER_KEY_HEADER, key)],
                Some(body),
            )
            .await?;
        info!("🏦️ Executed payout request {} with status {}", result.id, result.status);
        Ok(result)
    }

    pub async fn fetch_payout_request(&self, payout_request_id: &str) -> Result<PayoutRequest, MuralApiError> {
        let path = format!("/api/payouts/payout/{payout_request_id}");
        debug!("🏦️ Fetching payout request {payout_request_id}");
        self.rest_query::<PayoutRequest, ()>(Method::GET, &path, &[], &[], None).await
    }

    //------------------------------------------   Webhooks   --------------------------------------------------------

    pub async fn fetch_webhooks(&self) -> Result<Vec<Webhook>, MuralApiError> {
        debug!("🏦️ Fetching webhooks");
        let result = self.rest_query::<Vec<Webhook>, ()>(Method::GET, "/api/webhooks", &[], &[], None).await?;
        info!("🏦️ Fetched {} webhooks", result.len());
        Ok(result)
    }

    pub async fn create_webhook(&self, url: &str, events: &[&str]) -> Result<Webhook, MuralApiError> {
        let body = NewWebhook { url: url.to_string(), events: events.iter().map(|s| s.to_string()).collect() };
        debug!("🏦️ Creating webhook for {url}");
        let result =
            self.rest_query::<Webhook, NewWebhook>(Method::POST, "/api/webhooks", &[], &[], Some(body)).await?;
        info!("🏦️ Created webhook {}", result.id);
        Ok(result)
    }

    pub async fn update_webhook_status(&self, id: &str, status: &str) -> Result<Webhook, MuralApiError> {
        let path = format!("/api/webhooks/{id}/status");
        let body = UpdateWebhookStatus { status: status.to_string() };
        debug!("🏦️ Setting webhook {id} status to {status}");
        self.rest_query::<Webhook, UpdateWebhookStatus>(Method::PATCH, &path, &[], &[], Some(body)).await
    }

    pub async fn delete_webhook(&self, id: &str) -> Result<(), MuralApiError> {
        let path = format!("/api/webhooks/{id}");
        debug!("🏦️ Deleting webhook {id}");
        self.send_request::<()>(Method::DELETE, &path, &[], &[], None).await?;
        info!("🏦️ Deleted webhook {id}");
        Ok(())
    }
}
