use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//--------------------------------------     Accounts       ----------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_api_enabled: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_details: Option<AccountDetails>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("ACTIVE")
    }

    pub fn wallet_details(&self) -> Option<&WalletDetails> {
        self.account_details.as_ref().and_then(|d| d.wallet_details.as_ref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    #[serde(default)]
    pub balances: Vec<TokenAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_details: Option<WalletDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDetails {
    pub wallet_address: String,
    pub blockchain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    pub token_amount: f64,
    pub token_symbol: String,
}

impl TokenAmount {
    pub fn new<S: Into<String>>(token_amount: f64, token_symbol: S) -> Self {
        Self { token_amount, token_symbol: token_symbol.into() }
    }
}

//--------------------------------------   Organizations    ----------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOrganizationsResponse {
    #[serde(default)]
    pub count: u64,
    pub next_id: Option<String>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

//--------------------------------------    Transactions    ----------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    pub token_amount: TokenAmount,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTransactionsResponse {
    #[serde(default)]
    pub count: u64,
    pub next_id: Option<String>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payin {
    pub id: String,
    #[serde(default)]
    pub destination_account_id: String,
    #[serde(rename = "payinStatus", default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPayinsResponse {
    #[serde(default)]
    pub count: u64,
    pub next_id: Option<String>,
    #[serde(default)]
    pub payins: Vec<Payin>,
}

//--------------------------------------       Quotes       ----------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenFeeRequest {
    pub amount: TokenAmount,
    pub fiat_and_rail_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenToFiatQuoteRequest {
    pub token_fee_requests: Vec<TokenFeeRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiatAmount {
    pub amount: f64,
    #[serde(default)]
    pub currency_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenToFiatQuote {
    pub estimated_fiat_amount: FiatAmount,
}

//--------------------------------------      Payouts       ----------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayoutRequest {
    pub source_account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub payouts: Vec<PayoutInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutInfo {
    pub amount: TokenAmount,
    pub payout_details: FiatPayoutDetails,
    pub recipient_info: BusinessRecipientInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiatPayoutDetails {
    /// Always `fiat` for bank payouts.
    #[serde(rename = "type")]
    pub payout_type: String,
    pub bank_name: String,
    pub bank_account_owner: String,
    pub fiat_and_rail_details: CopDetails,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopDetails {
    /// Always `cop`.
    #[serde(rename = "type")]
    pub rail_type: String,
    pub symbol: String,
    pub phone_number: String,
    /// `CHECKING` or `SAVINGS`
    pub account_type: String,
    pub bank_account_number: String,
    pub document_number: String,
    pub document_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRecipientInfo {
    /// Always `business`.
    #[serde(rename = "type")]
    pub recipient_type: String,
    pub name: String,
    pub email: String,
    pub physical_address: PhysicalAddress,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalAddress {
    pub address1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    pub country: String,
    pub state: String,
    pub city: String,
    pub zip: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutePayoutRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_rate_tolerance_mode: Option<String>,
}

/// A payout request as reported by Mural. Creation, execution and lookups all return this shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

//--------------------------------------      Webhooks      ----------------------------------------------------------
pub const BALANCE_ACTIVITY_EVENT: &str = "MURAL_ACCOUNT_BALANCE_ACTIVITY";
pub const WEBHOOK_STATUS_ACTIVE: &str = "ACTIVE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Webhook {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub events: Vec<String>,
}

impl Webhook {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case(WEBHOOK_STATUS_ACTIVE)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewWebhook {
    pub url: String,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateWebhookStatus {
    pub status: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transaction_search_response() {
        let json = r#"{
            "count": 2,
            "nextId": null,
            "transactions": [
                {"id":"tx-1","direction":"CREDIT","executedAt":"2024-06-01T10:00:00Z",
                 "tokenAmount":{"tokenAmount":10.5,"tokenSymbol":"USDC"},"memo":"hi"},
                {"id":"tx-2","tokenAmount":{"tokenAmount":3,"tokenSymbol":"usdc"}}
            ]
        }"#;
        let resp: SearchTransactionsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.count, 2);
        assert!(resp.next_id.is_none());
        assert_eq!(resp.transactions[0].token_amount, TokenAmount::new(10.5, "USDC"));
        assert!(resp.transactions[0].executed_at.is_some());
        assert!(resp.transactions[1].executed_at.is_none());
        assert_eq!(resp.transactions[1].token_amount.token_amount, 3.0);
    }

    #[test]
    fn account_wallet_details() {
        let json = r#"[{"id":"acc-1","name":"Main Account","isApiEnabled":true,"status":"ACTIVE",
            "accountDetails":{"balances":[{"tokenAmount":100,"tokenSymbol":"USDC"}],
            "walletDetails":{"walletAddress":"0xabc","blockchain":"POLYGON"}}}]"#;
        let accounts: Vec<Account> = serde_json::from_str(json).unwrap();
        let acc = &accounts[0];
        assert!(acc.is_active());
        assert!(acc.is_api_enabled);
        let wallet = acc.wallet_details().unwrap();
        assert_eq!(wallet.wallet_address, "0xabc");
        assert_eq!(wallet.blockchain, "POLYGON");
    }

    #[test]
    fn payout_request_body() {
        let req = NewPayoutRequest {
            source_account_id: "acc-1".into(),
            memo: Some("Order 1".into()),
            payouts: vec![PayoutInfo {
                amount: TokenAmount::new(12.5, "USDC"),
                payout_details: FiatPayoutDetails {
                    payout_type: "fiat".into(),
                    bank_name: "Bancolombia".into(),
                    bank_account_owner: "Owner".into(),
                    fiat_and_rail_details: CopDetails {
                        rail_type: "cop".into(),
                        symbol: "COP".into(),
                        phone_number: "+570000".into(),
                        account_type: "CHECKING".into(),
                        bank_account_number: "123".into(),
                        document_number: "456".into(),
                        document_type: "RUC".into(),
                    },
                },
                recipient_info: BusinessRecipientInfo {
                    recipient_type: "business".into(),
                    name: "Owner".into(),
                    email: "owner@example.com".into(),
                    physical_address: PhysicalAddress {
                        address1: "Calle 1".into(),
                        address2: None,
                        country: "CO".into(),
                        state: "ANT".into(),
                        city: "Medellín".into(),
                        zip: "050021".into(),
                    },
                },
            }],
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["sourceAccountId"], "acc-1");
        let payout = &v["payouts"][0];
        assert_eq!(payout["amount"]["tokenSymbol"], "USDC");
        assert_eq!(payout["payoutDetails"]["type"], "fiat");
        assert_eq!(payout["payoutDetails"]["fiatAndRailDetails"]["type"], "cop");
        assert_eq!(payout["recipientInfo"]["type"], "business");
        assert!(payout["recipientInfo"]["physicalAddress"].get("address2").is_none());
    }
}
