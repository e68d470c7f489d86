use async_trait::async_trait;
use checkout_common::MicroUsdc;
use checkout_engine::traits::{
    FiatQuote,
    LedgerTransaction,
    PayoutInstruction,
    PayoutRecord,
    SettlementError,
    SettlementProvider,
};
use mockall::mock;

mock! {
    pub Provider {}
    #[async_trait]
    impl SettlementProvider for Provider {
        async fn search_transactions(&self, account_id: &str, page_size: usize) -> Result<Vec<LedgerTransaction>, SettlementError>;
        async fn quote_to_fiat(&self, amount: MicroUsdc, token_symbol: &str, fiat_rail_code: &str) -> Result<Vec<FiatQuote>, SettlementError>;
        async fn create_payout(&self, instruction: &PayoutInstruction) -> Result<PayoutRecord, SettlementError>;
        async fn execute_payout(&self, payout_id: &str, tolerance_mode: &str) -> Result<PayoutRecord, SettlementError>;
        async fn fetch_payout(&self, payout_id: &str) -> Result<PayoutRecord, SettlementError>;
    }
}
