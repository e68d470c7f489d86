mod helpers;
mod micro_usdc;

pub mod op;
mod secret;

pub use helpers::parse_boolean_flag;
pub use micro_usdc::{MicroUsdc, MicroUsdcConversionError, USDC_CURRENCY_CODE, USDC_CURRENCY_CODE_LOWER};
pub use secret::Secret;
