mod allowance;
mod client;
mod error;
mod provider_sync;
mod selection;

pub use allowance::{ensure_wallet_allowances, AllowanceRates, ALLOWANCE_HORIZON_MONTHS, MAX_ALLOWANCE};
pub use client::{
    AccountInfo, ChainClient, ChainEventKind, ChainEventRecord, IngestReceipt, RawProvider,
};
pub use error::ChainError;
pub use provider_sync::sync_providers;
pub use selection::{get_testing_providers, SelectionMode};
