mod wallet_snapshot;

pub use wallet_snapshot::{HistoryPoint, WalletSnapshot};
