pub mod adapter;
pub mod error;
pub mod indexer;
pub mod matcher;
pub mod monitor;
pub mod state;
pub mod supervisor;
pub mod types;

pub use adapter::ChainAdapter;
pub use error::ScanError;
pub use indexer::{BlockScanner, CycleOutcome, ScanSettings};
pub use matcher::{MatchOutcome, PaymentMatcher};
pub use monitor::ChainMonitor;
pub use supervisor::Supervisor;
pub use types::{decode_tag, ChainBlock, Transfer};
