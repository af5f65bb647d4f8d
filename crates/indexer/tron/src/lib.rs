pub mod adapter;
pub mod client;
pub mod parser;
pub mod types;

pub use adapter::TronAdapter;
