pub mod adapter;
pub mod parser;
pub mod provider;

pub use adapter::EvmAdapter;
