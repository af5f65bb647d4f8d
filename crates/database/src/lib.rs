pub mod client;
pub mod connect;
pub mod entities;
pub mod notices;
pub mod orders;
pub mod payments;

pub use client::{CursorRecord, DbClient};
pub use orders::{compute_order_id, parse_amount, NewOrder};
pub use payments::PaymentRecord;
