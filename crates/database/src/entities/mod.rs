pub mod notices;
pub mod orders;
pub mod payments;
pub mod scan_cursors;
pub mod sea_orm_active_enums;
