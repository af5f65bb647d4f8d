pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_scan_cursors;
mod m20250601_000002_create_orders;
mod m20250601_000003_create_payments;
mod m20250601_000004_create_notices;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_scan_cursors::Migration),
            Box::new(m20250601_000002_create_orders::Migration),
            Box::new(m20250601_000003_create_payments::Migration),
            Box::new(m20250601_000004_create_notices::Migration),
        ]
    }
}
