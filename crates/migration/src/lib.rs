pub use sea_orm_migration::prelude::*;

mod m20250819_000001_overtime;
mod m20250819_000002_accounts;

pub struct Migrator;
#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250819_000001_overtime::Migration),
            Box::new(m20250819_000002_accounts::Migration),
        ]
    }
}
