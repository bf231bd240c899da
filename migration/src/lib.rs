pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_users;
mod m20250301_000002_create_referrals;
mod m20250301_000003_create_withdrawals;
mod m20250302_000001_create_password_reset_tokens;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_users::Migration),
            Box::new(m20250301_000002_create_referrals::Migration),
            Box::new(m20250301_000003_create_withdrawals::Migration),
            Box::new(m20250302_000001_create_password_reset_tokens::Migration),
        ]
    }
}
