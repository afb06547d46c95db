pub use sea_orm_migration::prelude::*;

mod m20261016_000001_create_property_units;
mod m20261016_000002_create_voting_tables;
mod m20261016_000003_create_proxies;
mod m20261016_000004_create_attendance_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261016_000001_create_property_units::Migration),
            Box::new(m20261016_000002_create_voting_tables::Migration),
            Box::new(m20261016_000003_create_proxies::Migration),
            Box::new(m20261016_000004_create_attendance_tables::Migration),
        ]
    }
}
