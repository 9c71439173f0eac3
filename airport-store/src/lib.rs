pub mod app_config;
pub mod database;
pub mod tables;
pub mod pg_repo;

pub use database::DbClient;
pub use pg_repo::PgRepository;
pub use tables::PgTable;
