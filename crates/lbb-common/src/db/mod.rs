pub mod migrations;
pub mod offices;
pub mod pool;
pub mod util;

pub use migrations::{MigrationError, run_migrations};
pub use offices::{
    PgOfficeStore, UpdateReport, fetch_all_offices, load_overrides, update_offices,
};
pub use pool::{DbPoolError, PgPool, create_pool, create_pool_from_url};
