//! Database layer
//!
//! SQLite is the default single-file backend; MySQL is available for larger
//! deployments. The driver is chosen by `database.driver` in the config.
//!
//! ```ignore
//! use rentnest::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub(crate) use pool::on_pool;
pub use pool::{
    create_pool, create_test_pool, insert_ignore, DatabasePool, DynDatabasePool, InsertedId,
    MysqlDatabase, SqliteDatabase,
};
