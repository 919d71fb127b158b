//! # dbward Engines
//!
//! Command providers for every supported database engine.
//!
//! Each engine turns an [`EngineTarget`] into single shell command lines for
//! dumping, restoring and probing, with every interpolated value passed
//! through [`dbward_core::escape`]. Destructive preparation before a restore
//! and database listing talk to the server directly through a driver instead
//! of the CLI.
//!
//! ## Engines
//!
//! - **MySQL / MariaDB**: `mysqldump` or `mariadb-dump`, admin via `sqlx`
//! - **PostgreSQL**: `pg_dump` / `psql`, admin via `tokio-postgres`
//! - **SQLite**: plain file copies
//! - **Redis**: `redis-cli --rdb` snapshots (no restore), listing via `redis`
//! - **MongoDB**: `mongodump` / `mongorestore` archives
//! - **Firebird**: `gbak` backups or `isql` metadata extraction
//!
//! ## Features
//!
//! - `postgres`, `mysql`, `redis` (all default): enable the direct drivers.
//!   Without them the corresponding admin operations report an error.

mod engine;
mod firebird_engine;
mod mongodb_engine;
mod mysql_engine;
mod options;
mod postgres_engine;
mod probe;
mod redis_engine;
mod registry;
mod sqlite_engine;
mod target;

pub use engine::DatabaseEngine;
pub use firebird_engine::FirebirdEngine;
pub use mongodb_engine::MongoDbEngine;
pub use mysql_engine::MysqlEngine;
pub use postgres_engine::PostgresEngine;
pub use probe::run_probe;
pub use redis_engine::RedisEngine;
pub use registry::{EngineCommands, EngineRegistry};
pub use sqlite_engine::SqliteEngine;
pub use target::EngineTarget;
