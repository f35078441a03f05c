#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod client;
mod error;
pub mod model;
pub mod query;
mod schema;

/// Embeds all migrations into the final binary.
pub(crate) const MIGRATIONS: diesel_migrations::EmbeddedMigrations =
    diesel_migrations::embed_migrations!();

// Tracing target constants for consistent logging.

/// Tracing target for client-related operations.
pub const TRACING_TARGET_CLIENT: &str = "nvisy_postgres::client";

/// Tracing target for database query operations.
pub const TRACING_TARGET_QUERY: &str = "nvisy_postgres::queries";

/// Tracing target for database migration operations.
pub const TRACING_TARGET_MIGRATION: &str = "nvisy_postgres::migrations";

/// Tracing target for database connection operations.
pub const TRACING_TARGET_CONNECTION: &str = "nvisy_postgres::connection";

pub use diesel_async::AsyncPgConnection as PgConnection;

pub use crate::client::{
    ConnectionPool, MigrationResult, MigrationStatus, PgClient, PgClientMigrationExt, PgConfig,
    PgConn, PgPoolStatus, PooledConnection, get_applied_migrations, get_migration_status,
    run_pending_migrations, verify_schema_integrity,
};
pub use crate::error::{PgError, PgResult};
pub use crate::model::job::{Job, JobStatus, NewJob, UpdateJob};

pub mod prelude {
    //! Convenience re-export of the most commonly used types and traits.
    //!
    //! ```rust,no_run
    //! use nvisy_postgres::prelude::*;
    //! ```

    pub use diesel::prelude::*;
    pub use diesel_async::RunQueryDsl;

    pub use crate::model::job::{Job, JobStatus, NewJob, UpdateJob};
    pub use crate::query::job::JobRepository;
    pub use crate::{
        ConnectionPool, MigrationResult, MigrationStatus, PgClient, PgClientMigrationExt,
        PgConfig, PgConn, PgConnection, PgError, PgPoolStatus, PgResult,
    };
}
