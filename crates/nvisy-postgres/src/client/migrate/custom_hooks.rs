//! Hooks invoked immediately before and after running pending migrations.

use diesel_async::AsyncPgConnection;

use crate::{PgResult, TRACING_TARGET_MIGRATION};

/// Runs before [`super::run_migration::run_pending_migrations`] applies anything.
///
/// Reserved for pre-migration bookkeeping (advisory locks, schema snapshots).
/// Currently a no-op.
pub async fn pre_migrate(_conn: &mut AsyncPgConnection) -> PgResult<()> {
    tracing::trace!(target: TRACING_TARGET_MIGRATION, hook = "pre_migrate");
    Ok(())
}

/// Runs after pending migrations have been applied successfully.
///
/// Currently a no-op.
pub async fn post_migrate(_conn: &mut AsyncPgConnection) -> PgResult<()> {
    tracing::trace!(target: TRACING_TARGET_MIGRATION, hook = "post_migrate");
    Ok(())
}
