//! Database module
//!
//! Database connection and schema checks.

use sqlx::PgPool;

/// Tables created by `migrations/0001_billing_schema.sql`
pub const REQUIRED_TABLES: &[&str] = &["accounts", "credits", "payment_schedules", "ledger_entries"];

/// Simple connectivity check
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(*table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!(table = %table, "Required table does not exist");
            return Ok(false);
        }
    }

    tracing::info!("Database schema verified");
    Ok(true)
}
