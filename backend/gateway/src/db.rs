//! Database layer: migrations, the incident/donation mirror and the event log.

use std::str::FromStr;

use relief_engine::{Donation, Incident, LifecycleEvent};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::errors::Result;
use crate::records::{to_millis, DonationRow, EventRecord, IncidentRow};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Make sure the file is created if it doesn't exist yet.
    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database. The connection is never recycled,
/// since dropping it would drop the database.
#[cfg(test)]
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied successfully");
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Mirror writes
// ─────────────────────────────────────────────────────────

/// Persist one lifecycle event: upsert the incident snapshot, append the
/// donation (if any) and the event row, all in one transaction.
pub async fn record_event(pool: &SqlitePool, event: &LifecycleEvent) -> Result<()> {
    let payload = serde_json::to_string(event)?;
    let mut tx = pool.begin().await?;

    upsert_incident(&mut tx, &event.incident).await?;
    if let Some(donation) = &event.donation {
        insert_donation(&mut tx, donation).await?;
    }

    sqlx::query(
        r#"
        INSERT INTO events
            (event_type, incident_id, actor, amount, donation_id, status, payload, timestamp)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(event.kind.as_str())
    .bind(event.incident.id.as_str())
    .bind(&event.actor)
    .bind(event.amount)
    .bind(event.donation.as_ref().map(|d| d.id.as_str()))
    .bind(event.incident.status.as_str())
    .bind(payload)
    .bind(to_millis(event.occurred_at))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Insert a new incident row, or refresh the mutable columns of an existing one.
async fn upsert_incident(tx: &mut Transaction<'_, Sqlite>, incident: &Incident) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO incidents
            (id, beneficiary_id, beneficiary_name, location, cause, description, severity,
             image_url, amount_needed, amount_funded, status, verifier_id, verifier_name,
             created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT (id) DO UPDATE SET
            amount_funded = excluded.amount_funded,
            status        = excluded.status,
            verifier_id   = excluded.verifier_id,
            verifier_name = excluded.verifier_name
        "#,
    )
    .bind(incident.id.as_str())
    .bind(&incident.beneficiary_id)
    .bind(&incident.beneficiary_name)
    .bind(&incident.location)
    .bind(&incident.cause)
    .bind(&incident.description)
    .bind(incident.severity.as_str())
    .bind(&incident.image_url)
    .bind(incident.amount_needed)
    .bind(incident.amount_funded)
    .bind(incident.status.as_str())
    .bind(&incident.verifier_id)
    .bind(&incident.verifier_name)
    .bind(to_millis(incident.created_at))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Donations are immutable; a replayed donation is ignored.
async fn insert_donation(tx: &mut Transaction<'_, Sqlite>, donation: &Donation) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO donations
            (id, donor_id, donor_name, incident_id, amount, transaction_ref, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(donation.id.as_str())
    .bind(&donation.donor_id)
    .bind(&donation.donor_name)
    .bind(donation.incident_id.as_str())
    .bind(donation.amount)
    .bind(donation.transaction_ref.as_str())
    .bind(donation.status.as_str())
    .bind(to_millis(donation.created_at))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Mirror reads
// ─────────────────────────────────────────────────────────

/// All incidents in original insertion order.
pub async fn load_incidents(pool: &SqlitePool) -> Result<Vec<Incident>> {
    let rows = sqlx::query_as::<_, IncidentRow>(
        r#"
        SELECT id, beneficiary_id, beneficiary_name, location, cause, description, severity,
               image_url, amount_needed, amount_funded, status, verifier_id, verifier_name,
               created_at
        FROM   incidents
        ORDER  BY seq ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(Incident::try_from).collect()
}

/// All donations in original insertion order.
pub async fn load_donations(pool: &SqlitePool) -> Result<Vec<Donation>> {
    let rows = sqlx::query_as::<_, DonationRow>(
        r#"
        SELECT id, donor_id, donor_name, incident_id, amount, transaction_ref, status, created_at
        FROM   donations
        ORDER  BY seq ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(Donation::try_from).collect()
}

// ─────────────────────────────────────────────────────────
// Event reads
// ─────────────────────────────────────────────────────────

/// Fetch all events for a given incident, oldest first.
pub async fn get_events_for_incident(
    pool: &SqlitePool,
    incident_id: &str,
) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(
        r#"
        SELECT id, event_type, incident_id, actor, amount, donation_id, status, timestamp,
               created_at
        FROM   events
        WHERE  incident_id = ?1
        ORDER  BY id ASC
        "#,
    )
    .bind(incident_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetch all events, oldest first.
pub async fn get_all_events(pool: &SqlitePool) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(
        r#"
        SELECT id, event_type, incident_id, actor, amount, donation_id, status, timestamp,
               created_at
        FROM   events
        ORDER  BY id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
