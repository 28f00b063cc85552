use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use tracing::info;
use uuid::Uuid;

use tally_core::PaymentMethod;
use tally_patterns::{
    CardPaymentTypeMapping, CategorizationCorrection, CategoryPattern, LearningConfig,
    PatternStore, PaymentPattern, VendorPattern,
};

use crate::StorageError;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS corrections (
            id TEXT PRIMARY KEY,
            transaction_id INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            vendor TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            changes TEXT NOT NULL,
            notes TEXT,
            is_categorization_correction INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vendor_patterns (
            vendor TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            category TEXT,
            transaction_type TEXT,
            payment_method TEXT,
            income_source TEXT,
            confidence REAL NOT NULL,
            corrections INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS category_patterns (
            from_category TEXT NOT NULL,
            to_category TEXT NOT NULL,
            vendor TEXT,
            keywords TEXT NOT NULL,
            occurrences INTEGER NOT NULL,
            confidence REAL NOT NULL,
            reasons TEXT NOT NULL,
            PRIMARY KEY (from_category, to_category)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payment_patterns (
            vendor TEXT PRIMARY KEY,
            payment_method TEXT NOT NULL,
            confidence REAL NOT NULL,
            corrections INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS card_mappings (
            last_four TEXT PRIMARY KEY,
            payment_type TEXT NOT NULL,
            confidence REAL NOT NULL,
            times_confirmed INTEGER NOT NULL,
            last_context TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn parse_timestamp(raw: &str, what: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad {what} timestamp {raw:?}: {e}")))
}

// ── Correction log ───────────────────────────────────────────────────────────

/// Append one correction. The log is insert-only; nothing ever updates or
/// deletes a row here.
pub async fn append_correction(
    pool: &DbPool,
    correction: &CategorizationCorrection,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO corrections \
         (id, transaction_id, timestamp, vendor, amount_cents, changes, notes, is_categorization_correction) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(correction.id.to_string())
    .bind(correction.transaction_id)
    .bind(correction.timestamp.to_rfc3339())
    .bind(&correction.vendor)
    .bind(correction.amount_cents)
    .bind(serde_json::to_string(&correction.changes)?)
    .bind(&correction.notes)
    .bind(correction.is_categorization_correction as i64)
    .execute(pool)
    .await?;
    Ok(())
}

/// The full log in application order.
pub async fn load_corrections(
    pool: &DbPool,
) -> Result<Vec<CategorizationCorrection>, StorageError> {
    let rows = sqlx::query_as::<_, (String, i64, String, String, i64, String, Option<String>, i64)>(
        "SELECT id, transaction_id, timestamp, vendor, amount_cents, changes, notes, \
         is_categorization_correction FROM corrections ORDER BY timestamp, id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            let changes: BTreeMap<String, tally_patterns::FieldChange> =
                serde_json::from_str(&r.5)?;
            Ok(CategorizationCorrection {
                id: Uuid::parse_str(&r.0)
                    .map_err(|e| StorageError::Corrupt(format!("bad correction id {:?}: {e}", r.0)))?,
                transaction_id: r.1,
                timestamp: parse_timestamp(&r.2, "correction")?,
                vendor: r.3,
                amount_cents: r.4,
                changes,
                notes: r.6,
                is_categorization_correction: r.7 != 0,
            })
        })
        .collect()
}

// ── Pattern snapshot ─────────────────────────────────────────────────────────

/// Write the store's current patterns as a full snapshot, replacing the
/// previous one. The correction log is untouched.
pub async fn save_store(pool: &DbPool, store: &PatternStore) -> Result<(), StorageError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM vendor_patterns").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM category_patterns").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM payment_patterns").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM card_mappings").execute(&mut *tx).await?;

    for p in store.vendor_patterns() {
        sqlx::query(
            "INSERT INTO vendor_patterns \
             (vendor, display_name, category, transaction_type, payment_method, income_source, \
              confidence, corrections, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&p.vendor)
        .bind(&p.display_name)
        .bind(&p.category)
        .bind(p.transaction_type.map(|t| t.to_string()))
        .bind(p.payment_method.as_ref().map(|m| m.to_string()))
        .bind(&p.income_source)
        .bind(p.confidence)
        .bind(p.corrections as i64)
        .bind(p.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    for p in store.category_patterns() {
        sqlx::query(
            "INSERT INTO category_patterns \
             (from_category, to_category, vendor, keywords, occurrences, confidence, reasons) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&p.from_category)
        .bind(&p.to_category)
        .bind(&p.vendor)
        .bind(serde_json::to_string(&p.keywords)?)
        .bind(p.occurrences as i64)
        .bind(p.confidence)
        .bind(serde_json::to_string(&p.reasons)?)
        .execute(&mut *tx)
        .await?;
    }

    for p in store.payment_patterns() {
        sqlx::query(
            "INSERT INTO payment_patterns (vendor, payment_method, confidence, corrections, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&p.vendor)
        .bind(p.payment_method.to_string())
        .bind(p.confidence)
        .bind(p.corrections as i64)
        .bind(p.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    for m in store.card_mappings() {
        sqlx::query(
            "INSERT INTO card_mappings \
             (last_four, payment_type, confidence, times_confirmed, last_context, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&m.last_four)
        .bind(m.payment_type.to_string())
        .bind(m.confidence)
        .bind(m.times_confirmed as i64)
        .bind(serde_json::to_string(&m.last_context)?)
        .bind(m.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Hydrate a store from the last saved snapshot.
pub async fn load_store(
    pool: &DbPool,
    config: LearningConfig,
) -> Result<PatternStore, StorageError> {
    let mut store = PatternStore::new(config);

    let rows = sqlx::query_as::<_, (String, String, Option<String>, Option<String>, Option<String>, Option<String>, f32, i64, String)>(
        "SELECT vendor, display_name, category, transaction_type, payment_method, income_source, \
         confidence, corrections, updated_at FROM vendor_patterns",
    )
    .fetch_all(pool)
    .await?;
    for r in rows {
        store.insert_vendor_pattern(VendorPattern {
            vendor: r.0,
            display_name: r.1,
            category: r.2,
            transaction_type: r.3.and_then(|s| s.parse().ok()),
            payment_method: r.4.map(|s| {
                s.parse().unwrap_or(PaymentMethod::Other(s))
            }),
            income_source: r.5,
            confidence: r.6,
            corrections: r.7 as u32,
            updated_at: parse_timestamp(&r.8, "vendor pattern")?,
        });
    }

    let rows = sqlx::query_as::<_, (String, String, Option<String>, String, i64, f32, String)>(
        "SELECT from_category, to_category, vendor, keywords, occurrences, confidence, reasons \
         FROM category_patterns",
    )
    .fetch_all(pool)
    .await?;
    for r in rows {
        store.insert_category_pattern(CategoryPattern {
            from_category: r.0,
            to_category: r.1,
            vendor: r.2,
            keywords: serde_json::from_str(&r.3)?,
            occurrences: r.4 as u32,
            confidence: r.5,
            reasons: serde_json::from_str(&r.6)?,
        });
    }

    let rows = sqlx::query_as::<_, (String, String, f32, i64, String)>(
        "SELECT vendor, payment_method, confidence, corrections, updated_at FROM payment_patterns",
    )
    .fetch_all(pool)
    .await?;
    for r in rows {
        store.insert_payment_pattern(PaymentPattern {
            vendor: r.0,
            payment_method: r.1.parse().unwrap_or(PaymentMethod::Card),
            confidence: r.2,
            corrections: r.3 as u32,
            updated_at: parse_timestamp(&r.4, "payment pattern")?,
        });
    }

    let rows = sqlx::query_as::<_, (String, String, f32, i64, String, String)>(
        "SELECT last_four, payment_type, confidence, times_confirmed, last_context, updated_at \
         FROM card_mappings",
    )
    .fetch_all(pool)
    .await?;
    for r in rows {
        store.insert_card_mapping(CardPaymentTypeMapping {
            last_four: r.0,
            payment_type: r
                .1
                .parse()
                .map_err(StorageError::Corrupt)?,
            confidence: r.2,
            times_confirmed: r.3 as u32,
            last_context: serde_json::from_str(&r.4)?,
            updated_at: parse_timestamp(&r.5, "card mapping")?,
        });
    }

    Ok(store)
}

/// Discard the snapshot and rebuild the store by replaying the correction
/// log from empty state, then persist the rebuilt snapshot. The recovery
/// path when the snapshot is suspect, and the proof that the log is the
/// source of truth.
pub async fn rebuild_store(
    pool: &DbPool,
    config: LearningConfig,
) -> Result<PatternStore, StorageError> {
    let corrections = load_corrections(pool).await?;
    let store = PatternStore::replay(&corrections, config);
    save_store(pool, &store).await?;
    let stats = store.stats();
    info!(
        corrections = corrections.len(),
        vendors = stats.vendor_patterns,
        categories = stats.category_patterns,
        "rebuilt pattern store from correction log"
    );
    Ok(store)
}
