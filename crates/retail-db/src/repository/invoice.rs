//! # Invoice Numbering
//!
//! Hands out `PREFIX-YYYYMMDD-NNNN` numbers inside the sale transaction.
//!
//! ```text
//! INSERT ... ON CONFLICT(day) DO UPDATE SET last_value = last_value + 1
//!        │
//!        ▼  RETURNING last_value = 42
//! INV-20261018-0042 ──► already in sales? ──no──► use it
//!                                │
//!                               yes (imported data, prefix change, ...)
//!                                ▼
//!                      INV-20261018-0042-7QX2 ──► checked again
//! ```
//!
//! The counter row is bumped by a single upsert, so two sales committing on
//! the same day never see the same value. The existence check covers rows
//! that did not come from the counter.

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use retail_core::numbering::{
    day_key, format_invoice_number, with_suffix, SUFFIX_ALPHABET, SUFFIX_LEN,
};

use crate::error::{DbError, DbResult};

/// Suffixed candidates tried after the base number collides.
const MAX_SUFFIX_ATTEMPTS: usize = 5;

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

async fn next_sequence(conn: &mut SqliteConnection, day: &str) -> DbResult<i64> {
    let value = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO invoice_sequences (day, last_value) VALUES (?1, 1)
        ON CONFLICT(day) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(day)
    .fetch_one(&mut *conn)
    .await?;

    Ok(value)
}

async fn is_taken(conn: &mut SqliteConnection, invoice_number: &str) -> DbResult<bool> {
    let taken = sqlx::query_scalar::<_, i64>("SELECT 1 FROM sales WHERE invoice_number = ?1")
        .bind(invoice_number)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(taken.is_some())
}

/// Allocates the next unused invoice number for `at`'s calendar day (UTC).
pub async fn next_invoice_number(
    conn: &mut SqliteConnection,
    prefix: &str,
    at: DateTime<Utc>,
) -> DbResult<String> {
    let date = at.date_naive();
    let sequence = next_sequence(conn, &day_key(date)).await?;
    let base = format_invoice_number(prefix, date, sequence);

    if !is_taken(conn, &base).await? {
        debug!(invoice_number = %base, "Invoice number allocated");
        return Ok(base);
    }

    warn!(invoice_number = %base, "Invoice number collision, adding suffix");
    for _ in 0..MAX_SUFFIX_ATTEMPTS {
        let candidate = with_suffix(&base, &random_suffix());
        if !is_taken(conn, &candidate).await? {
            return Ok(candidate);
        }
    }

    Err(DbError::Internal(format!(
        "could not allocate a unique invoice number after {}",
        base
    )))
}
