use crate::quote::Quote;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// A verified quote as kept in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredQuote {
    /// Ledger identity (UUID); the fingerprint identifies content
    pub id: String,
    pub fingerprint: String,
    pub generation: u64,
    pub issued_at: DateTime<Utc>,
    pub reference: Option<String>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub grand_total: Decimal,
    pub quote: Quote,
}

/// Listing row (no payload)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub id: String,
    pub fingerprint: String,
    pub generation: u64,
    pub issued_at: DateTime<Utc>,
    pub reference: Option<String>,
    pub grand_total: Decimal,
}

/// Event for audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) a ledger file and make sure the schema exists
pub fn open_ledger(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open ledger {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Quotes Table (verified quotes only; payload is the serialized Quote)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS quotes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            quote_uuid TEXT UNIQUE NOT NULL,
            fingerprint TEXT UNIQUE NOT NULL,
            generation INTEGER NOT NULL,
            issued_at TEXT NOT NULL,
            reference TEXT,
            subtotal TEXT NOT NULL,
            tax TEXT NOT NULL,
            grand_total TEXT NOT NULL,
            verified INTEGER NOT NULL,
            payload TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quotes_issued_at ON quotes(issued_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Store a verified quote.
///
/// The fingerprint is unique: re-issuing identical content returns the
/// record already in the ledger instead of a second copy.
pub fn insert_quote(conn: &Connection, quote: &Quote, actor: &str) -> Result<StoredQuote> {
    if !quote.verified {
        bail!("refusing to store unverified quote {}", quote.fingerprint);
    }

    let stored = StoredQuote {
        id: uuid::Uuid::new_v4().to_string(),
        fingerprint: quote.fingerprint.clone(),
        generation: quote.generation,
        issued_at: Utc::now(),
        reference: quote.reference.clone(),
        subtotal: quote.totals.subtotal,
        tax: quote.totals.tax,
        grand_total: quote.totals.grand_total,
        quote: quote.clone(),
    };
    let payload = serde_json::to_string(quote).context("Failed to serialize quote")?;

    let result = conn.execute(
        "INSERT INTO quotes (
            quote_uuid, fingerprint, generation, issued_at, reference,
            subtotal, tax, grand_total, verified, payload
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            stored.id,
            stored.fingerprint,
            stored.generation as i64,
            stored.issued_at.to_rfc3339(),
            stored.reference,
            stored.subtotal.to_string(),
            stored.tax.to_string(),
            stored.grand_total.to_string(),
            quote.verified,
            payload,
        ],
    );

    match result {
        Ok(_) => {
            let event = Event::new(
                "quote_issued",
                "quote",
                &stored.id,
                serde_json::json!({
                    "fingerprint": stored.fingerprint,
                    "generation": stored.generation,
                    "grand_total": stored.grand_total.to_string(),
                    "lines": quote.line_count(),
                }),
                actor,
            );
            insert_event(conn, &event)?;
            info!(id = %stored.id, fingerprint = %stored.fingerprint, "quote stored");
            Ok(stored)
        }
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            get_quote_by_fingerprint(conn, &quote.fingerprint)?
                .context("Fingerprint collided but no stored quote was found")
        }
        Err(e) => Err(e.into()),
    }
}

const QUOTE_COLUMNS: &str = "quote_uuid, fingerprint, generation, issued_at, reference,
                subtotal, tax, grand_total, payload";

pub fn get_quote(conn: &Connection, id: &str) -> Result<Option<StoredQuote>> {
    let sql = format!("SELECT {} FROM quotes WHERE quote_uuid = ?1", QUOTE_COLUMNS);
    let stored = conn
        .query_row(&sql, params![id], stored_quote_from_row)
        .optional()?;
    Ok(stored)
}

pub fn get_quote_by_fingerprint(conn: &Connection, fingerprint: &str) -> Result<Option<StoredQuote>> {
    let sql = format!("SELECT {} FROM quotes WHERE fingerprint = ?1", QUOTE_COLUMNS);
    let stored = conn
        .query_row(&sql, params![fingerprint], stored_quote_from_row)
        .optional()?;
    Ok(stored)
}

/// Most recent first
pub fn list_quotes(conn: &Connection, limit: usize) -> Result<Vec<QuoteSummary>> {
    let mut stmt = conn.prepare(
        "SELECT quote_uuid, fingerprint, generation, issued_at, reference, grand_total
         FROM quotes
         ORDER BY issued_at DESC, id DESC
         LIMIT ?1",
    )?;

    let quotes = stmt
        .query_map(params![limit as i64], |row| {
            Ok(QuoteSummary {
                id: row.get(0)?,
                fingerprint: row.get(1)?,
                generation: row.get::<_, i64>(2)? as u64,
                issued_at: timestamp_column(row, 3)?,
                reference: row.get(4)?,
                grand_total: decimal_column(row, 5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(quotes)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))?;

    Ok(count)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Audit trail of one stored quote, newest first
pub fn get_events_for_quote(conn: &Connection, quote_id: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = 'quote' AND entity_id = ?1
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![quote_id], |row| {
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: timestamp_column(row, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// Row decoding
// ============================================================================

fn stored_quote_from_row(row: &Row<'_>) -> rusqlite::Result<StoredQuote> {
    let payload: String = row.get(8)?;
    let quote: Quote = serde_json::from_str(&payload)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

    Ok(StoredQuote {
        id: row.get(0)?,
        fingerprint: row.get(1)?,
        generation: row.get::<_, i64>(2)? as u64,
        issued_at: timestamp_column(row, 3)?,
        reference: row.get(4)?,
        subtotal: decimal_column(row, 5)?,
        tax: decimal_column(row, 6)?,
        grand_total: decimal_column(row, 7)?,
        quote,
    })
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ProductCategory, UnitBasis};
    use crate::knowledge::Provenance;
    use crate::pricing::{LineItem, Totals};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn create_test_quote(reference: &str) -> Quote {
        Quote {
            reference: Some(reference.to_string()),
            panels: vec![],
            accessories: vec![],
            fixings: vec![LineItem {
                sku: "RIVET-STD".to_string(),
                name: "Rivet".to_string(),
                category: ProductCategory::Fixing,
                unit_basis: UnitBasis::PerUnit,
                quantity: 100,
                area_m2: None,
                piece_length_m: Decimal::ZERO,
                unit_price: dec("0.05"),
                subtotal: dec("5.00"),
                provenance: Provenance {
                    source_id: "catalog".to_string(),
                    priority: 1,
                    generation: 1,
                },
                component: None,
            }],
            totals: Totals {
                subtotal: dec("5.00"),
                tax: dec("1.10"),
                materials_total: dec("6.10"),
                shipping: dec("280.00"),
                grand_total: dec("286.10"),
            },
            tax_rate: dec("0.22"),
            currency: "USD".to_string(),
            structural_checks: vec![],
            warnings: vec![],
            conflicts: vec![],
            generation: 1,
            fingerprint: format!("fp-{}", reference),
            verified: true,
        }
    }

    #[test]
    fn test_insert_and_get_quote() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let quote = create_test_quote("job-1");
        let stored = insert_quote(&conn, &quote, "test").unwrap();

        let loaded = get_quote(&conn, &stored.id).unwrap().unwrap();
        assert_eq!(loaded.quote, quote);
        assert_eq!(loaded.grand_total, dec("286.10"));
        assert_eq!(loaded.reference.as_deref(), Some("job-1"));
        assert_eq!(verify_count(&conn).unwrap(), 1);

        assert!(get_quote(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_same_fingerprint_stored_once() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let quote = create_test_quote("job-1");
        let first = insert_quote(&conn, &quote, "test").unwrap();
        let second = insert_quote(&conn, &quote, "test").unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(verify_count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_unverified_quote_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let mut quote = create_test_quote("job-1");
        quote.verified = false;

        assert!(insert_quote(&conn, &quote, "test").is_err());
        assert_eq!(verify_count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_list_quotes() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        for reference in ["job-1", "job-2", "job-3"] {
            insert_quote(&conn, &create_test_quote(reference), "test").unwrap();
        }

        let all = list_quotes(&conn, 10).unwrap();
        assert_eq!(all.len(), 3);
        // Newest first
        assert_eq!(all[0].reference.as_deref(), Some("job-3"));

        assert_eq!(list_quotes(&conn, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_event_log() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let stored = insert_quote(&conn, &create_test_quote("job-1"), "cli").unwrap();

        let event = Event::new(
            "quote_rendered",
            "quote",
            &stored.id,
            serde_json::json!({"format": "text"}),
            "cli",
        );
        insert_event(&conn, &event).unwrap();

        let events = get_events_for_quote(&conn, &stored.id).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|e| e.event_type == "quote_issued"));
        assert!(events.iter().all(|e| e.actor == "cli"));
    }

    #[test]
    fn test_open_ledger_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let conn = open_ledger(&path).unwrap();
            insert_quote(&conn, &create_test_quote("job-1"), "test").unwrap();
        }

        let conn = open_ledger(&path).unwrap();
        assert_eq!(verify_count(&conn).unwrap(), 1);
    }
}
