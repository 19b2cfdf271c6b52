//! SQLite-backed finding ticket index.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{FindingTicket, FindingTicketError, FindingTicketStore, NewFindingTicket};

const SELECT_COLUMNS: &str =
    "SELECT id, finding_id, team_id, ticket_key, url_tracker, created_at, updated_at FROM finding_tickets";

/// SQLite-backed finding ticket index.
pub struct SqliteFindingTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteFindingTicketStore {
    /// Open the index, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, FindingTicketError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory index (useful for testing).
    pub fn in_memory() -> Result<Self, FindingTicketError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), FindingTicketError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS finding_tickets (
                id TEXT PRIMARY KEY,
                finding_id TEXT NOT NULL,
                team_id TEXT NOT NULL,
                ticket_key TEXT NOT NULL,
                url_tracker TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (finding_id, team_id)
            );

            CREATE INDEX IF NOT EXISTS idx_finding_tickets_ticket_key ON finding_tickets(ticket_key);
            "#,
        )
        .map_err(db_err)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, FindingTicketError> {
        self.conn
            .lock()
            .map_err(|_| FindingTicketError::Database("connection mutex poisoned".to_string()))
    }

    fn row_to_finding_ticket(row: &rusqlite::Row) -> rusqlite::Result<FindingTicket> {
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;

        Ok(FindingTicket {
            id: row.get(0)?,
            finding_id: row.get(1)?,
            team_id: row.get(2)?,
            ticket_key: row.get(3)?,
            url_tracker: row.get(4)?,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        })
    }

    fn select_one(
        conn: &Connection,
        finding_id: &str,
        team_id: &str,
    ) -> Result<Option<FindingTicket>, FindingTicketError> {
        conn.query_row(
            &format!("{SELECT_COLUMNS} WHERE finding_id = ? AND team_id = ?"),
            params![finding_id, team_id],
            Self::row_to_finding_ticket,
        )
        .optional()
        .map_err(db_err)
    }
}

impl FindingTicketStore for SqliteFindingTicketStore {
    fn upsert(&self, request: NewFindingTicket) -> Result<FindingTicket, FindingTicketError> {
        let conn = self.lock()?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO finding_tickets (id, finding_id, team_id, ticket_key, url_tracker, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (finding_id, team_id) DO NOTHING",
            params![
                id,
                request.finding_id,
                request.team_id,
                request.ticket_key,
                request.url_tracker,
                now,
                now,
            ],
        )
        .map_err(db_err)?;

        Self::select_one(&conn, &request.finding_id, &request.team_id)?.ok_or_else(|| {
            FindingTicketError::Database(format!(
                "finding ticket ({}, {}) missing after insert",
                request.finding_id, request.team_id
            ))
        })
    }

    fn relink(
        &self,
        request: NewFindingTicket,
    ) -> Result<Option<FindingTicket>, FindingTicketError> {
        let conn = self.lock()?;

        let updated = conn
            .execute(
                "UPDATE finding_tickets SET ticket_key = ?, url_tracker = ?, updated_at = ? \
                 WHERE finding_id = ? AND team_id = ?",
                params![
                    request.ticket_key,
                    request.url_tracker,
                    Utc::now().to_rfc3339(),
                    request.finding_id,
                    request.team_id,
                ],
            )
            .map_err(db_err)?;

        if updated == 0 {
            return Ok(None);
        }
        Self::select_one(&conn, &request.finding_id, &request.team_id)
    }

    fn find(
        &self,
        finding_id: &str,
        team_id: &str,
    ) -> Result<Option<FindingTicket>, FindingTicketError> {
        let conn = self.lock()?;
        Self::select_one(&conn, finding_id, team_id)
    }

    fn count(&self) -> Result<i64, FindingTicketError> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM finding_tickets", [], |row| row.get(0))
            .map_err(db_err)
    }
}

fn db_err(e: rusqlite::Error) -> FindingTicketError {
    FindingTicketError::Database(e.to_string())
}

// Rows are only ever written by this store, with RFC 3339 timestamps.
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
