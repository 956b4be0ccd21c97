// src/core/store.rs

//! SQLite-backed table of unique (ip, hostname) pairs per domain.
//!
//! The store is an explicit handle: each operation opens its own connection,
//! runs inside its own transaction where it writes, and drops both on every
//! exit path. Writers are serialized through an internal lock so that only one
//! write transaction is open at a time per handle.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::error::{StorageError, StorageResult};
use crate::core::models::{
    DomainKey, HeaderEnvelope, InsertReport, KeyColumn, Observation, Target, TargetFilter,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS domains (
        domain TEXT PRIMARY KEY
    );

    CREATE TABLE IF NOT EXISTS data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ip TEXT,
        hostname TEXT,
        http_headers TEXT,
        https_headers TEXT,
        domain TEXT NOT NULL REFERENCES domains(domain)
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_data_domain_pair
        ON data(domain, IFNULL(ip, ''), IFNULL(hostname, ''));
    CREATE INDEX IF NOT EXISTS idx_data_domain_ip ON data(domain, ip);
    CREATE INDEX IF NOT EXISTS idx_data_domain_hostname ON data(domain, hostname);
"#;

pub struct Store {
    path: PathBuf,
    writer: Mutex<()>,
}

impl Store {
    /// Creates a handle for the database at `path`. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    fn connect(&self) -> StorageResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Creates the `domains` and `data` tables and their indexes if absent.
    pub fn ensure_schema(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %self.path.display(), "Schema ready.");
        Ok(())
    }

    /// Inserts the domain unless it already exists.
    pub fn register_domain(&self, domain: &DomainKey) -> StorageResult<()> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR IGNORE INTO domains(domain) VALUES (?1)",
            params![domain.key()],
        )?;
        Ok(())
    }

    /// Bulk insert in a single transaction.
    ///
    /// Pairs already present for the domain are skipped, as are rows the
    /// database rejects for any other reason; the rest of the batch still
    /// commits. Only a failure to open or commit the transaction is an error.
    ///
    /// # Arguments
    /// * `domain` - The registered domain the pairs belong to.
    /// * `pairs` - Extracted hostname/ip observations, in input order.
    ///
    /// # Returns
    /// An `InsertReport` with the number of new rows and every observation
    /// that was not inserted (duplicate or rejected).
    pub fn insert_targets(
        &self,
        domain: &DomainKey,
        pairs: &[Observation],
    ) -> StorageResult<InsertReport> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut report = InsertReport::default();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO data (ip, hostname, http_headers, https_headers, domain)
                 VALUES (?1, ?2, NULL, NULL, ?3)",
            )?;
            for pair in pairs {
                match stmt.execute(params![pair.ip, pair.hostname, domain.key()]) {
                    Ok(0) => {
                        debug!(ip = ?pair.ip, hostname = ?pair.hostname, "Duplicate pair skipped.");
                        report.skipped.push(pair.clone());
                    }
                    Ok(_) => report.inserted += 1,
                    Err(e) => {
                        warn!(ip = ?pair.ip, hostname = ?pair.hostname, error = %e, "Issue with row, skipped.");
                        report.skipped.push(pair.clone());
                    }
                }
            }
        }
        tx.commit()?;
        info!(
            domain = %domain,
            inserted = report.inserted,
            skipped = report.skipped.len(),
            "Targets stored."
        );
        Ok(report)
    }

    /// Reads the projection selected by `filter`, in insertion order.
    pub fn select_targets(
        &self,
        domain: &DomainKey,
        filter: TargetFilter,
    ) -> StorageResult<Vec<Target>> {
        let conn = self.connect()?;
        let targets = match filter {
            TargetFilter::IpsOnly => {
                let mut stmt = conn.prepare(
                    "SELECT ip FROM data WHERE domain = ?1 AND ip IS NOT NULL
                     GROUP BY ip ORDER BY MIN(id)",
                )?;
                let rows = stmt.query_map(params![domain.key()], |r| {
                    Ok(Target { ip: r.get(0)?, ..Default::default() })
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            TargetFilter::HostnamesOnly => {
                let mut stmt = conn.prepare(
                    "SELECT hostname FROM data WHERE domain = ?1 AND hostname IS NOT NULL
                     GROUP BY hostname ORDER BY MIN(id)",
                )?;
                let rows = stmt.query_map(params![domain.key()], |r| {
                    Ok(Target { hostname: r.get(0)?, ..Default::default() })
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            TargetFilter::WithHeaders => {
                let mut stmt = conn.prepare(
                    "SELECT ip, hostname, http_headers, https_headers FROM data
                     WHERE domain = ?1
                     AND (http_headers IS NOT NULL OR https_headers IS NOT NULL)
                     ORDER BY id",
                )?;
                let rows = stmt.query_map(params![domain.key()], full_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            TargetFilter::All => {
                let mut stmt = conn.prepare(
                    "SELECT ip, hostname, http_headers, https_headers FROM data
                     WHERE domain = ?1 ORDER BY id",
                )?;
                let rows = stmt.query_map(params![domain.key()], full_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        debug!(domain = %domain, %filter, rows = targets.len(), "Targets selected.");
        Ok(targets)
    }

    /// Sets both header columns on the first row whose `column` equals `value`.
    /// Returns whether a row was touched.
    pub fn update_headers(
        &self,
        domain: &DomainKey,
        column: KeyColumn,
        value: &str,
        http: Option<&str>,
        https: Option<&str>,
    ) -> StorageResult<bool> {
        let envelope = HeaderEnvelope {
            key: value.to_string(),
            http: http.map(str::to_string),
            https: https.map(str::to_string),
        };
        Ok(self.update_headers_batch(domain, column, std::slice::from_ref(&envelope))? == 1)
    }

    /// Applies a whole wave of header updates in one transaction and returns
    /// the number of rows changed.
    pub fn update_headers_batch(
        &self,
        domain: &DomainKey,
        column: KeyColumn,
        envelopes: &[HeaderEnvelope],
    ) -> StorageResult<usize> {
        // `column` comes from a closed enum, never from input.
        let sql = format!(
            "UPDATE data SET http_headers = ?1, https_headers = ?2
             WHERE id = (SELECT id FROM data WHERE domain = ?3 AND {col} = ?4 ORDER BY id LIMIT 1)",
            col = column.as_ref()
        );
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for envelope in envelopes {
                match stmt.execute(params![envelope.http, envelope.https, domain.key(), envelope.key]) {
                    Ok(n) => updated += n,
                    Err(e) => warn!(key = %envelope.key, %column, error = %e, "Header update failed."),
                }
            }
        }
        tx.commit()?;
        debug!(domain = %domain, %column, updated, "Header wave written.");
        Ok(updated)
    }

    /// Looks up a single row by its exact pair.
    pub fn find_target(
        &self,
        domain: &DomainKey,
        ip: Option<&str>,
        hostname: Option<&str>,
    ) -> StorageResult<Option<Target>> {
        let conn = self.connect()?;
        let target = conn
            .query_row(
                "SELECT ip, hostname, http_headers, https_headers FROM data
                 WHERE domain = ?1 AND IFNULL(ip, '') = IFNULL(?2, '')
                 AND IFNULL(hostname, '') = IFNULL(?3, '')",
                params![domain.key(), ip, hostname],
                full_row,
            )
            .optional()?;
        Ok(target)
    }

    pub fn count_targets(&self, domain: &DomainKey) -> StorageResult<usize> {
        let conn = self.connect()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM data WHERE domain = ?1",
            params![domain.key()],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }
}

fn full_row(r: &Row<'_>) -> rusqlite::Result<Target> {
    Ok(Target {
        ip: r.get(0)?,
        hostname: r.get(1)?,
        http_headers: r.get(2)?,
        https_headers: r.get(3)?,
    })
}
