use std::path::Path;

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::CrawlError;

const OBSERVED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One vessel row as read from a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRecord {
    pub imo: String,
    pub name: String,
    pub vessel_type: Option<String>,
    pub type_code: u32,
    pub build_year: Option<i64>,
    pub gross_tonnage: Option<i64>,
    pub deadweight: Option<i64>,
    pub length: Option<i64>,
    pub beam: Option<i64>,
    pub flag: Option<String>,
    pub flag_code: String,
}

/// SQLite-backed sink. Single writer; every write is one insert-or-ignore.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, CrawlError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Store { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, CrawlError> {
        Ok(Store {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn ensure_schema(&self) -> Result<(), CrawlError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS vessel (
                imo           TEXT PRIMARY KEY NOT NULL,
                name          TEXT NOT NULL,
                vessel_type   TEXT,
                type_code     INTEGER NOT NULL,
                build_year    INTEGER,
                gross_tonnage INTEGER,
                deadweight    INTEGER,
                length        INTEGER,
                beam          INTEGER,
                flag          TEXT,
                flag_code     TEXT NOT NULL,
                observed_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_vessel_type_code ON vessel(type_code);
            CREATE INDEX IF NOT EXISTS idx_vessel_flag_code ON vessel(flag_code);
            ",
        )?;
        Ok(())
    }

    /// Inserts `record` unless its IMO is already stored. Returns whether a row was written.
    pub fn upsert(&self, record: &ListingRecord) -> Result<bool, CrawlError> {
        let observed_at = chrono::Utc::now().format(OBSERVED_AT_FORMAT).to_string();
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO vessel
             (imo, name, vessel_type, type_code, build_year, gross_tonnage, deadweight,
              length, beam, flag, flag_code, observed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )?;
        let written = stmt.execute(params![
            record.imo,
            record.name,
            record.vessel_type,
            record.type_code,
            record.build_year,
            record.gross_tonnage,
            record.deadweight,
            record.length,
            record.beam,
            record.flag,
            record.flag_code,
            observed_at,
        ])?;
        Ok(written == 1)
    }

    pub fn close(self) -> Result<(), CrawlError> {
        self.conn.close().map_err(|(_, e)| CrawlError::Storage(e))
    }

    // ── Read side ──

    pub fn count(&self) -> Result<usize, CrawlError> {
        let n: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM vessel", [], |r| r.get(0))?;
        Ok(n)
    }

    pub fn stats(&self) -> Result<Stats, CrawlError> {
        let by_type = self.group_counts(
            "SELECT CAST(type_code AS TEXT), COUNT(*) FROM vessel GROUP BY type_code ORDER BY type_code",
        )?;
        let by_flag = self.group_counts(
            "SELECT flag_code, COUNT(*) FROM vessel GROUP BY flag_code ORDER BY flag_code",
        )?;
        let latest: Option<String> =
            self.conn
                .query_row("SELECT MAX(observed_at) FROM vessel", [], |r| r.get(0))?;
        Ok(Stats {
            total: self.count()?,
            by_type,
            by_flag,
            latest,
        })
    }

    fn group_counts(&self, sql: &str) -> Result<Vec<(String, usize)>, CrawlError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list(&self, filter: &ListFilter, limit: usize) -> Result<Vec<StoredVessel>, CrawlError> {
        let mut conditions = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(flag) = &filter.flag_code {
            conditions.push(format!("flag_code = ?{}", values.len() + 1));
            values.push(Box::new(flag.to_ascii_uppercase()));
        }
        if let Some(code) = filter.type_code {
            conditions.push(format!("type_code = ?{}", values.len() + 1));
            values.push(Box::new(code));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT imo, name, vessel_type, type_code, build_year, gross_tonnage, deadweight,
                    length, beam, flag, flag_code, observed_at
             FROM vessel{}
             ORDER BY observed_at, imo
             LIMIT {}",
            where_clause, limit
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rows = stmt
            .query_map(refs.as_slice(), |row| {
                Ok(StoredVessel {
                    record: ListingRecord {
                        imo: row.get(0)?,
                        name: row.get(1)?,
                        vessel_type: row.get(2)?,
                        type_code: row.get(3)?,
                        build_year: row.get(4)?,
                        gross_tonnage: row.get(5)?,
                        deadweight: row.get(6)?,
                        length: row.get(7)?,
                        beam: row.get(8)?,
                        flag: row.get(9)?,
                        flag_code: row.get(10)?,
                    },
                    observed_at: row.get(11)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[derive(Debug, Serialize)]
pub struct StoredVessel {
    #[serde(flatten)]
    pub record: ListingRecord,
    pub observed_at: String,
}

#[derive(Debug, Default)]
pub struct ListFilter {
    pub flag_code: Option<String>,
    pub type_code: Option<u32>,
}

pub struct Stats {
    pub total: usize,
    pub by_type: Vec<(String, usize)>,
    pub by_flag: Vec<(String, usize)>,
    pub latest: Option<String>,
}
