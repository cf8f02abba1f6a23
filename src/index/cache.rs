use std::{path::Path, sync::Mutex};

use log::debug;
use rusqlite::OptionalExtension;

use super::{IndexBox, IndexRecord, IndexSource};

use crate::errors::ArgoDataErr;

/// Results of previous index filters, keyed by the canonical string of the box.
#[derive(Debug)]
pub struct IndexCache {
    db_conn: Mutex<rusqlite::Connection>, // An sqlite connection.
}

impl IndexCache {
    /// Initialize a new cache, or open the one already at `path`.
    pub fn create(path: &dyn AsRef<Path>) -> Result<Self, ArgoDataErr> {
        if let Some(dir) = path.as_ref().parent() {
            std::fs::create_dir_all(dir)?;
        }

        let db_conn = rusqlite::Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE | rusqlite::OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        db_conn.execute_batch(include_str!("cache/create_cache.sql"))?;

        Ok(IndexCache {
            db_conn: Mutex::new(db_conn),
        })
    }

    /// Open an existing cache.
    pub fn connect(path: &dyn AsRef<Path>) -> Result<Self, ArgoDataErr> {
        let db_conn =
            rusqlite::Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE)?;

        Self::validate_db_structure(&db_conn)?;

        Ok(IndexCache {
            db_conn: Mutex::new(db_conn),
        })
    }

    /// A cache that only lives as long as this value.
    pub fn in_memory() -> Result<Self, ArgoDataErr> {
        let db_conn = rusqlite::Connection::open_in_memory()?;
        db_conn.execute_batch(include_str!("cache/create_cache.sql"))?;

        Ok(IndexCache {
            db_conn: Mutex::new(db_conn),
        })
    }

    /// Validate the database structure is correct.
    fn validate_db_structure(db_conn: &rusqlite::Connection) -> Result<(), ArgoDataErr> {
        let mut stmt =
            db_conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;

        let names: Result<Vec<String>, _> = stmt
            .query_map(rusqlite::NO_PARAMS, |row| row.get::<_, String>(0))?
            .collect();

        if names? != ["records", "requests"] {
            return Err(ArgoDataErr::InvalidSchema);
        }

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<rusqlite::Connection>, ArgoDataErr> {
        self.db_conn
            .lock()
            .map_err(|_| ArgoDataErr::LogicError("cache connection lock poisoned"))
    }

    /// Retrieve the rows stored for this key, in their original order.
    pub fn get(&self, cname: &str) -> Result<Option<Vec<IndexRecord>>, ArgoDataErr> {
        let db_conn = self.lock()?;

        let request_id: Option<i64> = db_conn
            .query_row(
                "SELECT id FROM requests WHERE cname = ?1",
                &[cname],
                |row| row.get(0),
            )
            .optional()?;

        let request_id = match request_id {
            Some(id) => id,
            None => return Ok(None),
        };

        let mut stmt = db_conn.prepare(
            "
                SELECT file, date, latitude, longitude, ocean, profiler_type, institution, date_update
                FROM records
                WHERE request_id = ?1
                ORDER BY row_num
            ",
        )?;

        let records: Result<Vec<IndexRecord>, _> = stmt
            .query_map(&[request_id], Self::parse_row_to_record)?
            .collect();

        Ok(Some(records?))
    }

    fn parse_row_to_record(row: &rusqlite::Row) -> Result<IndexRecord, rusqlite::Error> {
        Ok(IndexRecord {
            file: row.get(0)?,
            date: row.get(1)?,
            latitude: row.get(2)?,
            longitude: row.get(3)?,
            ocean: row.get(4)?,
            profiler_type: row.get(5)?,
            institution: row.get(6)?,
            date_update: row.get(7)?,
        })
    }

    /// Store the rows for a key, replacing anything stored before.
    pub fn put(&self, cname: &str, records: &[IndexRecord]) -> Result<(), ArgoDataErr> {
        let mut db_conn = self.lock()?;
        let tx = db_conn.transaction()?;

        tx.execute(
            "DELETE FROM records WHERE request_id IN (SELECT id FROM requests WHERE cname = ?1)",
            &[cname],
        )?;
        tx.execute("DELETE FROM requests WHERE cname = ?1", &[cname])?;
        tx.execute("INSERT INTO requests (cname) VALUES (?1)", &[cname])?;
        let request_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "
                    INSERT INTO records (request_id, row_num, file, date, latitude, longitude,
                                         ocean, profiler_type, institution, date_update)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ",
            )?;

            for (row_num, rec) in records.iter().enumerate() {
                stmt.execute(&[
                    &request_id as &dyn rusqlite::types::ToSql,
                    &(row_num as i64),
                    &rec.file,
                    &rec.date,
                    &rec.latitude,
                    &rec.longitude,
                    &rec.ocean,
                    &rec.profiler_type,
                    &rec.institution,
                    &rec.date_update,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Remove every stored result.
    pub fn clear(&self) -> Result<(), ArgoDataErr> {
        let db_conn = self.lock()?;
        db_conn.execute_batch("DELETE FROM records; DELETE FROM requests;")?;
        Ok(())
    }
}

/// An index source backed by a cache of previous results.
#[derive(Debug)]
pub struct CachedIndex<S: IndexSource> {
    source: S,
    cache: IndexCache,
}

impl<S: IndexSource> CachedIndex<S> {
    /// Put a cache in front of `source`.
    pub fn new(source: S, cache: IndexCache) -> Self {
        CachedIndex { source, cache }
    }

    /// The cache, to inspect or clear it.
    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }
}

impl<S: IndexSource> IndexSource for CachedIndex<S> {
    fn filter(&self, bx: &IndexBox) -> Result<Option<Vec<IndexRecord>>, ArgoDataErr> {
        let cname = bx.to_string();

        if let Some(records) = self.cache.get(&cname)? {
            debug!("cache hit for {}", cname);
            return Ok(Some(records));
        }

        match self.source.filter(bx)? {
            Some(records) => {
                self.cache.put(&cname, &records)?;
                Ok(Some(records))
            }
            None => Ok(None),
        }
    }
}
