// 🗄️ Persistence Gateway - CSV rows → SQLite
// One transaction per upload batch: everything commits or nothing does

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::PersistenceFailure;
use crate::filter::FilterSelection;
use crate::record::SalesRecord;

/// Handle to the sales database
///
/// Created once at startup and shared by cloning. Each operation holds the
/// connection for its own duration only.
#[derive(Clone)]
pub struct SalesStore {
    conn: Arc<Mutex<Connection>>,
}

impl SalesStore {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let conn = Connection::open(&config.path)
            .with_context(|| format!("Failed to open database {:?}", config.path))?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .context("Failed to set busy timeout")?;

        // WAL for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL mode")?;

        let store = Self::from_connection(conn)?;
        info!(path = %config.path.display(), "database opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // An interrupted transaction has already rolled back on drop,
        // so the connection is still consistent after a panic.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the connection
    #[cfg(test)]
    pub(crate) fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.lock();
        f(&conn)
    }

    /// Insert one batch atomically, in order
    ///
    /// Returns the number of records inserted. On any failure the whole
    /// batch is rolled back.
    pub fn persist_batch(&self, records: &[SalesRecord]) -> Result<usize, PersistenceFailure> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(PersistenceFailure::Begin)?;

        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO sales (item_name, category, sales, revenue)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;

            for (index, record) in records.iter().enumerate() {
                stmt.execute(params![
                    record.item_name,
                    record.category,
                    record.units_sold,
                    record.revenue,
                ])
                .map_err(|source| {
                    warn!(index, error = %source, "insert failed, rolling back batch");
                    PersistenceFailure::Insert { index, source }
                })?;
            }
        }

        tx.commit().map_err(PersistenceFailure::Commit)?;
        debug!(records = records.len(), "batch committed");

        Ok(records.len())
    }

    /// Every stored record, in insertion order
    pub fn all_sales(&self) -> Result<Vec<SalesRecord>, PersistenceFailure> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT item_name, category, sales, revenue
             FROM sales
             ORDER BY id",
        )?;

        let records = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Stored records whose category is selected, in insertion order
    pub fn sales_in_categories(
        &self,
        selection: &FilterSelection,
    ) -> Result<Vec<SalesRecord>, PersistenceFailure> {
        let all = self.all_sales()?;
        Ok(crate::filter::filter_records(&all, selection))
    }

    /// Distinct categories, sorted
    pub fn categories(&self) -> Result<Vec<String>, PersistenceFailure> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT DISTINCT category FROM sales ORDER BY category")?;

        let categories = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(categories)
    }

    pub fn count(&self) -> Result<i64, PersistenceFailure> {
        let conn = self.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM sales", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Close the underlying connection
    ///
    /// If other clones are still alive the connection closes when the last
    /// one drops instead.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => {
                let conn = mutex.into_inner().unwrap_or_else(PoisonError::into_inner);
                conn.close()
                    .map_err(|(_, e)| e)
                    .context("Failed to close database")?;
                info!("database closed");
            }
            Err(_) => warn!("database still in use, deferring close"),
        }

        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SalesRecord> {
    Ok(SalesRecord {
        item_name: row.get(0)?,
        category: row.get(1)?,
        units_sold: row.get(2)?,
        revenue: row.get(3)?,
    })
}

pub fn setup_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sales (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_name TEXT NOT NULL,
            category TEXT NOT NULL,
            sales INTEGER NOT NULL,
            revenue REAL NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create sales table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sales_category ON sales(category)",
        [],
    )?;

    Ok(())
}
