use std::path::Path;

use anyhow::{anyhow, Context, Result};
use inventory_core::{
    BasePackaging, Creator, HistoryEntry, Item, ItemId, PackPackaging, PackagingId,
    PackagingRecord, PackagingSpec, PackagingType, User, UserId,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const LATEST_SCHEMA_VERSION: i64 = 2;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS users (
  user_id TEXT PRIMARY KEY,
  name TEXT NOT NULL CHECK (length(trim(name)) > 0),
  email TEXT,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS items (
  item_id TEXT PRIMARY KEY,
  name TEXT NOT NULL CHECK (length(trim(name)) > 0),
  sku TEXT,
  description TEXT,
  base_packaging_json TEXT,
  pack_packaging_json TEXT,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS packaging_history (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  packaging_id TEXT NOT NULL UNIQUE,
  item_id TEXT NOT NULL,
  packaging_type TEXT NOT NULL CHECK (packaging_type IN ('base','pack')),
  amount REAL NOT NULL CHECK (amount > 0),
  unit TEXT NOT NULL,
  pack_size INTEGER CHECK (pack_size IS NULL OR pack_size >= 1),
  pack_unit TEXT,
  is_active INTEGER NOT NULL CHECK (is_active IN (0, 1)),
  created_by TEXT NOT NULL,
  created_at TEXT NOT NULL,
  CHECK ((packaging_type = 'pack') = (pack_size IS NOT NULL AND pack_unit IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_packaging_history_item
  ON packaging_history(item_id, packaging_type, is_active);
";

// Rows written before the unique index existed may hold several active
// records per (item, type); the newest one wins.
const MIGRATION_002_SQL: &str = r"
UPDATE packaging_history
SET is_active = 0
WHERE is_active = 1
  AND seq NOT IN (
    SELECT MAX(seq) FROM packaging_history
    WHERE is_active = 1
    GROUP BY item_id, packaging_type
  );

CREATE UNIQUE INDEX IF NOT EXISTS idx_packaging_history_single_active
  ON packaging_history(item_id, packaging_type)
  WHERE is_active = 1;
";

const HISTORY_SELECT_SQL: &str = r"
SELECT
  h.packaging_id, h.item_id, h.packaging_type, h.amount, h.unit,
  h.pack_size, h.pack_unit, h.is_active, h.created_by, h.created_at,
  u.name
FROM packaging_history h
LEFT JOIN users u ON u.user_id = h.created_by
WHERE h.item_id = ?1";

pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
    pub inferred_from_legacy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuplicateActiveGroup {
    pub item_id: String,
    pub packaging_type: String,
    pub active_rows: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub quick_check_ok: bool,
    pub quick_check_message: String,
    pub duplicate_active_groups: Vec<DuplicateActiveGroup>,
    pub schema_status: SchemaStatus,
}

/// An item as saved by a packaging write, and how many active rows that write retired.
#[derive(Debug, Clone, PartialEq)]
pub struct PackagingChange {
    pub item: Item,
    pub deactivated: usize,
}

impl SqliteStore {
    /// Open a SQLite-backed inventory store and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let (current_version, inferred_from_legacy) = detect_effective_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus {
            current_version,
            target_version: LATEST_SCHEMA_VERSION,
            pending_versions,
            inferred_from_legacy,
        })
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when migration bootstrapping or any migration step fails.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;

        if version == 0 {
            version = self.bootstrap_schema_version()?;
        }

        if version < 2 {
            self.apply_migration_2()?;
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    fn bootstrap_schema_version(&self) -> Result<i64> {
        if !table_exists(&self.conn, "packaging_history")? {
            let tx = self.conn.unchecked_transaction().context("failed to start migration v1")?;
            tx.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
            record_schema_version(&tx, 1)?;
            tx.commit().context("failed to commit migration v1")?;
            return Ok(1);
        }

        if !table_has_column(&self.conn, "packaging_history", "seq")? {
            return Err(anyhow!(
                "database schema is invalid: packaging_history has no seq column"
            ));
        }

        // Tables created before migrations were tracked.
        record_schema_version(&self.conn, 1)?;
        if index_exists(&self.conn, "idx_packaging_history_single_active")? {
            record_schema_version(&self.conn, 2)?;
            return Ok(2);
        }
        Ok(1)
    }

    fn apply_migration_2(&mut self) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to start migration v2 transaction")?;
        tx.execute_batch(MIGRATION_002_SQL)
            .context("failed to enforce single active packaging per item and type")?;
        record_schema_version(&tx, 2)?;
        tx.commit().context("failed to commit migration v2")?;
        Ok(())
    }

    /// # Errors
    /// Returns an error when validation fails or the insert is rejected.
    pub fn insert_user(&mut self, user: &User) -> Result<()> {
        user.validate().map_err(|err| anyhow!("user validation failed: {err}"))?;
        self.conn
            .execute(
                "INSERT INTO users(user_id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user.id.to_string(), user.name, user.email, rfc3339(user.created_at)?],
            )
            .context("failed to insert user")?;
        Ok(())
    }

    /// # Errors
    /// Returns an error when the lookup or row decoding fails.
    pub fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, name, email, created_at FROM users WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .context("failed to load user")?;

        let Some((id, name, email, created_at)) = row else {
            return Ok(None);
        };
        Ok(Some(User {
            id: parse_user_id(&id)?,
            name,
            email,
            created_at: parse_rfc3339(&created_at)?,
        }))
    }

    /// # Errors
    /// Returns an error when validation fails or the insert is rejected.
    pub fn insert_item(&mut self, item: &Item) -> Result<()> {
        item.validate().map_err(|err| anyhow!("item validation failed: {err}"))?;
        self.conn
            .execute(
                "INSERT INTO items(
                    item_id, name, sku, description,
                    base_packaging_json, pack_packaging_json, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    item.id.to_string(),
                    item.name,
                    item.sku,
                    item.description,
                    packaging_json(item.base_packaging.as_ref())?,
                    packaging_json(item.pack_packaging.as_ref())?,
                    rfc3339(item.created_at)?,
                    rfc3339(item.updated_at)?,
                ],
            )
            .context("failed to insert item")?;
        Ok(())
    }

    /// # Errors
    /// Returns an error when the lookup or row decoding fails.
    pub fn get_item(&self, item_id: ItemId) -> Result<Option<Item>> {
        load_item_row(&self.conn, item_id)
    }

    /// Load all items, most recently created first.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded from `SQLite`.
    pub fn list_items(&self) -> Result<Vec<Item>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id, name, sku, description,
                    base_packaging_json, pack_packaging_json, created_at, updated_at
             FROM items
             ORDER BY rowid DESC",
        )?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(item_from_row(row)?);
        }
        Ok(items)
    }

    /// Set the item's embedded packaging of `spec`'s type and make a new row
    /// the only active history row for that `(item, type)`.
    ///
    /// The item is read, changed and written back inside one `IMMEDIATE`
    /// transaction, so concurrent writers of either type serialize. Returns
    /// `None` when the item does not exist.
    ///
    /// # Errors
    /// Returns an error when the new row fails validation or any statement in the
    /// transaction fails. Nothing is persisted on error.
    pub fn replace_packaging(
        &mut self,
        item_id: ItemId,
        spec: &PackagingSpec,
        created_by: UserId,
        at: OffsetDateTime,
    ) -> Result<Option<PackagingChange>> {
        let record = PackagingRecord::active(item_id, spec, created_by, at);
        record.validate().map_err(|err| anyhow!("packaging validation failed: {err}"))?;

        let tx = self.write_transaction()?;
        let Some(mut item) = load_item_row(&tx, item_id)? else {
            return Ok(None);
        };
        item.apply_packaging(spec, at);
        update_item_row(&tx, &item)?;
        let deactivated = deactivate_history(&tx, item_id, record.packaging_type)?;
        tx.execute(
            "INSERT INTO packaging_history(
                packaging_id, item_id, packaging_type, amount, unit,
                pack_size, pack_unit, is_active, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id.to_string(),
                record.item_id.to_string(),
                record.packaging_type.as_str(),
                record.amount,
                record.unit,
                record.pack_size,
                record.pack_unit,
                record.is_active,
                record.created_by.to_string(),
                rfc3339(record.created_at)?,
            ],
        )
        .context("failed to insert packaging history record")?;
        tx.commit().context("failed to commit packaging transaction")?;
        Ok(Some(PackagingChange { item, deactivated }))
    }

    /// Clear the item's embedded packaging of `packaging_type` and deactivate the
    /// matching history rows. Same transaction rules as [`SqliteStore::replace_packaging`].
    ///
    /// # Errors
    /// Returns an error when any statement in the transaction fails.
    pub fn clear_packaging(
        &mut self,
        item_id: ItemId,
        packaging_type: PackagingType,
        at: OffsetDateTime,
    ) -> Result<Option<PackagingChange>> {
        let tx = self.write_transaction()?;
        let Some(mut item) = load_item_row(&tx, item_id)? else {
            return Ok(None);
        };
        item.clear_packaging(packaging_type, at);
        update_item_row(&tx, &item)?;
        let deactivated = deactivate_history(&tx, item_id, packaging_type)?;
        tx.commit().context("failed to commit packaging removal")?;
        Ok(Some(PackagingChange { item, deactivated }))
    }

    /// History rows for an item, newest first, with creators resolved.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded from `SQLite`.
    pub fn list_history(&self, item_id: ItemId, active_only: bool) -> Result<Vec<HistoryEntry>> {
        let sql = if active_only {
            format!("{HISTORY_SELECT_SQL} AND h.is_active = 1 ORDER BY h.seq DESC")
        } else {
            format!("{HISTORY_SELECT_SQL} ORDER BY h.seq DESC")
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![item_id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(history_entry_from_row(row)?);
        }
        Ok(entries)
    }

    /// Run `SQLite` quick_check and look for `(item, type)` pairs with more than one active row.
    ///
    /// # Errors
    /// Returns an error when the checks cannot be executed.
    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let quick_check_message = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get::<_, String>(0))
            .context("failed to run quick_check")?;

        let schema_status = self.schema_status()?;
        let mut duplicate_active_groups = Vec::new();
        if table_exists(&self.conn, "packaging_history")? {
            let mut stmt = self.conn.prepare(
                "SELECT item_id, packaging_type, COUNT(*)
                 FROM packaging_history
                 WHERE is_active = 1
                 GROUP BY item_id, packaging_type
                 HAVING COUNT(*) > 1
                 ORDER BY item_id ASC, packaging_type ASC",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                duplicate_active_groups.push(DuplicateActiveGroup {
                    item_id: row.get(0)?,
                    packaging_type: row.get(1)?,
                    active_rows: row.get(2)?,
                });
            }
        }

        Ok(IntegrityReport {
            quick_check_ok: quick_check_message == "ok",
            quick_check_message,
            duplicate_active_groups,
            schema_status,
        })
    }

    fn write_transaction(&mut self) -> Result<Transaction<'_>> {
        self.conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to start write transaction")
    }
}

fn load_item_row(conn: &Connection, item_id: ItemId) -> Result<Option<Item>> {
    let mut stmt = conn.prepare(
        "SELECT item_id, name, sku, description,
                base_packaging_json, pack_packaging_json, created_at, updated_at
         FROM items WHERE item_id = ?1",
    )?;
    let mut rows = stmt.query(params![item_id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(item_from_row(row)?)),
        None => Ok(None),
    }
}

fn update_item_row(conn: &Connection, item: &Item) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE items
             SET name = ?2, sku = ?3, description = ?4,
                 base_packaging_json = ?5, pack_packaging_json = ?6, updated_at = ?7
             WHERE item_id = ?1",
            params![
                item.id.to_string(),
                item.name,
                item.sku,
                item.description,
                packaging_json(item.base_packaging.as_ref())?,
                packaging_json(item.pack_packaging.as_ref())?,
                rfc3339(item.updated_at)?,
            ],
        )
        .context("failed to update item")?;
    if changed == 0 {
        return Err(anyhow!("item {} does not exist", item.id));
    }
    Ok(())
}

fn deactivate_history(
    conn: &Connection,
    item_id: ItemId,
    packaging_type: PackagingType,
) -> Result<usize> {
    conn.execute(
        "UPDATE packaging_history SET is_active = 0
         WHERE item_id = ?1 AND packaging_type = ?2 AND is_active = 1",
        params![item_id.to_string(), packaging_type.as_str()],
    )
    .context("failed to deactivate packaging history")
}

fn item_from_row(row: &Row<'_>) -> Result<Item> {
    let id_raw: String = row.get(0)?;
    let base_json: Option<String> = row.get(4)?;
    let pack_json: Option<String> = row.get(5)?;

    Ok(Item {
        id: ItemId::parse(&id_raw).ok_or_else(|| anyhow!("invalid item id: {id_raw}"))?,
        name: row.get(1)?,
        sku: row.get(2)?,
        description: row.get(3)?,
        base_packaging: base_json
            .map(|json| serde_json::from_str::<BasePackaging>(&json))
            .transpose()
            .context("failed to deserialize base packaging")?,
        pack_packaging: pack_json
            .map(|json| serde_json::from_str::<PackPackaging>(&json))
            .transpose()
            .context("failed to deserialize pack packaging")?,
        created_at: parse_rfc3339(&row.get::<_, String>(6)?)?,
        updated_at: parse_rfc3339(&row.get::<_, String>(7)?)?,
    })
}

fn history_entry_from_row(row: &Row<'_>) -> Result<HistoryEntry> {
    let id_raw: String = row.get(0)?;
    let item_id_raw: String = row.get(1)?;
    let type_raw: String = row.get(2)?;
    let created_by_raw: String = row.get(8)?;
    let creator_name: Option<String> = row.get(10)?;

    let created_by = parse_user_id(&created_by_raw)?;
    let record = PackagingRecord {
        id: PackagingId::parse(&id_raw).ok_or_else(|| anyhow!("invalid packaging id: {id_raw}"))?,
        item_id: ItemId::parse(&item_id_raw)
            .ok_or_else(|| anyhow!("invalid item id: {item_id_raw}"))?,
        packaging_type: PackagingType::parse(&type_raw)
            .ok_or_else(|| anyhow!("unknown packaging_type: {type_raw}"))?,
        amount: row.get(3)?,
        unit: row.get(4)?,
        pack_size: row.get(5)?,
        pack_unit: row.get(6)?,
        is_active: row.get(7)?,
        created_by,
        created_at: parse_rfc3339(&row.get::<_, String>(9)?)?,
    };

    Ok(record.with_creator(creator_name.map(|name| Creator { id: created_by, name })))
}

fn packaging_json<T: Serialize>(value: Option<&T>) -> Result<Option<String>> {
    value
        .map(serde_json::to_string)
        .transpose()
        .context("failed to serialize embedded packaging")
}

fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![table_name],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("failed to check if table exists: {table_name}"))?;
    Ok(exists == 1)
}

fn index_exists(conn: &Connection, index_name: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1)",
            params![index_name],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("failed to check if index exists: {index_name}"))?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    if !table_exists(conn, table)? {
        return Ok(false);
    }

    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("failed to inspect table_info for {table}"))?;
    let mut rows = stmt.query([])?;

    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }

    Ok(false)
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn detect_effective_schema_version(conn: &Connection) -> Result<(i64, bool)> {
    let recorded = current_schema_version(conn)?;
    if recorded > 0 {
        return Ok((recorded, false));
    }

    if !table_exists(conn, "packaging_history")? {
        return Ok((0, false));
    }

    if index_exists(conn, "idx_packaging_history_single_active")? {
        return Ok((2, true));
    }

    Ok((1, true))
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    let now = rfc3339(OffsetDateTime::now_utc())?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}

fn rfc3339(value: OffsetDateTime) -> Result<String> {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .with_context(|| format!("invalid RFC3339 timestamp: {value}"))
}

fn parse_user_id(raw: &str) -> Result<UserId> {
    UserId::parse(raw).ok_or_else(|| anyhow!("invalid user id: {raw}"))
}
