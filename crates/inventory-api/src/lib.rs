use std::path::PathBuf;

use inventory_core::{
    HistoryEntry, InventoryError, Item, ItemId, PackagingRequest, PackagingType, User, UserId,
    ITEM_NOT_FOUND, USER_NOT_FOUND,
};
use inventory_store_sqlite::{IntegrityReport, PackagingChange, SchemaStatus, SqliteStore};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const API_CONTRACT_VERSION: &str = "api.v1";
pub const NOT_AUTHORIZED: &str = "Not authorized";

/// Failures surfaced to callers, split the way HTTP status codes are.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::Validation(message) => Self::Validation(message),
            InventoryError::NotFound(message) => Self::NotFound(message),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrateResult {
    pub dry_run: bool,
    pub current_version: i64,
    pub target_version: i64,
    pub would_apply_versions: Vec<i64>,
    pub inferred_from_legacy: bool,
    pub after_version: Option<i64>,
    pub up_to_date: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewItemRequest {
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewUserRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum PackagingWrite {
    Add,
    Update,
}

impl PackagingWrite {
    fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InventoryApi {
    db_path: PathBuf,
}

impl InventoryApi {
    #[must_use]
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn open_store(&self) -> anyhow::Result<SqliteStore> {
        let mut store = SqliteStore::open(&self.db_path)?;
        store.migrate()?;
        Ok(store)
    }

    /// Inspect schema status without mutating data.
    ///
    /// # Errors
    /// Returns an error when the `SQLite` database cannot be opened or queried.
    pub fn schema_status(&self) -> ApiResult<SchemaStatus> {
        let store = SqliteStore::open(&self.db_path)?;
        Ok(store.schema_status()?)
    }

    /// Apply pending migrations, or return planned versions for dry-run mode.
    ///
    /// # Errors
    /// Returns an error when migration planning or execution fails.
    pub fn migrate(&self, dry_run: bool) -> ApiResult<MigrateResult> {
        let mut store = SqliteStore::open(&self.db_path)?;
        let before = store.schema_status()?;
        if dry_run {
            return Ok(MigrateResult {
                dry_run: true,
                current_version: before.current_version,
                target_version: before.target_version,
                would_apply_versions: before.pending_versions,
                inferred_from_legacy: before.inferred_from_legacy,
                after_version: None,
                up_to_date: None,
            });
        }

        let planned_versions = before.pending_versions;
        store.migrate()?;
        let after = store.schema_status()?;
        tracing::info!(
            before = before.current_version,
            after = after.current_version,
            "schema migrated"
        );
        Ok(MigrateResult {
            dry_run: false,
            current_version: before.current_version,
            target_version: before.target_version,
            would_apply_versions: planned_versions,
            inferred_from_legacy: before.inferred_from_legacy,
            after_version: Some(after.current_version),
            up_to_date: Some(after.pending_versions.is_empty()),
        })
    }

    /// # Errors
    /// Returns an error when the checks cannot be executed.
    pub fn integrity_check(&self) -> ApiResult<IntegrityReport> {
        let store = SqliteStore::open(&self.db_path)?;
        Ok(store.integrity_check()?)
    }

    /// # Errors
    /// Returns [`ApiError::Validation`] when the name is blank.
    pub fn create_user(&self, input: NewUserRequest) -> ApiResult<User> {
        let user = User::new(input.name, input.email, OffsetDateTime::now_utc());
        user.validate()?;
        let mut store = self.open_store()?;
        store.insert_user(&user)?;
        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// # Errors
    /// Returns [`ApiError::NotFound`] when the id is malformed or unknown.
    pub fn get_user(&self, user_id: &str) -> ApiResult<User> {
        let store = self.open_store()?;
        UserId::parse(user_id)
            .map(|id| store.get_user(id))
            .transpose()?
            .flatten()
            .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))
    }

    /// Resolve the requesting user of a private operation.
    ///
    /// # Errors
    /// Returns [`ApiError::Unauthorized`] when no user id is given or it does not name a user.
    pub fn authenticate(&self, user_id: Option<&str>) -> ApiResult<User> {
        let Some(user_id) = user_id else {
            return Err(ApiError::Unauthorized(NOT_AUTHORIZED.to_string()));
        };
        match self.get_user(user_id) {
            Err(ApiError::NotFound(_)) => Err(ApiError::Unauthorized(NOT_AUTHORIZED.to_string())),
            other => other,
        }
    }

    /// # Errors
    /// Returns [`ApiError::Validation`] when the name is blank.
    pub fn create_item(&self, input: NewItemRequest) -> ApiResult<Item> {
        let item = Item::new(input.name, input.sku, input.description, OffsetDateTime::now_utc());
        item.validate()?;
        let mut store = self.open_store()?;
        store.insert_item(&item)?;
        tracing::info!(item_id = %item.id, "item created");
        Ok(item)
    }

    /// # Errors
    /// Returns [`ApiError::NotFound`] when the id is malformed or unknown.
    pub fn get_item(&self, item_id: &str) -> ApiResult<Item> {
        let store = self.open_store()?;
        load_item(&store, item_id)
    }

    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn list_items(&self) -> ApiResult<Vec<Item>> {
        let store = self.open_store()?;
        Ok(store.list_items()?)
    }

    /// Set the item's current packaging of the requested type and record it in history.
    ///
    /// # Errors
    /// Returns [`ApiError::Validation`] for malformed input, [`ApiError::NotFound`]
    /// when the item does not exist, and [`ApiError::Internal`] for store failures.
    pub fn add_packaging(
        &self,
        item_id: &str,
        request: &PackagingRequest,
        created_by: UserId,
    ) -> ApiResult<Item> {
        self.write_packaging(item_id, request, created_by, PackagingWrite::Add)
    }

    /// Same contract as [`InventoryApi::add_packaging`].
    ///
    /// # Errors
    /// See [`InventoryApi::add_packaging`].
    pub fn update_packaging(
        &self,
        item_id: &str,
        request: &PackagingRequest,
        created_by: UserId,
    ) -> ApiResult<Item> {
        self.write_packaging(item_id, request, created_by, PackagingWrite::Update)
    }

    fn write_packaging(
        &self,
        item_id: &str,
        request: &PackagingRequest,
        created_by: UserId,
        write: PackagingWrite,
    ) -> ApiResult<Item> {
        let spec = request.validate().inspect_err(|err| {
            tracing::warn!(item_id, operation = write.as_str(), %err, "packaging rejected");
        })?;

        let id = parse_item_id(item_id)?;
        let mut store = self.open_store()?;
        let PackagingChange { item, deactivated } = store
            .replace_packaging(id, &spec, created_by, OffsetDateTime::now_utc())?
            .ok_or_else(item_not_found)?;

        tracing::info!(
            item_id = %item.id,
            packaging_type = %spec.packaging_type(),
            operation = write.as_str(),
            deactivated,
            "packaging saved"
        );
        Ok(item)
    }

    /// Remove the item's current packaging of `packaging_type` and deactivate its history.
    ///
    /// # Errors
    /// Returns [`ApiError::Validation`] for an unknown type and [`ApiError::NotFound`]
    /// when the item does not exist.
    pub fn delete_packaging(&self, item_id: &str, packaging_type: &str) -> ApiResult<Item> {
        let packaging_type = PackagingType::from_request(Some(packaging_type))?;

        let id = parse_item_id(item_id)?;
        let mut store = self.open_store()?;
        let PackagingChange { item, deactivated } = store
            .clear_packaging(id, packaging_type, OffsetDateTime::now_utc())?
            .ok_or_else(item_not_found)?;

        tracing::info!(
            item_id = %item.id,
            packaging_type = %packaging_type,
            deactivated,
            "packaging deleted"
        );
        Ok(item)
    }

    /// Every history row of the item, newest first. Unknown items have no history.
    ///
    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn packaging_by_item_id(&self, item_id: &str) -> ApiResult<Vec<HistoryEntry>> {
        self.history(item_id, false)
    }

    /// Only the currently active history rows of the item, newest first.
    ///
    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn packaging_history(&self, item_id: &str) -> ApiResult<Vec<HistoryEntry>> {
        self.history(item_id, true)
    }

    fn history(&self, item_id: &str, active_only: bool) -> ApiResult<Vec<HistoryEntry>> {
        let Some(item_id) = ItemId::parse(item_id) else {
            return Ok(Vec::new());
        };
        let store = self.open_store()?;
        Ok(store.list_history(item_id, active_only)?)
    }
}

fn item_not_found() -> ApiError {
    ApiError::NotFound(ITEM_NOT_FOUND.to_string())
}

fn parse_item_id(item_id: &str) -> ApiResult<ItemId> {
    ItemId::parse(item_id).ok_or_else(item_not_found)
}

fn load_item(store: &SqliteStore, item_id: &str) -> ApiResult<Item> {
    store.get_item(parse_item_id(item_id)?)?.ok_or_else(item_not_found)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use anyhow::anyhow;
    use inventory_core::{NumericInput, INVALID_PACK_DETAILS, MISSING_UNIT};

    fn unique_temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("inventory-api-{}.sqlite3", ulid::Ulid::new()))
    }

    fn fixture() -> anyhow::Result<(InventoryApi, PathBuf, Item, User)> {
        let db_path = unique_temp_db_path();
        let api = InventoryApi::new(db_path.clone());
        let user = api
            .create_user(NewUserRequest { name: "Dana".to_string(), email: None })
            .map_err(|err| anyhow!("create_user failed: {err}"))?;
        let item = api
            .create_item(NewItemRequest {
                name: "Canned tomatoes".to_string(),
                sku: Some("CT-400".to_string()),
                description: None,
            })
            .map_err(|err| anyhow!("create_item failed: {err}"))?;
        Ok((api, db_path, item, user))
    }

    fn base_request(amount: f64) -> PackagingRequest {
        PackagingRequest {
            packaging_type: Some("base".into()),
            amount: Some(NumericInput::from(amount)),
            unit: Some("g".into()),
            ..PackagingRequest::default()
        }
    }

    fn pack_request(pack_size: Option<u32>) -> PackagingRequest {
        PackagingRequest {
            packaging_type: Some("pack".into()),
            amount: Some(NumericInput::from(400.0)),
            unit: Some("g".into()),
            pack_size: pack_size.map(NumericInput::from),
            pack_unit: Some("tray".into()),
        }
    }

    fn cleanup(db_path: &Path) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", db_path.display(), suffix));
        }
    }

    #[test]
    fn add_base_packaging_updates_item_and_history() -> anyhow::Result<()> {
        let (api, db_path, item, user) = fixture()?;

        let updated = api.add_packaging(&item.id.to_string(), &base_request(400.0), user.id)?;
        assert_eq!(updated.base_packaging.as_ref().map(|base| base.amount), Some(400.0));

        let reloaded = api.get_item(&item.id.to_string())?;
        assert_eq!(reloaded.base_packaging, updated.base_packaging);

        let history = api.packaging_by_item_id(&item.id.to_string())?;
        assert_eq!(history.len(), 1);
        assert!(history[0].is_active);
        assert_eq!(history[0].created_by.as_ref().map(|creator| creator.id), Some(user.id));

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn pack_packaging_without_pack_size_is_rejected() -> anyhow::Result<()> {
        let (api, db_path, item, user) = fixture()?;

        let result = api.add_packaging(&item.id.to_string(), &pack_request(None), user.id);
        assert!(
            matches!(result, Err(ApiError::Validation(ref message)) if message == INVALID_PACK_DETAILS)
        );
        assert!(api.packaging_by_item_id(&item.id.to_string())?.is_empty());

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn validation_runs_before_item_lookup() -> anyhow::Result<()> {
        let (api, db_path, _item, user) = fixture()?;

        let mut request = base_request(1.0);
        request.unit = None;
        let result = api.update_packaging("missing", &request, user.id);
        assert!(matches!(result, Err(ApiError::Validation(ref message)) if message == MISSING_UNIT));

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn packaging_for_unknown_item_is_not_found() -> anyhow::Result<()> {
        let (api, db_path, _item, user) = fixture()?;

        for item_id in [ItemId::new().to_string(), "not-an-id".to_string()] {
            let result = api.add_packaging(&item_id, &base_request(1.0), user.id);
            assert!(
                matches!(result, Err(ApiError::NotFound(ref message)) if message == ITEM_NOT_FOUND)
            );
        }

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn successive_updates_leave_latest_row_active() -> anyhow::Result<()> {
        let (api, db_path, item, user) = fixture()?;
        let item_id = item.id.to_string();

        api.add_packaging(&item_id, &pack_request(Some(6)), user.id)?;
        api.update_packaging(&item_id, &pack_request(Some(12)), user.id)?;
        api.update_packaging(&item_id, &base_request(250.0), user.id)?;

        let active = api.packaging_history(&item_id)?;
        let active_pack = active
            .iter()
            .filter(|entry| entry.packaging_type == PackagingType::Pack)
            .collect::<Vec<_>>();
        assert_eq!(active_pack.len(), 1);
        assert_eq!(active_pack[0].pack_size, Some(12));
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].packaging_type, PackagingType::Base);

        let all = api.packaging_by_item_id(&item_id)?;
        assert_eq!(all.len(), 3);
        assert_eq!(all.iter().filter(|entry| entry.is_active).count(), 2);

        let current = api.get_item(&item_id)?;
        assert_eq!(current.pack_packaging.as_ref().map(|pack| pack.pack_size), Some(12));

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn delete_packaging_clears_field_and_deactivates_history() -> anyhow::Result<()> {
        let (api, db_path, item, user) = fixture()?;
        let item_id = item.id.to_string();

        api.add_packaging(&item_id, &base_request(400.0), user.id)?;
        api.add_packaging(&item_id, &pack_request(Some(6)), user.id)?;

        let cleared = api.delete_packaging(&item_id, "base")?;
        assert!(cleared.base_packaging.is_none());
        assert!(cleared.pack_packaging.is_some());

        let all = api.packaging_by_item_id(&item_id)?;
        assert_eq!(all.len(), 2);
        let active = api.packaging_history(&item_id)?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].packaging_type, PackagingType::Pack);

        assert!(matches!(api.delete_packaging(&item_id, "crate"), Err(ApiError::Validation(_))));
        assert!(matches!(
            api.delete_packaging(&ItemId::new().to_string(), "base"),
            Err(ApiError::NotFound(_))
        ));

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn concurrent_base_and_pack_writes_both_land_on_item() -> anyhow::Result<()> {
        let (api, db_path, item, user) = fixture()?;
        let item_id = item.id.to_string();
        let user_id = user.id;

        let writers = [PackagingType::Base, PackagingType::Pack].map(|packaging_type| {
            let api = api.clone();
            let item_id = item_id.clone();
            std::thread::spawn(move || -> ApiResult<()> {
                for round in 1..=10_u32 {
                    let request = match packaging_type {
                        PackagingType::Base => base_request(f64::from(round)),
                        PackagingType::Pack => pack_request(Some(round)),
                    };
                    api.update_packaging(&item_id, &request, user_id)?;
                }
                Ok(())
            })
        });
        for writer in writers {
            writer.join().map_err(|_| anyhow!("writer thread panicked"))??;
        }

        let current = api.get_item(&item_id)?;
        assert_eq!(current.base_packaging.as_ref().map(|base| base.amount), Some(10.0));
        assert_eq!(current.pack_packaging.as_ref().map(|pack| pack.pack_size), Some(10));

        let active = api.packaging_history(&item_id)?;
        assert_eq!(active.len(), 2);
        assert_eq!(api.packaging_by_item_id(&item_id)?.len(), 20);

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn history_of_unknown_item_is_empty() -> anyhow::Result<()> {
        let (api, db_path, _item, _user) = fixture()?;
        assert!(api.packaging_by_item_id(&ItemId::new().to_string())?.is_empty());
        assert!(api.packaging_history("garbage")?.is_empty());
        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn authenticate_requires_known_user() -> anyhow::Result<()> {
        let (api, db_path, _item, user) = fixture()?;

        assert_eq!(api.authenticate(Some(&user.id.to_string()))?.id, user.id);
        assert!(matches!(api.authenticate(None), Err(ApiError::Unauthorized(_))));
        assert!(matches!(
            api.authenticate(Some(&UserId::new().to_string())),
            Err(ApiError::Unauthorized(_))
        ));

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn migrate_dry_run_reports_pending_versions() -> anyhow::Result<()> {
        let db_path = unique_temp_db_path();
        let api = InventoryApi::new(db_path.clone());

        let planned = api.migrate(true)?;
        assert_eq!(planned.would_apply_versions, vec![1, 2]);
        assert_eq!(planned.after_version, None);

        let applied = api.migrate(false)?;
        assert_eq!(applied.after_version, Some(2));
        assert_eq!(applied.up_to_date, Some(true));

        cleanup(&db_path);
        Ok(())
    }
}
