//! SQLite implementation of ContentStore
//!
//! Every write transaction opens with a write statement so that SQLite takes
//! the write lock up front and waits on `busy_timeout` instead of failing a
//! read-to-write lock upgrade.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pkgstore_core::{
    Asset, AssetBlob, AssetId, Attributes, BlobRef, Component, ComponentId, Digests, Format,
    Repository, RepositoryId, RepositoryType,
};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, instrument, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{
    ComponentUpsert, ContentStore, CoordinateFilter, DeletedAsset, NewAsset, NewBlob,
    NewComponent, ReleasedLine, SaveOutcome, SaveRequest, SnapshotLine,
};

const COMPONENT_COLUMNS: &str = "id, repository_id, namespace, name, version, kind, \
     base_version, attributes, created_at, last_updated";

const ASSET_SELECT: &str = r#"
    SELECT
        a.id, a.repository_id, a.component_id, a.path, a.kind, a.attributes,
        a.blob_ref, a.last_verified, a.created_at, a.last_updated,
        b.size, b.content_type, b.checksums, b.created_at AS blob_created_at
    FROM assets a
    JOIN blobs b ON b.blob_ref = a.blob_ref
"#;

const SNAPSHOT_SUFFIX_SQL: &str = "'-SNAPSHOT'";

/// SQLite-backed content graph for one repository
#[derive(Debug, Clone)]
pub struct SqliteContentStore {
    pool: SqlitePool,
    repository: Repository,
}

impl SqliteContentStore {
    /// Bind to the named repository, provisioning it on first use
    ///
    /// Reopening an existing repository with a different format fails; the
    /// identity of a repository never changes after creation.
    #[instrument(skip(pool))]
    pub async fn open(
        pool: SqlitePool,
        name: &str,
        format: Format,
        repo_type: RepositoryType,
    ) -> DbResult<Self> {
        sqlx::query(
            r#"
            INSERT INTO repositories (name, format, repo_type, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(format.as_str())
        .bind(repo_type.to_string())
        .bind(Utc::now())
        .execute(&pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, name, format, repo_type, created_at FROM repositories WHERE name = ?",
        )
        .bind(name)
        .fetch_one(&pool)
        .await?;
        let repository = row_to_repository(&row)?;

        if repository.format != format || repository.repo_type != repo_type {
            return Err(DbError::Configuration(format!(
                "Repository '{}' already exists as {} {}",
                name, repository.format, repository.repo_type
            )));
        }

        debug!(repository_id = %repository.id, "Opened content repository");
        Ok(Self { pool, repository })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn repository_id(&self) -> i64 {
        self.repository.id.get()
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    fn repository(&self) -> &Repository {
        &self.repository
    }

    #[instrument(skip(self), fields(repository = %self.repository.name))]
    async fn find_asset(&self, path: &str) -> DbResult<Option<Asset>> {
        let mut conn = self.pool.acquire().await?;
        fetch_asset_by_path(&mut conn, self.repository_id(), path).await
    }

    async fn asset_exists(&self, path: &str) -> DbResult<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM assets WHERE repository_id = ? AND path = ?)",
        )
        .bind(self.repository_id())
        .bind(path)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    #[instrument(
        skip(self, component),
        fields(repository = %self.repository.name, coordinates = %format!("{}:{}:{}", component.namespace, component.name, component.version))
    )]
    async fn get_or_create_component(&self, component: NewComponent) -> DbResult<ComponentUpsert> {
        let mut tx = self.pool.begin().await?;
        let upsert = get_or_create_in(&mut tx, self.repository_id(), &component).await?;
        tx.commit().await?;

        debug!(created = upsert.created, component_id = %upsert.component.id, "Resolved component");
        Ok(upsert)
    }

    async fn find_component(
        &self,
        namespace: &str,
        name: &str,
        version: &str,
    ) -> DbResult<Option<Component>> {
        let sql = format!(
            "SELECT {} FROM components WHERE repository_id = ? AND namespace = ? AND name = ? AND version = ?",
            COMPONENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(self.repository_id())
            .bind(namespace)
            .bind(name)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_component).transpose()
    }

    async fn read_component(&self, id: ComponentId) -> DbResult<Option<Component>> {
        let sql = format!(
            "SELECT {} FROM components WHERE repository_id = ? AND id = ?",
            COMPONENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(self.repository_id())
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_component).transpose()
    }

    #[instrument(skip(self, asset), fields(repository = %self.repository.name, path = %asset.path))]
    async fn upsert_asset(&self, asset: NewAsset, overwrite: bool) -> DbResult<Asset> {
        let mut tx = self.pool.begin().await?;
        insert_blob(&mut tx, &asset.blob).await?;
        let stored = upsert_asset_in(&mut tx, self.repository_id(), &asset, overwrite).await?;
        tx.commit().await?;

        Ok(stored)
    }

    #[instrument(skip(self, request), fields(repository = %self.repository.name, path = %request.asset.path))]
    async fn save(&self, request: SaveRequest) -> DbResult<SaveOutcome> {
        let SaveRequest {
            component,
            mut asset,
            overwrite,
        } = request;

        let mut tx = self.pool.begin().await?;
        insert_blob(&mut tx, &asset.blob).await?;

        let component = match component {
            Some(component) => {
                let upsert = get_or_create_in(&mut tx, self.repository_id(), &component).await?;
                asset.component_id = Some(upsert.component.id);
                Some(upsert)
            }
            None => None,
        };

        let stored = upsert_asset_in(&mut tx, self.repository_id(), &asset, overwrite).await?;
        tx.commit().await?;

        debug!(asset_id = %stored.id, "Saved asset");
        Ok(SaveOutcome {
            asset: stored,
            component,
        })
    }

    #[instrument(skip(self), fields(repository = %self.repository.name))]
    async fn delete_asset(&self, path: &str) -> DbResult<Option<DeletedAsset>> {
        let mut conn = self.pool.acquire().await?;
        delete_asset_in(&mut conn, self.repository_id(), path).await
    }

    #[instrument(skip(self, paths), fields(repository = %self.repository.name, count = paths.len()))]
    async fn delete_assets_by_paths(&self, paths: &[String]) -> DbResult<Vec<DeletedAsset>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut deleted = Vec::new();
        for path in paths {
            if let Some(asset) = delete_asset_in(&mut tx, self.repository_id(), path).await? {
                deleted.push(asset);
            }
        }
        tx.commit().await?;

        Ok(deleted)
    }

    #[instrument(skip(self), fields(repository = %self.repository.name))]
    async fn delete_assets_with_prefix(&self, prefix: &str) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM assets WHERE repository_id = ? AND substr(path, 1, length(?)) = ?",
        )
        .bind(self.repository_id())
        .bind(prefix)
        .bind(prefix)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, ids), fields(repository = %self.repository.name, count = ids.len()))]
    async fn purge_components(&self, ids: &[ComponentId]) -> DbResult<Vec<Component>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "DELETE FROM components WHERE repository_id = ? AND id = ? RETURNING {}",
            COMPONENT_COLUMNS
        );

        let mut tx = self.pool.begin().await?;
        let mut purged = Vec::new();
        for id in ids {
            let row = sqlx::query(&sql)
                .bind(self.repository_id())
                .bind(id.get())
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(row) = row {
                purged.push(row_to_component(&row)?);
            }
        }
        tx.commit().await?;

        debug!(purged = purged.len(), "Purged components");
        Ok(purged)
    }

    #[instrument(skip(self), fields(repository = %self.repository.name, component_id = %id))]
    async fn delete_component_if_orphaned(&self, id: ComponentId) -> DbResult<Option<Component>> {
        let sql = format!(
            r#"
            DELETE FROM components
            WHERE repository_id = ? AND id = ?
              AND NOT EXISTS (SELECT 1 FROM assets WHERE assets.component_id = components.id)
            RETURNING {}
            "#,
            COMPONENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(self.repository_id())
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_component).transpose()
    }

    async fn component_exists(&self, filter: &CoordinateFilter) -> DbResult<bool> {
        let mut sql = String::from(
            "SELECT EXISTS(SELECT 1 FROM components WHERE repository_id = ? AND namespace = ?",
        );
        if filter.name.is_some() {
            sql.push_str(" AND name = ?");
        }
        if filter.base_version.is_some() {
            sql.push_str(" AND base_version = ?");
        }
        sql.push(')');

        let mut query = sqlx::query_scalar::<_, i64>(&sql)
            .bind(self.repository_id())
            .bind(&filter.namespace);
        if let Some(ref name) = filter.name {
            query = query.bind(name);
        }
        if let Some(ref base_version) = filter.base_version {
            query = query.bind(base_version);
        }

        Ok(query.fetch_one(&self.pool).await? != 0)
    }

    #[instrument(skip(self, value), fields(repository = %self.repository.name))]
    async fn set_asset_attribute(&self, path: &str, key: &str, value: Value) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE assets
            SET attributes = json_set(attributes, '$.' || ?, json(?)), last_updated = ?
            WHERE repository_id = ? AND path = ?
            "#,
        )
        .bind(key)
        .bind(value.to_string())
        .bind(Utc::now())
        .bind(self.repository_id())
        .bind(path)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_snapshot_lines(&self, minimum_retained: u32) -> DbResult<Vec<SnapshotLine>> {
        let sql = format!(
            r#"
            SELECT namespace, name, base_version, COUNT(*) AS count
            FROM components
            WHERE repository_id = ? AND substr(base_version, -9) = {}
            GROUP BY namespace, name, base_version
            HAVING COUNT(*) > ?
            ORDER BY namespace, name, base_version
            "#,
            SNAPSHOT_SUFFIX_SQL
        );
        let rows = sqlx::query(&sql)
            .bind(self.repository_id())
            .bind(i64::from(minimum_retained))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| SnapshotLine {
                namespace: row.get("namespace"),
                name: row.get("name"),
                base_version: row.get("base_version"),
                count: row.get("count"),
            })
            .collect())
    }

    async fn find_line_components(
        &self,
        namespace: &str,
        name: &str,
        base_version: &str,
    ) -> DbResult<Vec<Component>> {
        let sql = format!(
            r#"
            SELECT {} FROM components
            WHERE repository_id = ? AND namespace = ? AND name = ? AND base_version = ?
            ORDER BY created_at DESC, id DESC
            "#,
            COMPONENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(self.repository_id())
            .bind(namespace)
            .bind(name)
            .bind(base_version)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_component).collect()
    }

    async fn find_released_snapshot_lines(&self) -> DbResult<Vec<ReleasedLine>> {
        let sql = format!(
            r#"
            SELECT DISTINCT s.namespace, s.name, s.base_version, r.created_at AS released_at
            FROM components s
            JOIN components r
              ON r.repository_id = s.repository_id
             AND r.namespace = s.namespace
             AND r.name = s.name
             AND r.version = substr(s.base_version, 1, length(s.base_version) - 9)
            WHERE s.repository_id = ? AND substr(s.base_version, -9) = {}
            ORDER BY s.namespace, s.name, s.base_version
            "#,
            SNAPSHOT_SUFFIX_SQL
        );
        let rows = sqlx::query(&sql)
            .bind(self.repository_id())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| ReleasedLine {
                namespace: row.get("namespace"),
                name: row.get("name"),
                base_version: row.get("base_version"),
                released_at: row.get("released_at"),
            })
            .collect())
    }

    async fn count_components(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM components WHERE repository_id = ?")
                .bind(self.repository_id())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn count_assets(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assets WHERE repository_id = ?")
            .bind(self.repository_id())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }
}

/// Record a committed blob; a blob already known is left as is
async fn insert_blob(conn: &mut SqliteConnection, blob: &NewBlob) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO blobs (blob_ref, size, content_type, checksums, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (blob_ref) DO NOTHING
        "#,
    )
    .bind(blob.blob_ref.to_string())
    .bind(blob.size as i64)
    .bind(&blob.content_type)
    .bind(serde_json::to_string(&blob.checksums)?)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn get_or_create_in(
    conn: &mut SqliteConnection,
    repository_id: i64,
    component: &NewComponent,
) -> DbResult<ComponentUpsert> {
    let now = Utc::now();
    let attributes = serde_json::to_string(&component.attributes)?;

    let insert = format!(
        r#"
        INSERT INTO components (
            repository_id, namespace, name, version, kind, base_version,
            attributes, created_at, last_updated
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (repository_id, namespace, name, version) DO NOTHING
        RETURNING {}
        "#,
        COMPONENT_COLUMNS
    );
    let inserted = sqlx::query(&insert)
        .bind(repository_id)
        .bind(&component.namespace)
        .bind(&component.name)
        .bind(&component.version)
        .bind(&component.kind)
        .bind(&component.base_version)
        .bind(&attributes)
        .bind(now)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(row) = inserted {
        return Ok(ComponentUpsert {
            component: row_to_component(&row)?,
            created: true,
        });
    }

    // lost the insert race or the component already existed
    let refresh = format!(
        r#"
        UPDATE components
        SET kind = COALESCE(?, kind),
            base_version = COALESCE(?, base_version),
            attributes = json_patch(attributes, ?),
            last_updated = ?
        WHERE repository_id = ? AND namespace = ? AND name = ? AND version = ?
        RETURNING {}
        "#,
        COMPONENT_COLUMNS
    );
    let row = sqlx::query(&refresh)
        .bind(&component.kind)
        .bind(&component.base_version)
        .bind(&attributes)
        .bind(now)
        .bind(repository_id)
        .bind(&component.namespace)
        .bind(&component.name)
        .bind(&component.version)
        .fetch_one(&mut *conn)
        .await?;

    Ok(ComponentUpsert {
        component: row_to_component(&row)?,
        created: false,
    })
}

async fn upsert_asset_in(
    conn: &mut SqliteConnection,
    repository_id: i64,
    asset: &NewAsset,
    overwrite: bool,
) -> DbResult<Asset> {
    let on_conflict = if overwrite {
        r#"
        ON CONFLICT (repository_id, path) DO UPDATE SET
            component_id = COALESCE(excluded.component_id, assets.component_id),
            kind = excluded.kind,
            attributes = excluded.attributes,
            blob_ref = excluded.blob_ref,
            last_verified = excluded.last_verified,
            last_updated = excluded.last_updated
        "#
    } else {
        "ON CONFLICT (repository_id, path) DO NOTHING"
    };

    let sql = format!(
        r#"
        INSERT INTO assets (
            repository_id, component_id, path, kind, attributes, blob_ref,
            last_verified, created_at, last_updated
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        {}
        RETURNING id
        "#,
        on_conflict
    );

    let now = Utc::now();
    let id: Option<i64> = sqlx::query_scalar(&sql)
        .bind(repository_id)
        .bind(asset.component_id.map(|id| id.get()))
        .bind(&asset.path)
        .bind(&asset.kind)
        .bind(serde_json::to_string(&asset.attributes)?)
        .bind(asset.blob.blob_ref.to_string())
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

    let id = id.ok_or_else(|| DbError::AlreadyExists(asset.path.clone()))?;

    let sql = format!("{} WHERE a.id = ?", ASSET_SELECT);
    let row = sqlx::query(&sql).bind(id).fetch_one(&mut *conn).await?;
    row_to_asset(&row)
}

async fn fetch_asset_by_path(
    conn: &mut SqliteConnection,
    repository_id: i64,
    path: &str,
) -> DbResult<Option<Asset>> {
    let sql = format!("{} WHERE a.repository_id = ? AND a.path = ?", ASSET_SELECT);
    let row = sqlx::query(&sql)
        .bind(repository_id)
        .bind(path)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_asset).transpose()
}

async fn delete_asset_in(
    conn: &mut SqliteConnection,
    repository_id: i64,
    path: &str,
) -> DbResult<Option<DeletedAsset>> {
    let row = sqlx::query(
        "DELETE FROM assets WHERE repository_id = ? AND path = ? RETURNING path, component_id",
    )
    .bind(repository_id)
    .bind(path)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|row| DeletedAsset {
        path: row.get("path"),
        component_id: row.get::<Option<i64>, _>("component_id").map(ComponentId::new),
    }))
}

fn parse_attributes(raw: &str) -> DbResult<Attributes> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(DbError::InvalidData(format!(
            "Attributes must be a JSON object, got {}",
            other
        ))),
    }
}

fn row_to_repository(row: &SqliteRow) -> DbResult<Repository> {
    let format: String = row.get("format");
    let repo_type: String = row.get("repo_type");

    Ok(Repository {
        id: RepositoryId::new(row.get("id")),
        name: row.get("name"),
        format: Format::from_str(&format)?,
        repo_type: RepositoryType::from_str(&repo_type)?,
        created_at: row.get("created_at"),
    })
}

/// Convert a database row to a Component
fn row_to_component(row: &SqliteRow) -> DbResult<Component> {
    let attributes: String = row.get("attributes");

    Ok(Component {
        id: ComponentId::new(row.get("id")),
        repository_id: RepositoryId::new(row.get("repository_id")),
        namespace: row.get("namespace"),
        name: row.get("name"),
        version: row.get("version"),
        kind: row.get("kind"),
        base_version: row.get("base_version"),
        attributes: parse_attributes(&attributes)?,
        created_at: row.get("created_at"),
        last_updated: row.get("last_updated"),
    })
}

/// Convert a joined asset/blob row to an Asset
fn row_to_asset(row: &SqliteRow) -> DbResult<Asset> {
    let attributes: String = row.get("attributes");
    let blob_ref: String = row.get("blob_ref");
    let checksums: String = row.get("checksums");
    let size: i64 = row.get("size");

    let checksums: Digests = serde_json::from_str(&checksums).unwrap_or_else(|e| {
        warn!("Unreadable checksums for blob {}: {}", blob_ref, e);
        Digests::new()
    });

    let blob = AssetBlob {
        blob_ref: BlobRef::from_str(&blob_ref)?,
        size: u64::try_from(size)
            .map_err(|_| DbError::InvalidData(format!("Negative blob size: {}", size)))?,
        content_type: row.get("content_type"),
        checksums,
        created_at: row.get("blob_created_at"),
    };

    Ok(Asset {
        id: AssetId::new(row.get("id")),
        repository_id: RepositoryId::new(row.get("repository_id")),
        path: row.get("path"),
        kind: row.get("kind"),
        component_id: row.get::<Option<i64>, _>("component_id").map(ComponentId::new),
        attributes: parse_attributes(&attributes)?,
        blob,
        last_verified: row.get::<Option<DateTime<Utc>>, _>("last_verified"),
        created_at: row.get("created_at"),
        last_updated: row.get("last_updated"),
    })
}
