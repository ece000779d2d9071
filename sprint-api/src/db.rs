//! Postgres Store
//!
//! [`PgStore`] implements [`AsyncStore`] over a deadpool-postgres pool. Each
//! entity kind has one table holding the serialized record as a JSONB `doc`
//! next to typed copies of the columns the store filters and orders on.
//! Every conditional operation is a single statement, so the check and the
//! change it guards cannot interleave with another writer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde::{de::DeserializeOwned, Serialize};
use sprint_core::{
    EntityKind, EventId, EventRecord, FileId, FileRecord, GalleryItem, GalleryItemId,
    PageRequest, PaymentId, PaymentRecord, PaymentSnapshot, PaymentStatus, RegistrationFilter,
    RegistrationId, RegistrationRecord, Retention, SprintError, SprintResult, StorageError,
    Timestamp, UsageTag,
};
use sprint_storage::AsyncStore;
use tokio_postgres::{types::ToSql, NoTls, Row};

use crate::constants::{
    DEFAULT_DB_HOST, DEFAULT_DB_NAME, DEFAULT_DB_POOL_SIZE, DEFAULT_DB_PORT,
    DEFAULT_DB_TIMEOUT_SECS, DEFAULT_DB_USER,
};
use crate::error::{ApiError, ApiResult};

// ============================================================================
// DATABASE CONFIGURATION
// ============================================================================

/// Database connection configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            dbname: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            max_size: DEFAULT_DB_POOL_SIZE,
            timeout: Duration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("SPRINT_DB_HOST").unwrap_or_else(|_| DEFAULT_DB_HOST.to_string()),
            port: std::env::var("SPRINT_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DB_PORT),
            dbname: std::env::var("SPRINT_DB_NAME").unwrap_or_else(|_| DEFAULT_DB_NAME.to_string()),
            user: std::env::var("SPRINT_DB_USER").unwrap_or_else(|_| DEFAULT_DB_USER.to_string()),
            password: std::env::var("SPRINT_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("SPRINT_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DB_POOL_SIZE),
            timeout: Duration::from_secs(
                std::env::var("SPRINT_DB_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DB_TIMEOUT_SECS),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let mut pool_config = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_config.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sprint_file (
    file_id     UUID PRIMARY KEY,
    usage       TEXT NOT NULL,
    retention   TEXT NOT NULL,
    is_deleted  BOOLEAN NOT NULL DEFAULT FALSE,
    created_at  TIMESTAMPTZ NOT NULL,
    doc         JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS sprint_file_sweep_idx ON sprint_file (retention, created_at);
CREATE INDEX IF NOT EXISTS sprint_file_usage_idx ON sprint_file (usage, created_at);

CREATE TABLE IF NOT EXISTS sprint_event (
    event_id    UUID PRIMARY KEY,
    is_deleted  BOOLEAN NOT NULL DEFAULT FALSE,
    event_date  TIMESTAMPTZ NOT NULL,
    doc         JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS sprint_gallery (
    item_id     UUID PRIMARY KEY,
    is_deleted  BOOLEAN NOT NULL DEFAULT FALSE,
    created_at  TIMESTAMPTZ NOT NULL,
    doc         JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS sprint_registration (
    registration_id UUID PRIMARY KEY,
    team_name       TEXT NOT NULL,
    team_id         TEXT,
    payment_status  TEXT,
    is_deleted      BOOLEAN NOT NULL DEFAULT FALSE,
    created_at      TIMESTAMPTZ NOT NULL,
    doc             JSONB NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS sprint_registration_team_id_idx
    ON sprint_registration (team_id) WHERE team_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS sprint_registration_created_idx
    ON sprint_registration (created_at DESC);

CREATE TABLE IF NOT EXISTS sprint_payment (
    payment_id      UUID PRIMARY KEY,
    registration_id UUID NOT NULL,
    status          TEXT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL,
    doc             JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS sprint_payment_registration_idx
    ON sprint_payment (registration_id, created_at);

CREATE TABLE IF NOT EXISTS sprint_counter (
    name    TEXT PRIMARY KEY,
    value   TEXT NOT NULL
);
"#;

// ============================================================================
// STORE
// ============================================================================

/// [`AsyncStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Create tables and indexes that do not exist yet.
    pub async fn migrate(&self) -> SprintResult<()> {
        let client = self.conn().await?;
        client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| query_error(EntityKind::File, e))?;
        tracing::info!("Database schema ready");
        Ok(())
    }

    async fn conn(&self) -> SprintResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            StorageError::Unavailable {
                reason: format!("connection pool: {}", e),
            }
            .into()
        })
    }

    async fn query_doc<T: DeserializeOwned>(
        &self,
        entity: EntityKind,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> SprintResult<Option<T>> {
        let client = self.conn().await?;
        let row = client
            .query_opt(sql, params)
            .await
            .map_err(|e| query_error(entity, e))?;
        row.map(|r| decode(entity, &r)).transpose()
    }

    async fn query_docs<T: DeserializeOwned>(
        &self,
        entity: EntityKind,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> SprintResult<Vec<T>> {
        let client = self.conn().await?;
        let rows = client
            .query(sql, params)
            .await
            .map_err(|e| query_error(entity, e))?;
        rows.iter().map(|r| decode(entity, r)).collect()
    }

    async fn execute(
        &self,
        entity: EntityKind,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> SprintResult<u64> {
        let client = self.conn().await?;
        client
            .execute(sql, params)
            .await
            .map_err(|e| query_error(entity, e))
    }

    /// Run an `INSERT ... ON CONFLICT DO NOTHING`; zero rows means the id
    /// was taken.
    async fn insert(
        &self,
        entity: EntityKind,
        id: impl std::fmt::Display,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> SprintResult<()> {
        if self.execute(entity, sql, params).await? == 0 {
            return Err(StorageError::AlreadyExists {
                entity,
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn query_error(entity: EntityKind, e: tokio_postgres::Error) -> SprintError {
    if e.is_closed() {
        StorageError::Unavailable {
            reason: e.to_string(),
        }
        .into()
    } else {
        StorageError::QueryFailed {
            entity,
            reason: e.to_string(),
        }
        .into()
    }
}

fn decode<T: DeserializeOwned>(entity: EntityKind, row: &Row) -> SprintResult<T> {
    let doc: serde_json::Value = row.try_get(0).map_err(|e| StorageError::Corrupt {
        entity,
        reason: e.to_string(),
    })?;
    serde_json::from_value(doc).map_err(|e| {
        StorageError::Corrupt {
            entity,
            reason: e.to_string(),
        }
        .into()
    })
}

fn encode<T: Serialize>(entity: EntityKind, value: &T) -> SprintResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| {
        StorageError::Corrupt {
            entity,
            reason: e.to_string(),
        }
        .into()
    })
}

/// `updated_at` as the JSON value the entity serializers produce.
fn now_json() -> SprintResult<serde_json::Value> {
    encode(EntityKind::File, &Utc::now())
}

#[async_trait]
impl AsyncStore for PgStore {
    // === Files ===

    async fn file_insert(&self, file: &FileRecord) -> SprintResult<()> {
        let doc = encode(EntityKind::File, file)?;
        let id = file.file_id.as_uuid();
        self.insert(
            EntityKind::File,
            file.file_id,
            "INSERT INTO sprint_file (file_id, usage, retention, is_deleted, created_at, doc) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (file_id) DO NOTHING",
            &[
                &id,
                &file.usage.as_db_str(),
                &file.retention.as_db_str(),
                &file.is_deleted,
                &file.created_at,
                &doc,
            ],
        )
        .await
    }

    async fn file_get(&self, id: FileId) -> SprintResult<Option<FileRecord>> {
        self.query_doc(
            EntityKind::File,
            "SELECT doc FROM sprint_file WHERE file_id = $1",
            &[&id.as_uuid()],
        )
        .await
    }

    async fn file_list_by_usage(&self, usage: UsageTag) -> SprintResult<Vec<FileRecord>> {
        self.query_docs(
            EntityKind::File,
            "SELECT doc FROM sprint_file WHERE usage = $1 AND NOT is_deleted \
             ORDER BY created_at ASC",
            &[&usage.as_db_str()],
        )
        .await
    }

    async fn file_set_usage(
        &self,
        id: FileId,
        usage: UsageTag,
        retention: Retention,
    ) -> SprintResult<Option<FileRecord>> {
        let updated_at = now_json()?;
        self.query_doc(
            EntityKind::File,
            "UPDATE sprint_file SET usage = $2, retention = $3, \
             doc = doc || jsonb_build_object('usage', $2::text, 'retention', $3::text, \
                                             'updated_at', $4::jsonb) \
             WHERE file_id = $1 RETURNING doc",
            &[
                &id.as_uuid(),
                &usage.as_db_str(),
                &retention.as_db_str(),
                &updated_at,
            ],
        )
        .await
    }

    async fn file_delete(&self, id: FileId) -> SprintResult<Option<FileRecord>> {
        self.query_doc(
            EntityKind::File,
            "DELETE FROM sprint_file WHERE file_id = $1 RETURNING doc",
            &[&id.as_uuid()],
        )
        .await
    }

    async fn file_delete_if_temporary(
        &self,
        id: FileId,
        cutoff: Timestamp,
    ) -> SprintResult<Option<FileRecord>> {
        self.query_doc(
            EntityKind::File,
            "DELETE FROM sprint_file \
             WHERE file_id = $1 AND retention = 'Temporary' AND created_at < $2 \
             RETURNING doc",
            &[&id.as_uuid(), &cutoff],
        )
        .await
    }

    async fn file_list_temporary_before(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> SprintResult<Vec<FileRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_docs(
            EntityKind::File,
            "SELECT doc FROM sprint_file \
             WHERE retention = 'Temporary' AND created_at < $1 \
             ORDER BY created_at ASC LIMIT $2",
            &[&cutoff, &limit],
        )
        .await
    }

    // === Events ===

    async fn event_insert(&self, event: &EventRecord) -> SprintResult<()> {
        let doc = encode(EntityKind::Event, event)?;
        self.insert(
            EntityKind::Event,
            event.event_id,
            "INSERT INTO sprint_event (event_id, is_deleted, event_date, doc) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (event_id) DO NOTHING",
            &[&event.event_id.as_uuid(), &event.is_deleted, &event.event_date, &doc],
        )
        .await
    }

    async fn event_get(&self, id: EventId) -> SprintResult<Option<EventRecord>> {
        self.query_doc(
            EntityKind::Event,
            "SELECT doc FROM sprint_event WHERE event_id = $1",
            &[&id.as_uuid()],
        )
        .await
    }

    async fn event_list(&self) -> SprintResult<Vec<EventRecord>> {
        self.query_docs(
            EntityKind::Event,
            "SELECT doc FROM sprint_event WHERE NOT is_deleted ORDER BY event_date ASC, event_id ASC",
            &[],
        )
        .await
    }

    async fn event_update(&self, event: &EventRecord) -> SprintResult<()> {
        let doc = encode(EntityKind::Event, event)?;
        let updated = self
            .execute(
                EntityKind::Event,
                "UPDATE sprint_event SET is_deleted = $2, event_date = $3, doc = $4 \
                 WHERE event_id = $1",
                &[&event.event_id.as_uuid(), &event.is_deleted, &event.event_date, &doc],
            )
            .await?;
        if updated == 0 {
            return Err(SprintError::not_found(EntityKind::Event, event.event_id));
        }
        Ok(())
    }

    // === Gallery ===

    async fn gallery_insert(&self, item: &GalleryItem) -> SprintResult<()> {
        let doc = encode(EntityKind::GalleryItem, item)?;
        self.insert(
            EntityKind::GalleryItem,
            item.item_id,
            "INSERT INTO sprint_gallery (item_id, is_deleted, created_at, doc) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (item_id) DO NOTHING",
            &[&item.item_id.as_uuid(), &item.is_deleted, &item.created_at, &doc],
        )
        .await
    }

    async fn gallery_get(&self, id: GalleryItemId) -> SprintResult<Option<GalleryItem>> {
        self.query_doc(
            EntityKind::GalleryItem,
            "SELECT doc FROM sprint_gallery WHERE item_id = $1",
            &[&id.as_uuid()],
        )
        .await
    }

    async fn gallery_list(&self) -> SprintResult<Vec<GalleryItem>> {
        self.query_docs(
            EntityKind::GalleryItem,
            "SELECT doc FROM sprint_gallery WHERE NOT is_deleted ORDER BY created_at DESC",
            &[],
        )
        .await
    }

    async fn gallery_update(&self, item: &GalleryItem) -> SprintResult<()> {
        let doc = encode(EntityKind::GalleryItem, item)?;
        let updated = self
            .execute(
                EntityKind::GalleryItem,
                "UPDATE sprint_gallery SET is_deleted = $2, doc = $3 WHERE item_id = $1",
                &[&item.item_id.as_uuid(), &item.is_deleted, &doc],
            )
            .await?;
        if updated == 0 {
            return Err(SprintError::not_found(EntityKind::GalleryItem, item.item_id));
        }
        Ok(())
    }

    // === Registrations ===

    async fn registration_insert(&self, registration: &RegistrationRecord) -> SprintResult<()> {
        let doc = encode(EntityKind::Registration, registration)?;
        let payment_status = registration.payment_status().map(|s| s.as_db_str());
        self.insert(
            EntityKind::Registration,
            registration.registration_id,
            "INSERT INTO sprint_registration \
             (registration_id, team_name, team_id, payment_status, is_deleted, created_at, doc) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (registration_id) DO NOTHING",
            &[
                &registration.registration_id.as_uuid(),
                &registration.team_name,
                &registration.team_id,
                &payment_status,
                &registration.is_deleted,
                &registration.created_at,
                &doc,
            ],
        )
        .await
    }

    async fn registration_get(
        &self,
        id: RegistrationId,
    ) -> SprintResult<Option<RegistrationRecord>> {
        self.query_doc(
            EntityKind::Registration,
            "SELECT doc FROM sprint_registration WHERE registration_id = $1",
            &[&id.as_uuid()],
        )
        .await
    }

    async fn registration_filter(
        &self,
        filter: &RegistrationFilter,
        page: PageRequest,
    ) -> SprintResult<(Vec<RegistrationRecord>, u64)> {
        let mut params: Vec<Box<dyn ToSql + Sync + Send>> =
            vec![Box::new(filter.is_deleted.unwrap_or(false))];
        let mut clauses = vec!["is_deleted = $1".to_string()];

        if let Some(name) = &filter.team_name {
            params.push(Box::new(name.to_lowercase()));
            clauses.push(format!("strpos(lower(team_name), ${}) > 0", params.len()));
        }
        if let Some(team_id) = &filter.team_id {
            params.push(Box::new(team_id.to_lowercase()));
            clauses.push(format!("strpos(lower(team_id), ${}) > 0", params.len()));
        }
        if let Some(status) = filter.payment_status {
            params.push(Box::new(status.as_db_str().to_string()));
            clauses.push(format!("payment_status = ${}", params.len()));
        }
        let where_sql = clauses.join(" AND ");

        let mut refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let client = self.conn().await?;
        let count_row = client
            .query_one(
                &format!("SELECT COUNT(*) FROM sprint_registration WHERE {}", where_sql),
                &refs,
            )
            .await
            .map_err(|e| query_error(EntityKind::Registration, e))?;
        let total: i64 = count_row
            .try_get(0)
            .map_err(|e| query_error(EntityKind::Registration, e))?;

        let limit = i64::from(page.limit);
        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
        refs.push(&limit);
        refs.push(&offset);
        let page_sql = format!(
            "SELECT doc FROM sprint_registration WHERE {} \
             ORDER BY created_at DESC, registration_id DESC LIMIT ${} OFFSET ${}",
            where_sql,
            refs.len() - 1,
            refs.len()
        );
        let rows = client
            .query(&page_sql, &refs)
            .await
            .map_err(|e| query_error(EntityKind::Registration, e))?;
        let items = rows
            .iter()
            .map(|r| decode(EntityKind::Registration, r))
            .collect::<SprintResult<Vec<RegistrationRecord>>>()?;

        Ok((items, u64::try_from(total).unwrap_or(0)))
    }

    async fn registration_set_payment(
        &self,
        id: RegistrationId,
        snapshot: PaymentSnapshot,
    ) -> SprintResult<Option<RegistrationRecord>> {
        let payment = encode(EntityKind::Registration, &snapshot)?;
        let updated_at = now_json()?;
        self.query_doc(
            EntityKind::Registration,
            "UPDATE sprint_registration SET payment_status = $2, \
             doc = doc || jsonb_build_object('payment', $3::jsonb, 'updated_at', $4::jsonb) \
             WHERE registration_id = $1 RETURNING doc",
            &[
                &id.as_uuid(),
                &snapshot.status.as_db_str(),
                &payment,
                &updated_at,
            ],
        )
        .await
    }

    async fn registration_set_team_id_if_absent(
        &self,
        id: RegistrationId,
        team_id: &str,
    ) -> SprintResult<Option<RegistrationRecord>> {
        let updated_at = now_json()?;
        let updated: Option<RegistrationRecord> = self
            .query_doc(
                EntityKind::Registration,
                "UPDATE sprint_registration SET team_id = $2, \
                 doc = doc || jsonb_build_object('team_id', $2::text, 'updated_at', $3::jsonb) \
                 WHERE registration_id = $1 AND team_id IS NULL RETURNING doc",
                &[&id.as_uuid(), &team_id, &updated_at],
            )
            .await?;
        match updated {
            Some(record) => Ok(Some(record)),
            // Already holds an id, or does not exist.
            None => self.registration_get(id).await,
        }
    }

    async fn registration_max_team_id(&self) -> SprintResult<Option<String>> {
        let client = self.conn().await?;
        let row = client
            .query_opt(
                "SELECT team_id FROM sprint_registration WHERE team_id ~ '^[0-9]+$' \
                 ORDER BY length(ltrim(team_id, '0')) DESC, ltrim(team_id, '0') DESC LIMIT 1",
                &[],
            )
            .await
            .map_err(|e| query_error(EntityKind::Registration, e))?;
        row.map(|r| r.try_get::<_, String>(0))
            .transpose()
            .map_err(|e| query_error(EntityKind::Registration, e))
    }

    // === Payments ===

    async fn payment_insert(&self, payment: &PaymentRecord) -> SprintResult<()> {
        let doc = encode(EntityKind::Payment, payment)?;
        self.insert(
            EntityKind::Payment,
            payment.payment_id,
            "INSERT INTO sprint_payment (payment_id, registration_id, status, created_at, doc) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (payment_id) DO NOTHING",
            &[
                &payment.payment_id.as_uuid(),
                &payment.registration_id.as_uuid(),
                &payment.status.as_db_str(),
                &payment.created_at,
                &doc,
            ],
        )
        .await
    }

    async fn payment_get(&self, id: PaymentId) -> SprintResult<Option<PaymentRecord>> {
        self.query_doc(
            EntityKind::Payment,
            "SELECT doc FROM sprint_payment WHERE payment_id = $1",
            &[&id.as_uuid()],
        )
        .await
    }

    async fn payment_update_status(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        new_status: PaymentStatus,
    ) -> SprintResult<Option<PaymentRecord>> {
        let updated_at = now_json()?;
        self.query_doc(
            EntityKind::Payment,
            "UPDATE sprint_payment SET status = $3, \
             doc = doc || jsonb_build_object('status', $3::text, 'updated_at', $4::jsonb) \
             WHERE payment_id = $1 AND status = $2 RETURNING doc",
            &[
                &id.as_uuid(),
                &expected.as_db_str(),
                &new_status.as_db_str(),
                &updated_at,
            ],
        )
        .await
    }

    async fn payments_for_registration(
        &self,
        id: RegistrationId,
    ) -> SprintResult<Vec<PaymentRecord>> {
        self.query_docs(
            EntityKind::Payment,
            "SELECT doc FROM sprint_payment WHERE registration_id = $1 \
             ORDER BY created_at ASC, payment_id ASC",
            &[&id.as_uuid()],
        )
        .await
    }

    // === Counters ===

    async fn counter_get(&self, name: &str) -> SprintResult<Option<String>> {
        let client = self.conn().await?;
        let row = client
            .query_opt("SELECT value FROM sprint_counter WHERE name = $1", &[&name])
            .await
            .map_err(|e| query_error(EntityKind::Registration, e))?;
        row.map(|r| r.try_get::<_, String>(0))
            .transpose()
            .map_err(|e| query_error(EntityKind::Registration, e))
    }

    async fn counter_compare_and_set(
        &self,
        name: &str,
        expected: Option<&str>,
        new_value: &str,
    ) -> SprintResult<bool> {
        let changed = match expected {
            None => {
                self.execute(
                    EntityKind::Registration,
                    "INSERT INTO sprint_counter (name, value) VALUES ($1, $2) \
                     ON CONFLICT (name) DO NOTHING",
                    &[&name, &new_value],
                )
                .await?
            }
            Some(current) => {
                self.execute(
                    EntityKind::Registration,
                    "UPDATE sprint_counter SET value = $3 WHERE name = $1 AND value = $2",
                    &[&name, &current, &new_value],
                )
                .await?
            }
        };
        Ok(changed == 1)
    }

    // === Health ===

    async fn ping(&self) -> SprintResult<()> {
        let client = self.conn().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| StorageError::Unavailable {
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
