// Repository layer for the core's persisted state: connectors, OAuth
// providers, ingestion jobs, and MCP tools (spec.md §4.6-§4.8).

use assistant_contracts::{
    Connector, ConnectorStatus, DiscoveredTool, IngestionJob, IngestionJobMetadata, OAuthProvider,
    PartialToolUpdateResult, SourceApp, Tool, ToolStatusUpdate, ToolUpdateFailure,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::models::{
    app_to_text, auth_mode_to_text, connector_status_to_text, job_status_to_text, ConnectorRow,
    IngestionJobRow, NewConnector, NewOAuthProvider, OAuthProviderRow, ToolRow,
};

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies `migrations/` (embedded at compile time) against the pool.
    /// Idempotent — sqlx tracks applied versions in `_sqlx_migrations` and
    /// skips anything already run, so this is safe to call on every boot.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(StorageError::Migration)
    }

    // ============================================
    // Connectors (§4.6)
    // ============================================

    pub async fn create_connector(&self, input: NewConnector) -> Result<Connector> {
        let row = sqlx::query_as::<_, ConnectorRow>(
            r#"
            INSERT INTO connectors
                (external_id, tenant_id, owner_user_id, app, auth_mode, status,
                 credentials_encrypted, subject_identity)
            VALUES ($1, $2, $3, $4, $5, 'not_connected', $6, $7)
            RETURNING id, external_id, tenant_id, owner_user_id, app, auth_mode, status,
                      credentials_encrypted, subject_identity, created_at, updated_at, deleted_at
            "#,
        )
        .bind(&input.external_id)
        .bind(input.tenant_id)
        .bind(input.owner_user_id)
        .bind(app_to_text(input.app))
        .bind(auth_mode_to_text(input.auth_mode))
        .bind(&input.credentials_encrypted)
        .bind(&input.subject_identity)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_connector()?)
    }

    pub async fn get_connector(&self, id: Uuid) -> Result<Option<Connector>> {
        let row = sqlx::query_as::<_, ConnectorRow>(
            r#"
            SELECT id, external_id, tenant_id, owner_user_id, app, auth_mode, status,
                   credentials_encrypted, subject_identity, created_at, updated_at, deleted_at
            FROM connectors
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ConnectorRow::into_connector).transpose().map_err(Into::into)
    }

    pub async fn get_connector_by_external_id(&self, external_id: &str) -> Result<Option<Connector>> {
        let row = sqlx::query_as::<_, ConnectorRow>(
            r#"
            SELECT id, external_id, tenant_id, owner_user_id, app, auth_mode, status,
                   credentials_encrypted, subject_identity, created_at, updated_at, deleted_at
            FROM connectors
            WHERE external_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ConnectorRow::into_connector).transpose().map_err(Into::into)
    }

    /// Returns non-deleted connectors visible to `owner_user_id` within `tenant_id`.
    pub async fn list_connectors(&self, tenant_id: Uuid, owner_user_id: Uuid) -> Result<Vec<Connector>> {
        let rows = sqlx::query_as::<_, ConnectorRow>(
            r#"
            SELECT id, external_id, tenant_id, owner_user_id, app, auth_mode, status,
                   credentials_encrypted, subject_identity, created_at, updated_at, deleted_at
            FROM connectors
            WHERE tenant_id = $1 AND owner_user_id = $2 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(ConnectorRow::into_connector)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    pub async fn update_connector_status(
        &self,
        external_id: &str,
        status: ConnectorStatus,
    ) -> Result<Connector> {
        let row = sqlx::query_as::<_, ConnectorRow>(
            r#"
            UPDATE connectors
            SET status = $2, updated_at = NOW()
            WHERE external_id = $1 AND deleted_at IS NULL
            RETURNING id, external_id, tenant_id, owner_user_id, app, auth_mode, status,
                      credentials_encrypted, subject_identity, created_at, updated_at, deleted_at
            "#,
        )
        .bind(external_id)
        .bind(connector_status_to_text(status))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::ConnectorNotFound)?;

        Ok(row.into_connector()?)
    }

    pub async fn set_connector_credentials(
        &self,
        id: Uuid,
        credentials_encrypted: Vec<u8>,
        subject_identity: Option<String>,
    ) -> Result<Connector> {
        let row = sqlx::query_as::<_, ConnectorRow>(
            r#"
            UPDATE connectors
            SET credentials_encrypted = $2, subject_identity = COALESCE($3, subject_identity), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, external_id, tenant_id, owner_user_id, app, auth_mode, status,
                      credentials_encrypted, subject_identity, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .bind(&credentials_encrypted)
        .bind(&subject_identity)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::ConnectorNotFound)?;

        Ok(row.into_connector()?)
    }

    /// Soft-deletes the connector, cascading to its tools (hard-deleted)
    /// and its active ingestion jobs (cancelled) — spec.md §4.6's
    /// `DeleteConnector` guarantee, all inside one transaction.
    pub async fn delete_connector(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE connectors SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM tools WHERE connector_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE ingestion_jobs SET status = 'cancelled', updated_at = NOW() \
             WHERE connector_id = $1 AND status IN ('pending', 'running')",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    // ============================================
    // OAuth providers (§4.6)
    // ============================================

    /// Records provider credentials. A second global provider for the same
    /// `(workspace_id, app)` is rejected by a partial unique index rather
    /// than a check-then-insert race (Open Question decision 2).
    pub async fn create_oauth_provider(&self, input: NewOAuthProvider) -> Result<OAuthProvider> {
        let row = sqlx::query_as::<_, OAuthProviderRow>(
            r#"
            INSERT INTO oauth_providers (workspace_id, app, client_id, client_secret_encrypted, scopes, is_global)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, workspace_id, app, client_id, client_secret_encrypted, scopes, is_global
            "#,
        )
        .bind(input.workspace_id)
        .bind(app_to_text(input.app))
        .bind(&input.client_id)
        .bind(&input.client_secret_encrypted)
        .bind(&input.scopes)
        .bind(input.is_global)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::DuplicateGlobalProvider
            } else {
                StorageError::Database(e)
            }
        })?;

        Ok(row.into_oauth_provider()?)
    }

    /// Resolves the provider for a connector's app: a workspace-scoped
    /// provider first, falling back to the global one for that app.
    pub async fn find_provider_for_app(
        &self,
        workspace_id: Uuid,
        app: SourceApp,
    ) -> Result<Option<OAuthProvider>> {
        let row = sqlx::query_as::<_, OAuthProviderRow>(
            r#"
            SELECT id, workspace_id, app, client_id, client_secret_encrypted, scopes, is_global
            FROM oauth_providers
            WHERE app = $1 AND (workspace_id = $2 OR is_global)
            ORDER BY is_global ASC
            LIMIT 1
            "#,
        )
        .bind(app_to_text(app))
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OAuthProviderRow::into_oauth_provider).transpose().map_err(Into::into)
    }

    // ============================================
    // Ingestion jobs (§4.7)
    // ============================================

    /// Creates a job for `(user_id, connector_id)` only if none is
    /// currently `pending`/`running`, inside a single round-trip
    /// transaction — spec.md §4.7's at-most-one-active invariant.
    pub async fn create_ingestion_job_if_absent(
        &self,
        user_id: Uuid,
        connector_id: Uuid,
    ) -> Result<IngestionJob> {
        let mut tx = self.pool.begin().await?;

        let active: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM ingestion_jobs \
             WHERE user_id = $1 AND connector_id = $2 AND status IN ('pending', 'running') \
             FOR UPDATE",
        )
        .bind(user_id)
        .bind(connector_id)
        .fetch_optional(&mut *tx)
        .await?;

        if active.is_some() {
            tx.rollback().await?;
            return Err(StorageError::IngestionAlreadyRunning);
        }

        let metadata = IngestionJobMetadata::default();
        let insert_result = sqlx::query_as::<_, IngestionJobRow>(
            r#"
            INSERT INTO ingestion_jobs (user_id, connector_id, status, metadata)
            VALUES ($1, $2, 'pending', $3)
            RETURNING id, user_id, connector_id, status, metadata, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(connector_id)
        .bind(sqlx::types::Json(&metadata))
        .fetch_one(&mut *tx)
        .await;

        let row = match insert_result {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                return Err(StorageError::IngestionAlreadyRunning);
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;
        Ok(row.into_ingestion_job()?)
    }

    pub async fn get_ingestion_job(&self, id: Uuid) -> Result<Option<IngestionJob>> {
        let row = sqlx::query_as::<_, IngestionJobRow>(
            r#"
            SELECT id, user_id, connector_id, status, metadata, created_at, updated_at
            FROM ingestion_jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(IngestionJobRow::into_ingestion_job).transpose().map_err(Into::into)
    }

    /// Overwrites the job's `metadata` document. Per spec.md §5, writes to
    /// `ingestionState` are linearized by the single owning worker — this
    /// method doesn't itself provide that linearization, the caller must
    /// ensure only one worker updates a given job concurrently.
    pub async fn update_ingestion_job_metadata(
        &self,
        id: Uuid,
        metadata: &IngestionJobMetadata,
    ) -> Result<Option<IngestionJob>> {
        let row = sqlx::query_as::<_, IngestionJobRow>(
            r#"
            UPDATE ingestion_jobs
            SET metadata = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, connector_id, status, metadata, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(sqlx::types::Json(metadata))
        .fetch_optional(&self.pool)
        .await?;

        row.map(IngestionJobRow::into_ingestion_job).transpose().map_err(Into::into)
    }

    pub async fn update_ingestion_job_status(
        &self,
        id: Uuid,
        status: assistant_contracts::IngestionJobStatus,
    ) -> Result<Option<IngestionJob>> {
        let row = sqlx::query_as::<_, IngestionJobRow>(
            r#"
            UPDATE ingestion_jobs
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, connector_id, status, metadata, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(job_status_to_text(status))
        .fetch_optional(&self.pool)
        .await?;

        row.map(IngestionJobRow::into_ingestion_job).transpose().map_err(Into::into)
    }

    // ============================================
    // Tools (§4.8)
    // ============================================

    /// Atomically replaces the connector's tool catalog with `discovered`
    /// — spec.md §4.8 step 3's "synchronizes the persisted tool set".
    pub async fn sync_connector_tools(
        &self,
        workspace_id: Uuid,
        connector_id: Uuid,
        discovered: &[DiscoveredTool],
    ) -> Result<Vec<Tool>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tools WHERE connector_id = $1")
            .bind(connector_id)
            .execute(&mut *tx)
            .await?;

        let mut rows = Vec::with_capacity(discovered.len());
        for tool in discovered {
            let row = sqlx::query_as::<_, ToolRow>(
                r#"
                INSERT INTO tools (workspace_id, connector_id, name, schema, description, enabled)
                VALUES ($1, $2, $3, $4, $5, true)
                RETURNING id, workspace_id, connector_id, name, schema, description, enabled, created_at, updated_at
                "#,
            )
            .bind(workspace_id)
            .bind(connector_id)
            .bind(&tool.name)
            .bind(sqlx::types::Json(&tool.schema))
            .bind(&tool.description)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }

        tx.commit().await?;
        Ok(rows.into_iter().map(ToolRow::into_tool).collect())
    }

    pub async fn list_enabled_tools_for_connector(&self, connector_id: Uuid) -> Result<Vec<Tool>> {
        let rows = sqlx::query_as::<_, ToolRow>(
            r#"
            SELECT id, workspace_id, connector_id, name, schema, description, enabled, created_at, updated_at
            FROM tools
            WHERE connector_id = $1 AND enabled
            ORDER BY name
            "#,
        )
        .bind(connector_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ToolRow::into_tool).collect())
    }

    pub async fn list_tools_for_workspace(&self, workspace_id: Uuid) -> Result<Vec<Tool>> {
        let rows = sqlx::query_as::<_, ToolRow>(
            r#"
            SELECT id, workspace_id, connector_id, name, schema, description, enabled, created_at, updated_at
            FROM tools
            WHERE workspace_id = $1
            ORDER BY name
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ToolRow::into_tool).collect())
    }

    /// Mutates enable flags one row per transaction; a single tool's
    /// failure doesn't abort the rest (spec.md §4.8's partial-success
    /// shape).
    pub async fn update_tools_status(
        &self,
        workspace_id: Uuid,
        updates: Vec<ToolStatusUpdate>,
    ) -> Result<PartialToolUpdateResult> {
        let mut result = PartialToolUpdateResult::default();

        for update in updates {
            let outcome = sqlx::query(
                "UPDATE tools SET enabled = $2, updated_at = NOW() WHERE id = $1 AND workspace_id = $3",
            )
            .bind(update.tool_id)
            .bind(update.enabled)
            .bind(workspace_id)
            .execute(&self.pool)
            .await;

            match outcome {
                Ok(r) if r.rows_affected() > 0 => result.updated.push(update.tool_id),
                Ok(_) => result.failed.push(ToolUpdateFailure {
                    tool_id: update.tool_id,
                    reason: "tool not found".to_string(),
                }),
                Err(e) => result.failed.push(ToolUpdateFailure {
                    tool_id: update.tool_id,
                    reason: e.to_string(),
                }),
            }
        }

        Ok(result)
    }
}
