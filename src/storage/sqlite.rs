use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{AnalysisRecord, AnalysisSummary, Invocation, Storage};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        Self::connect(options, config.max_connections).await
    }

    /// Create a private in-memory database.
    ///
    /// A single connection is used so every query sees the same database.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        Self::connect(options, 1).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn save_analysis(&self, record: &AnalysisRecord) -> StorageResult<()> {
        let result = serde_json::to_string(&record.outcome).map_err(|e| StorageError::Query {
            message: format!("Failed to serialize analysis: {}", e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO analyses (id, decision, reasoning, result, synthesis_summary, critical_flaws, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.decision)
        .bind(&record.reasoning)
        .bind(&result)
        .bind(&record.outcome.verdict.synthesis_summary)
        .bind(record.outcome.verdict.critical_flaws.len() as i64)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(analysis_id = %record.id, "Analysis stored");
        Ok(())
    }

    async fn get_analysis(&self, id: &str) -> StorageResult<Option<AnalysisRecord>> {
        let row: Option<AnalysisRow> = sqlx::query_as(
            r#"
            SELECT id, decision, reasoning, result, created_at
            FROM analyses
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AnalysisRecord::try_from).transpose()
    }

    async fn list_analyses(&self, limit: u32) -> StorageResult<Vec<AnalysisSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT id, decision, synthesis_summary, critical_flaws, created_at
            FROM analyses
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AnalysisSummary::try_from).collect()
    }

    async fn delete_analysis(&self, id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM analyses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn log_invocation(&self, invocation: &Invocation) -> StorageResult<()> {
        let input = serde_json::to_string(&invocation.input).unwrap_or_default();
        let output = invocation
            .output
            .as_ref()
            .map(|o| serde_json::to_string(o).unwrap_or_default());

        sqlx::query(
            r#"
            INSERT INTO invocations (id, analysis_id, tool_name, input, output, latency_ms, success, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invocation.id)
        .bind(&invocation.analysis_id)
        .bind(&invocation.tool_name)
        .bind(&input)
        .bind(&output)
        .bind(invocation.latency_ms)
        .bind(invocation.success)
        .bind(&invocation.error)
        .bind(invocation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_invocations(&self, limit: u32) -> StorageResult<Vec<Invocation>> {
        let rows: Vec<InvocationRow> = sqlx::query_as(
            r#"
            SELECT id, analysis_id, tool_name, input, output, latency_ms, success, error, created_at
            FROM invocations
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Invocation::try_from).collect()
    }
}

fn parse_timestamp(table: &str, id: &str, value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt {
            message: format!("{} {}: bad created_at {:?}: {}", table, id, value, e),
        })
}

fn parse_json(table: &str, id: &str, value: &str) -> StorageResult<serde_json::Value> {
    serde_json::from_str(value).map_err(|e| StorageError::Corrupt {
        message: format!("{} {}: {}", table, id, e),
    })
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct AnalysisRow {
    id: String,
    decision: String,
    reasoning: Option<String>,
    result: String,
    created_at: String,
}

impl TryFrom<AnalysisRow> for AnalysisRecord {
    type Error = StorageError;

    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        let outcome = serde_json::from_str(&row.result).map_err(|e| StorageError::Corrupt {
            message: format!("analysis {}: {}", row.id, e),
        })?;

        Ok(Self {
            created_at: parse_timestamp("analysis", &row.id, &row.created_at)?,
            id: row.id,
            decision: row.decision,
            reasoning: row.reasoning,
            outcome,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    decision: String,
    synthesis_summary: String,
    critical_flaws: i64,
    created_at: String,
}

impl TryFrom<SummaryRow> for AnalysisSummary {
    type Error = StorageError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            created_at: parse_timestamp("analysis", &row.id, &row.created_at)?,
            id: row.id,
            decision: row.decision,
            synthesis_summary: row.synthesis_summary,
            critical_flaws: row.critical_flaws,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InvocationRow {
    id: String,
    analysis_id: Option<String>,
    tool_name: String,
    input: String,
    output: Option<String>,
    latency_ms: Option<i64>,
    success: bool,
    error: Option<String>,
    created_at: String,
}

impl TryFrom<InvocationRow> for Invocation {
    type Error = StorageError;

    fn try_from(row: InvocationRow) -> Result<Self, Self::Error> {
        let input = parse_json("invocation", &row.id, &row.input)?;
        let output = row
            .output
            .as_deref()
            .map(|s| parse_json("invocation", &row.id, s))
            .transpose()?;

        Ok(Self {
            created_at: parse_timestamp("invocation", &row.id, &row.created_at)?,
            id: row.id,
            analysis_id: row.analysis_id,
            tool_name: row.tool_name,
            input,
            output,
            latency_ms: row.latency_ms,
            success: row.success,
            error: row.error,
        })
    }
}
