use super::{ColumnType, Loader, ROW_COLUMNS};
use crate::error::{PipelineError, Result};
use crate::normalize::model::NormalizedRow;
use crate::utils::validate_table_name;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqliteConnection, SqlitePool,
};
use std::{collections::HashSet, str::FromStr};
use tracing::{debug, info};

/// Embedded store. Each call appends its batch in a single transaction.
#[derive(Debug, Clone)]
pub struct SqliteLoader {
    pool: SqlitePool,
}

impl SqliteLoader {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| PipelineError::Config(format!("invalid sqlite url {database_url:?}: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| PipelineError::DestinationWrite(format!("failed to open {database_url}: {e}")))?;

        Ok(SqliteLoader { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn sql_type(kind: ColumnType) -> &'static str {
    match kind {
        ColumnType::Text | ColumnType::Timestamp => "TEXT",
        ColumnType::Integer | ColumnType::Boolean => "INTEGER",
    }
}

fn create_table_sql(table_name: &str) -> String {
    let columns = ROW_COLUMNS
        .iter()
        .map(|c| {
            let not_null = if c.required { " NOT NULL" } else { "" };
            format!("\"{}\" {}{}", c.name, sql_type(c.kind), not_null)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE \"{table_name}\" ({columns})")
}

fn insert_sql(table_name: &str) -> String {
    let names = ROW_COLUMNS
        .iter()
        .map(|c| format!("\"{}\"", c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let params = vec!["?"; ROW_COLUMNS.len()].join(", ");
    format!("INSERT INTO \"{table_name}\" ({names}) VALUES ({params})")
}

/// Creates the table when it is missing, otherwise checks that every row column exists.
/// Column names compare case-insensitively, as SQLite resolves them.
async fn ensure_table(conn: &mut SqliteConnection, table_name: &str) -> Result<()> {
    let existing: HashSet<String> = sqlx::query(&format!("PRAGMA table_info(\"{table_name}\")"))
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(|row| row.try_get::<String, _>("name").map(|name| name.to_ascii_lowercase()))
        .collect::<std::result::Result<_, _>>()?;

    if existing.is_empty() {
        debug!(table = %table_name, "Creating table");
        sqlx::query(&create_table_sql(table_name))
            .execute(&mut *conn)
            .await?;
        return Ok(());
    }

    let missing: Vec<&str> = ROW_COLUMNS
        .iter()
        .map(|c| c.name)
        .filter(|name| !existing.contains(&name.to_ascii_lowercase()))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::SchemaDrift {
            table: table_name.to_string(),
            detail: format!("missing columns: {}", missing.join(", ")),
        });
    }

    Ok(())
}

impl Loader for SqliteLoader {
    async fn load(&self, rows: &[NormalizedRow], table_name: &str) -> Result<u64> {
        validate_table_name(table_name)?;
        if rows.is_empty() {
            info!(table = %table_name, "No rows to load");
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        ensure_table(&mut tx, table_name).await?;

        let sql = insert_sql(table_name);
        let mut written = 0u64;
        for row in rows {
            let result = sqlx::query(&sql)
                .bind(row.video_id.as_str())
                .bind(row.trending_at.as_str())
                .bind(row.title.as_deref())
                .bind(row.published_at.as_deref())
                .bind(row.channel_id.as_deref())
                .bind(row.channel_title.as_deref())
                .bind(row.description.as_deref())
                .bind(row.tags.as_deref())
                .bind(row.default_audio_language.as_deref())
                .bind(row.caption)
                .bind(row.view_count)
                .bind(row.like_count)
                .bind(row.comment_count)
                .bind(row.duration_sec)
                .bind(row.category.as_deref())
                .bind(row.thumbnail_url.as_deref())
                .execute(&mut *tx)
                .await?;
            written += result.rows_affected();
        }

        // dropping the transaction before this point rolls every insert back
        tx.commit().await?;

        info!(table = %table_name, rows = written, "Loaded rows into sqlite");
        Ok(written)
    }
}
