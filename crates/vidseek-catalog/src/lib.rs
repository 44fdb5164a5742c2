//! SQLite catalog: the system of record for source files and segments.
//!
//! Two tables, `source_files` and `contents`, with `contents.source_file_id`
//! cascading on delete. The schema is applied by the embedded migrations when
//! connecting.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;

use vidseek_core::traits::{Catalog, CatalogWriter};
use vidseek_core::types::{
    NewSegment, NewSourceFile, Segment, SegmentId, SegmentWithSource, SourceFile, SourceFileId,
};

mod rows;

use rows::{
    meta_to_text, millis_to_datetime, JoinedRow, SegmentRow, SourceFileRow, JOINED_COLUMNS, SEGMENT_COLUMNS,
    SOURCE_FILE_COLUMNS,
};

/// Bind parameters per `IN (...)` query, under SQLite's variable limit.
const MAX_IN_PARAMS: usize = 500;

#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Connect to `url` (e.g. `sqlite://vidseek.db`), creating the file and
    /// schema when missing.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid catalog url '{url}'"))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("opening catalog {url}"))?;
        sqlx::migrate!("./migrations").run(&pool).await.context("running catalog migrations")?;
        tracing::info!(url, "catalog ready");
        Ok(Self { pool })
    }

    pub async fn connect_path(path: &Path) -> Result<Self> {
        Self::connect(&format!("sqlite://{}", path.display())).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn begin(&self) -> Result<Box<dyn CatalogWriter>> {
        let tx = self.pool.begin().await.context("starting catalog transaction")?;
        Ok(Box::new(SqliteWriter { tx }))
    }

    async fn get_segments_by_ids(&self, ids: &[SegmentId]) -> Result<Vec<SegmentWithSource>> {
        let mut out = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IN_PARAMS) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {JOINED_COLUMNS} FROM contents c \
                 JOIN source_files s ON s.id = c.source_file_id \
                 WHERE c.id IN ("
            ));
            let mut list = qb.separated(", ");
            for id in chunk {
                list.push_bind(id.to_string());
            }
            list.push_unseparated(") ORDER BY c.rowid");
            let rows: Vec<JoinedRow> = qb.build_query_as().fetch_all(&self.pool).await?;
            for row in rows {
                out.push(SegmentWithSource::try_from(row)?);
            }
        }
        Ok(out)
    }

    async fn get_source_file(&self, id: SourceFileId) -> Result<Option<SourceFile>> {
        let query = format!("SELECT {SOURCE_FILE_COLUMNS} FROM source_files WHERE id = ?");
        let row: Option<SourceFileRow> =
            sqlx::query_as(&query).bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.map(SourceFile::try_from).transpose()
    }

    async fn list_source_files(&self) -> Result<Vec<SourceFile>> {
        let query = format!("SELECT {SOURCE_FILE_COLUMNS} FROM source_files ORDER BY created_at, id");
        let rows: Vec<SourceFileRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        rows.into_iter().map(SourceFile::try_from).collect()
    }

    async fn find_source_files_by_path(&self, file_path: &str) -> Result<Vec<SourceFile>> {
        let query =
            format!("SELECT {SOURCE_FILE_COLUMNS} FROM source_files WHERE file_path = ? ORDER BY created_at, id");
        let rows: Vec<SourceFileRow> = sqlx::query_as(&query).bind(file_path).fetch_all(&self.pool).await?;
        rows.into_iter().map(SourceFile::try_from).collect()
    }

    async fn count_segments(&self, source_file_id: SourceFileId) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contents WHERE source_file_id = ?")
            .bind(source_file_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn list_segments(&self, after: Option<SegmentId>, limit: usize) -> Result<Vec<Segment>> {
        let query = format!(
            "SELECT {SEGMENT_COLUMNS} FROM contents WHERE (?1 IS NULL OR id > ?1) ORDER BY id LIMIT ?2"
        );
        let rows: Vec<SegmentRow> = sqlx::query_as(&query)
            .bind(after.map(|id| id.to_string()))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Segment::try_from).collect()
    }

    async fn delete_source_file(&self, id: SourceFileId) -> Result<Option<Vec<SegmentId>>> {
        let mut tx = self.pool.begin().await?;
        let segment_ids: Vec<(String,)> = sqlx::query_as("SELECT id FROM contents WHERE source_file_id = ?")
            .bind(id.to_string())
            .fetch_all(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM source_files WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        tx.commit().await?;
        let ids = segment_ids
            .into_iter()
            .map(|(s,)| s.parse::<SegmentId>().with_context(|| format!("bad segment id '{s}'")))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(source_file = %id, segments = ids.len(), "deleted source file");
        Ok(Some(ids))
    }
}

/// Writes of one ingestion unit. Dropping the writer rolls the transaction back.
pub struct SqliteWriter {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl CatalogWriter for SqliteWriter {
    async fn create_source_file(&mut self, new: NewSourceFile) -> Result<SourceFile> {
        let id = SourceFileId::generate();
        let created_at = millis_to_datetime(Utc::now().timestamp_millis())?;
        let metadata = meta_to_text(new.metadata_info.as_ref())?;
        sqlx::query(
            "INSERT INTO source_files (id, filename, file_type, file_path, author, created_at, metadata_info) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&new.filename)
        .bind(&new.file_type)
        .bind(new.file_path.as_deref())
        .bind(new.author.as_deref())
        .bind(created_at.timestamp_millis())
        .bind(metadata)
        .execute(&mut *self.tx)
        .await
        .context("inserting source file")?;
        Ok(SourceFile {
            id,
            filename: new.filename,
            file_type: new.file_type,
            file_path: new.file_path,
            author: new.author,
            created_at,
            metadata_info: new.metadata_info,
        })
    }

    async fn create_segment(&mut self, new: NewSegment) -> Result<Segment> {
        let id = SegmentId::generate();
        let custom = serde_json::to_string(&new.custom).context("encoding segment attributes")?;
        sqlx::query("INSERT INTO contents (id, source_file_id, type, content, custom) VALUES (?, ?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(new.source_file_id.to_string())
            .bind(new.kind.as_str())
            .bind(&new.content)
            .bind(custom)
            .execute(&mut *self.tx)
            .await
            .context("inserting segment")?;
        Ok(Segment { id, source_file_id: new.source_file_id, kind: new.kind, content: new.content, custom: new.custom })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let SqliteWriter { tx } = *self;
        tx.commit().await.context("committing catalog transaction")
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let SqliteWriter { tx } = *self;
        tx.rollback().await.context("rolling back catalog transaction")
    }
}
