//! LanceDB-backed [`VectorIndex`].

use anyhow::{anyhow, Context, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashSet;
use std::sync::Arc;

use vidseek_core::traits::VectorIndex;
use vidseek_core::types::{IndexVector, SearchHit, SegmentId};

use crate::error::VectorIndexError;
use crate::schema::build_vector_schema;
use crate::table::{ensure_table, open_db, quoted_list};

/// Ids per `IN (...)` filter.
const FILTER_CHUNK: usize = 500;

pub struct LanceVectorIndex {
    conn: Connection,
    table_name: String,
    dim: usize,
}

impl LanceVectorIndex {
    pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
        let conn = open_db(uri).await?;
        ensure_table(&conn, table_name, build_vector_schema(dim as i32)).await?;
        Ok(Self { conn, table_name: table_name.to_string(), dim })
    }

    async fn table(&self) -> Result<Table> {
        Ok(self.conn.open_table(&self.table_name).execute().await?)
    }

    fn to_record_batch(&self, vectors: &[IndexVector]) -> Result<RecordBatch> {
        for v in vectors {
            if v.vector.len() != self.dim {
                return Err(VectorIndexError::DimensionMismatch { expected: self.dim, got: v.vector.len() }.into());
            }
        }
        let ids: Vec<String> = vectors.iter().map(|v| v.id.to_string()).collect();
        let values = vectors.iter().map(|v| Some(v.vector.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
        let batch = RecordBatch::try_new(
            build_vector_schema(self.dim as i32),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(values, self.dim as i32)),
            ],
        )?;
        Ok(batch)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("column '{name}' missing"))
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn upsert(&self, vectors: &[IndexVector]) -> Result<()> {
        if vectors.is_empty() {
            return Ok(());
        }
        let batch = self.to_record_batch(vectors)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let table = self.table().await?;
        let mut merge = table.merge_insert(&["id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge.execute(reader).await.context("merge_insert into vector table")?;
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(VectorIndexError::DimensionMismatch { expected: self.dim, got: query.len() }.into());
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let table = self.table().await?;
        let mut stream = table
            .vector_search(query.to_vec())?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = string_column(&batch, "id")?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow!("column '_distance' missing"))?;
            for i in 0..batch.num_rows() {
                let id: SegmentId = ids.value(i).parse().with_context(|| format!("bad id '{}'", ids.value(i)))?;
                hits.push(SearchHit { id, score: 1.0 - distances.value(i) });
            }
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        Ok(hits)
    }

    async fn existing_ids(&self, ids: &[SegmentId]) -> Result<HashSet<SegmentId>> {
        let mut found = HashSet::new();
        if ids.is_empty() {
            return Ok(found);
        }
        let table = self.table().await?;
        for chunk in ids.chunks(FILTER_CHUNK) {
            let strings: Vec<String> = chunk.iter().map(ToString::to_string).collect();
            let filter = format!("id IN ({})", quoted_list(strings.iter().map(String::as_str)));
            let mut stream = table
                .query()
                .only_if(filter)
                .select(Select::columns(&["id"]))
                .execute()
                .await?;
            while let Some(batch) = stream.try_next().await? {
                let col = string_column(&batch, "id")?;
                for i in 0..col.len() {
                    if let Ok(id) = col.value(i).parse() {
                        found.insert(id);
                    }
                }
            }
        }
        Ok(found)
    }

    async fn delete(&self, ids: &[SegmentId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let table = self.table().await?;
        for chunk in ids.chunks(FILTER_CHUNK) {
            let strings: Vec<String> = chunk.iter().map(ToString::to_string).collect();
            table.delete(&format!("id IN ({})", quoted_list(strings.iter().map(String::as_str)))).await?;
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.table().await?.count_rows(None).await?)
    }
}
