
use super::{ChunkMetadata, VectorRecord};
use crate::{RagError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Vector database store using LanceDB, one table per collection
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    table_name: String,
    vector_dimension: Option<usize>,
}

/// Search result from vector similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    /// The stored vector, needed for diversity reranking
    pub vector: Vec<f32>,
    /// Cosine similarity to the query vector
    pub similarity_score: f32,
}

impl VectorStore {
    /// Open the store and collection named in the configuration
    #[inline]
    pub async fn new(config: &Config) -> Result<Self, RagError> {
        Self::open(&config.vector_database_path(), &config.store.collection).await
    }

    /// Open (creating if needed) the store directory at `path`
    ///
    /// The collection table itself is created on the first insert, once the
    /// vector dimension is known.
    #[inline]
    pub async fn open(path: &Path, collection: &str) -> Result<Self, RagError> {
        debug!("Initializing LanceDB at path: {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = path.to_string_lossy();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let mut store = Self {
            connection,
            path: path.to_path_buf(),
            table_name: collection.to_string(),
            vector_dimension: None,
        };

        if store.table_exists().await? {
            let dim = store.detect_existing_vector_dimension().await?;
            info!(
                "Opened collection '{}' with vector dimension {}",
                store.table_name, dim
            );
            store.vector_dimension = Some(dim);
        } else {
            debug!("Collection '{}' does not exist yet", store.table_name);
        }

        Ok(store)
    }

    /// Delete the store directory and recreate it empty
    ///
    /// Returns whether a previous store was removed.
    #[inline]
    pub fn wipe(path: &Path) -> Result<bool, RagError> {
        let existed = path.exists();
        if existed {
            info!("Deleting vector store at {:?}", path);
            std::fs::remove_dir_all(path).map_err(|e| {
                RagError::Database(format!("Failed to delete vector store: {}", e))
            })?;
        }

        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!("Failed to recreate vector store directory: {}", e))
        })?;

        Ok(existed)
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn vector_dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    async fn table_exists(&self) -> Result<bool, RagError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table, RagError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize, RagError> {
        let table = self.open_table().await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return usize::try_from(*size).map_err(|_| {
                        RagError::Database(format!("Invalid vector dimension: {}", size))
                    });
                }
            }
        }

        Err(RagError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim,
                ),
                false,
            ),
            Field::new("source", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Append records to the collection
    ///
    /// Records are never updated in place; all records of a collection must
    /// share one vector dimension.
    #[inline]
    pub async fn add_records(&mut self, records: Vec<VectorRecord>) -> Result<(), RagError> {
        let Some(first) = records.first() else {
            debug!("No records to store");
            return Ok(());
        };

        let vector_dim = first.vector.len();
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(RagError::Database(format!(
                "Inconsistent vector dimensions in batch: {} and {}",
                vector_dim,
                bad.vector.len()
            )));
        }

        match self.vector_dimension {
            Some(existing) if existing != vector_dim => {
                return Err(RagError::Database(format!(
                    "Collection '{}' holds {}-dimensional vectors but the new records have {}; \
                     rebuild the store to change embedding models",
                    self.table_name, existing, vector_dim
                )));
            }
            Some(_) => {}
            None => {
                self.create_table(vector_dim).await?;
                self.vector_dimension = Some(vector_dim);
            }
        }

        debug!("Storing batch of {} records", records.len());

        let record_batch = Self::create_record_batch(&records, vector_dim)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert records: {}", e)))?;

        info!(
            "Stored {} records in collection '{}'",
            records.len(),
            self.table_name
        );
        Ok(())
    }

    async fn create_table(&self, vector_dim: usize) -> Result<(), RagError> {
        let dim = i32::try_from(vector_dim)
            .map_err(|_| RagError::Database(format!("Vector dimension too large: {}", vector_dim)))?;

        info!(
            "Creating collection '{}' with {} dimensions",
            self.table_name, vector_dim
        );

        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(dim))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    /// Create a RecordBatch from vector records
    fn create_record_batch(
        records: &[VectorRecord],
        vector_dim: usize,
    ) -> Result<RecordBatch, RagError> {
        let dim = i32::try_from(vector_dim)
            .map_err(|_| RagError::Database(format!("Vector dimension too large: {}", vector_dim)))?;
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut sources = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            sources.push(record.metadata.source.as_str());
            contents.push(record.metadata.content.as_str());
            chunk_indices.push(record.metadata.chunk_index);
            created_ats.push(record.metadata.created_at.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(field, dim, Arc::new(values_array), None)
            .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(dim), arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Find the `limit` records closest to `query_vector` by cosine distance
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, RagError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        if self.vector_dimension.is_none() || limit == 0 {
            debug!("Collection '{}' is empty, nothing to search", self.table_name);
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;
        let mut results = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results", search_results.len());
        Ok(search_results)
    }

    /// Read every record's metadata, in storage order
    #[inline]
    pub async fn list_records(&self) -> Result<Vec<ChunkMetadata>, RagError> {
        let total = self.count().await?;
        if total == 0 {
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;
        let mut results = table
            .query()
            .limit(usize::try_from(total).unwrap_or(usize::MAX))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to scan table: {}", e)))?;

        let mut records = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            records.extend(
                Self::parse_search_batch(&batch)?
                    .into_iter()
                    .map(|r| r.chunk_metadata),
            );
        }

        Ok(records)
    }

    /// Distinct document sources in the collection, sorted
    #[inline]
    pub async fn sources(&self) -> Result<Vec<String>, RagError> {
        let mut sources: Vec<String> = self
            .list_records()
            .await?
            .into_iter()
            .map(|metadata| metadata.source)
            .collect();
        sources.sort_unstable();
        sources.dedup();
        Ok(sources)
    }

    /// Get the total number of records stored
    #[inline]
    pub async fn count(&self) -> Result<u64, RagError> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Parse a single record batch from a search or scan
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, RagError> {
        let sources = string_column(batch, "source")?;
        let contents = string_column(batch, "content")?;
        let created_ats = string_column(batch, "created_at")?;

        let chunk_indices = batch
            .column_by_name("chunk_index")
            .ok_or_else(|| RagError::Database("Missing chunk_index column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| RagError::Database("Invalid chunk_index column type".to_string()))?;

        let vectors = batch
            .column_by_name("vector")
            .ok_or_else(|| RagError::Database("Missing vector column".to_string()))?
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .ok_or_else(|| RagError::Database("Invalid vector column type".to_string()))?;

        // Only present for vector searches
        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut search_results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let vector_values = vectors.value(row);
            let vector = vector_values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| RagError::Database("Invalid vector value type".to_string()))?
                .values()
                .to_vec();

            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            search_results.push(SearchResult {
                chunk_metadata: ChunkMetadata {
                    source: sources.value(row).to_string(),
                    content: contents.value(row).to_string(),
                    chunk_index: chunk_indices.value(row),
                    created_at: created_ats.value(row).to_string(),
                },
                vector,
                // Cosine distance is 1 - cosine similarity
                similarity_score: 1.0 - distance,
            });
        }

        Ok(search_results)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, RagError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}
