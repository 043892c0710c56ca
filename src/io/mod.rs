//! Readers and writers over object storage and the embedded query engine
//!
//! - [`ObjectStorage`]: bucket/key get and put over `object_store`, with the
//!   backing store for each bucket supplied by a [`StoreProvider`]
//! - [`DuckDbReader`] / [`DuckDbS3Reader`]: SQL queries through an in-memory
//!   DuckDB connection, optionally authenticated against S3

mod query;
mod storage;

pub use query::{
    classify_query_error, AuthType, DuckDbReader, DuckDbS3Reader, QueryRetryPolicy,
};
pub use storage::{
    tag_set, InMemoryStoreProvider, ObjectStorage, S3StoreProvider, StoreProvider, Tags,
};

use crate::error::Result;
use crate::types::JsonObject;
use async_trait::async_trait;
use bytes::Bytes;

/// Reads whole objects from a bucket
#[async_trait]
pub trait Reader: Send + Sync {
    async fn read(&self, bucket: &str, key: &str) -> Result<Bytes>;
}

/// Writes whole objects to a bucket
#[async_trait]
pub trait Writer: Send + Sync {
    /// Upload `body` to `bucket/key`, attaching `tags` if given
    async fn write(&self, bucket: &str, key: &str, body: Bytes, tags: Option<&Tags>)
        -> Result<()>;
}

/// Runs SQL and returns one JSON object per row
pub trait QueryReader {
    fn read(&self, query: &str, params: &[duckdb::types::Value]) -> Result<Vec<JsonObject>>;
}

#[cfg(test)]
mod tests;
