//! Typed data access
//!
//! Every query in the store is parameterized; nothing is ever interpolated
//! into SQL text. Each submodule owns the CRUD for one family of tables and
//! exposes `pub(crate)` connection-level functions (used inside cascade and
//! graph transactions) plus public [`DocumentStore`] methods that wrap them
//! in a lock or a transaction.

pub(crate) mod clusters;
pub(crate) mod documents;
pub(crate) mod embeddings;
pub(crate) mod entities;
pub(crate) mod graph;
pub(crate) mod ocr;

use std::str::FromStr;

use provstore_core::error::StoreError;
use rusqlite::types::Type;
use serde::de::DeserializeOwned;

/// Parse a TEXT column into a closed enum, surfacing bad stored values as
/// a column conversion failure rather than a panic
pub(crate) fn parse_enum<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = StoreError>,
{
    value
        .parse()
        .map_err(|e: StoreError| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a JSON TEXT column into a typed value
pub(crate) fn parse_json<T: DeserializeOwned>(idx: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Serialize a value into its JSON column form
pub(crate) fn to_json<T: serde::Serialize>(
    value: &T,
) -> provstore_core::error::Result<String> {
    Ok(serde_json::to_string(value)?)
}
