//! Persistent store contract.
//!
//! The store is an opaque table-oriented key-value service. Callers only ever
//! need equality lookups, upserts keyed on a column set, plain inserts and
//! counter RPCs, so that is all the contract exposes.

use async_trait::async_trait;
use rankgrid_core::{RankgridResult, StorageError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;

/// A table row: column name to JSON value.
pub type Row = Map<String, Value>;

/// Equality predicate on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column).unwrap_or(&Value::Null) == &self.value
    }
}

/// Additive update of integer counters on the row identified by `key`.
///
/// When no row matches, one is created from the key columns with every
/// incremented column starting at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterUpdate {
    pub table: String,
    pub key: Vec<Filter>,
    pub increments: Vec<(String, i64)>,
}

impl CounterUpdate {
    pub fn new(table: impl Into<String>, key: Vec<Filter>) -> Self {
        Self {
            table: table.into(),
            key,
            increments: Vec::new(),
        }
    }

    pub fn add(mut self, column: impl Into<String>, amount: i64) -> Self {
        self.increments.push((column.into(), amount));
        self
    }

    /// Same update with every amount negated.
    pub fn reversed(&self) -> Self {
        Self {
            table: self.table.clone(),
            key: self.key.clone(),
            increments: self
                .increments
                .iter()
                .map(|(column, amount)| (column.clone(), -amount))
                .collect(),
        }
    }

    pub fn amount_for(&self, column: &str) -> i64 {
        self.increments
            .iter()
            .filter(|(c, _)| c == column)
            .map(|(_, amount)| amount)
            .sum()
    }
}

/// Upper bound on a counter column after an increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterLimit {
    pub column: String,
    pub limit: i64,
}

impl CounterLimit {
    pub fn new(column: impl Into<String>, limit: i64) -> Self {
        Self {
            column: column.into(),
            limit,
        }
    }
}

/// Result of a conditional counter increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterOutcome {
    /// Every limit held; the increments were written.
    Applied,
    /// The first violated limit. Nothing was written.
    Rejected {
        column: String,
        current: i64,
        limit: i64,
    },
}

impl CounterOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Table-oriented store used by the ledger, the recorder and the cache.
#[async_trait]
pub trait KvStore: Send + Sync + Debug {
    /// Rows matching every filter, in insertion order.
    async fn select(&self, table: &str, filters: &[Filter]) -> RankgridResult<Vec<Row>>;

    /// Insert `row`, replacing any row that agrees on every `conflict_key` column.
    async fn upsert(&self, table: &str, row: Row, conflict_key: &[&str]) -> RankgridResult<()>;

    async fn insert(&self, table: &str, row: Row) -> RankgridResult<()>;

    async fn increment(&self, update: &CounterUpdate) -> RankgridResult<()>;

    /// Apply `update` only if, for every limit, `current + amount <= limit`.
    ///
    /// Check and write happen as one indivisible step.
    async fn increment_within_limits(
        &self,
        update: &CounterUpdate,
        limits: &[CounterLimit],
    ) -> RankgridResult<CounterOutcome>;
}

/// Serialize a typed row for `table`.
pub fn to_row<T: Serialize>(table: &str, value: &T) -> RankgridResult<Row> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StorageError::Serialization {
            table: table.to_string(),
            reason: format!("expected an object, got {}", other),
        }
        .into()),
        Err(e) => Err(StorageError::Serialization {
            table: table.to_string(),
            reason: e.to_string(),
        }
        .into()),
    }
}

/// Deserialize a row read from `table`.
pub fn from_row<T: DeserializeOwned>(table: &str, row: Row) -> RankgridResult<T> {
    serde_json::from_value(Value::Object(row)).map_err(|e| {
        StorageError::Serialization {
            table: table.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// First row matching `filters`, decoded.
pub async fn select_one<T: DeserializeOwned>(
    store: &dyn KvStore,
    table: &str,
    filters: &[Filter],
) -> RankgridResult<Option<T>> {
    match store.select(table, filters).await?.into_iter().next() {
        Some(row) => from_row(table, row).map(Some),
        None => Ok(None),
    }
}
