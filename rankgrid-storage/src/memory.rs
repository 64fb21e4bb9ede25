//! In-process [`KvStore`] backed by a `RwLock`ed table map.
//!
//! Lock sections are short and synchronous; no guard is held across an
//! `.await`.

use crate::store::{CounterLimit, CounterOutcome, CounterUpdate, Filter, KvStore, Row};
use async_trait::async_trait;
use rankgrid_core::{RankgridResult, StorageError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.read()
            .map(|tables| tables.get(table).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn read(&self) -> RankgridResult<RwLockReadGuard<'_, HashMap<String, Vec<Row>>>> {
        self.tables
            .read()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    fn write(&self) -> RankgridResult<RwLockWriteGuard<'_, HashMap<String, Vec<Row>>>> {
        self.tables
            .write()
            .map_err(|_| StorageError::LockPoisoned.into())
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| f.matches(row))
}

fn counter_value(row: Option<&Row>, column: &str) -> i64 {
    row.and_then(|r| r.get(column))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

/// Find the counter row for `update`, creating it from the key columns.
fn counter_row<'a>(rows: &'a mut Vec<Row>, update: &CounterUpdate) -> &'a mut Row {
    let idx = match rows.iter().position(|r| matches_all(r, &update.key)) {
        Some(idx) => idx,
        None => {
            let mut row = Row::new();
            for filter in &update.key {
                row.insert(filter.column.clone(), filter.value.clone());
            }
            rows.push(row);
            rows.len() - 1
        }
    };
    &mut rows[idx]
}

fn apply_increments(row: &mut Row, update: &CounterUpdate) {
    for (column, amount) in &update.increments {
        let current = row.get(column).and_then(Value::as_i64).unwrap_or(0);
        row.insert(column.clone(), Value::from(current + amount));
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn select(&self, table: &str, filters: &[Filter]) -> RankgridResult<Vec<Row>> {
        let tables = self.read()?;
        Ok(tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| matches_all(r, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert(&self, table: &str, row: Row, conflict_key: &[&str]) -> RankgridResult<()> {
        let key: Vec<Filter> = conflict_key
            .iter()
            .map(|column| Filter {
                column: column.to_string(),
                value: row.get(*column).cloned().unwrap_or(Value::Null),
            })
            .collect();

        let mut tables = self.write()?;
        let rows = tables.entry(table.to_string()).or_default();
        match rows.iter_mut().find(|r| matches_all(r, &key)) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
        Ok(())
    }

    async fn insert(&self, table: &str, row: Row) -> RankgridResult<()> {
        let mut tables = self.write()?;
        tables.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    async fn increment(&self, update: &CounterUpdate) -> RankgridResult<()> {
        let mut tables = self.write()?;
        let rows = tables.entry(update.table.clone()).or_default();
        apply_increments(counter_row(rows, update), update);
        Ok(())
    }

    async fn increment_within_limits(
        &self,
        update: &CounterUpdate,
        limits: &[CounterLimit],
    ) -> RankgridResult<CounterOutcome> {
        let mut tables = self.write()?;
        let rows = tables.entry(update.table.clone()).or_default();

        let existing = rows.iter().find(|r| matches_all(r, &update.key));
        for limit in limits {
            let current = counter_value(existing, &limit.column);
            if current + update.amount_for(&limit.column) > limit.limit {
                return Ok(CounterOutcome::Rejected {
                    column: limit.column.clone(),
                    current,
                    limit: limit.limit,
                });
            }
        }

        apply_increments(counter_row(rows, update), update);
        Ok(CounterOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("row fixtures must be objects"),
        }
    }

    fn quota_key() -> Vec<Filter> {
        vec![Filter::eq("tenant", "t1"), Filter::eq("month", 3)]
    }

    #[tokio::test]
    async fn test_select_filters() {
        let store = InMemoryStore::new();
        store.insert("users", row(json!({"id": 1, "tier": "pro"}))).await.unwrap();
        store.insert("users", row(json!({"id": 2, "tier": "free"}))).await.unwrap();

        let rows = store.select("users", &[Filter::eq("tier", "free")]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(2));

        assert!(store.select("missing", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_on_conflict() {
        let store = InMemoryStore::new();
        let key = ["subject", "data_type"];
        store
            .upsert("cache", row(json!({"subject": "a", "data_type": "k", "v": 1})), &key)
            .await
            .unwrap();
        store
            .upsert("cache", row(json!({"subject": "a", "data_type": "k", "v": 2})), &key)
            .await
            .unwrap();
        store
            .upsert("cache", row(json!({"subject": "b", "data_type": "k", "v": 3})), &key)
            .await
            .unwrap();

        assert_eq!(store.row_count("cache"), 2);
        let rows = store.select("cache", &[Filter::eq("subject", "a")]).await.unwrap();
        assert_eq!(rows[0]["v"], json!(2));
    }

    #[tokio::test]
    async fn test_increment_creates_row() {
        let store = InMemoryStore::new();
        let update = CounterUpdate::new("quota", quota_key()).add("used", 2).add("total", 2);
        store.increment(&update).await.unwrap();
        store.increment(&update).await.unwrap();

        let rows = store.select("quota", &quota_key()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["used"], json!(4));
        assert_eq!(rows[0]["tenant"], json!("t1"));
    }

    #[tokio::test]
    async fn test_increment_within_limits() {
        let store = InMemoryStore::new();
        let update = CounterUpdate::new("quota", quota_key()).add("used", 40).add("total", 40);
        let limits = [CounterLimit::new("used", 100), CounterLimit::new("total", 90)];

        assert!(store.increment_within_limits(&update, &limits).await.unwrap().is_applied());
        assert!(store.increment_within_limits(&update, &limits).await.unwrap().is_applied());

        let outcome = store.increment_within_limits(&update, &limits).await.unwrap();
        assert_eq!(
            outcome,
            CounterOutcome::Rejected {
                column: "used".to_string(),
                current: 80,
                limit: 100
            }
        );

        let rows = store.select("quota", &quota_key()).await.unwrap();
        assert_eq!(rows[0]["used"], json!(80));
        assert_eq!(rows[0]["total"], json!(80));
    }

    #[tokio::test]
    async fn test_rejection_on_empty_table_writes_nothing() {
        let store = InMemoryStore::new();
        let update = CounterUpdate::new("quota", quota_key()).add("used", 5);
        let outcome = store
            .increment_within_limits(&update, &[CounterLimit::new("used", 4)])
            .await
            .unwrap();
        assert!(!outcome.is_applied());
        assert_eq!(store.row_count("quota"), 0);
    }
}
