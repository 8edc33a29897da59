use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repository::{Condition, DatabaseError, FilterOp, Query, Record, Repository};

/// Process-local table. Rows keep insertion order, so sorts are stable.
pub struct MemoryRepository<T: Record> {
    rows: RwLock<Vec<T>>,
}

impl<T: Record> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self { rows: RwLock::new(Vec::new()) }
    }
}

impl<T: Record> MemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryRepository<T> {
    async fn insert(&self, record: &T) -> Result<T, DatabaseError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|row| row.id() == record.id()) {
            return Err(DatabaseError::UnexpectedResponse(format!(
                "duplicate key {} in {}",
                record.id(),
                T::TABLE
            )));
        }
        rows.push(record.clone());
        Ok(record.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<T>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|row| row.id() == id).cloned())
    }

    async fn update(&self, record: &T) -> Result<T, DatabaseError> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|row| row.id() == record.id()) {
            Some(row) => {
                *row = record.clone();
                Ok(record.clone())
            }
            None => Err(DatabaseError::MissingRecord(record.id())),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| row.id() != id);
        Ok(rows.len() != before)
    }

    async fn find(&self, query: &Query) -> Result<Vec<T>, DatabaseError> {
        let rows = self.rows.read().await;

        let mut matched = Vec::new();
        for row in rows.iter() {
            let value = serde_json::to_value(row)?;
            if query.conditions.iter().all(|c| matches(&value, c)) {
                matched.push((value, row.clone()));
            }
        }

        if !query.order.is_empty() {
            matched.sort_by(|(a, _), (b, _)| {
                for key in &query.order {
                    let ordering = order_nulls_last(field(a, &key.field), field(b, &key.field), key.ascending);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, row)| row)
            .collect())
    }
}

fn field<'a>(row: &'a Value, name: &str) -> &'a Value {
    row.get(name).unwrap_or(&Value::Null)
}

fn matches(row: &Value, condition: &Condition) -> bool {
    match condition {
        Condition::Compare { field: name, op, value } => {
            let actual = field(row, name);
            if actual.is_null() {
                return false;
            }
            let ordering = compare_values(actual, value);
            match op {
                FilterOp::Eq => ordering == Some(Ordering::Equal),
                FilterOp::Neq => ordering != Some(Ordering::Equal),
                FilterOp::Lt => ordering == Some(Ordering::Less),
                FilterOp::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                FilterOp::Gt => ordering == Some(Ordering::Greater),
                FilterOp::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            }
        }
        Condition::In { field: name, values } => {
            let actual = field(row, name);
            values
                .iter()
                .any(|candidate| compare_values(actual, candidate) == Some(Ordering::Equal))
        }
        Condition::IsNull { field: name } => field(row, name).is_null(),
        Condition::Or(conditions) => conditions.iter().any(|c| matches(row, c)),
    }
}

/// Orders JSON scalars the way the database would: numbers numerically,
/// timestamps chronologically, other strings lexically (which is correct
/// for `YYYY-MM-DD` dates and `HH:MM:SS` times).
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => {
            match (x.parse::<DateTime<Utc>>(), y.parse::<DateTime<Utc>>()) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        _ => None,
    }
}

fn order_nulls_last(a: &Value, b: &Value, ascending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ordering = compare_values(a, b).unwrap_or(Ordering::Equal);
            if ascending { ordering } else { ordering.reverse() }
        }
    }
}
