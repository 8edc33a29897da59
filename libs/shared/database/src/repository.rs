use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::SchedulingError;

pub const MAX_PAGE_LIMIT: usize = 1000;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Record with ID {0} does not exist")]
    MissingRecord(Uuid),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl From<DatabaseError> for SchedulingError {
    fn from(err: DatabaseError) -> Self {
        SchedulingError::Database(err.to_string())
    }
}

/// A persisted entity: one row of `TABLE`, addressed by `id()`.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn id(&self) -> Uuid;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare { field: String, op: FilterOp, value: Value },
    In { field: String, values: Vec<Value> },
    IsNull { field: String },
    Or(Vec<Condition>),
}

impl Condition {
    pub fn compare(field: &str, op: FilterOp, value: impl Serialize) -> Self {
        Condition::Compare {
            field: field.to_string(),
            op,
            value: to_value(value),
        }
    }

    pub fn is_null(field: &str) -> Self {
        Condition::IsNull { field: field.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub ascending: bool,
}

/// Conjunction of conditions plus ordering and an optional window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub conditions: Vec<Condition>,
    pub order: Vec<OrderBy>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn eq(self, field: &str, value: impl Serialize) -> Self {
        self.filter(Condition::compare(field, FilterOp::Eq, value))
    }

    pub fn neq(self, field: &str, value: impl Serialize) -> Self {
        self.filter(Condition::compare(field, FilterOp::Neq, value))
    }

    pub fn lt(self, field: &str, value: impl Serialize) -> Self {
        self.filter(Condition::compare(field, FilterOp::Lt, value))
    }

    pub fn lte(self, field: &str, value: impl Serialize) -> Self {
        self.filter(Condition::compare(field, FilterOp::Lte, value))
    }

    pub fn gt(self, field: &str, value: impl Serialize) -> Self {
        self.filter(Condition::compare(field, FilterOp::Gt, value))
    }

    pub fn gte(self, field: &str, value: impl Serialize) -> Self {
        self.filter(Condition::compare(field, FilterOp::Gte, value))
    }

    pub fn is_in<V: Serialize>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filter(Condition::In {
            field: field.to_string(),
            values: values.into_iter().map(to_value).collect(),
        })
    }

    pub fn any_of(self, conditions: Vec<Condition>) -> Self {
        self.filter(Condition::Or(conditions))
    }

    pub fn order_asc(mut self, field: &str) -> Self {
        self.order.push(OrderBy { field: field.to_string(), ascending: true });
        self
    }

    pub fn order_desc(mut self, field: &str) -> Self {
        self.order.push(OrderBy { field: field.to_string(), ascending: false });
        self
    }

    pub fn paginate(mut self, page: Page) -> Self {
        self.offset = Some(page.skip);
        self.limit = Some(page.limit);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

fn to_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Offset pagination with `limit` in `[1, 1000]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(skip: usize, limit: usize) -> Result<Self, SchedulingError> {
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(SchedulingError::validation(format!(
                "limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT, limit
            )));
        }
        Ok(Self { skip, limit })
    }

    /// Builds a page from optional query parameters, defaulting to `0..100`.
    pub fn from_params(skip: Option<usize>, limit: Option<usize>) -> Result<Self, SchedulingError> {
        Self::new(skip.unwrap_or(0), limit.unwrap_or(100))
    }
}

/// `?skip=&limit=` query parameters as they arrive over HTTP.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl PageParams {
    pub fn into_page(self) -> Result<Page, SchedulingError> {
        Page::from_params(self.skip, self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { skip: 0, limit: 100 }
    }
}

#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    async fn insert(&self, record: &T) -> Result<T, DatabaseError>;

    async fn get(&self, id: Uuid) -> Result<Option<T>, DatabaseError>;

    async fn list(&self, page: Page) -> Result<Vec<T>, DatabaseError> {
        self.find(&Query::new().paginate(page)).await
    }

    /// Replaces the stored row with `record`. Fails if the row is gone.
    async fn update(&self, record: &T) -> Result<T, DatabaseError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;

    async fn find(&self, query: &Query) -> Result<Vec<T>, DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_limit_bounds() {
        assert!(Page::new(0, 0).is_err());
        assert!(Page::new(0, 1001).is_err());
        assert_eq!(Page::new(20, 1000).unwrap(), Page { skip: 20, limit: 1000 });
        assert_eq!(Page::from_params(None, None).unwrap(), Page::default());
    }

    #[test]
    fn query_builder_collects_conditions_in_order() {
        let query = Query::new()
            .eq("doctor_id", "d1")
            .is_in("status", ["scheduled", "confirmed"])
            .order_asc("start_time");

        assert_eq!(query.conditions.len(), 2);
        assert_eq!(
            query.conditions[0],
            Condition::Compare {
                field: "doctor_id".into(),
                op: FilterOp::Eq,
                value: Value::String("d1".into()),
            }
        );
        assert_eq!(query.order[0].field, "start_time");
    }
}
