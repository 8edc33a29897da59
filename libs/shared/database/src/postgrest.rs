use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::repository::{Condition, DatabaseError, Query, Record, Repository};
use crate::supabase::{return_representation, SupabaseClient};

/// Repository backed by a Supabase (PostgREST) table named `T::TABLE`.
pub struct SupabaseRepository<T: Record> {
    supabase: Arc<SupabaseClient>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> SupabaseRepository<T> {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase, _record: PhantomData }
    }

    fn table_path(&self) -> String {
        format!("/rest/v1/{}", T::TABLE)
    }

    fn row_path(&self, id: Uuid) -> String {
        format!("/rest/v1/{}?id=eq.{}", T::TABLE, id)
    }
}

#[async_trait]
impl<T: Record> Repository<T> for SupabaseRepository<T> {
    async fn insert(&self, record: &T) -> Result<T, DatabaseError> {
        let body = serde_json::to_value(record)?;
        let result: Vec<T> = self.supabase.request_with_headers(
            Method::POST,
            &self.table_path(),
            Some(body),
            Some(return_representation()),
        ).await.map_err(|e| DatabaseError::Request(e.to_string()))?;

        result.into_iter().next().ok_or_else(|| {
            DatabaseError::UnexpectedResponse(format!("insert into {} returned no rows", T::TABLE))
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<T>, DatabaseError> {
        let result: Vec<T> = self.supabase.request(
            Method::GET,
            &self.row_path(id),
            None,
        ).await.map_err(|e| DatabaseError::Request(e.to_string()))?;

        Ok(result.into_iter().next())
    }

    async fn update(&self, record: &T) -> Result<T, DatabaseError> {
        let body = serde_json::to_value(record)?;
        let result: Vec<T> = self.supabase.request_with_headers(
            Method::PATCH,
            &self.row_path(record.id()),
            Some(body),
            Some(return_representation()),
        ).await.map_err(|e| DatabaseError::Request(e.to_string()))?;

        result.into_iter().next().ok_or(DatabaseError::MissingRecord(record.id()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &self.row_path(id),
            None,
            Some(return_representation()),
        ).await.map_err(|e| DatabaseError::Request(e.to_string()))?;

        Ok(!result.is_empty())
    }

    async fn find(&self, query: &Query) -> Result<Vec<T>, DatabaseError> {
        let query_string = render_query(query);
        let path = if query_string.is_empty() {
            self.table_path()
        } else {
            format!("{}?{}", self.table_path(), query_string)
        };
        debug!("Querying {}", path);

        self.supabase.request(Method::GET, &path, None)
            .await
            .map_err(|e| DatabaseError::Request(e.to_string()))
    }
}

/// Renders a query as PostgREST parameters, e.g.
/// `doctor_id=eq.<id>&status=in.(scheduled,confirmed)&order=start_time.asc`.
pub fn render_query(query: &Query) -> String {
    let mut parts: Vec<String> = query.conditions.iter().map(render_top_level).collect();

    if !query.order.is_empty() {
        let order = query.order.iter()
            .map(|o| format!("{}.{}", o.field, if o.ascending { "asc" } else { "desc.nullslast" }))
            .collect::<Vec<_>>()
            .join(",");
        parts.push(format!("order={}", order));
    }
    if let Some(offset) = query.offset {
        parts.push(format!("offset={}", offset));
    }
    if let Some(limit) = query.limit {
        parts.push(format!("limit={}", limit));
    }

    parts.join("&")
}

fn render_top_level(condition: &Condition) -> String {
    match condition {
        Condition::Compare { field, op, value } => {
            format!("{}={}.{}", field, op.as_str(), scalar(value))
        }
        Condition::In { field, values } => format!("{}=in.({})", field, scalar_list(values)),
        Condition::IsNull { field } => format!("{}=is.null", field),
        Condition::Or(conditions) => format!("or=({})", render_nested(conditions)),
    }
}

fn render_nested(conditions: &[Condition]) -> String {
    conditions.iter()
        .map(|condition| match condition {
            Condition::Compare { field, op, value } => {
                format!("{}.{}.{}", field, op.as_str(), scalar(value))
            }
            Condition::In { field, values } => format!("{}.in.({})", field, scalar_list(values)),
            Condition::IsNull { field } => format!("{}.is.null", field),
            Condition::Or(inner) => format!("or({})", render_nested(inner)),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn scalar(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    };
    urlencoding::encode(&raw).into_owned()
}

fn scalar_list(values: &[Value]) -> String {
    values.iter().map(scalar).collect::<Vec<_>>().join(",")
}
