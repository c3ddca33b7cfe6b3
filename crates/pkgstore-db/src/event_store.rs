//! Event store for content event persistence and querying
//!
//! Graph mutations and rebuild requests are appended here after the
//! mutation commits. Rebuild consumers poll it by repository and type.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pkgstore_core::{ContentEvent, EventType};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::error::{DbError, DbResult};

/// Query parameters for searching events
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Filter by repository name
    pub repository: Option<String>,

    /// Filter by event types
    pub event_types: Vec<String>,

    /// Filter by actor
    pub actor: Option<String>,

    /// Filter events after this timestamp
    pub after: Option<DateTime<Utc>>,

    /// Filter events before this timestamp
    pub before: Option<DateTime<Utc>>,

    /// Maximum number of events to return
    pub limit: i64,

    /// Number of events to skip
    pub offset: i64,
}

impl EventQuery {
    /// Create a new event query with defaults
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    /// Filter by repository
    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// Filter by event type
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.push(event_type.into());
        self
    }

    /// Filter by actor
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Filter events after timestamp
    pub fn after(mut self, timestamp: DateTime<Utc>) -> Self {
        self.after = Some(timestamp);
        self
    }

    /// Filter events before timestamp
    pub fn before(mut self, timestamp: DateTime<Utc>) -> Self {
        self.before = Some(timestamp);
        self
    }

    /// Set pagination limit
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set pagination offset
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Shared WHERE clause; bind order is repository, types, actor, after, before
    fn where_clause(&self) -> String {
        let mut sql = String::from(" WHERE 1=1");

        if self.repository.is_some() {
            sql.push_str(" AND repository = ?");
        }

        if !self.event_types.is_empty() {
            let placeholders = vec!["?"; self.event_types.len()].join(", ");
            sql.push_str(&format!(" AND event_type IN ({})", placeholders));
        }

        if self.actor.is_some() {
            sql.push_str(" AND actor = ?");
        }

        if self.after.is_some() {
            sql.push_str(" AND timestamp > ?");
        }

        if self.before.is_some() {
            sql.push_str(" AND timestamp < ?");
        }

        sql
    }
}

/// Results from an event query
#[derive(Debug, Clone)]
pub struct EventQueryResults {
    /// Events matching the query
    pub events: Vec<ContentEvent>,

    /// Total number of matching events (without pagination)
    pub total: i64,

    /// Current offset
    pub offset: i64,

    /// Current limit
    pub limit: i64,
}

impl EventQueryResults {
    /// Check if there are more events available
    pub fn has_more(&self) -> bool {
        (self.offset + self.events.len() as i64) < self.total
    }

    /// Get the number of events in this page
    pub fn count(&self) -> usize {
        self.events.len()
    }
}

/// Event store trait for persisting and querying content events
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append a new event to the store
    async fn append(&self, event: ContentEvent) -> DbResult<ContentEvent>;

    /// Append multiple events atomically
    async fn append_batch(&self, events: Vec<ContentEvent>) -> DbResult<Vec<ContentEvent>>;

    /// Query events with filters, newest first
    async fn query(&self, query: &EventQuery) -> DbResult<EventQueryResults>;

    /// Count total events in the store
    async fn count_events(&self) -> DbResult<i64>;

    /// Count events by type
    async fn count_by_type(&self, event_type: &str) -> DbResult<i64>;

    /// Health check for event store
    async fn health_check(&self) -> DbResult<()>;
}

/// SQLite implementation of EventStore
#[derive(Debug, Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    /// Create a new SQLite event store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn insert_event(conn: &mut SqliteConnection, event: &ContentEvent) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO content_events (
            event_id, event_type, repository, component_id, timestamp,
            correlation_id, actor, source, payload, context
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(ulid::Ulid::new().to_string())
    .bind(event.event_name())
    .bind(event.repository())
    .bind(event.event_type.component_id().map(|id| id.get()))
    .bind(event.timestamp)
    .bind(&event.correlation_id)
    .bind(event.actor.as_deref().unwrap_or("system"))
    .bind(&event.source)
    .bind(serde_json::to_string(&event.event_type)?)
    .bind(serde_json::to_string(&event.context)?)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait]
impl EventStore for SqliteEventStore {
    #[instrument(skip(self, event), fields(event = %event.event_name()))]
    async fn append(&self, event: ContentEvent) -> DbResult<ContentEvent> {
        debug!("Appending event to store");

        let mut conn = self.pool.acquire().await?;
        insert_event(&mut conn, &event).await?;

        debug!("Event appended successfully");
        Ok(event)
    }

    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn append_batch(&self, events: Vec<ContentEvent>) -> DbResult<Vec<ContentEvent>> {
        debug!("Appending batch of events");

        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        for event in &events {
            insert_event(&mut tx, event).await?;
        }
        tx.commit().await?;

        debug!("Event batch appended successfully");
        Ok(events)
    }

    #[instrument(skip(self, query))]
    async fn query(&self, query: &EventQuery) -> DbResult<EventQueryResults> {
        debug!("Querying events");

        if query.limit < 0 || query.offset < 0 {
            return Err(DbError::InvalidQuery(
                "limit and offset must not be negative".to_string(),
            ));
        }

        let where_clause = query.where_clause();

        let sql = format!(
            r#"
            SELECT timestamp, correlation_id, actor, source, payload, context
            FROM content_events
            {}
            ORDER BY timestamp DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            where_clause
        );

        let mut db_query = sqlx::query(&sql);
        if let Some(ref repository) = query.repository {
            db_query = db_query.bind(repository);
        }
        for event_type in &query.event_types {
            db_query = db_query.bind(event_type);
        }
        if let Some(ref actor) = query.actor {
            db_query = db_query.bind(actor);
        }
        if let Some(after) = query.after {
            db_query = db_query.bind(after);
        }
        if let Some(before) = query.before {
            db_query = db_query.bind(before);
        }

        let rows = db_query
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await?;

        let events = rows
            .iter()
            .map(row_to_event)
            .collect::<DbResult<Vec<ContentEvent>>>()?;

        let count_sql = format!("SELECT COUNT(*) FROM content_events{}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(ref repository) = query.repository {
            count_query = count_query.bind(repository);
        }
        for event_type in &query.event_types {
            count_query = count_query.bind(event_type);
        }
        if let Some(ref actor) = query.actor {
            count_query = count_query.bind(actor);
        }
        if let Some(after) = query.after {
            count_query = count_query.bind(after);
        }
        if let Some(before) = query.before {
            count_query = count_query.bind(before);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        Ok(EventQueryResults {
            events,
            total,
            offset: query.offset,
            limit: query.limit,
        })
    }

    async fn count_events(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_by_type(&self, event_type: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM content_events WHERE event_type = ?")
                .bind(event_type)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }
}

/// Convert database row to ContentEvent
fn row_to_event(row: &SqliteRow) -> DbResult<ContentEvent> {
    let payload: String = row.get("payload");
    let event_type: EventType = serde_json::from_str(&payload)
        .map_err(|e| DbError::Serialization(format!("Failed to parse event type: {}", e)))?;

    let context: String = row.get("context");
    let context: HashMap<String, String> = serde_json::from_str(&context).unwrap_or_default();

    Ok(ContentEvent {
        event_type,
        timestamp: row.get("timestamp"),
        correlation_id: row.get("correlation_id"),
        actor: row.get("actor"),
        source: row.get("source"),
        context,
    })
}
