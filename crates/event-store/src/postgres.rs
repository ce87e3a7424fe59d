use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventQuery, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

const SELECT_COLUMNS: &str = "SELECT sequence, id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata FROM events";

/// Advisory lock key held by every append transaction until it commits.
const APPEND_LOCK_KEY: i64 = 0x6a6f_7572_6e61_6c;

/// PostgreSQL-backed journal. Commit order is the `sequence` column.
///
/// `BIGSERIAL` values are handed out at insert time, not at commit time, so
/// appends take a transaction-scoped advisory lock first: a later sequence
/// cannot commit while an earlier one is still in flight. Gaps left by
/// rolled-back appends are permanent and safe to skip.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the workspace migrations (journal and storefront tables).
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        let sequence: i64 = row.try_get("sequence")?;
        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            sequence: u64::try_from(sequence).unwrap_or_default(),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;
        let aggregate_id = events[0].aggregate_id;

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(APPEND_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        if let Some(expected) = options.expected_version {
            let current_version: Option<i64> =
                sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                    .bind(aggregate_id.as_uuid())
                    .fetch_one(&mut *tx)
                    .await?;

            let actual = Version::new(current_version.unwrap_or(0));
            if actual != expected {
                metrics::counter!("event_store_conflicts_total").increment(1);
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual,
                });
            }
        }

        let mut last_version = Version::initial();
        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A writer that passed the version check concurrently lost the race.
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_aggregate_version")
                {
                    metrics::counter!("event_store_conflicts_total").increment(1);
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: options.expected_version.unwrap_or(Version::initial()),
                        actual: event.version,
                    };
                }
                EventStoreError::Database(e)
            })?;

            last_version = event.version;
        }

        tx.commit().await?;
        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE aggregate_id = $1 ORDER BY version ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        if query.aggregate_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_id = ${param_count}"));
        }
        if query.aggregate_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_type = ${param_count}"));
        }
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }
        if query.payload_contains.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND payload @> ${param_count}"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp <= ${param_count}"));
        }

        sql.push_str(" ORDER BY sequence ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.aggregate_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(aggregate_type) = query.aggregate_type {
            sqlx_query = sqlx_query.bind(aggregate_type);
        }
        if let Some(event_types) = query.event_types {
            sqlx_query = sqlx_query.bind(event_types);
        }
        if let Some(fragment) = query.payload_contains {
            sqlx_query = sqlx_query.bind(fragment);
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE event_type = $1 ORDER BY sequence ASC"
        ))
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_events_after(&self, after: u64) -> Result<EventStream> {
        let after = i64::try_from(after).unwrap_or(i64::MAX);
        // Rows are buffered so the returned stream does not borrow the pool.
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE sequence > $1 ORDER BY sequence ASC"
        ))
        .bind(after)
        .fetch_all(&self.pool)
        .await?;
        let events: Vec<Result<EventEnvelope>> = rows.into_iter().map(Self::row_to_event).collect();
        Ok(Box::pin(futures_util::stream::iter(events)))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }
}
