use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{BinPage, BinStore, BinWindow, NotificationStore, StoreError, StoreResult};
use crate::model::{
    Bin, BinStatus, BinSummary, BinUpdate, FieldOfficer, NewBin, NewNotification, Notification,
    NotificationWithBin, TelemetryWrite,
};

pub(crate) const BIN_COLUMNS: &str = "id, name, location, latitude, longitude, fill_level, status, \
     sensor_id, battery_level, capacity, notes, images, field_officer_id, last_collection, \
     next_collection, created_at, updated_at, last_updated";

const NOTIFICATION_COLUMNS: &str = "id, bin_id, message, type, read, created_at";

#[derive(Debug, FromRow)]
struct BinRow {
    id: String,
    name: String,
    location: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    fill_level: f64,
    status: String,
    sensor_id: Option<String>,
    battery_level: Option<f64>,
    capacity: i32,
    notes: Option<String>,
    images: Vec<String>,
    field_officer_id: Option<String>,
    last_collection: Option<DateTime<Utc>>,
    next_collection: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl TryFrom<BinRow> for Bin {
    type Error = StoreError;

    fn try_from(row: BinRow) -> Result<Self, Self::Error> {
        let status = BinStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Decode(format!("bin '{}' has unknown status '{}'", row.id, row.status))
        })?;
        Ok(Bin {
            id: row.id,
            name: row.name,
            location: row.location,
            latitude: row.latitude,
            longitude: row.longitude,
            fill_level: row.fill_level,
            status,
            sensor_id: row.sensor_id,
            battery_level: row.battery_level,
            capacity: row.capacity,
            notes: row.notes,
            images: row.images,
            field_officer_id: row.field_officer_id,
            last_collection: row.last_collection,
            next_collection: row.next_collection,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_updated: row.last_updated,
        })
    }
}

fn into_bins(rows: Vec<BinRow>) -> StoreResult<Vec<Bin>> {
    rows.into_iter().map(Bin::try_from).collect()
}

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: Uuid,
    bin_id: String,
    message: String,
    #[sqlx(rename = "type")]
    kind: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            bin_id: row.bin_id,
            message: row.message,
            kind: row.kind,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct NotificationJoinRow {
    #[sqlx(flatten)]
    notification: NotificationRow,
    bin_ref: Option<String>,
    bin_name: Option<String>,
    bin_location: Option<String>,
}

impl From<NotificationJoinRow> for NotificationWithBin {
    fn from(row: NotificationJoinRow) -> Self {
        let bin = match (row.bin_ref, row.bin_name, row.bin_location) {
            (Some(id), Some(name), Some(location)) => Some(BinSummary { id, name, location }),
            _ => None,
        };
        NotificationWithBin {
            notification: row.notification.into(),
            bin,
        }
    }
}

#[derive(Debug, FromRow)]
struct OfficerRow {
    id: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    avatar_url: Option<String>,
}

/// Postgres-backed store over the `trash_bins`, `notifications` and `users` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn select_bins(&self, filter: &str) -> StoreResult<Vec<Bin>> {
        let sql = format!(
            "SELECT {BIN_COLUMNS} FROM trash_bins {filter} ORDER BY last_updated DESC, id ASC"
        );
        let rows = sqlx::query_as::<_, BinRow>(&sql).fetch_all(&self.pool).await?;
        into_bins(rows)
    }
}

#[async_trait]
impl BinStore for PgStore {
    async fn upsert_telemetry(&self, write: &TelemetryWrite) -> StoreResult<Bin> {
        let seed = write.seed();
        let sql = format!(
            "INSERT INTO trash_bins (id, name, location, fill_level, status, capacity, created_at, updated_at, last_updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $7) \
             ON CONFLICT (id) DO UPDATE SET \
                name = EXCLUDED.name, \
                location = EXCLUDED.location, \
                fill_level = EXCLUDED.fill_level, \
                status = EXCLUDED.status, \
                last_updated = EXCLUDED.last_updated \
             RETURNING {BIN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BinRow>(&sql)
            .bind(&write.id)
            .bind(&write.name)
            .bind(&write.location)
            .bind(write.fill_level)
            .bind(write.status.as_str())
            .bind(seed.capacity)
            .bind(write.reported_at)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn insert_bin(&self, bin: &NewBin) -> StoreResult<Bin> {
        let sql = format!(
            "INSERT INTO trash_bins (id, name, location, latitude, longitude, fill_level, status, sensor_id, capacity, notes, field_officer_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {BIN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BinRow>(&sql)
            .bind(&bin.id)
            .bind(&bin.name)
            .bind(&bin.location)
            .bind(bin.coordinates.map(|c| c.latitude))
            .bind(bin.coordinates.map(|c| c.longitude))
            .bind(bin.fill_level)
            .bind(bin.status().as_str())
            .bind(&bin.sensor_id)
            .bind(bin.capacity)
            .bind(&bin.notes)
            .bind(&bin.field_officer_id)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn update_bin(&self, id: &str, update: &BinUpdate) -> StoreResult<Option<Bin>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE trash_bins SET updated_at = now()");
        if let Some(name) = &update.name {
            builder.push(", name = ").push_bind(name);
        }
        if let Some(location) = &update.location {
            builder.push(", location = ").push_bind(location);
        }
        if let Some(coordinates) = update.coordinates {
            builder.push(", latitude = ").push_bind(coordinates.latitude);
            builder.push(", longitude = ").push_bind(coordinates.longitude);
        }
        if let Some(fill_level) = update.fill_level {
            builder.push(", fill_level = ").push_bind(fill_level);
        }
        if let Some(status) = update.status {
            builder.push(", status = ").push_bind(status.as_str());
        }
        if let Some(sensor_id) = &update.sensor_id {
            builder.push(", sensor_id = ").push_bind(sensor_id);
        }
        if let Some(battery_level) = update.battery_level {
            builder.push(", battery_level = ").push_bind(battery_level);
        }
        if let Some(capacity) = update.capacity {
            builder.push(", capacity = ").push_bind(capacity);
        }
        if let Some(notes) = &update.notes {
            builder.push(", notes = ").push_bind(notes);
        }
        if let Some(images) = &update.images {
            builder.push(", images = ").push_bind(images);
        }
        if let Some(officer) = &update.field_officer_id {
            builder.push(", field_officer_id = ").push_bind(officer);
        }
        if let Some(at) = update.last_collection {
            builder.push(", last_collection = ").push_bind(at);
        }
        if let Some(at) = update.next_collection {
            builder.push(", next_collection = ").push_bind(at);
        }
        builder.push(" WHERE id = ").push_bind(id);
        builder.push(" RETURNING ").push(BIN_COLUMNS);

        let row = builder
            .build_query_as::<BinRow>()
            .fetch_optional(&self.pool)
            .await?;
        row.map(Bin::try_from).transpose()
    }

    async fn fetch_bin(&self, id: &str) -> StoreResult<Option<Bin>> {
        let sql = format!("SELECT {BIN_COLUMNS} FROM trash_bins WHERE id = $1");
        let row = sqlx::query_as::<_, BinRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Bin::try_from).transpose()
    }

    async fn list_bins(&self, window: &BinWindow) -> StoreResult<BinPage> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        builder.push(BIN_COLUMNS).push(" FROM trash_bins");
        if let Some(status) = window.status {
            builder.push(" WHERE status = ").push_bind(status.as_str());
        }
        builder.push(" ORDER BY last_updated DESC, id ASC LIMIT ");
        builder.push_bind(i64::from(window.limit));
        builder.push(" OFFSET ").push_bind(i64::from(window.offset));
        let rows = builder.build_query_as::<BinRow>().fetch_all(&self.pool).await?;

        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM trash_bins");
        if let Some(status) = window.status {
            count.push(" WHERE status = ").push_bind(status.as_str());
        }
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        Ok(BinPage {
            bins: into_bins(rows)?,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn bins_with_coordinates(&self) -> StoreResult<Vec<Bin>> {
        self.select_bins("WHERE latitude IS NOT NULL AND longitude IS NOT NULL")
            .await
    }

    async fn all_bins(&self) -> StoreResult<Vec<Bin>> {
        self.select_bins("").await
    }

    async fn fetch_officer(&self, id: &str) -> StoreResult<Option<FieldOfficer>> {
        let row = sqlx::query_as::<_, OfficerRow>(
            "SELECT id, name, email, phone, avatar_url FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| FieldOfficer {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
            avatar_url: r.avatar_url,
        }))
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(&self, notification: &NewNotification) -> StoreResult<Notification> {
        let sql = format!(
            "INSERT INTO notifications (id, bin_id, message, type) VALUES ($1, $2, $3, $4) \
             RETURNING {NOTIFICATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&notification.bin_id)
            .bind(&notification.message)
            .bind(&notification.kind)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn recent_for_bin(&self, bin_id: &str, limit: u32) -> StoreResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE bin_id = $1 \
             ORDER BY created_at DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(bin_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn list_notifications(
        &self,
        read: Option<bool>,
        limit: u32,
    ) -> StoreResult<Vec<NotificationWithBin>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT n.id, n.bin_id, n.message, n.type, n.read, n.created_at, \
             b.id AS bin_ref, b.name AS bin_name, b.location AS bin_location \
             FROM notifications n LEFT JOIN trash_bins b ON b.id = n.bin_id",
        );
        if let Some(read) = read {
            builder.push(" WHERE n.read = ").push_bind(read);
        }
        builder.push(" ORDER BY n.created_at DESC LIMIT ");
        builder.push_bind(i64::from(limit));
        let rows = builder
            .build_query_as::<NotificationJoinRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(NotificationWithBin::from).collect())
    }

    async fn unread_count(&self) -> StoreResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE NOT read")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn mark_read(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        let sql = format!(
            "UPDATE notifications SET read = true WHERE id = $1 RETURNING {NOTIFICATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Notification::from))
    }

    async fn mark_all_read(&self) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE notifications SET read = true WHERE NOT read")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
