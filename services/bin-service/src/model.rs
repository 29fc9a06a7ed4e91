//! Records exchanged between the service and its store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinates;
use crate::status::classify;

/// Capacity (liters) given to bins created without one.
pub const DEFAULT_CAPACITY: i32 = 120;
/// Location stored when a telemetry report does not name one.
pub const UNKNOWN_LOCATION: &str = "Unknown";
/// Characters of the bin id used in the fallback display name.
pub const FALLBACK_NAME_PREFIX_LEN: usize = 8;
/// Notification type emitted by the ingestion pipeline.
pub const NOTIFICATION_CRITICAL: &str = "critical";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinStatus {
    Normal,
    Warning,
    Full,
}

impl BinStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinStatus::Normal => "normal",
            BinStatus::Warning => "warning",
            BinStatus::Full => "full",
        }
    }

    pub fn parse(s: &str) -> Option<BinStatus> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(BinStatus::Normal),
            "warning" => Some(BinStatus::Warning),
            "full" => Some(BinStatus::Full),
            _ => None,
        }
    }
}

impl fmt::Display for BinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub id: String,
    pub name: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub fill_level: f64,
    pub status: BinStatus,
    pub sensor_id: Option<String>,
    pub battery_level: Option<f64>,
    pub capacity: i32,
    pub notes: Option<String>,
    pub images: Vec<String>,
    pub field_officer_id: Option<String>,
    pub last_collection: Option<DateTime<Utc>>,
    pub next_collection: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Last telemetry write; distinct from `updated_at`, which tracks edits.
    pub last_updated: DateTime<Utc>,
}

impl Bin {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    pub fn summary(&self) -> BinSummary {
        BinSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            location: self.location.clone(),
        }
    }
}

/// First-write record for a bin. Both creation paths (explicit create and
/// telemetry upsert of an unseen id) start from [`NewBin::new`] so their
/// defaults cannot drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBin {
    pub id: String,
    pub name: String,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub fill_level: f64,
    pub sensor_id: Option<String>,
    pub capacity: i32,
    pub notes: Option<String>,
    pub field_officer_id: Option<String>,
}

impl NewBin {
    pub fn new(id: impl Into<String>, name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: location.into(),
            coordinates: None,
            fill_level: 0.0,
            sensor_id: None,
            capacity: DEFAULT_CAPACITY,
            notes: None,
            field_officer_id: None,
        }
    }

    pub fn status(&self) -> BinStatus {
        classify(self.fill_level)
    }

    pub fn into_bin(self, now: DateTime<Utc>) -> Bin {
        let status = self.status();
        Bin {
            id: self.id,
            name: self.name,
            location: self.location,
            latitude: self.coordinates.map(|c| c.latitude),
            longitude: self.coordinates.map(|c| c.longitude),
            fill_level: self.fill_level,
            status,
            sensor_id: self.sensor_id,
            battery_level: None,
            capacity: self.capacity,
            notes: self.notes,
            images: Vec::new(),
            field_officer_id: self.field_officer_id,
            last_collection: None,
            next_collection: None,
            created_at: now,
            updated_at: now,
            last_updated: now,
        }
    }
}

/// The pipeline-owned field set written by a telemetry upsert. Fields not
/// listed here are never touched when the bin already exists.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryWrite {
    pub id: String,
    pub name: String,
    pub location: String,
    pub fill_level: f64,
    pub status: BinStatus,
    pub reported_at: DateTime<Utc>,
}

impl TelemetryWrite {
    /// Record inserted when no bin with this id exists yet.
    pub fn seed(&self) -> NewBin {
        let mut bin = NewBin::new(&self.id, &self.name, &self.location);
        bin.fill_level = self.fill_level;
        bin
    }
}

pub fn fallback_bin_name(id: &str) -> String {
    let prefix: String = id.chars().take(FALLBACK_NAME_PREFIX_LEN).collect();
    format!("Bin {prefix}")
}

/// Validated partial update. `status` is only ever derived from `fill_level`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinUpdate {
    pub name: Option<String>,
    pub location: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub fill_level: Option<f64>,
    pub status: Option<BinStatus>,
    pub sensor_id: Option<String>,
    pub battery_level: Option<f64>,
    pub capacity: Option<i32>,
    pub notes: Option<String>,
    pub images: Option<Vec<String>>,
    pub field_officer_id: Option<String>,
    pub last_collection: Option<DateTime<Utc>>,
    pub next_collection: Option<DateTime<Utc>>,
}

impl BinUpdate {
    pub fn apply_to(&self, bin: &mut Bin, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            bin.name = name.clone();
        }
        if let Some(location) = &self.location {
            bin.location = location.clone();
        }
        if let Some(coordinates) = self.coordinates {
            bin.latitude = Some(coordinates.latitude);
            bin.longitude = Some(coordinates.longitude);
        }
        if let Some(fill_level) = self.fill_level {
            bin.fill_level = fill_level;
        }
        if let Some(status) = self.status {
            bin.status = status;
        }
        if let Some(sensor_id) = &self.sensor_id {
            bin.sensor_id = Some(sensor_id.clone());
        }
        if let Some(battery_level) = self.battery_level {
            bin.battery_level = Some(battery_level);
        }
        if let Some(capacity) = self.capacity {
            bin.capacity = capacity;
        }
        if let Some(notes) = &self.notes {
            bin.notes = Some(notes.clone());
        }
        if let Some(images) = &self.images {
            bin.images = images.clone();
        }
        if let Some(officer) = &self.field_officer_id {
            bin.field_officer_id = Some(officer.clone());
        }
        if let Some(at) = self.last_collection {
            bin.last_collection = Some(at);
        }
        if let Some(at) = self.next_collection {
            bin.next_collection = Some(at);
        }
        bin.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub bin_id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub bin_id: String,
    pub message: String,
    pub kind: String,
}

impl NewNotification {
    /// `label` is the reported display name, or the bin id when none was sent.
    pub fn bin_full(bin_id: &str, label: &str, fill_level: f64) -> Self {
        Self {
            bin_id: bin_id.to_string(),
            message: format!("Trash bin \"{label}\" is full ({fill_level}%)"),
            kind: NOTIFICATION_CRITICAL.to_string(),
        }
    }

    pub fn into_notification(self, id: Uuid, now: DateTime<Utc>) -> Notification {
        Notification {
            id,
            bin_id: self.bin_id,
            message: self.message,
            kind: self.kind,
            read: false,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSummary {
    pub id: String,
    pub name: String,
    pub location: String,
}

/// Notification listing row with the referenced bin embedded, if it still exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationWithBin {
    #[serde(flatten)]
    pub notification: Notification,
    #[serde(rename = "trash_bins")]
    pub bin: Option<BinSummary>,
}

/// Read-only view over the users collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOfficer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}
