//! Bin registry operations: create, partial update and the detail view.

use chrono::{DateTime, Utc};
use common_auth::{ensure_role, AuthContext, BIN_WRITE_ROLES, ROLE_OFFICER};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::geo::Coordinates;
use crate::model::{Bin, BinUpdate, FieldOfficer, NewBin, Notification};
use crate::status::classify;
use crate::store::{BinStore, NotificationStore};

/// Notifications embedded in the bin detail view.
pub const DETAIL_NOTIFICATION_LIMIT: u32 = 5;

fn required_text(field: &'static str, value: Option<&str>, message: &str) -> CoreResult<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CoreError::validation(field, message))
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn check_capacity(capacity: i32) -> CoreResult<i32> {
    if capacity <= 0 {
        return Err(CoreError::validation("capacity", "capacity must be greater than 0"));
    }
    Ok(capacity)
}

fn check_percent(field: &'static str, value: f64) -> CoreResult<f64> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(CoreError::validation(
            field,
            format!("{field} must be between 0 and 100"),
        ));
    }
    Ok(value)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBinRequest {
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub capacity: Option<i32>,
    pub sensor_id: Option<String>,
    pub notes: Option<String>,
}

impl CreateBinRequest {
    /// New bins start empty. An officer creating a bin becomes its assignee.
    pub fn into_new_bin(&self, caller: &AuthContext) -> CoreResult<NewBin> {
        const MISSING: &str = "Missing required fields: name, location";
        let name = required_text("name", self.name.as_deref(), MISSING)?;
        let location = required_text("location", self.location.as_deref(), MISSING)?;

        let mut bin = NewBin::new(Uuid::new_v4().to_string(), name, location);
        bin.coordinates = Coordinates::from_pair(self.latitude, self.longitude)?;
        if let Some(capacity) = self.capacity {
            bin.capacity = check_capacity(capacity)?;
        }
        bin.sensor_id = optional_text(self.sensor_id.as_deref());
        bin.notes = optional_text(self.notes.as_deref());
        if caller.has_role(ROLE_OFFICER) {
            bin.field_officer_id = Some(caller.caller_id().to_string());
        }
        Ok(bin)
    }
}

/// Client-editable fields for `PUT /bins/:id`. A `status` in the body is
/// ignored; it is always recomputed from `fill_level`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BinPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub fill_level: Option<f64>,
    pub sensor_id: Option<String>,
    pub battery_level: Option<f64>,
    pub capacity: Option<i32>,
    pub notes: Option<String>,
    pub images: Option<Vec<String>>,
    pub field_officer_id: Option<String>,
    pub last_collection: Option<DateTime<Utc>>,
    pub next_collection: Option<DateTime<Utc>>,
}

impl BinPatch {
    pub fn validate(&self) -> CoreResult<BinUpdate> {
        let name = match self.name.as_deref() {
            Some(raw) => Some(required_text("name", Some(raw), "name must not be empty")?),
            None => None,
        };
        let location = match self.location.as_deref() {
            Some(raw) => Some(required_text("location", Some(raw), "location must not be empty")?),
            None => None,
        };
        let fill_level = self
            .fill_level
            .map(|value| check_percent("fill_level", value))
            .transpose()?;
        let battery_level = self
            .battery_level
            .map(|value| check_percent("battery_level", value))
            .transpose()?;
        let capacity = self.capacity.map(check_capacity).transpose()?;

        Ok(BinUpdate {
            name,
            location,
            coordinates: Coordinates::from_pair(self.latitude, self.longitude)?,
            fill_level,
            status: fill_level.map(classify),
            sensor_id: self.sensor_id.clone(),
            battery_level,
            capacity,
            notes: self.notes.clone(),
            images: self.images.clone(),
            field_officer_id: self.field_officer_id.clone(),
            last_collection: self.last_collection,
            next_collection: self.next_collection,
        })
    }
}

pub async fn create_bin(
    bins: &dyn BinStore,
    caller: &AuthContext,
    request: &CreateBinRequest,
) -> CoreResult<Bin> {
    ensure_role(caller, BIN_WRITE_ROLES)?;
    let new_bin = request.into_new_bin(caller)?;
    let bin = bins.insert_bin(&new_bin).await?;
    info!(bin_id = %bin.id, caller = %caller.caller_id(), "bin created");
    Ok(bin)
}

pub async fn update_bin(
    bins: &dyn BinStore,
    caller: &AuthContext,
    id: &str,
    patch: &BinPatch,
) -> CoreResult<Bin> {
    ensure_role(caller, BIN_WRITE_ROLES)?;
    let update = patch.validate()?;
    let bin = bins
        .update_bin(id, &update)
        .await?
        .ok_or_else(CoreError::bin_not_found)?;
    info!(bin_id = %bin.id, caller = %caller.caller_id(), "bin updated");
    Ok(bin)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinDetail {
    #[serde(flatten)]
    pub bin: Bin,
    pub field_officer: Option<FieldOfficer>,
    pub recent_notifications: Vec<Notification>,
}

/// The bin itself must load; the officer and notification joins degrade to
/// empty with a warning.
pub async fn bin_detail(
    bins: &dyn BinStore,
    notifications: &dyn NotificationStore,
    id: &str,
) -> CoreResult<BinDetail> {
    let bin = bins.fetch_bin(id).await?.ok_or_else(CoreError::bin_not_found)?;

    let field_officer = match bin.field_officer_id.as_deref() {
        Some(officer_id) => match bins.fetch_officer(officer_id).await {
            Ok(officer) => officer,
            Err(err) => {
                warn!(bin_id = %id, officer_id, error = %err, "field officer lookup failed");
                None
            }
        },
        None => None,
    };

    let recent_notifications = notifications
        .recent_for_bin(id, DETAIL_NOTIFICATION_LIMIT)
        .await
        .unwrap_or_else(|err| {
            warn!(bin_id = %id, error = %err, "recent notifications lookup failed");
            Vec::new()
        });

    Ok(BinDetail {
        bin,
        field_officer,
        recent_notifications,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BinStatus, NewNotification, DEFAULT_CAPACITY};
    use crate::store::MemoryStore;
    use common_auth::{Claims, ROLE_ADMIN, ROLE_USER};

    fn caller(id: &str, role: &str) -> AuthContext {
        AuthContext {
            claims: Claims {
                subject: id.into(),
                role: role.into(),
                email: None,
                expires_at: Utc::now() + chrono::Duration::hours(1),
                issued_at: None,
                issuer: None,
                audience: vec![],
                raw: serde_json::Value::Null,
            },
            token: "t".into(),
        }
    }

    fn request(name: &str, location: &str) -> CreateBinRequest {
        CreateBinRequest {
            name: Some(name.into()),
            location: Some(location.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn officer_becomes_assignee() {
        let store = MemoryStore::new();
        let bin = create_bin(&store, &caller("off-1", ROLE_OFFICER), &request("Pier", "Dock 4"))
            .await
            .unwrap();
        assert_eq!(bin.field_officer_id.as_deref(), Some("off-1"));
        assert_eq!(bin.capacity, DEFAULT_CAPACITY);
        assert_eq!(bin.fill_level, 0.0);
        assert_eq!(bin.status, BinStatus::Normal);
        assert!(Uuid::parse_str(&bin.id).is_ok());

        let bin = create_bin(&store, &caller("adm-1", ROLE_ADMIN), &request("Pier", "Dock 5"))
            .await
            .unwrap();
        assert!(bin.field_officer_id.is_none());
    }

    #[tokio::test]
    async fn plain_users_cannot_write() {
        let store = MemoryStore::new();
        let err = create_bin(&store, &caller("u", ROLE_USER), &request("A", "B"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Authorization { .. }));
        let err = update_bin(&store, &caller("u", ROLE_USER), "x", &BinPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Authorization { .. }));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn create_validation() {
        let admin = caller("a", ROLE_ADMIN);
        assert!(request(" ", "B").into_new_bin(&admin).is_err());
        let mut half = request("A", "B");
        half.latitude = Some(1.0);
        assert!(half.into_new_bin(&admin).is_err());
        let mut empty = request("A", "B");
        empty.capacity = Some(0);
        assert!(empty.into_new_bin(&admin).is_err());
    }

    #[test]
    fn patch_recomputes_status_from_fill_level() {
        let update = BinPatch {
            fill_level: Some(65.0),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(update.status, Some(BinStatus::Warning));

        let untouched = BinPatch::default().validate().unwrap();
        assert_eq!(untouched.status, None);

        let out_of_range = BinPatch {
            fill_level: Some(120.0),
            ..Default::default()
        };
        assert!(out_of_range.validate().is_err());
    }

    #[tokio::test]
    async fn update_missing_bin_is_not_found() {
        let store = MemoryStore::new();
        let err = update_bin(&store, &caller("a", ROLE_ADMIN), "nope", &BinPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { code: "bin_not_found", .. }));
    }

    #[tokio::test]
    async fn detail_joins_officer_and_latest_notifications() {
        let store = MemoryStore::new();
        store
            .add_officer(FieldOfficer {
                id: "off-1".into(),
                name: "Rina".into(),
                email: Some("rina@example.com".into()),
                phone: None,
                avatar_url: None,
            })
            .unwrap();
        let bin = create_bin(&store, &caller("off-1", ROLE_OFFICER), &request("Pier", "Dock"))
            .await
            .unwrap();
        for fill in [81.0, 82.0, 83.0, 84.0, 85.0, 86.0, 87.0] {
            store
                .insert_notification(&NewNotification::bin_full(&bin.id, "Pier", fill))
                .await
                .unwrap();
        }

        let detail = bin_detail(&store, &store, &bin.id).await.unwrap();
        assert_eq!(detail.field_officer.as_ref().map(|o| o.name.as_str()), Some("Rina"));
        assert_eq!(detail.recent_notifications.len(), DETAIL_NOTIFICATION_LIMIT as usize);
        assert!(detail.recent_notifications[0].message.contains("87%"));

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], bin.id.as_str());
        assert_eq!(json["fieldOfficer"]["id"], "off-1");
        assert!(json["recentNotifications"].is_array());
    }

    #[tokio::test]
    async fn detail_of_missing_bin_is_not_found() {
        let store = MemoryStore::new();
        let err = bin_detail(&store, &store, "ghost").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
