//! Telemetry ingestion: validate, upsert the bin, then raise a critical
//! notification when the bin is full.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common_observability::BinMetrics;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::model::{
    fallback_bin_name, Bin, NewNotification, Notification, TelemetryWrite, UNKNOWN_LOCATION,
};
use crate::status::{classify, requires_alert};
use crate::store::{BinStore, NotificationStore, StoreError};

/// Raw sensor payload as posted to `/sensor/update`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReport {
    pub bin_id: Option<String>,
    pub fill_level: Option<f64>,
    pub location: Option<String>,
    pub bin_name: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Turns a report into the pipeline-owned field set, or a validation error.
/// `now` becomes the bin's `last_updated`.
pub fn validate_report(report: &TelemetryReport, now: DateTime<Utc>) -> CoreResult<TelemetryWrite> {
    let id = non_blank(report.bin_id.as_deref())
        .ok_or_else(|| CoreError::validation("binId", "Missing required fields: binId, fillLevel"))?;
    let fill_level = report
        .fill_level
        .ok_or_else(|| CoreError::validation("fillLevel", "Missing required fields: binId, fillLevel"))?;
    if !fill_level.is_finite() || !(0.0..=100.0).contains(&fill_level) {
        return Err(CoreError::validation(
            "fillLevel",
            "fillLevel must be between 0 and 100",
        ));
    }

    let name = non_blank(report.bin_name.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| fallback_bin_name(id));
    let location = non_blank(report.location.as_deref())
        .unwrap_or(UNKNOWN_LOCATION)
        .to_string();

    Ok(TelemetryWrite {
        id: id.to_string(),
        name,
        location,
        fill_level,
        status: classify(fill_level),
        reported_at: now,
    })
}

/// What happened to the critical notification for one report.
#[derive(Debug)]
pub enum AlertOutcome {
    NotRequired,
    Raised(Notification),
    /// The bin write stood; only the notification was lost.
    Failed(StoreError),
}

#[derive(Debug)]
pub struct IngestReceipt {
    pub bin: Bin,
    pub alert: AlertOutcome,
}

#[derive(Clone)]
pub struct TelemetryPipeline {
    bins: Arc<dyn BinStore>,
    notifications: Arc<dyn NotificationStore>,
    metrics: Arc<BinMetrics>,
}

impl TelemetryPipeline {
    pub fn new(
        bins: Arc<dyn BinStore>,
        notifications: Arc<dyn NotificationStore>,
        metrics: Arc<BinMetrics>,
    ) -> Self {
        Self {
            bins,
            notifications,
            metrics,
        }
    }

    /// Success is decided by the bin upsert alone. The notification insert is
    /// not transactional with it and its failure is only logged.
    pub async fn ingest(&self, report: &TelemetryReport) -> CoreResult<IngestReceipt> {
        let write = match validate_report(report, Utc::now()) {
            Ok(write) => write,
            Err(err) => {
                self.metrics.telemetry_rejected.inc();
                debug!(error = %err, "rejected telemetry report");
                return Err(err);
            }
        };

        let bin = self.bins.upsert_telemetry(&write).await?;
        self.metrics
            .telemetry_ingested
            .with_label_values(&[write.status.as_str()])
            .inc();
        info!(
            bin_id = %bin.id,
            fill_level = write.fill_level,
            status = %write.status,
            "telemetry stored"
        );

        if !requires_alert(write.fill_level) {
            return Ok(IngestReceipt {
                bin,
                alert: AlertOutcome::NotRequired,
            });
        }

        let label = non_blank(report.bin_name.as_deref()).unwrap_or(&write.id);
        let alert = NewNotification::bin_full(&write.id, label, write.fill_level);
        let alert = match self.notifications.insert_notification(&alert).await {
            Ok(notification) => {
                self.metrics.notifications_emitted.inc();
                AlertOutcome::Raised(notification)
            }
            Err(err) => {
                self.metrics.notification_failures.inc();
                warn!(bin_id = %write.id, error = %err, "failed to create critical notification");
                AlertOutcome::Failed(err)
            }
        };

        Ok(IngestReceipt { bin, alert })
    }
}
