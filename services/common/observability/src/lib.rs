use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct BinMetrics {
    pub registry: Registry,
    pub telemetry_ingested: IntCounterVec,
    pub telemetry_rejected: IntCounter,
    pub notifications_emitted: IntCounter,
    pub notification_failures: IntCounter,
    pub nearby_candidates: Histogram,
    pub http_errors_total: IntCounterVec,
}

impl BinMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let telemetry_ingested = IntCounterVec::new(
            Opts::new(
                "bin_telemetry_ingested_total",
                "Telemetry reports persisted, by derived status",
            ),
            &["status"],
        )?;
        let telemetry_rejected = IntCounter::new(
            "bin_telemetry_rejected_total",
            "Telemetry reports rejected by validation",
        )?;
        let notifications_emitted = IntCounter::new(
            "bin_notifications_emitted_total",
            "Critical notifications created by the ingestion pipeline",
        )?;
        let notification_failures = IntCounter::new(
            "bin_notification_failures_total",
            "Critical notifications that could not be stored",
        )?;
        let nearby_candidates = Histogram::with_opts(
            HistogramOpts::new(
                "bin_nearby_candidates",
                "Coordinate-bearing bins scanned per proximity search",
            )
            .buckets(vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]),
        )?;
        let http_errors_total = IntCounterVec::new(
            Opts::new(
                "http_errors_total",
                "Count of HTTP error responses emitted (status >= 400)",
            ),
            &["service", "code", "status"],
        )?;
        registry.register(Box::new(telemetry_ingested.clone()))?;
        registry.register(Box::new(telemetry_rejected.clone()))?;
        registry.register(Box::new(notifications_emitted.clone()))?;
        registry.register(Box::new(notification_failures.clone()))?;
        registry.register(Box::new(nearby_candidates.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        Ok(BinMetrics {
            registry,
            telemetry_ingested,
            telemetry_rejected,
            notifications_emitted,
            notification_failures,
            nearby_candidates,
            http_errors_total,
        })
    }

    pub fn record_http_error(&self, service: &str, code: &str, status: u16) {
        self.http_errors_total
            .with_label_values(&[service, code, &status.to_string()])
            .inc();
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_recorded_series() {
        let metrics = BinMetrics::new().expect("metrics");
        metrics.telemetry_ingested.with_label_values(&["full"]).inc();
        metrics.record_http_error("bin-service", "validation_error", 400);
        let text = metrics.render().expect("render");
        assert!(text.contains("bin_telemetry_ingested_total{status=\"full\"} 1"));
        assert!(text.contains("code=\"validation_error\""));
    }

    #[test]
    fn registries_are_independent() {
        let a = BinMetrics::new().expect("a");
        let b = BinMetrics::new().expect("b");
        a.notification_failures.inc();
        assert_eq!(a.notification_failures.get(), 1);
        assert_eq!(b.notification_failures.get(), 0);
    }
}
