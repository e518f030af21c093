//! Metrics module for renewal-service.
//! Provides Prometheus metrics for evaluation passes, renewals and reminders.

use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Evaluation passes by outcome
pub static EVALUATION_PASSES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Evaluation pass duration histogram
pub static EVALUATION_PASS_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Automatic renewals by mode and calendar
pub static RENEWALS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Reminders raised by kind
pub static REMINDERS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Notification deliveries by channel and status
pub static NOTIFICATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Per-subscription faults for alerting
pub static FAULTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() {
    EVALUATION_PASSES_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "renewal_evaluation_passes_total",
                "Total evaluation passes by status"
            ),
            &["status"]
        )
        .expect("Failed to register EVALUATION_PASSES_TOTAL")
    });

    EVALUATION_PASS_DURATION.get_or_init(|| {
        register_histogram_vec!(
            histogram_opts!(
                "renewal_evaluation_pass_duration_seconds",
                "Evaluation pass duration",
                vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0]
            ),
            &["status"]
        )
        .expect("Failed to register EVALUATION_PASS_DURATION")
    });

    RENEWALS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "renewal_auto_renewals_total",
                "Total automatic renewals by mode and calendar"
            ),
            &["mode", "calendar"]
        )
        .expect("Failed to register RENEWALS_TOTAL")
    });

    REMINDERS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("renewal_reminders_total", "Total reminders raised by kind"),
            &["kind"]
        )
        .expect("Failed to register REMINDERS_TOTAL")
    });

    NOTIFICATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "renewal_notifications_total",
                "Total notification deliveries by channel and status"
            ),
            &["channel", "status"]
        )
        .expect("Failed to register NOTIFICATIONS_TOTAL")
    });

    FAULTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "renewal_subscription_faults_total",
                "Total per-subscription faults by kind"
            ),
            &["kind"]
        )
        .expect("Failed to register FAULTS_TOTAL")
    });
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record a finished evaluation pass.
pub fn record_evaluation_pass(status: &str, duration_secs: f64) {
    if let Some(counter) = EVALUATION_PASSES_TOTAL.get() {
        counter.with_label_values(&[status]).inc();
    }
    if let Some(histogram) = EVALUATION_PASS_DURATION.get() {
        histogram.with_label_values(&[status]).observe(duration_secs);
    }
}

/// Record an automatic renewal.
pub fn record_renewal(mode: &str, calendar: &str) {
    if let Some(counter) = RENEWALS_TOTAL.get() {
        counter.with_label_values(&[mode, calendar]).inc();
    }
}

/// Record a reminder raised by evaluation.
pub fn record_reminder(kind: &str) {
    if let Some(counter) = REMINDERS_TOTAL.get() {
        counter.with_label_values(&[kind]).inc();
    }
}

/// Record one channel delivery.
pub fn record_notification(channel: &str, status: &str) {
    if let Some(counter) = NOTIFICATIONS_TOTAL.get() {
        counter.with_label_values(&[channel, status]).inc();
    }
}

/// Record a per-subscription fault.
pub fn record_fault(kind: &str) {
    if let Some(counter) = FAULTS_TOTAL.get() {
        counter.with_label_values(&[kind]).inc();
    }
}
