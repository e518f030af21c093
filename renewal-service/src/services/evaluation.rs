//! Evaluation pass: renew what is due, raise reminders, notify.

use super::metrics;
use super::notifier::{compose_reminder, compose_renewal, Dispatcher};
use super::reminder::ReminderKind;
use super::renewal::{evaluate_subscription, Transition};
use super::repository::{StoredSubscription, SubscriptionRepository};
use crate::calendar::{Clock, TimezoneClock};
use crate::models::Subscription;
use chrono::{DateTime, Utc};
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;

/// A reminder raised during a pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaisedReminder {
    pub subscription_id: String,
    pub name: String,
    #[serde(serialize_with = "serialize_kind")]
    pub kind: ReminderKind,
    pub days_remaining: i64,
    pub hours_remaining: f64,
    /// At least one channel accepted the notice.
    pub delivered: bool,
}

fn serialize_kind<S: serde::Serializer>(kind: &ReminderKind, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.as_str())
}

/// A subscription that could not be processed cleanly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fault {
    pub subscription_id: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub evaluated: usize,
    /// Subscriptions as they are after renewal.
    pub renewed: Vec<Subscription>,
    pub reminders: Vec<RaisedReminder>,
    pub faults: Vec<Fault>,
    /// Reminders were raised but the current hour is outside the
    /// notification hours.
    pub notifications_suppressed: bool,
}

#[derive(Clone)]
pub struct EvaluationService {
    repository: SubscriptionRepository,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
}

impl EvaluationService {
    pub fn new(
        repository: SubscriptionRepository,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            clock,
        }
    }

    pub async fn run_evaluation_pass(&self) -> Result<EvaluationReport, AppError> {
        let now = self.clock.now();
        let started = Instant::now();
        let result = self.run_at(now).await;
        let status = if result.is_ok() { "success" } else { "failure" };
        metrics::record_evaluation_pass(status, started.elapsed().as_secs_f64());
        result
    }

    async fn run_at(&self, now: DateTime<Utc>) -> Result<EvaluationReport, AppError> {
        let settings = self.repository.load_settings().await?;
        let clock = TimezoneClock::new(&settings.timezone);
        let mut report = EvaluationReport::default();
        let mut notices = Vec::new();
        let mut reminder_notices = Vec::new();

        {
            let _guard = self.repository.lock().await;
            let mut entries = self.repository.load_all().await?;
            let mut changed = false;

            for entry in entries.iter_mut() {
                report.evaluated += 1;
                let slot = match entry {
                    StoredSubscription::Valid(subscription) => subscription,
                    StoredSubscription::Malformed { raw, error } => {
                        let subscription_id = raw
                            .get("id")
                            .and_then(|id| id.as_str())
                            .unwrap_or("unknown")
                            .to_string();
                        metrics::record_fault("malformed_subscription");
                        tracing::warn!(
                            subscription_id = %subscription_id,
                            error = %error,
                            "Stored subscription is unreadable, skipped"
                        );
                        report.faults.push(Fault {
                            subscription_id,
                            kind: "malformed_subscription".to_string(),
                            message: error.clone(),
                        });
                        continue;
                    }
                };
                let evaluation = evaluate_subscription(slot, now, &clock);

                if let Some(fault) = &evaluation.fault {
                    metrics::record_fault(fault.kind());
                    tracing::warn!(
                        subscription_id = %slot.id,
                        kind = fault.kind(),
                        error = %fault,
                        "Subscription evaluation fault"
                    );
                    report.faults.push(Fault {
                        subscription_id: slot.id.clone(),
                        kind: fault.kind().to_string(),
                        message: fault.to_string(),
                    });
                }

                if let Transition::Renewed(renewal) = &evaluation.transition {
                    metrics::record_renewal(
                        evaluation.subscription.subscription_mode.as_str(),
                        evaluation.subscription.calendar_kind().as_str(),
                    );
                    notices.push(compose_renewal(&evaluation.subscription, renewal));
                    report.renewed.push(evaluation.subscription.clone());
                    *slot = evaluation.subscription.clone();
                    changed = true;
                }

                if let Some(reminder) = evaluation.reminder {
                    metrics::record_reminder(reminder.kind.as_str());
                    reminder_notices.push(compose_reminder(&evaluation.subscription, &reminder));
                    report.reminders.push(RaisedReminder {
                        subscription_id: evaluation.subscription.id.clone(),
                        name: evaluation.subscription.name.clone(),
                        kind: reminder.kind,
                        days_remaining: reminder.days_remaining,
                        hours_remaining: reminder.hours_remaining,
                        delivered: false,
                    });
                }
            }

            if changed {
                self.repository.save_all(&entries).await?;
            }
        }

        for notice in &notices {
            self.dispatcher
                .dispatch(notice, &settings.enabled_channels)
                .await;
        }

        let local_hour = clock.date_parts(now).hour;
        if !report.reminders.is_empty() && !settings.allows_hour(local_hour) {
            report.notifications_suppressed = true;
            tracing::info!(
                hour = local_hour,
                reminders = report.reminders.len(),
                "Outside notification hours, reminders not sent"
            );
        } else {
            for (raised, notice) in report.reminders.iter_mut().zip(&reminder_notices) {
                raised.delivered = self
                    .dispatcher
                    .dispatch(notice, &settings.enabled_channels)
                    .await
                    .any_delivered();
            }
        }

        tracing::info!(
            evaluated = report.evaluated,
            renewed = report.renewed.len(),
            reminders = report.reminders.len(),
            faults = report.faults.len(),
            timezone = clock.name(),
            "Evaluation pass complete"
        );

        Ok(report)
    }
}
