//! Renewal integration tests for renewal-service.

mod common;

use common::{monthly, utc, ymd, TestApp};
use renewal_service::calendar::PeriodUnit;
use renewal_service::models::{
    CreateSubscription, ManualRenewal, PaymentPatch, PaymentType, SubscriptionMode,
};
use renewal_service::services::{BlobStore, ReminderKind};
use rust_decimal::Decimal;
use service_core::error::AppError;

#[tokio::test]
async fn cycle_mode_catches_up_with_one_payment() {
    let app = TestApp::new(utc(2024, 1, 10, 12)).await;
    let created = app
        .subscriptions
        .create_subscription(monthly("Streaming", ymd(2024, 1, 1), ymd(2024, 2, 1)))
        .await
        .expect("Failed to create subscription");
    assert_eq!(created.payment_history.len(), 1);
    assert_eq!(created.payment_history[0].payment_type, PaymentType::Initial);

    // Seven months pass without an evaluation.
    app.clock.set(utc(2024, 8, 10, 12));
    let report = app.evaluation.run_evaluation_pass().await.unwrap();

    assert_eq!(report.evaluated, 1);
    assert_eq!(report.renewed.len(), 1);
    assert!(report.faults.is_empty());

    let stored = app.subscriptions.get_subscription(&created.id).await.unwrap();
    assert_eq!(stored.expiry_date, ymd(2024, 9, 1));
    assert_eq!(stored.start_date, Some(ymd(2024, 2, 1)));
    assert_eq!(stored.last_payment_date, Some(utc(2024, 8, 10, 12)));

    let autos: Vec<_> = stored
        .payment_history
        .iter()
        .filter(|p| p.payment_type == PaymentType::Auto)
        .collect();
    assert_eq!(autos.len(), 1, "catch-up records a single payment");
    assert_eq!(autos[0].period_start, ymd(2024, 2, 1));
    assert_eq!(autos[0].period_end, ymd(2024, 9, 1));
    assert_eq!(autos[0].note, "Auto renewal, 7 periods");
    assert_eq!(autos[0].amount, Decimal::new(1500, 2));

    // Nothing left to renew on the next pass.
    let again = app.evaluation.run_evaluation_pass().await.unwrap();
    assert!(again.renewed.is_empty());
    let unchanged = app.subscriptions.get_subscription(&created.id).await.unwrap();
    assert_eq!(unchanged.payment_history.len(), 2);
}

#[tokio::test]
async fn reset_mode_restarts_from_today() {
    let app = TestApp::new(utc(2024, 1, 10, 12)).await;
    let created = app
        .subscriptions
        .create_subscription(CreateSubscription {
            subscription_mode: SubscriptionMode::Reset,
            ..monthly("Gym", ymd(2024, 1, 1), ymd(2024, 2, 1))
        })
        .await
        .unwrap();

    app.clock.set(utc(2024, 8, 10, 12));
    app.evaluation.run_evaluation_pass().await.unwrap();

    let stored = app.subscriptions.get_subscription(&created.id).await.unwrap();
    assert_eq!(stored.start_date, Some(ymd(2024, 8, 10)));
    assert_eq!(stored.expiry_date, ymd(2024, 9, 10));
    let last = stored.payment_history.last().unwrap();
    assert_eq!(last.payment_type, PaymentType::Auto);
    assert_eq!(last.note, "Auto renewal");
    assert_eq!((last.period_start, last.period_end), (ymd(2024, 8, 10), ymd(2024, 9, 10)));
}

#[tokio::test]
async fn expired_subscription_is_fast_forwarded_on_creation() {
    let app = TestApp::new(utc(2024, 8, 10, 12)).await;
    let created = app
        .subscriptions
        .create_subscription(monthly("Cloud storage", ymd(2024, 1, 1), ymd(2024, 2, 1)))
        .await
        .unwrap();

    assert_eq!(created.expiry_date, ymd(2024, 9, 1));
    assert_eq!(created.start_date, Some(ymd(2024, 8, 1)));
    assert_eq!(created.payment_history.len(), 1);
    let initial = &created.payment_history[0];
    assert_eq!(initial.payment_type, PaymentType::Initial);
    assert_eq!(initial.note, "Initial subscription");
    assert_eq!((initial.period_start, initial.period_end), (ymd(2024, 8, 1), ymd(2024, 9, 1)));
}

#[tokio::test]
async fn expired_subscription_without_auto_renew_is_fast_forwarded_on_creation() {
    let app = TestApp::new(utc(2024, 8, 10, 12)).await;
    let created = app
        .subscriptions
        .create_subscription(CreateSubscription {
            auto_renew: Some(false),
            ..monthly("Magazine", ymd(2024, 1, 1), ymd(2024, 2, 1))
        })
        .await
        .unwrap();

    assert!(!created.auto_renew);
    assert_eq!(created.expiry_date, ymd(2024, 9, 1));
    assert_eq!(created.start_date, Some(ymd(2024, 8, 1)));
    assert_eq!(created.payment_history.len(), 1);
    assert_eq!(created.payment_history[0].payment_type, PaymentType::Initial);

    // Not overdue right after creation.
    let report = app.evaluation.run_evaluation_pass().await.unwrap();
    assert!(report.reminders.is_empty());
    assert!(report.renewed.is_empty());
}

#[tokio::test]
async fn expiry_defaults_to_one_period_after_start() {
    let app = TestApp::new(utc(2024, 1, 10, 12)).await;
    let created = app
        .subscriptions
        .create_subscription(CreateSubscription {
            expiry_date: None,
            period_value: Some(3),
            ..monthly("Quarterly", ymd(2024, 1, 5), ymd(2024, 1, 5))
        })
        .await
        .unwrap();
    assert_eq!(created.expiry_date, ymd(2024, 4, 5));
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let app = TestApp::new(utc(2024, 1, 10, 12)).await;

    let blank = app
        .subscriptions
        .create_subscription(monthly("  ", ymd(2024, 1, 1), ymd(2024, 2, 1)))
        .await;
    assert!(matches!(blank, Err(AppError::BadRequest(_))));

    let no_dates = app
        .subscriptions
        .create_subscription(CreateSubscription {
            name: "Undated".to_string(),
            ..CreateSubscription::default()
        })
        .await;
    assert!(matches!(no_dates, Err(AppError::BadRequest(_))));

    let half_period = app
        .subscriptions
        .create_subscription(CreateSubscription {
            period_unit: None,
            ..monthly("Half", ymd(2024, 1, 1), ymd(2024, 2, 1))
        })
        .await;
    assert!(matches!(half_period, Err(AppError::BadRequest(_))));

    assert!(app.subscriptions.list_subscriptions().await.unwrap().is_empty());
}

#[tokio::test]
async fn manual_renewal_applies_multiplier() {
    let app = TestApp::new(utc(2024, 1, 10, 12)).await;
    let created = app
        .subscriptions
        .create_subscription(monthly("News", ymd(2024, 1, 1), ymd(2024, 2, 1)))
        .await
        .unwrap();

    let (renewed, payment) = app
        .subscriptions
        .manual_renew(
            &created.id,
            ManualRenewal {
                amount: Some(Decimal::new(4000, 2)),
                period_multiplier: Some(3),
                note: Some("Quarter paid upfront".to_string()),
                ..ManualRenewal::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(renewed.expiry_date, ymd(2024, 5, 1));
    assert_eq!(payment.payment_type, PaymentType::Manual);
    assert_eq!(payment.amount, Decimal::new(4000, 2));
    assert_eq!(payment.note, "Quarter paid upfront");
    assert_eq!((payment.period_start, payment.period_end), (ymd(2024, 2, 1), ymd(2024, 5, 1)));
    assert_eq!(renewed.payment_history.len(), 2);
}

#[tokio::test]
async fn deleting_a_payment_restores_expiry() {
    let app = TestApp::new(utc(2024, 1, 10, 12)).await;
    let created = app
        .subscriptions
        .create_subscription(monthly("Music", ymd(2024, 1, 1), ymd(2024, 2, 1)))
        .await
        .unwrap();

    app.clock.set(utc(2024, 1, 20, 9));
    let (renewed, payment) = app
        .subscriptions
        .manual_renew(&created.id, ManualRenewal::default())
        .await
        .unwrap();
    assert_eq!(renewed.expiry_date, ymd(2024, 3, 1));
    assert_eq!(payment.note, "Manual renewal");
    assert_eq!(renewed.last_payment_date, Some(utc(2024, 1, 20, 9)));

    let restored = app
        .subscriptions
        .delete_payment(&created.id, &payment.id)
        .await
        .unwrap();
    assert_eq!(restored.expiry_date, ymd(2024, 2, 1));
    assert_eq!(restored.payment_history.len(), 1);
    assert_eq!(restored.last_payment_date, Some(utc(2024, 1, 10, 12)));

    let missing = app.subscriptions.delete_payment(&created.id, &payment.id).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn editing_a_payment_keeps_dates() {
    let app = TestApp::new(utc(2024, 1, 10, 12)).await;
    let created = app
        .subscriptions
        .create_subscription(monthly("VPN", ymd(2024, 1, 1), ymd(2024, 2, 1)))
        .await
        .unwrap();
    let initial_id = created.payment_history[0].id.clone();

    let edited = app
        .subscriptions
        .edit_payment(
            &created.id,
            &initial_id,
            PaymentPatch {
                amount: Some(Decimal::new(1200, 2)),
                note: Some("Promo price".to_string()),
                ..PaymentPatch::default()
            },
        )
        .await
        .unwrap();

    let record = &edited.payment_history[0];
    assert_eq!(record.amount, Decimal::new(1200, 2));
    assert_eq!(record.note, "Promo price");
    assert_eq!(edited.expiry_date, ymd(2024, 2, 1));
}

#[tokio::test]
async fn malformed_subscription_does_not_stop_the_pass() {
    let app = TestApp::new(utc(2024, 1, 10, 12)).await;
    let broken = app
        .subscriptions
        .create_subscription(CreateSubscription {
            name: "No period".to_string(),
            expiry_date: Some(ymd(2024, 2, 1)),
            auto_renew: Some(true),
            ..CreateSubscription::default()
        })
        .await
        .unwrap();
    let healthy = app
        .subscriptions
        .create_subscription(monthly("Healthy", ymd(2024, 1, 1), ymd(2024, 2, 1)))
        .await
        .unwrap();

    app.clock.set(utc(2024, 3, 15, 12));
    let report = app.evaluation.run_evaluation_pass().await.unwrap();

    assert_eq!(report.evaluated, 2);
    assert_eq!(report.faults.len(), 1);
    assert_eq!(report.faults[0].subscription_id, broken.id);
    assert_eq!(report.faults[0].kind, "malformed_subscription");

    assert_eq!(report.renewed.len(), 1);
    assert_eq!(report.renewed[0].id, healthy.id);
    assert_eq!(report.renewed[0].expiry_date, ymd(2024, 4, 1));

    // The broken one is still reported as overdue.
    assert_eq!(report.reminders.len(), 1);
    assert_eq!(report.reminders[0].subscription_id, broken.id);
    assert_eq!(report.reminders[0].kind, ReminderKind::Overdue);

    let stored = app.subscriptions.get_subscription(&broken.id).await.unwrap();
    assert_eq!(stored.expiry_date, ymd(2024, 2, 1));
    assert_eq!(stored.payment_history.len(), 1);
}

#[tokio::test]
async fn lunar_monthly_renewal_follows_new_moons() {
    let app = TestApp::new(utc(2024, 2, 1, 12)).await;
    let created = app
        .subscriptions
        .create_subscription(CreateSubscription {
            use_lunar_cycle: true,
            ..monthly("Temple offering", ymd(2024, 1, 11), ymd(2024, 2, 10))
        })
        .await
        .unwrap();

    app.clock.set(utc(2024, 3, 20, 12));
    let report = app.evaluation.run_evaluation_pass().await.unwrap();
    assert!(report.faults.is_empty());

    let stored = app.subscriptions.get_subscription(&created.id).await.unwrap();
    // Lunar 2/1 was Mar 10; lunar 3/1 is Apr 9.
    assert_eq!(stored.expiry_date, ymd(2024, 4, 9));
    assert_eq!(stored.payment_history.last().unwrap().note, "Auto renewal, 2 periods");
}

#[tokio::test]
async fn lunar_yearly_renewal_past_table_uses_solar_dates() {
    let app = TestApp::new(utc(2100, 11, 15, 0)).await;
    let created = app
        .subscriptions
        .create_subscription(CreateSubscription {
            use_lunar_cycle: true,
            period_unit: Some(PeriodUnit::Year),
            ..monthly("Family dues", ymd(2100, 11, 15), ymd(2100, 12, 1))
        })
        .await
        .unwrap();

    app.clock.set(utc(2101, 1, 15, 0));
    let report = app.evaluation.run_evaluation_pass().await.unwrap();
    assert!(report.faults.is_empty());
    assert_eq!(report.renewed.len(), 1);

    let stored = app.subscriptions.get_subscription(&created.id).await.unwrap();
    assert_eq!(stored.expiry_date, ymd(2101, 12, 1));

    let notice = app
        .sender
        .sent()
        .into_iter()
        .find(|n| n.title.contains("renewed"))
        .expect("renewal notice sent");
    assert!(notice.body.contains("solar dates used"));

    // Later passes keep working on the stored solar expiry.
    app.clock.set(utc(2101, 6, 1, 0));
    let later = app.evaluation.run_evaluation_pass().await.unwrap();
    assert!(later.faults.is_empty());
    assert!(later.renewed.is_empty());
}

#[tokio::test]
async fn inactive_subscription_is_left_alone() {
    let app = TestApp::new(utc(2024, 1, 10, 12)).await;
    let created = app
        .subscriptions
        .create_subscription(monthly("Paused", ymd(2024, 1, 1), ymd(2024, 2, 1)))
        .await
        .unwrap();
    app.subscriptions.toggle_active(&created.id, false).await.unwrap();

    app.clock.set(utc(2024, 6, 1, 12));
    let report = app.evaluation.run_evaluation_pass().await.unwrap();

    assert_eq!(report.evaluated, 1);
    assert!(report.renewed.is_empty());
    assert!(report.reminders.is_empty());
    assert_eq!(app.sender.send_count(), 0);

    let stored = app.subscriptions.get_subscription(&created.id).await.unwrap();
    assert_eq!(stored.expiry_date, ymd(2024, 2, 1));
}

#[tokio::test]
async fn renewal_notice_is_sent_for_each_renewal() {
    let app = TestApp::new(utc(2024, 1, 10, 12)).await;
    for name in ["One", "Two"] {
        app.subscriptions
            .create_subscription(monthly(name, ymd(2024, 1, 1), ymd(2024, 2, 1)))
            .await
            .unwrap();
    }

    app.clock.set(utc(2024, 2, 15, 12));
    let report = app.evaluation.run_evaluation_pass().await.unwrap();
    assert_eq!(report.renewed.len(), 2);

    let sent = app.sender.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|n| n.title.starts_with("Subscription renewed: ")));
    assert!(sent.iter().all(|n| n.tags.contains(&"renewal".to_string())));
}

#[tokio::test]
async fn unreadable_record_does_not_stop_the_pass() {
    let app = TestApp::new(utc(2024, 1, 10, 12)).await;
    let healthy = app
        .subscriptions
        .create_subscription(monthly("Healthy", ymd(2024, 1, 1), ymd(2024, 2, 1)))
        .await
        .unwrap();

    // Append a copy whose period unit this version does not know.
    let key = format!("{}:subscriptions", app.key_prefix);
    let raw = app.store.get(&key).await.unwrap().expect("subscriptions blob");
    let mut records: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
    let mut unreadable = records[0].clone();
    unreadable["id"] = serde_json::json!("legacy-weekly");
    unreadable["periodUnit"] = serde_json::json!("week");
    records.push(unreadable);
    app.store
        .put(&key, &serde_json::to_string(&records).unwrap())
        .await
        .unwrap();

    app.clock.set(utc(2024, 3, 15, 12));
    let report = app.evaluation.run_evaluation_pass().await.unwrap();

    assert_eq!(report.evaluated, 2);
    assert_eq!(report.renewed.len(), 1);
    assert_eq!(report.renewed[0].id, healthy.id);
    assert_eq!(report.renewed[0].expiry_date, ymd(2024, 4, 1));
    assert_eq!(report.faults.len(), 1);
    assert_eq!(report.faults[0].subscription_id, "legacy-weekly");
    assert_eq!(report.faults[0].kind, "malformed_subscription");

    // The unreadable record survives the save untouched.
    let saved: Vec<serde_json::Value> =
        serde_json::from_str(&app.store.get(&key).await.unwrap().unwrap()).unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[1]["id"], "legacy-weekly");
    assert_eq!(saved[1]["periodUnit"], "week");
    assert_eq!(saved[1]["expiryDate"], "2024-02-01");

    // Reads skip it, and it can still be removed by id.
    assert_eq!(app.subscriptions.list_subscriptions().await.unwrap().len(), 1);
    app.subscriptions
        .delete_subscription("legacy-weekly")
        .await
        .unwrap();
    let remaining: Vec<serde_json::Value> =
        serde_json::from_str(&app.store.get(&key).await.unwrap().unwrap()).unwrap();
    assert_eq!(remaining.len(), 1);
}
