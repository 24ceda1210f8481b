//! End-to-end flows through the dispatcher with the in-memory store and the
//! log channel.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use society_notifier::{
    LogSender, MemoryStore, NotifierConfig, NotifierService, SkipReason,
};
use society_shared::types::{ChangeEvent, Target};
use std::sync::Arc;

fn service(store: MemoryStore) -> (NotifierService, Arc<LogSender>) {
    let sender = Arc::new(LogSender::new());
    let service =
        NotifierService::with_components(NotifierConfig::default(), sender.clone(), Arc::new(store))
            .unwrap();
    (service, sender)
}

#[tokio::test]
async fn payment_notifies_member_then_admins() {
    let store = MemoryStore::new();
    store.insert_member(
        "u1",
        json!({"name": "Asha", "fcmToken": "tok1", "apartmentNumber": "B-12"}),
    );
    let (service, sender) = service(store);

    let event = ChangeEvent::created(
        "p1",
        json!({"userId": "u1", "amount": 500, "transactionId": "T1"}),
    );
    let outcomes = service.dispatcher().payment_created(&event).await;

    assert_eq!(outcomes.len(), 2);
    let sent = sender.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].target, Target::token("tok1"));
    assert_eq!(sent[0].body(), "₹500 received. Transaction ID: T1");
    assert_eq!(sent[1].target, Target::topic("maintenance_admins"));
    assert_eq!(sent[1].body(), "Flat B-12 paid ₹500.");
}

#[tokio::test]
async fn maintenance_status_change_reaches_requester() {
    let store = MemoryStore::new();
    store.insert_member("u7", json!({"fcmToken": "tok7"}));
    let (service, sender) = service(store);
    let dispatcher = service.dispatcher();

    let unchanged = ChangeEvent::updated(
        "r1",
        json!({"title": "Leaking tap", "status": "open", "userId": "u7"}),
        json!({"title": "Leaking tap", "status": "open", "userId": "u7"}),
    );
    let outcome = dispatcher.maintenance_request_updated(&unchanged).await;
    assert_eq!(outcome.skipped, Some(SkipReason::StatusUnchanged));

    let completed = ChangeEvent::updated(
        "r1",
        json!({"title": "Leaking tap", "status": "open", "userId": "u7"}),
        json!({"title": "Leaking tap", "status": "completed", "userId": "u7"}),
    );
    let outcome = dispatcher.maintenance_request_updated(&completed).await;
    assert_eq!(outcome.sent_count(), 1);

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].target, Target::token("tok7"));
}

#[tokio::test]
async fn utility_bill_body_uses_society_offset() {
    let (service, sender) = service(MemoryStore::new());

    let event = ChangeEvent::created(
        "b1",
        json!({"utilityType": "Water", "totalAmount": 1500, "dueDate": "2024-03-15"}),
    );
    service.dispatcher().utility_bill_created(&event).await;

    let sent = sender.sent();
    assert_eq!(sent[0].target, Target::topic("all_users"));
    assert_eq!(sent[0].body(), "Water bill ₹1500 • Due: 3/15/2024");
}

#[tokio::test]
async fn daily_jobs_send_one_broadcast_each() {
    let store = MemoryStore::new();
    store.insert_bill(
        "late",
        json!({"isActive": true, "status": "overdue", "dueDate": "2024-02-20"}),
    );
    store.insert_bill(
        "soon",
        json!({"isActive": true, "status": "pending", "dueDate": "2024-03-02T12:00:00Z"}),
    );
    store.insert_bill(
        "also_soon",
        json!({"isActive": true, "status": "pending", "dueDate": "2024-03-02T18:00:00Z"}),
    );
    store.insert_bill(
        "paid",
        json!({"isActive": true, "status": "paid", "dueDate": "2024-03-02"}),
    );
    store.insert_bill("broken", json!({"isActive": true, "status": "pending", "dueDate": "soon"}));
    let (service, sender) = service(store);
    let dispatcher = service.dispatcher();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 3, 30, 0).unwrap();

    let reminder = dispatcher.run_billing_reminder(now).await;
    let overdue = dispatcher.run_overdue_alert(now).await;

    assert_eq!(reminder.sent_count(), 1);
    assert_eq!(overdue.sent_count(), 1);
    let sent = sender.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].title(), "Payment Reminder");
    assert_eq!(sent[1].title(), "Overdue Bill");
    assert!(sent.iter().all(|m| m.target == Target::topic("all_users")));
}

#[tokio::test]
async fn nothing_due_means_no_broadcast() {
    let (service, sender) = service(MemoryStore::new());
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 3, 30, 0).unwrap();

    let outcome = service.dispatcher().run_billing_reminder(now).await;

    assert_eq!(outcome.skipped, Some(SkipReason::NoQualifyingBills));
    assert!(sender.sent().is_empty());
}
