//! Status updates for the owner of a maintenance request

use super::{Reaction, ReactionOutcome, ReactorContext, SkipReason};
use crate::error::NotificationError;
use society_shared::types::{
    ChangeEvent, MaintenanceRequestRecord, NotificationMessage, Target, MAINTENANCE_REQUESTS,
};
use tracing::{debug, error, info};

/// Title and body for a status the owner is told about; `None` for all others
pub fn status_message(status: &str, request_title: &str) -> Option<(&'static str, String)> {
    match status {
        "in_progress" => Some((
            "Maintenance Started",
            format!(
                "Your maintenance request '{}' is now in progress.",
                request_title
            ),
        )),
        "completed" => Some((
            "Maintenance Completed",
            format!(
                "Your maintenance request '{}' has been completed.",
                request_title
            ),
        )),
        "rejected" => Some((
            "Request Rejected",
            format!("Your request '{}' was rejected.", request_title),
        )),
        _ => None,
    }
}

/// React to an updated maintenance request
pub async fn on_updated(ctx: &ReactorContext, event: &ChangeEvent) -> ReactionOutcome {
    let mut outcome = ctx.begin(Reaction::MaintenanceStatus);

    let snapshots = event
        .decode_before::<MaintenanceRequestRecord>()
        .and_then(|before| Ok((before, event.decode_after::<MaintenanceRequestRecord>()?)));
    let (before, after) = match snapshots {
        Ok((Some(before), Some(after))) => (before, after),
        Ok(_) => {
            debug!(request_id = %event.key, "Update without both snapshots, ignoring");
            ctx.skip(&mut outcome, SkipReason::MissingData);
            return outcome;
        }
        Err(err) => {
            let e = NotificationError::invalid_record(MAINTENANCE_REQUESTS, err.to_string());
            error!(request_id = %event.key, "{}", e);
            ctx.skip(&mut outcome, SkipReason::InvalidRecord);
            return outcome;
        }
    };

    // Raw fields, so two absent statuses compare equal
    if before.status == after.status {
        ctx.skip(&mut outcome, SkipReason::StatusUnchanged);
        return outcome;
    }

    let Some(new_status) = after.status.as_deref() else {
        ctx.skip(&mut outcome, SkipReason::UnhandledStatus);
        return outcome;
    };
    let Some((title, body)) = status_message(new_status, after.status_title()) else {
        debug!(request_id = %event.key, status = new_status, "No notification for status");
        ctx.skip(&mut outcome, SkipReason::UnhandledStatus);
        return outcome;
    };

    let Some(user_id) = after.user_id() else {
        ctx.skip(&mut outcome, SkipReason::MissingUserId);
        return outcome;
    };
    let Some(token) = ctx.member_token(Reaction::MaintenanceStatus, user_id).await else {
        ctx.skip(&mut outcome, SkipReason::NoRecipientToken);
        return outcome;
    };

    info!(request_id = %event.key, status = new_status, "Sending status update");
    ctx.deliver(
        &mut outcome,
        NotificationMessage::new(Target::token(token), title, body),
    )
    .await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactors::testing::*;
    use crate::store::MockDocumentStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_status_table() {
        assert_eq!(
            status_message("in_progress", "Leak"),
            Some((
                "Maintenance Started",
                "Your maintenance request 'Leak' is now in progress.".to_string()
            ))
        );
        assert_eq!(
            status_message("completed", "Leak"),
            Some((
                "Maintenance Completed",
                "Your maintenance request 'Leak' has been completed.".to_string()
            ))
        );
        assert_eq!(
            status_message("rejected", "Leak"),
            Some((
                "Request Rejected",
                "Your request 'Leak' was rejected.".to_string()
            ))
        );
        assert_eq!(status_message("open", "Leak"), None);
        assert_eq!(status_message("In_Progress", "Leak"), None);
    }

    #[tokio::test]
    async fn test_completed_request_notifies_owner() {
        let (sender, captured) = capturing_sender();
        let store = store_with_member("u1", json!({"fcmToken": "tok1"}));
        let ctx = context(sender, store);
        let event = ChangeEvent::updated(
            "r1",
            json!({"title": "Leaking tap", "userId": "u1", "status": "in_progress"}),
            json!({"title": "Leaking tap", "userId": "u1", "status": "completed"}),
        );

        let outcome = on_updated(&ctx, &event).await;
        assert_eq!(outcome.sent_count(), 1);

        let sent = captured.lock();
        assert_eq!(sent[0].target, Target::token("tok1"));
        assert_eq!(sent[0].title(), "Maintenance Completed");
        assert_eq!(
            sent[0].body(),
            "Your maintenance request 'Leaking tap' has been completed."
        );
        assert!(sent[0].data.is_empty());
    }

    #[tokio::test]
    async fn test_default_title() {
        let (sender, captured) = capturing_sender();
        let store = store_with_member("u1", json!({"fcmToken": "tok1"}));
        let ctx = context(sender, store);
        let event = ChangeEvent::updated(
            "r1",
            json!({"userId": "u1", "status": "open"}),
            json!({"userId": "u1", "status": "rejected"}),
        );

        on_updated(&ctx, &event).await;
        assert_eq!(
            captured.lock()[0].body(),
            "Your request 'Maintenance Request' was rejected."
        );
    }

    #[tokio::test]
    async fn test_unchanged_status_is_noop() {
        let ctx = context(silent_sender(), unused_store());

        let same = ChangeEvent::updated(
            "r1",
            json!({"status": "completed", "title": "a"}),
            json!({"status": "completed", "title": "b"}),
        );
        let outcome = on_updated(&ctx, &same).await;
        assert_eq!(outcome.skipped, Some(SkipReason::StatusUnchanged));

        let both_absent = ChangeEvent::updated("r1", json!({}), json!({"title": "b"}));
        let outcome = on_updated(&ctx, &both_absent).await;
        assert_eq!(outcome.skipped, Some(SkipReason::StatusUnchanged));
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_noop() {
        let ctx = context(silent_sender(), unused_store());
        let event = ChangeEvent {
            key: "r1".to_string(),
            before: None,
            after: Some(json!({"status": "completed"})),
        };

        let outcome = on_updated(&ctx, &event).await;
        assert_eq!(outcome.skipped, Some(SkipReason::MissingData));
    }

    #[tokio::test]
    async fn test_unhandled_status_is_noop() {
        let ctx = context(silent_sender(), unused_store());
        let event = ChangeEvent::updated(
            "r1",
            json!({"status": "in_progress", "userId": "u1"}),
            json!({"status": "on_hold", "userId": "u1"}),
        );

        let outcome = on_updated(&ctx, &event).await;
        assert_eq!(outcome.skipped, Some(SkipReason::UnhandledStatus));
    }

    #[tokio::test]
    async fn test_absent_or_empty_token_sends_nothing() {
        for member in [json!({"fcmToken": ""}), json!({"name": "Asha"})] {
            let store = store_with_member("u1", member);
            let ctx = context(silent_sender(), store);
            let event = ChangeEvent::updated(
                "r1",
                json!({"status": "open", "userId": "u1"}),
                json!({"status": "in_progress", "userId": "u1"}),
            );

            let outcome = on_updated(&ctx, &event).await;
            assert_eq!(outcome.skipped, Some(SkipReason::NoRecipientToken));
        }
    }

    #[tokio::test]
    async fn test_unknown_member_sends_nothing() {
        let mut store = MockDocumentStore::new();
        store.expect_get_member().returning(|_| Ok(None));
        let ctx = context(silent_sender(), store);
        let event = ChangeEvent::updated(
            "r1",
            json!({"status": "open", "userId": "ghost"}),
            json!({"status": "completed", "userId": "ghost"}),
        );

        let outcome = on_updated(&ctx, &event).await;
        assert_eq!(outcome.skipped, Some(SkipReason::NoRecipientToken));
    }

    #[tokio::test]
    async fn test_missing_user_id_sends_nothing() {
        let ctx = context(silent_sender(), unused_store());
        let event = ChangeEvent::updated(
            "r1",
            json!({"status": "open"}),
            json!({"status": "completed"}),
        );

        let outcome = on_updated(&ctx, &event).await;
        assert_eq!(outcome.skipped, Some(SkipReason::MissingUserId));
    }
}
