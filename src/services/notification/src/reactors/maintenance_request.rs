//! Alerts for newly submitted maintenance requests

use super::{Reaction, ReactionOutcome, ReactorContext};
use society_shared::types::{
    AndroidNotification, AndroidPriority, ApnsConfig, ChangeEvent, MaintenanceRequestRecord,
    NotificationMessage, Target, CLICK_ACTION, MAINTENANCE_REQUESTS,
};
use std::collections::BTreeMap;
use tracing::info;

/// Display coding for a request priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityInfo {
    pub emoji: &'static str,
    pub label: &'static str,
    pub android: AndroidPriority,
}

/// Emoji and label match case-insensitively, anything other than high or low
/// counting as normal. The Android priority only honours the exact lowercase
/// values.
pub fn priority_info(priority: &str) -> PriorityInfo {
    let android = android_priority(priority);
    match priority.to_lowercase().as_str() {
        "high" => PriorityInfo {
            emoji: "🔴",
            label: "High Priority",
            android,
        },
        "low" => PriorityInfo {
            emoji: "🟢",
            label: "Low Priority",
            android,
        },
        _ => PriorityInfo {
            emoji: "🟡",
            label: "Normal Priority",
            android,
        },
    }
}

fn android_priority(priority: &str) -> AndroidPriority {
    match priority {
        "high" => AndroidPriority::Max,
        "low" => AndroidPriority::Normal,
        _ => AndroidPriority::High,
    }
}

fn request_data(request_id: &str, request: &MaintenanceRequestRecord) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("type".to_string(), "maintenance".to_string()),
        ("requestId".to_string(), request_id.to_string()),
        ("title".to_string(), request.title().to_string()),
        ("status".to_string(), request.status().to_string()),
        ("priority".to_string(), request.priority().to_string()),
        ("typeCategory".to_string(), request.request_type().to_string()),
        ("userApartment".to_string(), request.flat_number().to_string()),
        ("isPublic".to_string(), request.is_public.to_string()),
        ("click_action".to_string(), CLICK_ACTION.to_string()),
    ])
}

fn compose(
    topic: &str,
    title: &str,
    body: &str,
    priority: &PriorityInfo,
    data: BTreeMap<String, String>,
) -> NotificationMessage {
    NotificationMessage::new(Target::topic(topic), title, body)
        .with_android(AndroidNotification::new(title, body, priority.android))
        .with_apns(
            ApnsConfig::alert(title, body)
                .with_category("MAINTENANCE_CATEGORY")
                .with_thread("maintenance"),
        )
        .with_data_map(data)
}

/// Message for the admin topic, sent for every request
pub fn admin_message(
    topic: &str,
    request_id: &str,
    request: &MaintenanceRequestRecord,
) -> NotificationMessage {
    let priority = priority_info(request.priority());
    let title = format!("{} New Maintenance Request", priority.emoji);
    let body = format!(
        "{} Priority: {}\n\nFlat {}: {}",
        priority.emoji,
        priority.label,
        request.flat_number(),
        request.title()
    );
    compose(topic, &title, &body, &priority, request_data(request_id, request))
}

/// Message for all residents, sent only for public requests
pub fn public_message(
    topic: &str,
    request_id: &str,
    request: &MaintenanceRequestRecord,
) -> NotificationMessage {
    let priority = priority_info(request.priority());
    let title = format!("{} New Public Maintenance Request", priority.emoji);
    let body = format!(
        "Flat {}: {} ({})",
        request.flat_number(),
        request.title(),
        priority.label
    );
    compose(topic, &title, &body, &priority, request_data(request_id, request))
}

/// React to a created maintenance request
///
/// Returns one outcome holding the admin delivery and, for public requests,
/// the broadcast delivery.
pub async fn on_created(ctx: &ReactorContext, event: &ChangeEvent) -> ReactionOutcome {
    let mut outcome = ctx.begin(Reaction::MaintenanceRequest);
    let Some(request) =
        ctx.created_record::<MaintenanceRequestRecord>(&mut outcome, event, MAINTENANCE_REQUESTS)
    else {
        return outcome;
    };

    info!(
        request_id = %event.key,
        priority = request.priority(),
        is_public = request.is_public,
        "Composing maintenance request notification"
    );

    let admin = admin_message(&ctx.topics.admins, &event.key, &request);
    ctx.deliver(&mut outcome, admin).await;

    if request.is_public {
        let public = public_message(&ctx.topics.all_users, &event.key, &request);
        ctx.deliver(&mut outcome, public).await;
    }

    outcome
}
