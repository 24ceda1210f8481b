//! Broadcast for newly published notices

use super::{Reaction, ReactionOutcome, ReactorContext};
use society_shared::types::{
    AndroidNotification, AndroidPriority, ApnsConfig, ChangeEvent, NoticeRecord,
    NotificationMessage, Target, CLICK_ACTION, NOTICES,
};
use std::collections::BTreeMap;
use tracing::info;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];
const PDF_EXTENSION: &str = "pdf";

/// Body length before truncation kicks in, in characters
const BODY_LIMIT: usize = 120;
const EMPTY_BODY: &str = "Tap to view notice details";

/// Image and PDF attachments found on a notice
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AttachmentSummary {
    pub image_count: usize,
    pub pdf_count: usize,
    /// First image in list order
    pub image_url: Option<String>,
    pub pdf_urls: Vec<String>,
}

/// Lowercased extension of the URL path, ignoring query string and fragment
fn extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (_, extension) = file_name.rsplit_once('.')?;
    Some(extension.to_ascii_lowercase())
}

pub fn summarize_attachments(attachments: &[String]) -> AttachmentSummary {
    let mut summary = AttachmentSummary::default();

    for url in attachments {
        match extension(url).as_deref() {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => {
                summary.image_count += 1;
                if summary.image_url.is_none() {
                    summary.image_url = Some(url.clone());
                }
            }
            Some(PDF_EXTENSION) => {
                summary.pdf_count += 1;
                summary.pdf_urls.push(url.clone());
            }
            _ => {}
        }
    }

    summary
}

/// Notice content shortened for the notification body
pub fn notification_body(content: &str) -> String {
    let body = if content.chars().count() > BODY_LIMIT {
        let head: String = content.chars().take(BODY_LIMIT).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    };

    if body.trim().is_empty() {
        EMPTY_BODY.to_string()
    } else {
        body
    }
}

pub fn notification_title(priority: &str) -> &'static str {
    match priority {
        "urgent" => "🚨 Urgent Notice",
        "high" => "⚠️ Important Notice",
        _ => "New Notice Published",
    }
}

pub fn build_message(
    topic: &str,
    notice_id: &str,
    notice: &NoticeRecord,
    summary: &AttachmentSummary,
) -> NotificationMessage {
    let title = notification_title(notice.priority());
    let body = notification_body(notice.content());
    let image = summary.image_url.as_deref();
    let android_priority = if notice.priority() == "urgent" {
        AndroidPriority::Max
    } else {
        AndroidPriority::High
    };

    let attachment_count = notice.attachments().len();
    let pdf_urls = serde_json::to_string(&summary.pdf_urls).unwrap_or_else(|_| "[]".to_string());

    let data = BTreeMap::from([
        ("type".to_string(), "notice".to_string()),
        ("noticeId".to_string(), notice_id.to_string()),
        ("title".to_string(), notice.title().to_string()),
        ("category".to_string(), notice.category().to_string()),
        ("priority".to_string(), notice.priority().to_string()),
        (
            "hasAttachments".to_string(),
            (attachment_count > 0).to_string(),
        ),
        ("attachmentCount".to_string(), attachment_count.to_string()),
        ("imageCount".to_string(), summary.image_count.to_string()),
        ("pdfCount".to_string(), summary.pdf_count.to_string()),
        ("imageUrl".to_string(), image.unwrap_or_default().to_string()),
        ("pdfUrls".to_string(), pdf_urls),
        ("click_action".to_string(), CLICK_ACTION.to_string()),
    ]);

    NotificationMessage::new(Target::topic(topic), title, body.as_str())
        .with_image(image)
        .with_android(
            AndroidNotification::new(title, &body, android_priority)
                .with_image(image)
                .with_tag(notice_id),
        )
        .with_apns(
            ApnsConfig::alert(title, &body)
                .with_category("NOTICE_CATEGORY")
                .with_thread("notices")
                .with_image(image),
        )
        .with_data_map(data)
}

/// React to a created notice
pub async fn on_created(ctx: &ReactorContext, event: &ChangeEvent) -> ReactionOutcome {
    let mut outcome = ctx.begin(Reaction::Notice);
    let Some(notice) = ctx.created_record::<NoticeRecord>(&mut outcome, event, NOTICES) else {
        return outcome;
    };

    let summary = summarize_attachments(notice.attachments());
    info!(
        notice_id = %event.key,
        images = summary.image_count,
        pdfs = summary.pdf_count,
        "Composing notice notification"
    );

    let message = build_message(&ctx.topics.all_users, &event.key, &notice, &summary);
    ctx.deliver(&mut outcome, message).await;
    outcome
}
