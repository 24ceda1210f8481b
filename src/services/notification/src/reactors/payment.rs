//! Payment notifications
//!
//! A created payment triggers two independent reactions: a confirmation to the
//! paying member's device and a summary for the admin topic. Neither depends
//! on the other's outcome.

use super::{Reaction, ReactionOutcome, ReactorContext, SkipReason};
use society_shared::types::{
    ChangeEvent, NotificationMessage, PaymentRecord, Target, NOT_AVAILABLE, PAYMENTS,
};
use tracing::debug;

pub const CONFIRMATION_TITLE: &str = "Payment Successful";
pub const RECEIVED_TITLE: &str = "Payment Received";

pub fn confirmation_body(payment: &PaymentRecord) -> String {
    format!(
        "₹{} received. Transaction ID: {}",
        payment.amount(),
        payment.transaction_reference()
    )
}

pub fn received_body(flat_number: &str, payment: &PaymentRecord) -> String {
    format!("Flat {} paid ₹{}.", flat_number, payment.amount())
}

/// Confirmation sent to the paying member
pub async fn confirm_to_member(ctx: &ReactorContext, event: &ChangeEvent) -> ReactionOutcome {
    let mut outcome = ctx.begin(Reaction::PaymentConfirmation);
    let Some(payment) = ctx.created_record::<PaymentRecord>(&mut outcome, event, PAYMENTS) else {
        return outcome;
    };

    let Some(user_id) = payment.user_id() else {
        debug!(payment_id = %event.key, "Payment without userId, no confirmation");
        ctx.skip(&mut outcome, SkipReason::MissingUserId);
        return outcome;
    };
    let Some(token) = ctx.member_token(Reaction::PaymentConfirmation, user_id).await else {
        ctx.skip(&mut outcome, SkipReason::NoRecipientToken);
        return outcome;
    };

    let message = NotificationMessage::new(
        Target::token(token),
        CONFIRMATION_TITLE,
        confirmation_body(&payment),
    );
    ctx.deliver(&mut outcome, message).await;
    outcome
}

/// Summary sent to the admin topic
pub async fn notify_admins(ctx: &ReactorContext, event: &ChangeEvent) -> ReactionOutcome {
    let mut outcome = ctx.begin(Reaction::PaymentReceived);
    let Some(payment) = ctx.created_record::<PaymentRecord>(&mut outcome, event, PAYMENTS) else {
        return outcome;
    };

    let flat_number = match payment.user_id() {
        Some(user_id) => ctx
            .find_member(Reaction::PaymentReceived, user_id)
            .await
            .map(|member| member.flat_number().to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        None => NOT_AVAILABLE.to_string(),
    };

    let message = NotificationMessage::new(
        Target::topic(ctx.topics.admins.as_str()),
        RECEIVED_TITLE,
        received_body(&flat_number, &payment),
    );
    ctx.deliver(&mut outcome, message).await;
    outcome
}

/// Run both payment reactions for one created payment
pub async fn on_created(ctx: &ReactorContext, event: &ChangeEvent) -> Vec<ReactionOutcome> {
    let confirmation = confirm_to_member(ctx, event).await;
    let summary = notify_admins(ctx, event).await;
    vec![confirmation, summary]
}
