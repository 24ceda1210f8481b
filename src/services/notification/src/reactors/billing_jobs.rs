//! Daily bill jobs: the upcoming-payment reminder and the overdue alert
//!
//! Both jobs scan the outstanding bills and send at most one broadcast per
//! tick; individual bills are never addressed.

use super::{Reaction, ReactionOutcome, ReactorContext, SkipReason};
use chrono::{DateTime, Duration, Utc};
use society_shared::types::{NotificationMessage, Target};
use tracing::{debug, error, info, warn};

pub const REMINDER_TITLE: &str = "Payment Reminder";
pub const REMINDER_BODY: &str = "Only 2 days left to pay your bill.";
pub const OVERDUE_TITLE: &str = "Overdue Bill";
pub const OVERDUE_BODY: &str = "Your bill is overdue. Please make payment.";

/// True when some bill falls due after `now` and no later than `now + window`
pub fn reminder_due(due_dates: &[DateTime<Utc>], now: DateTime<Utc>, window: Duration) -> bool {
    let horizon = now + window;
    due_dates.iter().any(|due| now < *due && *due <= horizon)
}

/// True when some bill fell due strictly before `now`
pub fn overdue(due_dates: &[DateTime<Utc>], now: DateTime<Utc>) -> bool {
    due_dates.iter().any(|due| *due < now)
}

/// Due dates of all outstanding bills; `None` when the scan itself failed
async fn outstanding_due_dates(
    ctx: &ReactorContext,
    reaction: Reaction,
) -> Option<Vec<DateTime<Utc>>> {
    let entries = match ctx.store.find_due_bills().await {
        Ok(entries) => entries,
        Err(e) => {
            error!(
                reaction = reaction.as_str(),
                error = %e,
                "Error scanning utility bills"
            );
            return None;
        }
    };

    let mut due_dates = Vec::with_capacity(entries.len());
    for entry in entries {
        let bill = match entry.record {
            Ok(bill) => bill,
            Err(reason) => {
                warn!(
                    reaction = reaction.as_str(),
                    bill_id = %entry.key,
                    %reason,
                    "Skipping undecodable bill"
                );
                continue;
            }
        };

        match bill.due_date() {
            Some(Ok(due)) => due_dates.push(due),
            Some(Err(e)) => warn!(
                reaction = reaction.as_str(),
                bill_id = %entry.key,
                error = %e,
                "Error parsing due date"
            ),
            None => debug!(bill_id = %entry.key, "Bill has no due date"),
        }
    }

    Some(due_dates)
}

async fn broadcast_if(
    ctx: &ReactorContext,
    mut outcome: ReactionOutcome,
    flagged: bool,
    title: &str,
    body: &str,
) -> ReactionOutcome {
    if !flagged {
        info!(reaction = outcome.reaction.as_str(), "No qualifying bills");
        ctx.skip(&mut outcome, SkipReason::NoQualifyingBills);
        return outcome;
    }

    let message =
        NotificationMessage::new(Target::topic(ctx.topics.all_users.as_str()), title, body);
    ctx.deliver(&mut outcome, message).await;
    outcome
}

/// One reminder broadcast if any outstanding bill is due within the window
pub async fn run_billing_reminder(ctx: &ReactorContext, now: DateTime<Utc>) -> ReactionOutcome {
    let mut outcome = ctx.begin(Reaction::BillingReminder);
    let Some(due_dates) = outstanding_due_dates(ctx, Reaction::BillingReminder).await else {
        ctx.skip(&mut outcome, SkipReason::ScanFailed);
        return outcome;
    };

    let flagged = reminder_due(&due_dates, now, ctx.reminder_window);
    broadcast_if(ctx, outcome, flagged, REMINDER_TITLE, REMINDER_BODY).await
}

/// One alert broadcast if any outstanding bill is past due
pub async fn run_overdue_alert(ctx: &ReactorContext, now: DateTime<Utc>) -> ReactionOutcome {
    let mut outcome = ctx.begin(Reaction::OverdueAlert);
    let Some(due_dates) = outstanding_due_dates(ctx, Reaction::OverdueAlert).await else {
        ctx.skip(&mut outcome, SkipReason::ScanFailed);
        return outcome;
    };

    let flagged = overdue(&due_dates, now);
    broadcast_if(ctx, outcome, flagged, OVERDUE_TITLE, OVERDUE_BODY).await
}
