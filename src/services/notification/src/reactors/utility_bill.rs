//! Broadcast for newly generated utility bills

use super::{DateDisplay, Reaction, ReactionOutcome, ReactorContext};
use society_shared::types::{
    ChangeEvent, NotificationMessage, Target, UtilityBillRecord, NOT_AVAILABLE, UTILITY_BILLS,
};
use tracing::warn;

pub const TITLE: &str = "New Bill Generated";

/// Due date as shown to residents, or `N/A` when missing or unparseable
pub fn due_date_label(bill: &UtilityBillRecord, dates: &DateDisplay) -> String {
    match bill.due_date() {
        Some(Ok(due)) => dates.render(due),
        Some(Err(e)) => {
            warn!(error = %e, "Unparseable bill due date");
            NOT_AVAILABLE.to_string()
        }
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn body(bill: &UtilityBillRecord, dates: &DateDisplay) -> String {
    format!(
        "{} bill ₹{} • Due: {}",
        bill.utility_type(),
        bill.total_amount(),
        due_date_label(bill, dates)
    )
}

/// React to a created utility bill
pub async fn on_created(ctx: &ReactorContext, event: &ChangeEvent) -> ReactionOutcome {
    let mut outcome = ctx.begin(Reaction::UtilityBill);
    let Some(bill) = ctx.created_record::<UtilityBillRecord>(&mut outcome, event, UTILITY_BILLS)
    else {
        return outcome;
    };

    let message = NotificationMessage::new(
        Target::topic(ctx.topics.all_users.as_str()),
        TITLE,
        body(&bill, &ctx.dates),
    );
    ctx.deliver(&mut outcome, message).await;
    outcome
}
