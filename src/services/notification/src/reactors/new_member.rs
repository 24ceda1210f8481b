//! Admin alert for newly registered members

use super::{Reaction, ReactionOutcome, ReactorContext};
use society_shared::types::{ChangeEvent, MemberRecord, NotificationMessage, Target, MEMBERS};

pub const TITLE: &str = "New Member Joined";

pub fn body(member: &MemberRecord) -> String {
    format!(
        "{} from Flat {} registered.",
        member.name(),
        member.apartment_number()
    )
}

/// React to a created member
pub async fn on_created(ctx: &ReactorContext, event: &ChangeEvent) -> ReactionOutcome {
    let mut outcome = ctx.begin(Reaction::NewMember);
    let Some(member) = ctx.created_record::<MemberRecord>(&mut outcome, event, MEMBERS) else {
        return outcome;
    };

    let message = NotificationMessage::new(
        Target::topic(ctx.topics.admins.as_str()),
        TITLE,
        body(&member),
    );
    ctx.deliver(&mut outcome, message).await;
    outcome
}
