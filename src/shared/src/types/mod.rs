//! Shared type definitions for the society notification platform
//!
//! Record schemas for the watched collections, the change-event envelope
//! delivered by the trigger runtime, and the outbound push message.

pub mod events;
pub mod message;
pub mod records;

pub use events::ChangeEvent;
pub use message::{
    AndroidNotification, AndroidPriority, ApnsConfig, Notification, NotificationMessage, Target,
    ADMIN_TOPIC, ALL_USERS_TOPIC, CLICK_ACTION, DEFAULT_SOUND, HIGH_IMPORTANCE_CHANNEL,
};
pub use records::{
    parse_due_date, Amount, DueDateError, MaintenanceRequestRecord, MemberRecord, NoticeRecord,
    PaymentRecord, UtilityBillRecord, MAINTENANCE_REQUESTS, MEMBERS, NOTICES, NOT_AVAILABLE,
    OUTSTANDING_BILL_STATUSES, PAYMENTS, UTILITY_BILLS,
};
