pub mod delete_request;
pub mod family;
pub mod login_attempt;
pub mod notification;
pub mod record;
pub mod timestamp;
pub mod user;

pub use delete_request::{DeleteRequest, DeleteRequestStatus, PendingDeleteRequest};
pub use family::{Family, FamilyMember, FamilySummary, MemberRole};
pub use login_attempt::{LoginAttempt, LoginPolicy};
pub use notification::{Notification, NotificationCategory, UnreadCounts};
pub use record::{NewRecord, Record, RecordFilter, RecordType};
pub use user::{User, UserProfile};
