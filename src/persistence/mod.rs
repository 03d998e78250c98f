//! Typed repositories over the document-store-shaped Postgres schema.
//!
//! Each collection from the data model gets a handful of real columns for
//! fields that are filtered, sorted, or joined on, plus JSONB columns for the
//! nested, schema-light substructures. Every mutating method that both
//! patches a column and appends a timeline event does so in one `UPDATE ...
//! RETURNING` statement so the two changes commit atomically, matching the
//! single-writer-wins compare-and-swap contract the lifecycle controller
//! depends on.

pub mod applications;
pub mod email_logs;
pub mod jobs;
pub mod notifications;
pub mod usage_events;
pub mod users;
pub mod work_items;

pub use applications::ApplicationsRepo;
pub use email_logs::EmailLogsRepo;
pub use jobs::JobsRepo;
pub use notifications::NotificationsRepo;
pub use usage_events::UsageEventsRepo;
pub use users::UsersRepo;
pub use work_items::WorkItemsRepo;
