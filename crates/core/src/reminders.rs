//! Calendar-reminder collaborator for lease end dates.

use async_trait::async_trait;

use crate::Result;

/// External calendar integration mirroring lease end dates as reminders.
///
/// Invoked by the repository whenever a lessee's end date is set, changed,
/// or the lessee is removed. Failures never propagate into write outcomes.
#[async_trait]
pub trait LeaseReminderService: Send + Sync {
    /// Creates a reminder and returns its id. An empty id means the
    /// integration declined to create one.
    async fn insert_reminder(&self, date: &str, text: &str) -> Result<String>;

    async fn update_reminder(&self, reminder_id: &str, date: &str, text: &str) -> Result<()>;

    async fn delete_reminder(&self, reminder_id: &str) -> Result<()>;
}

/// Reminder sink for setups without a calendar integration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReminders;

#[async_trait]
impl LeaseReminderService for NoopReminders {
    async fn insert_reminder(&self, _date: &str, _text: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn update_reminder(&self, _reminder_id: &str, _date: &str, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_reminder(&self, _reminder_id: &str) -> Result<()> {
        Ok(())
    }
}
