//! services/checkin/src/notifications.rs
//!
//! Durable, role-scoped notification lists and the shared unread counter.
//!
//! This service is the only writer of `notifications_<role>` and
//! `unreadNotifications`. Writes are serialized so a read-modify-write never
//! loses an update, and every change is announced on a broadcast channel so
//! views in the same process can refresh their badge without re-reading.

use attendance_core::ports::{KeyValueStore, PortError, PortResult};
use attendance_core::{NotificationCategory, NotificationRecord, Role};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// Most recent records kept per role.
pub const NOTIFICATION_CAP: usize = 200;
pub const UNREAD_KEY: &str = "unreadNotifications";

fn list_key(role: Role) -> String {
    format!("notifications_{}", role)
}

/// Announced after every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationsChanged {
    pub role: Role,
    pub unread: u32,
}

pub struct NotificationService {
    storage: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
    updates: broadcast::Sender<NotificationsChanged>,
}

impl NotificationService {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        let (updates, _) = broadcast::channel(32);
        Self {
            storage,
            write_lock: Mutex::new(()),
            updates,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationsChanged> {
        self.updates.subscribe()
    }

    /// Newest first. An unreadable list is treated as empty.
    pub async fn list(&self, role: Role) -> PortResult<Vec<NotificationRecord>> {
        let Some(raw) = self.storage.get(&list_key(role)).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(%role, "Discarding unreadable notification list: {}", e);
                Ok(Vec::new())
            }
        }
    }

    pub async fn list_category(
        &self,
        role: Role,
        category: NotificationCategory,
    ) -> PortResult<Vec<NotificationRecord>> {
        Ok(self
            .list(role)
            .await?
            .into_iter()
            .filter(|r| r.category == category)
            .collect())
    }

    pub async fn unread_count(&self) -> PortResult<u32> {
        Ok(self
            .storage
            .get(UNREAD_KEY)
            .await?
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0))
    }

    /// Prepends `record` to the role's list and bumps the unread counter.
    /// Returns the new unread count.
    pub async fn push(&self, role: Role, record: NotificationRecord) -> PortResult<u32> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.list(role).await?;
        records.insert(0, record);
        records.truncate(NOTIFICATION_CAP);
        self.write_list(role, &records).await?;

        let unread = self.unread_count().await?.saturating_add(1);
        self.write_unread(unread).await?;

        debug!(%role, unread, "notification stored");
        self.announce(role, unread);
        Ok(unread)
    }

    /// Marks one record read. Returns false when it was unknown or already read.
    pub async fn mark_read(&self, role: Role, id: Uuid) -> PortResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.list(role).await?;
        let Some(record) = records.iter_mut().find(|r| r.id == id && !r.read) else {
            return Ok(false);
        };
        record.read = true;
        self.write_list(role, &records).await?;

        let unread = self.unread_count().await?.saturating_sub(1);
        self.write_unread(unread).await?;
        self.announce(role, unread);
        Ok(true)
    }

    /// Marks every record of the role read. Returns how many changed.
    pub async fn mark_all_read(&self, role: Role) -> PortResult<u32> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.list(role).await?;
        let mut changed = 0u32;
        for record in records.iter_mut().filter(|r| !r.read) {
            record.read = true;
            changed += 1;
        }
        if changed == 0 {
            return Ok(0);
        }
        self.write_list(role, &records).await?;

        let unread = self.unread_count().await?.saturating_sub(changed);
        self.write_unread(unread).await?;
        self.announce(role, unread);
        Ok(changed)
    }

    async fn write_list(&self, role: Role, records: &[NotificationRecord]) -> PortResult<()> {
        let raw = serde_json::to_string(records)
            .map_err(|e| PortError::Unexpected(format!("Failed to encode notifications: {}", e)))?;
        self.storage.set(&list_key(role), &raw).await
    }

    async fn write_unread(&self, unread: u32) -> PortResult<()> {
        self.storage.set(UNREAD_KEY, &unread.to_string()).await
    }

    fn announce(&self, role: Role, unread: u32) {
        // No subscribers is fine; views re-read on mount.
        let _ = self.updates.send(NotificationsChanged { role, unread });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use chrono::Utc;

    fn record(message: &str, category: NotificationCategory) -> NotificationRecord {
        NotificationRecord {
            id: Uuid::new_v4(),
            kind: "Attendance".into(),
            message: message.into(),
            time_ago: "Just now".into(),
            category,
            details: None,
            action_button: None,
            read: false,
            created_at: Utc::now(),
        }
    }

    fn service() -> NotificationService {
        NotificationService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn push_prepends_and_counts() {
        let service = service();
        service.push(Role::Student, record("first", NotificationCategory::General)).await.unwrap();
        let unread = service
            .push(Role::Student, record("second", NotificationCategory::Completed))
            .await
            .unwrap();

        let list = service.list(Role::Student).await.unwrap();
        assert_eq!(list[0].message, "second");
        assert_eq!(list[1].message, "first");
        assert_eq!(unread, 2);
        assert!(service.list(Role::Lecturer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_capped() {
        let service = service();
        for i in 0..(NOTIFICATION_CAP + 5) {
            service
                .push(Role::Student, record(&format!("n{}", i), NotificationCategory::General))
                .await
                .unwrap();
        }
        let list = service.list(Role::Student).await.unwrap();
        assert_eq!(list.len(), NOTIFICATION_CAP);
        assert_eq!(list[0].message, format!("n{}", NOTIFICATION_CAP + 4));
    }

    #[tokio::test]
    async fn marking_read_decrements_once() {
        let service = service();
        let rec = record("x", NotificationCategory::Completed);
        let id = rec.id;
        service.push(Role::Student, rec).await.unwrap();

        assert!(service.mark_read(Role::Student, id).await.unwrap());
        assert!(!service.mark_read(Role::Student, id).await.unwrap());
        assert_eq!(service.unread_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mark_all_read_and_category_filter() {
        let service = service();
        service.push(Role::Student, record("a", NotificationCategory::Deadline)).await.unwrap();
        service.push(Role::Student, record("b", NotificationCategory::Completed)).await.unwrap();

        let completed = service
            .list_category(Role::Student, NotificationCategory::Completed)
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);

        assert_eq!(service.mark_all_read(Role::Student).await.unwrap(), 2);
        assert_eq!(service.unread_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn subscribers_hear_about_writes() {
        let service = service();
        let mut rx = service.subscribe();
        service.push(Role::Lecturer, record("x", NotificationCategory::General)).await.unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change, NotificationsChanged { role: Role::Lecturer, unread: 1 });
    }
}
