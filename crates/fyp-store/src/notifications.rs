//! Notification inbox storage.
//!
//! Notifications are append-only; `is_read` is the only column that ever
//! changes after insert.

use chrono::Utc;
use rusqlite::params;

use fyp_shared::types::{NotificationId, UserId};

use crate::convert::{enum_at, opt_uuid_at, time_at, uuid_at};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewNotification, Notification};

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, sender_id, title, message, type, is_read, link, related_id, created_at";

impl Database {
    /// Insert a batch of notifications in one transaction.
    pub fn insert_notifications(&mut self, batch: &[NewNotification]) -> Result<Vec<Notification>> {
        let now = Utc::now();
        let tx = self.conn_mut().transaction()?;
        let mut inserted = Vec::with_capacity(batch.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO notifications (id, recipient_id, sender_id, title, message, type,
                                            is_read, link, related_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9)",
            )?;
            for new in batch {
                let id = NotificationId::new();
                stmt.execute(params![
                    id.to_string(),
                    new.recipient.to_string(),
                    new.sender.map(|s| s.to_string()),
                    new.title,
                    new.message,
                    new.kind.as_str(),
                    new.link,
                    new.related_id,
                    now.to_rfc3339(),
                ])?;
                inserted.push(Notification {
                    id,
                    recipient: new.recipient,
                    sender: new.sender,
                    title: new.title.clone(),
                    message: new.message.clone(),
                    kind: new.kind,
                    is_read: false,
                    link: new.link.clone(),
                    related_id: new.related_id.clone(),
                    created_at: now,
                });
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// A recipient's notifications, newest first.
    pub fn list_notifications(
        &self,
        recipient: UserId,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE recipient_id = ?1 AND (?2 = 0 OR is_read = 0)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![recipient.to_string(), unread_only, limit],
            row_to_notification,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn unread_count(&self, recipient: UserId) -> Result<u32> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
            params![recipient.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Mark one notification read. Only its recipient may do so; anything
    /// else reports [`StoreError::NotFound`].
    pub fn mark_notification_read(&self, id: NotificationId, recipient: UserId) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND recipient_id = ?2",
            params![id.to_string(), recipient.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Returns how many notifications changed.
    pub fn mark_all_notifications_read(&self, recipient: UserId) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
            params![recipient.to_string()],
        )?;
        Ok(affected)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: NotificationId(uuid_at(row, 0)?),
        recipient: UserId(uuid_at(row, 1)?),
        sender: opt_uuid_at(row, 2)?.map(UserId),
        title: row.get(3)?,
        message: row.get(4)?,
        kind: enum_at(row, 5)?,
        is_read: row.get(6)?,
        link: row.get(7)?,
        related_id: row.get(8)?,
        created_at: time_at(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use fyp_shared::types::{NotificationType, Role};

    use super::*;
    use crate::database::test_support::{open, user};

    fn notice(recipient: UserId, title: &str) -> NewNotification {
        NewNotification {
            recipient,
            sender: None,
            title: title.to_string(),
            message: format!("{title} message"),
            kind: NotificationType::Approval,
            link: "/projects".to_string(),
            related_id: None,
        }
    }

    #[test]
    fn test_insert_and_list_newest_first() {
        let (mut db, _dir) = open();
        let alice = user(&db, "Alice", Role::Student);
        let bob = user(&db, "Bob", Role::Student);

        db.insert_notifications(&[notice(alice.id, "first"), notice(bob.id, "other")])
            .unwrap();
        db.insert_notifications(&[notice(alice.id, "second")]).unwrap();

        let inbox = db.list_notifications(alice.id, false, 50).unwrap();
        let titles: Vec<_> = inbox.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
        assert!(inbox.iter().all(|n| !n.is_read));
        assert_eq!(inbox[0].kind, NotificationType::Approval);
    }

    #[test]
    fn test_read_flags() {
        let (mut db, _dir) = open();
        let alice = user(&db, "Alice", Role::Student);
        let bob = user(&db, "Bob", Role::Student);
        let inserted = db
            .insert_notifications(&[notice(alice.id, "a"), notice(alice.id, "b")])
            .unwrap();
        assert_eq!(db.unread_count(alice.id).unwrap(), 2);

        // Someone else cannot mark Alice's notification.
        assert!(matches!(
            db.mark_notification_read(inserted[0].id, bob.id),
            Err(StoreError::NotFound)
        ));

        db.mark_notification_read(inserted[0].id, alice.id).unwrap();
        assert_eq!(db.unread_count(alice.id).unwrap(), 1);
        let unread = db.list_notifications(alice.id, true, 50).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].title, "b");

        assert_eq!(db.mark_all_notifications_read(alice.id).unwrap(), 1);
        assert_eq!(db.unread_count(alice.id).unwrap(), 0);
    }

    #[test]
    fn test_unknown_recipient_rolls_back_batch() {
        let (mut db, _dir) = open();
        let alice = user(&db, "Alice", Role::Student);
        let result = db.insert_notifications(&[notice(alice.id, "ok"), notice(UserId::new(), "bad")]);
        assert!(result.is_err());
        assert_eq!(db.unread_count(alice.id).unwrap(), 0);
    }
}
