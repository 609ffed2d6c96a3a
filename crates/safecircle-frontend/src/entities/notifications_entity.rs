use std::collections::BTreeMap;

use safecircle_bridge::notification::{NotificationId, SystemNotification};

/// System notifications currently on screen.
#[derive(Debug, Clone, Default)]
pub struct NotificationsEntity {
    pub shown: BTreeMap<NotificationId, SystemNotification>,
}

impl NotificationsEntity {
    pub fn show(&mut self, notification: SystemNotification) {
        self.shown.insert(notification.id, notification);
    }

    pub fn close(&mut self, id: NotificationId) -> Option<SystemNotification> {
        self.shown.remove(&id)
    }

    pub fn get(&self, id: NotificationId) -> Option<&SystemNotification> {
        self.shown.get(&id)
    }
}
