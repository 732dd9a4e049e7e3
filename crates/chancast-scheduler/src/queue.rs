//! Typed task queues — one unbounded FIFO per task kind.
//!
//! Senders are cheap clones living in the app context; each receiver is
//! owned by exactly one worker loop, which preserves per-kind submission
//! order. Items are ephemeral: the task row is the durable record.

use tokio::sync::mpsc;

use chancast_core::types::TaskKind;
use chancast_core::{ChanCastError, Result};

/// One unit of batch work, popped by exactly one worker of the matching kind.
#[derive(Debug, Clone)]
pub enum QueueItem {
    CreateChannel {
        task_id: i64,
        user_id: i64,
        session_name: String,
        title: String,
    },
    SetUsername {
        task_id: i64,
        session_name: String,
        channel_tid: i64,
        access_hash: i64,
        username: String,
    },
    SetPhoto {
        task_id: i64,
        session_name: String,
        channel_tid: i64,
        access_hash: i64,
        photo_path: String,
    },
    SetDescription {
        task_id: i64,
        session_name: String,
        channel_tid: i64,
        access_hash: i64,
        description: String,
    },
}

impl QueueItem {
    pub fn kind(&self) -> TaskKind {
        match self {
            QueueItem::CreateChannel { .. } => TaskKind::CreateChannel,
            QueueItem::SetUsername { .. } => TaskKind::SetUsername,
            QueueItem::SetPhoto { .. } => TaskKind::SetPhoto,
            QueueItem::SetDescription { .. } => TaskKind::SetDescription,
        }
    }

    pub fn task_id(&self) -> i64 {
        match self {
            QueueItem::CreateChannel { task_id, .. }
            | QueueItem::SetUsername { task_id, .. }
            | QueueItem::SetPhoto { task_id, .. }
            | QueueItem::SetDescription { task_id, .. } => *task_id,
        }
    }
}

/// Producer half of every queue; lives in the app context.
#[derive(Clone)]
pub struct QueueSenders {
    create_channel: mpsc::UnboundedSender<QueueItem>,
    set_username: mpsc::UnboundedSender<QueueItem>,
    set_photo: mpsc::UnboundedSender<QueueItem>,
    set_description: mpsc::UnboundedSender<QueueItem>,
}

impl QueueSenders {
    /// Route an item to the queue of its kind.
    pub fn enqueue(&self, item: QueueItem) -> Result<()> {
        let kind = item.kind();
        let sender = match kind {
            TaskKind::CreateChannel => &self.create_channel,
            TaskKind::SetUsername => &self.set_username,
            TaskKind::SetPhoto => &self.set_photo,
            TaskKind::SetDescription => &self.set_description,
        };
        sender
            .send(item)
            .map_err(|_| ChanCastError::Internal(format!("{kind} queue is closed")))
    }
}

/// Consumer half; taken once at boot by `spawn_workers`.
pub struct QueueReceivers {
    pub create_channel: mpsc::UnboundedReceiver<QueueItem>,
    pub set_username: mpsc::UnboundedReceiver<QueueItem>,
    pub set_photo: mpsc::UnboundedReceiver<QueueItem>,
    pub set_description: mpsc::UnboundedReceiver<QueueItem>,
}

/// Build the full queue set.
pub fn task_queues() -> (QueueSenders, QueueReceivers) {
    let (create_channel_tx, create_channel_rx) = mpsc::unbounded_channel();
    let (set_username_tx, set_username_rx) = mpsc::unbounded_channel();
    let (set_photo_tx, set_photo_rx) = mpsc::unbounded_channel();
    let (set_description_tx, set_description_rx) = mpsc::unbounded_channel();
    (
        QueueSenders {
            create_channel: create_channel_tx,
            set_username: set_username_tx,
            set_photo: set_photo_tx,
            set_description: set_description_tx,
        },
        QueueReceivers {
            create_channel: create_channel_rx,
            set_username: set_username_rx,
            set_photo: set_photo_rx,
            set_description: set_description_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn items_route_by_kind_in_fifo_order() {
        let (senders, mut receivers) = task_queues();

        for title in ["a", "b", "c"] {
            senders
                .enqueue(QueueItem::CreateChannel {
                    task_id: 1,
                    user_id: 1,
                    session_name: "s1".into(),
                    title: title.into(),
                })
                .unwrap();
        }
        senders
            .enqueue(QueueItem::SetDescription {
                task_id: 2,
                session_name: "s1".into(),
                channel_tid: 10,
                access_hash: 0,
                description: "d".into(),
            })
            .unwrap();

        for expected in ["a", "b", "c"] {
            match receivers.create_channel.recv().await.unwrap() {
                QueueItem::CreateChannel { title, .. } => assert_eq!(title, expected),
                other => panic!("wrong queue: {other:?}"),
            }
        }
        assert_eq!(
            receivers.set_description.recv().await.unwrap().task_id(),
            2
        );
    }

    #[tokio::test]
    async fn enqueue_after_worker_death_is_an_internal_error() {
        let (senders, receivers) = task_queues();
        drop(receivers);
        let result = senders.enqueue(QueueItem::SetUsername {
            task_id: 1,
            session_name: "s1".into(),
            channel_tid: 1,
            access_hash: 0,
            username: "u".into(),
        });
        assert!(matches!(result, Err(ChanCastError::Internal(_))));
    }
}
