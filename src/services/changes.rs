use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::cache::BookingCache;

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    BookingsCreated {
        branch_id: String,
        booking_ids: Vec<String>,
    },
    BookingUpdated {
        branch_id: String,
        booking_id: String,
    },
    LeaveUpdated {
        staff_id: String,
    },
}

impl ChangeEvent {
    pub fn branch_id(&self) -> Option<&str> {
        match self {
            ChangeEvent::BookingsCreated { branch_id, .. }
            | ChangeEvent::BookingUpdated { branch_id, .. } => Some(branch_id),
            ChangeEvent::LeaveUpdated { .. } => None,
        }
    }
}

pub fn publish(tx: &broadcast::Sender<ChangeEvent>, event: ChangeEvent) {
    tracing::debug!(?event, "publishing change event");
    // No subscribers is fine
    let _ = tx.send(event);
}

/// Drops the cache entry of every branch a change event touches.
pub fn spawn_cache_invalidator(
    mut rx: broadcast::Receiver<ChangeEvent>,
    cache: Arc<BookingCache>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(branch_id) = event.branch_id() {
                        if cache.invalidate(branch_id) {
                            tracing::debug!(branch_id, "invalidated booking cache");
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Missed events could name any branch
                    tracing::warn!(skipped, "cache invalidator lagged, clearing all branches");
                    cache.clear();
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
