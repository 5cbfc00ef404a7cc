use serde_json::Value;
use tokio::sync::broadcast;

use super::Filter;

/// A push notification for a single row. Delete events carry only the
/// row id, so a row filter cannot be evaluated against them; they are
/// always delivered and the consumer's merge treats unknown ids as a
/// no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Inserted(Value),
    Updated(Value),
    Deleted { id: String },
}

impl ChangeEvent {
    pub fn row_id(&self) -> Option<&str> {
        match self {
            Self::Inserted(row) | Self::Updated(row) => row.get("id").and_then(Value::as_str),
            Self::Deleted { id } => Some(id),
        }
    }

    fn passes(&self, filter: &Filter) -> bool {
        match self {
            Self::Inserted(row) | Self::Updated(row) => filter.matches(row),
            Self::Deleted { .. } => true,
        }
    }
}

/// A live push channel for one table. Dropping the subscription is the
/// unsubscribe: the receiver closes and no further events are delivered.
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
    filter: Option<Filter>,
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<ChangeEvent>, filter: Option<Filter>) -> Self {
        Self { rx, filter }
    }

    /// Wait for the next matching event. Returns `None` once the channel
    /// closes. A lagged receiver skips ahead; there is no replay, so a
    /// consumer that needs a complete picture must re-fetch.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.filter.as_ref().map(|f| event.passes(f)).unwrap_or(true) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Push channel lagged, {} events dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn recv_skips_events_that_fail_the_filter() {
        let (tx, rx) = broadcast::channel(8);
        let mut sub = Subscription::new(rx, Some(Filter::eq("post_id", "p-1")));

        tx.send(ChangeEvent::Inserted(json!({"id": "a", "post_id": "p-2"})))
            .unwrap();
        tx.send(ChangeEvent::Inserted(json!({"id": "b", "post_id": "p-1"})))
            .unwrap();
        drop(tx);

        let event = sub.recv().await.unwrap();
        assert_eq!(event.row_id(), Some("b"));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn delete_events_always_pass_row_filters() {
        let (tx, rx) = broadcast::channel(8);
        let mut sub = Subscription::new(rx, Some(Filter::eq("post_id", "p-1")));

        tx.send(ChangeEvent::Deleted { id: "x".into() }).unwrap();
        drop(tx);

        assert_eq!(
            sub.recv().await,
            Some(ChangeEvent::Deleted { id: "x".into() })
        );
    }

    #[tokio::test]
    async fn recv_returns_none_when_channel_closes() {
        let (tx, rx) = broadcast::channel::<ChangeEvent>(8);
        let mut sub = Subscription::new(rx, None);
        drop(tx);
        assert!(sub.recv().await.is_none());
    }
}
