use std::sync::Arc;
use tokio::sync::broadcast;

/// Bounded many-to-many channel carrying shared copies of each message.
/// Slow subscribers lag and skip ahead instead of blocking the publisher,
/// which is the control thread.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    sender: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Topic { sender }
    }

    /// Returns how many subscribers will see `msg`. With none it is dropped.
    pub fn publish(&self, msg: T) -> usize {
        self.sender.send(Arc::new(msg)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let topic: Topic<u32> = Topic::new(4);
        let mut first = topic.subscribe();
        let mut second = topic.subscribe();
        assert_eq!(topic.publish(7), 2);
        assert_eq!(*first.recv().await.unwrap(), 7);
        assert_eq!(*second.recv().await.unwrap(), 7);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let topic: Topic<u32> = Topic::new(4);
        assert_eq!(topic.publish(1), 0);
        let mut late = topic.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_slow_subscriber_lags() {
        let topic: Topic<u32> = Topic::new(2);
        let mut slow = topic.subscribe();
        for i in 0..5 {
            topic.publish(i);
        }
        assert!(matches!(slow.try_recv(), Err(broadcast::error::TryRecvError::Lagged(3))));
        assert_eq!(*slow.try_recv().unwrap(), 3);
    }
}
