//! Last-value-wins channels.
//!
//! A producer publishing into a full channel replaces the event the consumer
//! has not taken yet, so a slow consumer only ever sees the latest value.
//! Used for store-to-listener snapshot delivery and for state watchers.

use crossbeam_channel::{bounded, Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Create a connected sender/receiver pair holding at most one value.
pub fn latest_channel<T>() -> (LatestSender<T>, LatestReceiver<T>) {
    let (sender, receiver) = bounded(1);
    let alive = Arc::new(());
    let tx = LatestSender {
        sender,
        evict: receiver.clone(),
        consumer: Arc::downgrade(&alive),
    };
    let rx = LatestReceiver {
        receiver,
        _alive: alive,
    };
    (tx, rx)
}

/// Producer half.
pub struct LatestSender<T> {
    sender: Sender<T>,
    /// Producer-side receiver used only to drop a stale value.
    evict: Receiver<T>,
    consumer: Weak<()>,
}

impl<T> LatestSender<T> {
    /// Publish a value, replacing any value the consumer has not taken yet.
    ///
    /// Returns false once the consumer is gone. Callers serialize sends.
    pub fn send(&self, value: T) -> bool {
        if !self.is_connected() {
            return false;
        }

        let mut value = value;
        loop {
            match self.sender.try_send(value) {
                Ok(()) => return true,
                Err(TrySendError::Full(back)) => {
                    let _ = self.evict.try_recv();
                    value = back;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.consumer.strong_count() > 0
    }
}

/// Consumer half.
///
/// Dropping it disconnects the sender; the channel closes for the receiver
/// once the sender is dropped.
pub struct LatestReceiver<T> {
    receiver: Receiver<T>,
    _alive: Arc<()>,
}

impl<T> LatestReceiver<T> {
    /// Receive the next value (blocking).
    pub fn recv(&self) -> Result<T, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a value (non-blocking).
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_value_wins() {
        let (tx, rx) = latest_channel();
        for v in 1..=5u32 {
            assert!(tx.send(v));
        }

        assert_eq!(rx.try_recv().unwrap(), 5);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = latest_channel::<u32>();
        drop(rx);
        assert!(!tx.is_connected());
        assert!(!tx.send(1));
    }

    #[test]
    fn test_receiver_sees_disconnect() {
        let (tx, rx) = latest_channel::<u32>();
        assert!(tx.send(7));
        drop(tx);

        assert_eq!(rx.recv().unwrap(), 7);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_recv_timeout_when_empty() {
        let (_tx, rx) = latest_channel::<u32>();
        let result = rx.recv_timeout(Duration::from_millis(10));
        assert!(matches!(result, Err(RecvTimeoutError::Timeout)));
    }

    #[test]
    fn test_cross_thread_delivery() {
        let (tx, rx) = latest_channel();
        let producer = std::thread::spawn(move || {
            for v in 0..100u32 {
                tx.send(v);
            }
        });
        producer.join().unwrap();

        assert_eq!(rx.recv().unwrap(), 99);
    }
}
