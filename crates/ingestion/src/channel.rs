//! Dispatch channel: bounded MPMC queue between the producer and the workers
//!
//! 容量大于 0 时就是普通的 `async_channel::bounded`。容量为 0 时是同步交接：
//! 只有当某个 worker 正在等待接收时，生产者才会把收件人放进通道。

use std::sync::Arc;

use async_channel::{Receiver, RecvError, SendError, Sender, TryRecvError};
use contracts::Recipient;
use tokio::sync::Semaphore;

/// Create a dispatch channel
///
/// `capacity == 0` gives a rendezvous handoff: each waiting receiver grants
/// the sender exactly one slot.
pub fn dispatch_channel(capacity: usize) -> (DispatchSender, DispatchReceiver) {
    let (tx, rx) = async_channel::bounded(capacity.max(1));
    let demand = (capacity == 0).then(|| Arc::new(Semaphore::new(0)));
    (
        DispatchSender {
            tx,
            demand: demand.clone(),
        },
        DispatchReceiver { rx, demand },
    )
}

/// Producer half
pub struct DispatchSender {
    tx: Sender<Recipient>,
    /// Receivers currently waiting (rendezvous only)
    demand: Option<Arc<Semaphore>>,
}

impl DispatchSender {
    /// Enqueue one recipient, suspending while the channel is full or, in
    /// rendezvous mode, until a receiver is waiting
    ///
    /// Not cancel-safe with respect to the recipient: callers racing this
    /// against cancellation must keep their own copy.
    pub async fn send(&self, recipient: Recipient) -> Result<(), SendError<Recipient>> {
        if let Some(demand) = &self.demand {
            match demand.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(SendError(recipient)),
            }
        }
        self.tx.send(recipient).await
    }

    /// Recipients buffered and not yet received
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Close the channel; receivers drain what is buffered, then stop
    pub fn close(&self) -> bool {
        if let Some(demand) = &self.demand {
            demand.close();
        }
        self.tx.close()
    }
}

/// Worker half, one clone per worker
#[derive(Clone)]
pub struct DispatchReceiver {
    rx: Receiver<Recipient>,
    demand: Option<Arc<Semaphore>>,
}

impl DispatchReceiver {
    /// Wait for the next recipient; `Err` once the channel is closed and empty
    pub async fn recv(&self) -> Result<Recipient, RecvError> {
        if let Some(demand) = &self.demand {
            // 同步交接：先登记等待，再接收
            demand.add_permits(1);
        }
        self.rx.recv().await
    }

    /// Take a buffered recipient without waiting or granting demand
    pub fn try_recv(&self) -> Result<Recipient, TryRecvError> {
        self.rx.try_recv()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Close the channel from the receiving side; a pending send fails
    pub fn close(&self) -> bool {
        if let Some(demand) = &self.demand {
            demand.close();
        }
        self.rx.close()
    }
}
