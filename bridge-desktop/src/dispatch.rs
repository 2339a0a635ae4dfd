//! Main-thread continuation queue.

use bridge_traits::dispatch::{CallbackDispatcher, DispatchTask};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::warn;

/// Dispatcher half: cloneable, handed to the core.
#[derive(Clone)]
pub struct QueueDispatcher {
    sender: UnboundedSender<DispatchTask>,
}

/// Receiver half: owned by the host thread that must run continuations.
pub struct DispatchQueue {
    receiver: UnboundedReceiver<DispatchTask>,
}

impl QueueDispatcher {
    pub fn new() -> (Self, DispatchQueue) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, DispatchQueue { receiver })
    }
}

impl CallbackDispatcher for QueueDispatcher {
    fn dispatch(&self, task: DispatchTask) {
        if self.sender.send(task).is_err() {
            warn!("Dispatch queue closed, dropping continuation");
        }
    }
}

impl DispatchQueue {
    /// Run every continuation queued so far without waiting for more.
    ///
    /// Returns how many ran. Meant to be called once per host frame/tick.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Wait for the next continuation and run it.
    ///
    /// Returns `false` once every dispatcher handle has been dropped and the
    /// queue is empty.
    pub async fn next(&mut self) -> bool {
        match self.receiver.recv().await {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }
}
