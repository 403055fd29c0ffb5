use super::events::{Event, NetworkFrame};
use super::manager::NetworkManager;
use super::partition::NetworkPartition;
use crate::error::Result;
use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use std::time::Duration;

/// Consumer half of a network bridge (`SPEC_FULL.md` §4.8). Registers
/// itself with the `NetworkManager` at construction so the manager knows
/// where to deliver incoming frames, then the owning pipeline polls
/// `try_recv`/`recv_blocking` to turn frames into tasks.
pub struct NetworkSource {
    manager: NetworkManager,
    partition: NetworkPartition,
    frames: Receiver<NetworkFrame>,
    event_sender: Mutex<Option<crossbeam::channel::Sender<Event>>>,
}

impl NetworkSource {
    pub fn new(manager: NetworkManager, partition: NetworkPartition) -> Result<Self> {
        let frames = manager.register_subpartition_consumer(partition)?;
        Ok(Self { manager, partition, frames, event_sender: Mutex::new(None) })
    }

    pub fn partition(&self) -> NetworkPartition {
        self.partition
    }

    pub fn try_recv(&self) -> Option<NetworkFrame> {
        self.frames.try_recv().ok()
    }

    pub fn recv_blocking(&self) -> Option<NetworkFrame> {
        self.frames.recv().ok()
    }

    /// Sends an event on the reverse channel back toward the producer,
    /// connecting lazily with the configured retry budget on first use.
    pub fn send_event(&self, event: Event, retries: u32, retry_wait: Duration) -> Result<()> {
        let mut guard = self.event_sender.lock();
        if guard.is_none() {
            *guard = Some(self.manager.event_sender(self.partition, retries, retry_wait)?);
        }
        guard
            .as_ref()
            .unwrap()
            .send(event)
            .map_err(|e| crate::error::NebulaError::ChannelBroken(e.to_string()))
    }
}
