use super::events::{Event, NetworkFrame};
use super::manager::NetworkManager;
use super::partition::NetworkPartition;
use crate::buffer::TupleBuffer;
use crate::common::TerminationType;
use crate::error::Result;
use crossbeam::channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::trace;

/// Producer half of a network bridge (`SPEC_FULL.md` §4.8). Lazily
/// registers with the `NetworkManager` on first send, then frames and
/// forwards each buffer; on stop it emits a single EOS frame tagged with
/// the termination type.
pub struct NetworkSink {
    manager: NetworkManager,
    partition: NetworkPartition,
    retries: u32,
    retry_wait: Duration,
    sender: Mutex<Option<Sender<NetworkFrame>>>,
    events: Mutex<Option<Receiver<Event>>>,
}

impl NetworkSink {
    pub fn new(manager: NetworkManager, partition: NetworkPartition, retries: u32, retry_wait: Duration) -> Self {
        Self {
            manager,
            partition,
            retries,
            retry_wait,
            sender: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    fn ensure_connected(&self) -> Result<Sender<NetworkFrame>> {
        let mut guard = self.sender.lock();
        if let Some(sender) = guard.as_ref() {
            return Ok(sender.clone());
        }
        let sender = self.manager.register_subpartition_producer(self.partition, self.retries, self.retry_wait)?;
        *guard = Some(sender.clone());
        let mut events_guard = self.events.lock();
        if events_guard.is_none() {
            *events_guard = self.manager.register_event_channel(self.partition).ok();
        }
        Ok(sender)
    }

    pub fn send(&self, buffer: &TupleBuffer) -> Result<()> {
        let sender = self.ensure_connected()?;
        let tuple_count = buffer.number_of_tuples() as u64;
        let payload = buffer.with_bytes(|bytes| bytes.to_vec());
        trace!(partition = %self.partition, tuple_count, "sending network frame");
        sender
            .send(NetworkFrame::Data { tuple_count, payload })
            .map_err(|e| crate::error::NebulaError::ChannelBroken(e.to_string()))
    }

    /// Drains any pending reverse-channel events (`StartSourceEvent`,
    /// `PropagateEpochEvent`, ...) without blocking.
    pub fn poll_events(&self) -> Vec<Event> {
        let guard = self.events.lock();
        match guard.as_ref() {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn stop(&self, termination: TerminationType) -> Result<()> {
        let sender = self.ensure_connected()?;
        sender
            .send(NetworkFrame::Eos(termination))
            .map_err(|e| crate::error::NebulaError::ChannelBroken(e.to_string()))
    }
}
