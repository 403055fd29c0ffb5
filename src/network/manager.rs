use super::events::{Event, NetworkFrame};
use super::partition::NetworkPartition;
use crate::error::{NebulaError, Result};
use crossbeam::channel::{unbounded, Receiver, Sender};
use dashmap::DashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// One per worker: tracks which network partitions this process is
/// consuming (`subpartitionConsumers`) and which it is producing into
/// (`subpartitionProducers`), grounded on `rusty_db::network::server`'s
/// connection bookkeeping but addressed by logical partition rather than
/// socket (`SPEC_FULL.md` §4.8). Transport is in-process `crossbeam`
/// channels rather than a real socket, consistent with the Non-goal that
/// excludes an actual gRPC/TCP wire.
#[derive(Clone, Default)]
pub struct NetworkManager {
    consumers: Arc<DashMap<NetworkPartition, Sender<NetworkFrame>>>,
    event_channels: Arc<DashMap<NetworkPartition, Sender<Event>>>,
}

impl NetworkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers this partition as a consumer, returning the receiver end
    /// a `NetworkSource` polls. Fails with `PartitionAlreadyRegistered` on
    /// a duplicate.
    pub fn register_subpartition_consumer(&self, partition: NetworkPartition) -> Result<Receiver<NetworkFrame>> {
        if self.consumers.contains_key(&partition) {
            return Err(NebulaError::PartitionAlreadyRegistered(partition.to_string()));
        }
        let (tx, rx) = unbounded();
        self.consumers.insert(partition, tx);
        debug!(%partition, "registered subpartition consumer");
        Ok(rx)
    }

    /// Looks up the sender side for `partition` with bounded retries,
    /// since a producer may start before its remote consumer has
    /// registered. Fails with `ChannelUnavailable` once the retry budget
    /// is exhausted.
    pub fn register_subpartition_producer(
        &self,
        partition: NetworkPartition,
        retries: u32,
        wait: Duration,
    ) -> Result<Sender<NetworkFrame>> {
        for attempt in 0..=retries {
            if let Some(sender) = self.consumers.get(&partition) {
                debug!(%partition, attempt, "registered subpartition producer");
                return Ok(sender.clone());
            }
            if attempt < retries {
                thread::sleep(wait);
            }
        }
        warn!(%partition, retries, "producer registration exhausted retry budget");
        Err(NebulaError::ChannelUnavailable {
            retries,
            reason: format!("no consumer registered for partition {partition}"),
        })
    }

    /// Registers the reverse event channel for `partition`, returning the
    /// receiver a sink-side operator polls for `StartSourceEvent` /
    /// `PropagateEpochEvent` / custom events emitted by the matching
    /// source.
    pub fn register_event_channel(&self, partition: NetworkPartition) -> Result<Receiver<Event>> {
        if self.event_channels.contains_key(&partition) {
            return Err(NebulaError::PartitionAlreadyRegistered(partition.to_string()));
        }
        let (tx, rx) = unbounded();
        self.event_channels.insert(partition, tx);
        Ok(rx)
    }

    pub fn event_sender(&self, partition: NetworkPartition, retries: u32, wait: Duration) -> Result<Sender<Event>> {
        for attempt in 0..=retries {
            if let Some(sender) = self.event_channels.get(&partition) {
                return Ok(sender.clone());
            }
            if attempt < retries {
                thread::sleep(wait);
            }
        }
        Err(NebulaError::ChannelUnavailable {
            retries,
            reason: format!("no event consumer registered for partition {partition}"),
        })
    }

    pub fn unregister(&self, partition: &NetworkPartition) {
        self.consumers.remove(partition);
        self.event_channels.remove(partition);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_consumer_registration_fails() {
        let manager = NetworkManager::new();
        let partition = NetworkPartition::new(1, 2, 0);
        manager.register_subpartition_consumer(partition).unwrap();
        let err = manager.register_subpartition_consumer(partition).unwrap_err();
        assert!(matches!(err, NebulaError::PartitionAlreadyRegistered(_)));
    }

    #[test]
    fn producer_registration_fails_fast_with_no_wait_budget() {
        let manager = NetworkManager::new();
        let partition = NetworkPartition::new(1, 2, 0);
        let err = manager
            .register_subpartition_producer(partition, 0, Duration::from_millis(1))
            .unwrap_err();
        assert!(matches!(err, NebulaError::ChannelUnavailable { .. }));
    }

    #[test]
    fn producer_finds_consumer_once_registered() {
        let manager = NetworkManager::new();
        let partition = NetworkPartition::new(1, 2, 0);
        let _rx = manager.register_subpartition_consumer(partition).unwrap();
        manager
            .register_subpartition_producer(partition, 2, Duration::from_millis(1))
            .unwrap();
    }
}
