//! Network data plane and reverse event plane (`SPEC_FULL.md` §4.8),
//! grounded on `rusty_db::network::server`'s connection-handling idiom but
//! transported over in-process `crossbeam` channels addressed by
//! `NetworkPartition` rather than a real socket.

mod events;
mod manager;
mod partition;
mod sink;
mod source;

pub use events::{Event, NetworkFrame};
pub use manager::NetworkManager;
pub use partition::NetworkPartition;
pub use sink::NetworkSink;
pub use source::NetworkSource;
