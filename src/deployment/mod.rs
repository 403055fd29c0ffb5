//! Deployment & lifecycle (`SPEC_FULL.md` §4.14, §6): the query catalog,
//! the worker/coordinator RPC surface, and deploy/undeploy orchestration.

pub mod catalog;
pub mod lifecycle;
pub mod rpc;

pub use catalog::{CatalogEntry, QueryCatalog, QueryLifecycleState};
pub use lifecycle::{deploy_query, undeploy_query, WorkerClients};
pub use rpc::{CoordinatorRpc, RegisterNodeRequest, RegisterPhysicalStreamRequest, WorkerRpc};
