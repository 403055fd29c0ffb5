//! Property-style tests for the quantified invariants in `SPEC_FULL.md`
//! §8: buffer conservation, refcount safety, placement capacity,
//! signature stability, and round-trip serialization of a physical plan.

use nebula_stream::buffer::BufferPool;
use nebula_stream::common::{DataType, Field, Schema};
use nebula_stream::placement::place_bottom_up;
use nebula_stream::plan::{textual_signature, LogicalPlan, MemoryLayoutKind, OperatorKind, PhysicalNode, PhysicalPlan, Topology};
use std::sync::Arc;
use std::thread;

/// `free + checked_out == total_buffers`, held across concurrent
/// acquire/release traffic from many threads.
#[test]
fn buffer_pool_conserves_total_count_under_concurrency() {
    let pool = Arc::new(BufferPool::new(64, 16));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                let buffer = pool.get_buffer_blocking().unwrap();
                drop(buffer);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(pool.available_buffers(), pool.total_buffers());
}

/// A buffer's recycler only runs once every clone has been dropped, even
/// when clones cross thread boundaries.
#[test]
fn refcount_only_recycles_after_every_handle_drops() {
    let pool = BufferPool::new(64, 1);
    let buffer = pool.get_buffer_blocking().unwrap();
    assert_eq!(pool.available_buffers(), 0);

    let clones: Vec<_> = (0..4).map(|_| buffer.clone()).collect();
    assert_eq!(buffer.ref_count(), 5);

    drop(buffer);
    assert_eq!(pool.available_buffers(), 0, "pool must still be empty while clones are alive");

    for clone in clones {
        drop(clone);
    }
    assert_eq!(pool.available_buffers(), 1);
}

fn leaf_node(id: u64, placement: u64) -> PhysicalNode {
    PhysicalNode {
        id,
        kind: OperatorKind::Source { logical_name: "s".into() },
        children: vec![],
        schema: Schema::default(),
        layout: MemoryLayoutKind::Row,
        placement: Some(placement),
        origin_id: None,
    }
}

/// Placement never oversubscribes a topology node: with one unit of
/// capacity on the node closest to the source, a second intermediate
/// operator must advance past it rather than double-book it.
#[test]
fn placement_never_exceeds_node_capacity() {
    let mut topo = Topology::new();
    topo.add_node(1, 1);
    topo.add_node(2, 1);
    topo.add_node(3, 5);
    topo.add_link(1, 2);
    topo.add_link(2, 3);

    let mut plan = PhysicalPlan::new();
    plan.insert(leaf_node(0, 1));
    plan.insert(PhysicalNode {
        id: 1,
        kind: OperatorKind::Filter { predicate: "x>1".into() },
        children: vec![0],
        schema: Schema::default(),
        layout: MemoryLayoutKind::Row,
        placement: None,
        origin_id: None,
    });
    plan.insert(PhysicalNode {
        id: 2,
        kind: OperatorKind::Map { expression: "x+1".into(), output_field: "y".into() },
        children: vec![1],
        schema: Schema::default(),
        layout: MemoryLayoutKind::Row,
        placement: None,
        origin_id: None,
    });
    plan.insert(PhysicalNode {
        id: 3,
        kind: OperatorKind::Sink { name: "out".into() },
        children: vec![2],
        schema: Schema::default(),
        layout: MemoryLayoutKind::Row,
        placement: Some(3),
        origin_id: None,
    });

    place_bottom_up(&mut plan, &mut topo, 0).unwrap();
    let filter_node = plan.node(1).unwrap().placement.unwrap();
    let map_node = plan.node(2).unwrap().placement.unwrap();

    assert_eq!(filter_node, 1);
    assert_eq!(topo.remaining_capacity(1), 0);
    // the second operator must have advanced past the now-full node 1.
    assert_ne!(map_node, 1);
    assert_eq!(topo.remaining_capacity(map_node), 0);
}

/// Structurally identical logical plans always produce the same textual
/// signature, independent of operator id allocation order.
#[test]
fn textual_signature_is_stable_across_separately_built_plans() {
    let mut plan_a = LogicalPlan::new();
    let src_a = plan_a.add_node(OperatorKind::Source { logical_name: "orders".into() }, vec![], None);
    let root_a = plan_a.add_node(OperatorKind::Filter { predicate: "amount > 10".into() }, vec![src_a], None);

    let mut plan_b = LogicalPlan::new();
    let src_b = plan_b.add_node(OperatorKind::Source { logical_name: "orders".into() }, vec![], None);
    let root_b = plan_b.add_node(OperatorKind::Filter { predicate: "amount > 10".into() }, vec![src_b], None);

    assert_eq!(textual_signature(&plan_a, root_a), textual_signature(&plan_b, root_b));
}

/// A physical plan round-trips through the same bincode configuration
/// decomposition uses to serialize subplans for deployment.
#[test]
fn physical_plan_round_trips_through_bincode() {
    let mut plan = PhysicalPlan::new();
    plan.insert(PhysicalNode {
        id: 0,
        kind: OperatorKind::Source { logical_name: "orders".into() },
        children: vec![],
        schema: Schema::new(vec![Field::new("id", DataType::Int64)]),
        layout: MemoryLayoutKind::Row,
        placement: Some(1),
        origin_id: Some(0),
    });
    plan.sink_roots.push(0);

    let encoded = bincode::serde::encode_to_vec(&plan, bincode::config::standard()).unwrap();
    let (decoded, _): (PhysicalPlan, usize) = bincode::serde::decode_from_slice(&encoded, bincode::config::standard()).unwrap();

    assert_eq!(decoded, plan);
}
