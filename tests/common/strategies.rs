use proptest::prelude::*;

/// Strategy for VIP flags of a sequence of submitted orders
pub fn vip_flags_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 0..64)
}

/// One state transition attempted against the dispatch queue
#[derive(Debug, Clone, Copy)]
pub enum QueueOp {
    Claim(u64),
    Release(u64),
    Complete(u64),
}

/// Strategy for transitions targeting ids `1..=max_id`, including unknown ids
pub fn queue_ops_strategy(max_id: u64) -> impl Strategy<Value = Vec<QueueOp>> {
    let id = 1..=max_id + 2;
    let op = prop_oneof![
        id.clone().prop_map(QueueOp::Claim),
        id.clone().prop_map(QueueOp::Release),
        id.prop_map(QueueOp::Complete),
    ];
    prop::collection::vec(op, 0..128)
}
