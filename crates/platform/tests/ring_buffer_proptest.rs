//! Property-based tests for the interrupt-safe ring buffer.
//! The model is a `VecDeque` bounded at the same capacity.

use platform::ring_buffer::RingBuffer;
use proptest::prelude::*;
use std::collections::VecDeque;

const N: usize = 64;

#[derive(Debug, Clone)]
enum Op {
    Enqueue(u8),
    EnqueueSlice(Vec<u8>),
    DequeueOne,
    DequeueMany(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u8>().prop_map(Op::Enqueue),
        2 => proptest::collection::vec(any::<u8>(), 0..100).prop_map(Op::EnqueueSlice),
        3 => Just(Op::DequeueOne),
        2 => (0usize..100).prop_map(Op::DequeueMany),
    ]
}

proptest::proptest! {
    /// The queue behaves exactly like a capacity-bounded FIFO: dequeued
    /// items reproduce enqueued order, fulls fail without mutation, and
    /// the live count never exceeds capacity.
    #[test]
    fn ring_buffer_matches_fifo_model(ops in proptest::collection::vec(op_strategy(), 1..200)) {
        let rb = RingBuffer::<u8, N>::new();
        let mut model: VecDeque<u8> = VecDeque::new();
        let capacity = N - 1;

        for op in ops {
            match op {
                Op::Enqueue(b) => {
                    let accepted = rb.enqueue(b);
                    if model.len() < capacity {
                        prop_assert!(accepted);
                        model.push_back(b);
                    } else {
                        prop_assert!(!accepted, "enqueue on full must fail");
                    }
                }
                Op::EnqueueSlice(items) => {
                    let accepted = rb.enqueue_slice(&items);
                    let room = capacity - model.len();
                    prop_assert_eq!(accepted, items.len().min(room));
                    for &b in items.iter().take(accepted) {
                        model.push_back(b);
                    }
                }
                Op::DequeueOne => {
                    prop_assert_eq!(rb.dequeue_one(), model.pop_front());
                }
                Op::DequeueMany(max) => {
                    let mut out = vec![0u8; max];
                    let n = rb.dequeue(&mut out);
                    prop_assert_eq!(n, max.min(model.len()));
                    for slot in out.iter().take(n) {
                        prop_assert_eq!(Some(*slot), model.pop_front());
                    }
                }
            }

            prop_assert_eq!(rb.len(), model.len());
            prop_assert!(rb.len() <= capacity);
        }
    }
}
