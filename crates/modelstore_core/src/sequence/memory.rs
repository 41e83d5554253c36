//! Process-lifetime sequences backed by atomic counters.

use crate::sequence::{SequenceAllocator, SequenceResult, SequenceSpec};
use dashmap::DashMap;
use log::debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

struct Counter {
    value: AtomicI64,
    increment: i64,
}

impl Counter {
    fn from_spec(spec: &SequenceSpec) -> Self {
        let increment = spec.effective_increment();
        Self {
            // First `next_value` yields `start`.
            value: AtomicI64::new(spec.start - increment),
            increment,
        }
    }
}

/// In-memory sequence allocator.
///
/// One instance is the single authority for its names; share it behind an
/// `Arc` instead of creating one per caller.
#[derive(Default)]
pub struct InMemorySequences {
    counters: DashMap<String, Arc<Counter>>,
}

impl InMemorySequences {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, name: &str) -> SequenceResult<Arc<Counter>> {
        if let Some(counter) = self.counters.get(name) {
            return Ok(Arc::clone(counter.value()));
        }
        let spec = SequenceSpec::new(name);
        spec.validate()?;
        let counter = self
            .counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Counter::from_spec(&spec)));
        Ok(Arc::clone(counter.value()))
    }
}

impl SequenceAllocator for InMemorySequences {
    fn define(&self, spec: SequenceSpec) -> SequenceResult<()> {
        spec.validate()?;
        self.counters
            .entry(spec.name.clone())
            .or_insert_with(|| Arc::new(Counter::from_spec(&spec)));
        debug!(
            "event=sequence_define module=sequence status=ok backend=memory name={} start={} increment={}",
            spec.name,
            spec.start,
            spec.effective_increment()
        );
        Ok(())
    }

    fn next_value(&self, name: &str) -> SequenceResult<i64> {
        let counter = self.counter(name)?;
        let previous = counter.value.fetch_add(counter.increment, Ordering::SeqCst);
        Ok(previous + counter.increment)
    }

    fn current_value(&self, name: &str) -> SequenceResult<i64> {
        Ok(self.counter(name)?.value.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::InMemorySequences;
    use crate::sequence::{SequenceAllocator, SequenceSpec};

    #[test]
    fn first_value_is_start() {
        let sequences = InMemorySequences::new();
        sequences
            .define(SequenceSpec::new("Order.id").starting_at(100).incrementing_by(10))
            .unwrap();
        assert_eq!(sequences.current_value("Order.id").unwrap(), 90);
        assert_eq!(sequences.next_value("Order.id").unwrap(), 100);
        assert_eq!(sequences.next_value("Order.id").unwrap(), 110);
        assert_eq!(sequences.current_value("Order.id").unwrap(), 110);
    }

    #[test]
    fn undefined_names_start_at_one() {
        let sequences = InMemorySequences::new();
        assert_eq!(sequences.next_value("fresh").unwrap(), 1);
        assert_eq!(sequences.next_value("fresh").unwrap(), 2);
    }

    #[test]
    fn first_definition_wins() {
        let sequences = InMemorySequences::new();
        sequences.define(SequenceSpec::new("a").starting_at(5)).unwrap();
        sequences.define(SequenceSpec::new("a").starting_at(50)).unwrap();
        assert_eq!(sequences.next_value("a").unwrap(), 5);
    }

    #[test]
    fn instances_do_not_share_state() {
        let first = InMemorySequences::new();
        let second = InMemorySequences::new();
        first.next_value("shared").unwrap();
        assert_eq!(second.next_value("shared").unwrap(), 1);
    }
}
