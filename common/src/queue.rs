use parking_lot::Mutex;
use tracing::warn;

use crate::types::{ActionRequest, FetchKind, FetchRequest};

/// Keeps one slot free to tell full from empty; capacity `n` holds `n - 1`.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            head: 0,
            tail: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        (self.tail + self.capacity() - self.head) % self.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        (self.tail + 1) % self.capacity() == self.head
    }

    pub fn push(&mut self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        self.slots[self.tail] = Some(value);
        self.tail = (self.tail + 1) % self.capacity();
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        value
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len()).filter_map(move |offset| {
            self.slots[(self.head + offset) % self.capacity()].as_ref()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Queued,
    Duplicate,
    Full,
}

impl Enqueue {
    pub fn is_queued(self) -> bool {
        self == Self::Queued
    }
}

/// Deduplicated by kind; entries older than the stale threshold are dropped
/// on dequeue instead of being executed.
#[derive(Debug)]
pub struct FetchQueue {
    entries: Mutex<RingBuffer<FetchRequest>>,
    stale_threshold_ms: u64,
}

impl FetchQueue {
    pub fn new(capacity: usize, stale_threshold_ms: u64) -> Self {
        Self {
            entries: Mutex::new(RingBuffer::new(capacity)),
            stale_threshold_ms,
        }
    }

    pub fn enqueue(&self, kind: FetchKind, now_ms: u64) -> Enqueue {
        let mut entries = self.entries.lock();
        if entries.iter().any(|entry| entry.kind == kind) {
            return Enqueue::Duplicate;
        }
        match entries.push(FetchRequest {
            kind,
            enqueued_at_ms: now_ms,
        }) {
            Ok(()) => Enqueue::Queued,
            Err(_) => Enqueue::Full,
        }
    }

    pub fn dequeue(&self, now_ms: u64) -> Option<FetchRequest> {
        let mut entries = self.entries.lock();
        while let Some(request) = entries.pop() {
            let age_ms = now_ms.saturating_sub(request.enqueued_at_ms);
            if age_ms > self.stale_threshold_ms {
                warn!("dropping stale {} fetch request ({age_ms} ms old)", request.kind);
                continue;
            }
            return Some(request);
        }
        None
    }

    pub fn contains(&self, kind: FetchKind) -> bool {
        self.entries.lock().iter().any(|entry| entry.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[derive(Debug)]
pub struct ActionQueue {
    entries: Mutex<RingBuffer<ActionRequest>>,
}

impl ActionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(RingBuffer::new(capacity)),
        }
    }

    pub fn enqueue(&self, request: ActionRequest) -> Enqueue {
        match self.entries.lock().push(request) {
            Ok(()) => Enqueue::Queued,
            Err(_) => Enqueue::Full,
        }
    }

    pub fn dequeue(&self) -> Option<ActionRequest> {
        self.entries.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(entity: &str, status: &str) -> ActionRequest {
        ActionRequest {
            target_entity: entity.to_string(),
            desired_status: status.to_string(),
        }
    }

    #[test]
    fn ring_buffer_wraps_around() {
        let mut ring = RingBuffer::new(3);
        for round in 0..5 {
            assert_eq!(ring.push(round), Ok(()));
            assert_eq!(ring.push(round + 100), Ok(()));
            assert_eq!(ring.push(round + 200), Err(round + 200));
            assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![round, round + 100]);
            assert_eq!(ring.pop(), Some(round));
            assert_eq!(ring.pop(), Some(round + 100));
            assert_eq!(ring.pop(), None);
        }
    }

    #[test]
    fn fetch_kinds_are_deduplicated() {
        let queue = FetchQueue::new(20, 10_000);

        assert_eq!(queue.enqueue(FetchKind::SmartSolar, 0), Enqueue::Queued);
        assert_eq!(queue.enqueue(FetchKind::SmartSolar, 5), Enqueue::Duplicate);
        assert_eq!(queue.enqueue(FetchKind::Camper, 5), Enqueue::Queued);
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.dequeue(10).map(|r| r.kind), Some(FetchKind::SmartSolar));
        assert_eq!(queue.enqueue(FetchKind::SmartSolar, 10), Enqueue::Queued);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn fetch_queue_is_full_one_below_capacity() {
        let queue = FetchQueue::new(4, 10_000);

        assert!(queue.enqueue(FetchKind::Camper, 0).is_queued());
        assert!(queue.enqueue(FetchKind::ClimateInside, 0).is_queued());
        assert!(queue.enqueue(FetchKind::ClimateOutside, 0).is_queued());
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.enqueue(FetchKind::SmartShunt, 0), Enqueue::Full);
        assert!(!queue.contains(FetchKind::SmartShunt));
    }

    #[test]
    fn stale_entries_are_skipped() {
        let queue = FetchQueue::new(20, 1_000);
        queue.enqueue(FetchKind::Camper, 0);
        queue.enqueue(FetchKind::SmartShunt, 900);

        let request = queue.dequeue(1_500).unwrap();

        assert_eq!(request.kind, FetchKind::SmartShunt);
        assert_eq!(request.enqueued_at_ms, 900);
        assert!(queue.is_empty());
    }

    #[test]
    fn lone_stale_entry_is_never_returned() {
        let queue = FetchQueue::new(20, 1_000);
        queue.enqueue(FetchKind::SmartSolar, 0);

        assert_eq!(queue.dequeue(1_001), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn entry_at_threshold_is_still_fresh() {
        let queue = FetchQueue::new(20, 1_000);
        queue.enqueue(FetchKind::SmartSolar, 0);

        assert!(queue.dequeue(1_000).is_some());
    }

    #[test]
    fn actions_keep_duplicates_in_order() {
        let queue = ActionQueue::new(10);

        assert!(queue.enqueue(action("pump_state", "ON")).is_queued());
        assert!(queue.enqueue(action("pump_state", "ON")).is_queued());
        assert!(queue.enqueue(action("household_state", "OFF")).is_queued());

        assert_eq!(queue.dequeue(), Some(action("pump_state", "ON")));
        assert_eq!(queue.dequeue(), Some(action("pump_state", "ON")));
        assert_eq!(queue.dequeue(), Some(action("household_state", "OFF")));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn action_queue_rejects_when_full() {
        let queue = ActionQueue::new(10);
        for _ in 0..9 {
            assert!(queue.enqueue(action("pump_state", "ON")).is_queued());
        }

        assert_eq!(queue.enqueue(action("pump_state", "OFF")), Enqueue::Full);
        assert_eq!(queue.len(), 9);
    }
}
