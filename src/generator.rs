use crate::clock::{SystemClock, TimeSource};
use crate::error::SnowflakeError;
use crate::snowflake::Snowflake;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Outcome of a single minting attempt.
///
/// `Pending` means the current millisecond's sequence space is exhausted and
/// the caller should wait roughly this long before retrying.
pub enum SnowflakeOperation<S> {
    Ready(S),
    Pending(Duration),
}

#[derive(Debug)]
struct GeneratorState {
    last_timestamp: i64,
    sequence: u64,
}

#[derive(Debug)]
pub struct SnowflakeGenerator<S: Snowflake, C: TimeSource = SystemClock> {
    worker_id: u64,
    datacenter_id: u64,
    state: Mutex<GeneratorState>,
    epoch: i64,
    clock: C,
    _marker: PhantomData<S>,
}

impl<S: Snowflake> SnowflakeGenerator<S, SystemClock> {
    /// Creates a generator with the default epoch and the system clock.
    pub fn new(worker_id: u64, datacenter_id: u64) -> Result<Self, SnowflakeError> {
        Self::with_epoch(worker_id, datacenter_id, crate::defs::SNOWFLAKE_ID_EPOCH)
    }

    /// Creates a new SnowflakeGenerator with a custom epoch
    ///
    /// # Arguments
    /// * `worker_id` - Unique worker ID within the datacenter (0-31)
    /// * `datacenter_id` - Unique datacenter ID (0-31)
    /// * `epoch` - Custom epoch in milliseconds since Unix epoch
    ///
    /// # Example
    /// ```
    /// use snowmint::SnowflakeGenerator;
    ///
    /// // Use a custom epoch (e.g., Jan 1, 2024)
    /// let generator = SnowflakeGenerator::with_epoch(1, 1, 1704067200000).unwrap();
    /// ```
    pub fn with_epoch(
        worker_id: u64,
        datacenter_id: u64,
        epoch: i64,
    ) -> Result<Self, SnowflakeError> {
        Self::with_clock(worker_id, datacenter_id, epoch, 0, SystemClock)
    }

    /// Creates a generator with a seeded sequence counter. The seed is not
    /// range-checked; it is masked to 12 bits on first use.
    pub fn with_initial_sequence(
        worker_id: u64,
        datacenter_id: u64,
        epoch: i64,
        initial_sequence: u64,
    ) -> Result<Self, SnowflakeError> {
        Self::with_clock(worker_id, datacenter_id, epoch, initial_sequence, SystemClock)
    }
}

impl<S: Snowflake, C: TimeSource> SnowflakeGenerator<S, C> {
    /// Fully general constructor: custom epoch, seeded sequence, and an
    /// injected time source.
    pub fn with_clock(
        worker_id: u64,
        datacenter_id: u64,
        epoch: i64,
        initial_sequence: u64,
        clock: C,
    ) -> Result<Self, SnowflakeError> {
        if worker_id > S::max_worker_id() {
            return Err(SnowflakeError::InvalidWorkerId(
                worker_id,
                S::max_worker_id(),
            ));
        }
        if datacenter_id > S::max_datacenter_id() {
            return Err(SnowflakeError::InvalidDatacenterId(
                datacenter_id,
                S::max_datacenter_id(),
            ));
        }

        Ok(SnowflakeGenerator {
            worker_id,
            datacenter_id,
            // -1 is strictly below any real timestamp, so the first call
            // always takes the new-millisecond branch.
            state: Mutex::new(GeneratorState {
                last_timestamp: -1,
                sequence: initial_sequence,
            }),
            epoch,
            clock,
            _marker: PhantomData,
        })
    }

    /// Returns the epoch being used by this generator
    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    pub fn datacenter_id(&self) -> u64 {
        self.datacenter_id
    }

    /// Diagnostic read of the current sequence counter.
    pub fn sequence(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sequence
    }

    /// Performs one minting attempt.
    ///
    /// A backwards-moving clock fails immediately with the drift magnitude;
    /// the caller decides whether to retry or abort. An exhausted
    /// millisecond returns `Pending` without committing any state, and the
    /// lock is released so waiting callers cannot starve each other past
    /// the next tick.
    pub fn try_next_id(&self) -> Result<SnowflakeOperation<S>, SnowflakeError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SnowflakeError::GeneratorPoisoned)?;

        let timestamp = self.clock.current_millis();

        if timestamp < state.last_timestamp {
            return Err(SnowflakeError::ClockMovedBackwards(
                state.last_timestamp - timestamp,
            ));
        }

        if timestamp == state.last_timestamp {
            let next_seq = (state.sequence + 1) & S::max_sequence();
            if next_seq == 0 {
                return Ok(SnowflakeOperation::Pending(Duration::from_millis(1)));
            }
            state.sequence = next_seq;
        } else {
            state.sequence = 0;
        }

        state.last_timestamp = timestamp;

        let timestamp_offset = timestamp - self.epoch;
        if timestamp_offset < 0 || timestamp_offset > S::max_timestamp() {
            return Err(SnowflakeError::TimestampOverflow);
        }

        let masked_timestamp = (timestamp_offset as u64) & S::timestamp_mask();

        Ok(SnowflakeOperation::Ready(S::from_component_parts(
            masked_timestamp,
            self.datacenter_id,
            self.worker_id,
            state.sequence,
        )))
    }

    /// Mints the next id, invoking `on_pending` whenever the current
    /// millisecond is exhausted. Every retry goes back through
    /// [`try_next_id`](Self::try_next_id) and re-reads the time source, so
    /// the wait ends exactly when the clock advances past the recorded
    /// millisecond. The wait itself is unbounded.
    pub fn next_id(&self, mut on_pending: impl FnMut(Duration)) -> Result<S, SnowflakeError> {
        loop {
            match self.try_next_id()? {
                SnowflakeOperation::Ready(id) => return Ok(id),
                SnowflakeOperation::Pending(wait) => {
                    on_pending(wait);
                }
            }
        }
    }

    /// Mints `count` ids under a single lock acquisition, so the batch is
    /// contiguous in the sequence space.
    pub fn next_id_bulk(
        &self,
        count: usize,
        mut on_pending: impl FnMut(Duration),
    ) -> Result<Vec<S>, SnowflakeError> {
        let mut ids = Vec::with_capacity(count);

        let mut state = self
            .state
            .lock()
            .map_err(|_| SnowflakeError::GeneratorPoisoned)?;

        for _ in 0..count {
            let mut timestamp = self.clock.current_millis();

            if timestamp < state.last_timestamp {
                return Err(SnowflakeError::ClockMovedBackwards(
                    state.last_timestamp - timestamp,
                ));
            }

            if timestamp == state.last_timestamp {
                state.sequence = (state.sequence + 1) & S::max_sequence();
                if state.sequence == 0 {
                    // Sequence space exhausted; wait out the rest of the
                    // millisecond while holding the lock.
                    while timestamp <= state.last_timestamp {
                        on_pending(Duration::from_millis(1));
                        timestamp = self.clock.current_millis();
                    }
                }
            } else {
                state.sequence = 0;
            }

            state.last_timestamp = timestamp;

            let timestamp_offset = timestamp - self.epoch;
            if timestamp_offset < 0 || timestamp_offset > S::max_timestamp() {
                return Err(SnowflakeError::TimestampOverflow);
            }

            let masked_timestamp = (timestamp_offset as u64) & S::timestamp_mask();

            ids.push(S::from_component_parts(
                masked_timestamp,
                self.datacenter_id,
                self.worker_id,
                state.sequence,
            ));
        }

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::{MAX_SEQUENCE, SNOWFLAKE_ID_EPOCH};
    use crate::SnowflakeId;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    /// Settable clock for driving the deterministic paths.
    #[derive(Clone)]
    struct ManualClock(Arc<AtomicI64>);

    impl ManualClock {
        fn at(millis: i64) -> Self {
            ManualClock(Arc::new(AtomicI64::new(millis)))
        }

        fn set(&self, millis: i64) {
            self.0.store(millis, Ordering::SeqCst);
        }

        fn advance(&self, millis: i64) {
            self.0.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl TimeSource for ManualClock {
        fn current_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn generator_at(
        now: i64,
    ) -> (SnowflakeGenerator<SnowflakeId, ManualClock>, ManualClock) {
        let clock = ManualClock::at(now);
        let generator =
            SnowflakeGenerator::with_clock(1, 1, SNOWFLAKE_ID_EPOCH, 0, clock.clone()).unwrap();
        (generator, clock)
    }

    #[test]
    fn timestamp_round_trips_through_the_id() {
        let now = SNOWFLAKE_ID_EPOCH + 123_456;
        let (generator, _clock) = generator_at(now);

        let id = generator.next_id(|_| {}).unwrap();

        assert_eq!((id.id() as u64) >> 22, 123_456);
        assert_eq!(id.timestamp(), 123_456);
        assert_eq!(id.timestamp_with_epoch(SNOWFLAKE_ID_EPOCH), now);
    }

    #[test]
    fn sequence_increments_within_one_millisecond() {
        let (generator, _clock) = generator_at(SNOWFLAKE_ID_EPOCH + 1_000);

        for expected in 0..10u64 {
            let id = generator.next_id(|_| {}).unwrap();
            assert_eq!(id.sequence(), expected);
            assert_eq!(id.timestamp(), 1_000);
        }
        assert_eq!(generator.sequence(), 9);
    }

    #[test]
    fn new_millisecond_resets_sequence_to_zero() {
        let (generator, clock) = generator_at(SNOWFLAKE_ID_EPOCH + 1_000);

        let first = generator.next_id(|_| {}).unwrap();
        let second = generator.next_id(|_| {}).unwrap();
        assert_eq!(first.sequence(), 0);
        assert_eq!(second.sequence(), 1);

        clock.advance(1);
        let third = generator.next_id(|_| {}).unwrap();
        assert_eq!(third.sequence(), 0);
        assert_eq!(third.timestamp(), 1_001);
    }

    #[test]
    fn exhausted_millisecond_reports_pending_until_the_clock_advances() {
        let (generator, clock) = generator_at(SNOWFLAKE_ID_EPOCH + 2_000);

        // Drain the full 12-bit sequence space at one tick.
        for expected in 0..=MAX_SEQUENCE {
            match generator.try_next_id().unwrap() {
                SnowflakeOperation::Ready(id) => assert_eq!(id.sequence(), expected),
                SnowflakeOperation::Pending(_) => panic!("exhausted too early at {}", expected),
            }
        }

        // 4097th id in the same millisecond must block, repeatedly.
        for _ in 0..3 {
            match generator.try_next_id().unwrap() {
                SnowflakeOperation::Pending(wait) => assert_eq!(wait, Duration::from_millis(1)),
                SnowflakeOperation::Ready(_) => panic!("issued more than 4096 ids in one ms"),
            }
        }

        clock.advance(1);
        let id = generator.next_id(|_| {}).unwrap();
        assert_eq!(id.sequence(), 0);
        assert_eq!(id.timestamp(), 2_001);
    }

    #[test]
    fn ids_stay_unique_across_the_rollover_boundary() {
        let (generator, clock) = generator_at(SNOWFLAKE_ID_EPOCH + 3_000);
        let mut ids = Vec::new();

        for _ in 0..=MAX_SEQUENCE {
            ids.push(generator.next_id(|_| {}).unwrap());
        }
        clock.advance(1);
        for _ in 0..16 {
            ids.push(generator.next_id(|_| {}).unwrap());
        }

        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());

        for pair in ids.windows(2) {
            assert!(pair[0].id() < pair[1].id());
        }
    }

    #[test]
    fn backwards_clock_is_rejected_with_the_drift() {
        let now = SNOWFLAKE_ID_EPOCH + 5_000;
        let (generator, clock) = generator_at(now);

        generator.next_id(|_| {}).unwrap();
        clock.set(now - 25);

        match generator.next_id(|_| {}) {
            Err(SnowflakeError::ClockMovedBackwards(drift)) => assert_eq!(drift, 25),
            other => panic!("expected ClockMovedBackwards, got {:?}", other.map(|id| id.id())),
        }

        // The failure must not have burned a sequence slot: once the clock
        // recovers, generation resumes normally.
        clock.set(now + 1);
        let id = generator.next_id(|_| {}).unwrap();
        assert_eq!(id.sequence(), 0);
    }

    #[test]
    fn timestamp_field_never_decreases() {
        let (generator, clock) = generator_at(SNOWFLAKE_ID_EPOCH + 7_000);
        let mut last = 0i64;

        for step in [0, 0, 1, 0, 3, 0, 10, 0] {
            clock.advance(step);
            let id = generator.next_id(|_| {}).unwrap();
            assert!(id.timestamp() >= last);
            last = id.timestamp();
        }
    }

    #[test]
    fn epoch_in_the_future_is_a_configuration_error() {
        let now = SNOWFLAKE_ID_EPOCH + 9_000;
        let clock = ManualClock::at(now);
        let generator: SnowflakeGenerator<SnowflakeId, ManualClock> =
            SnowflakeGenerator::with_clock(1, 1, now + 60_000, 0, clock).unwrap();

        match generator.next_id(|_| {}) {
            Err(SnowflakeError::TimestampOverflow) => {}
            other => panic!("expected TimestampOverflow, got {:?}", other.map(|id| id.id())),
        }
    }

    #[test]
    fn bulk_generation_with_a_manual_clock_spans_ticks() {
        let (generator, clock) = generator_at(SNOWFLAKE_ID_EPOCH + 11_000);

        // Advancing the clock from the pending callback lets the batch cross
        // millisecond boundaries deterministically.
        let ids = generator
            .next_id_bulk(5_000, |_| clock.advance(1))
            .unwrap();

        assert_eq!(ids.len(), 5_000);
        for pair in ids.windows(2) {
            assert!(pair[0].id() < pair[1].id());
        }
    }

    #[test]
    fn seeded_sequence_is_masked_to_twelve_bits() {
        let clock = ManualClock::at(SNOWFLAKE_ID_EPOCH + 13_000);
        let generator: SnowflakeGenerator<SnowflakeId, ManualClock> =
            SnowflakeGenerator::with_clock(3, 3, SNOWFLAKE_ID_EPOCH, 0xFFFFFF - 20, clock.clone())
                .unwrap();

        for _ in 0..40 {
            let id = generator.next_id(|_| clock.advance(1)).unwrap();
            assert_eq!(id.worker_id(), 3);
            assert_eq!(id.datacenter_id(), 3);
            assert!(id.sequence() <= MAX_SEQUENCE);
        }
    }
}
