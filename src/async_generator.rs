use crate::clock::{SystemClock, TimeSource};
use crate::error::SnowflakeError;
use crate::generator::SnowflakeOperation;
use crate::snowflake::Snowflake;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::sync::Mutex;

struct GeneratorState {
    last_timestamp: i64,
    sequence: u64,
}

pub struct AsyncSnowflakeGenerator<S: Snowflake, C: TimeSource = SystemClock> {
    worker_id: u64,
    datacenter_id: u64,
    state: Mutex<GeneratorState>,
    epoch: i64,
    clock: C,
    _marker: PhantomData<S>,
}

impl<S: Snowflake> AsyncSnowflakeGenerator<S, SystemClock> {
    pub fn new(worker_id: u64, datacenter_id: u64) -> Result<Self, SnowflakeError> {
        Self::with_epoch(worker_id, datacenter_id, crate::defs::SNOWFLAKE_ID_EPOCH)
    }

    pub fn with_epoch(
        worker_id: u64,
        datacenter_id: u64,
        epoch: i64,
    ) -> Result<Self, SnowflakeError> {
        Self::with_clock(worker_id, datacenter_id, epoch, 0, SystemClock)
    }
}

impl<S: Snowflake, C: TimeSource> AsyncSnowflakeGenerator<S, C> {
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

        Ok(AsyncSnowflakeGenerator {
            worker_id,
            datacenter_id,
            state: Mutex::new(GeneratorState {
                last_timestamp: -1,
                sequence: initial_sequence,
            }),
            epoch,
            clock,
            _marker: PhantomData,
        })
    }

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
    pub async fn sequence(&self) -> u64 {
        self.state.lock().await.sequence
    }

    pub async fn try_next_id(&self) -> Result<SnowflakeOperation<S>, SnowflakeError> {
        let mut state = self.state.lock().await;
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

    /// Mints the next id, sleeping out exhausted milliseconds. The clock is
    /// re-read on every attempt, so an id is only issued once the time
    /// source has strictly advanced.
    pub async fn next_id(&self) -> Result<S, SnowflakeError> {
        loop {
            match self.try_next_id().await? {
                SnowflakeOperation::Ready(id) => return Ok(id),
                SnowflakeOperation::Pending(wait) => {
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    pub async fn next_id_bulk(&self, count: usize) -> Result<Vec<S>, SnowflakeError> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(self.next_id().await?);
        }
        Ok(ids)
    }
}
