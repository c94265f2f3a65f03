use std::fmt;

#[derive(Debug, Clone)]
pub enum SnowflakeError {
    InvalidWorkerId(u64, u64),
    InvalidDatacenterId(u64, u64),
    ClockMovedBackwards(i64),
    TimestampOverflow,
    GeneratorPoisoned,
    InvalidId(String),
}

impl fmt::Display for SnowflakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnowflakeError::InvalidWorkerId(id, max) => {
                write!(
                    f,
                    "Invalid worker ID: {}. Must be between 0 and {}",
                    id, max
                )
            }
            SnowflakeError::InvalidDatacenterId(id, max) => {
                write!(
                    f,
                    "Invalid datacenter ID: {}. Must be between 0 and {}",
                    id, max
                )
            }
            SnowflakeError::ClockMovedBackwards(drift_ms) => {
                write!(
                    f,
                    "Clock moved backwards by {}ms. Refusing to generate id",
                    drift_ms
                )
            }
            SnowflakeError::TimestampOverflow => {
                write!(f, "Timestamp offset exceeds the 41-bit field")
            }
            SnowflakeError::GeneratorPoisoned => {
                write!(f, "ID generator mutex was poisoned by a panicking thread")
            }
            SnowflakeError::InvalidId(msg) => {
                write!(f, "Invalid snowflake ID: {}", msg)
            }
        }
    }
}

impl std::error::Error for SnowflakeError {}
