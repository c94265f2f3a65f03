use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "sqlx")]
use sqlx::Type;

pub mod clock;
pub mod defs;
pub mod error;
pub mod generator;
pub mod snowflake;

#[cfg(feature = "tokio")]
pub mod async_generator;

pub use clock::{SystemClock, TimeSource};
pub use defs::*;
use error::SnowflakeError;
pub use snowflake::Snowflake;

/// Type alias for the generic generator parameterised on `SnowflakeId`.
pub type SnowflakeGenerator = generator::SnowflakeGenerator<SnowflakeId>;

#[cfg(feature = "tokio")]
pub type AsyncSnowflakeGenerator = async_generator::AsyncSnowflakeGenerator<SnowflakeId>;

/// A 64-bit id packing `[41-bit timestamp][5-bit datacenter][5-bit worker]
/// [12-bit sequence]`. The top bit is always 0, so the value is non-negative
/// as an `i64` and maps cleanly onto a database `BIGINT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "sqlx", derive(Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "BIGINT"))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct SnowflakeId(i64);

// ---------------------------------------------------------------------------
// Snowflake trait implementation
// ---------------------------------------------------------------------------

impl Snowflake for SnowflakeId {
    fn from_component_parts(
        timestamp_offset: u64,
        datacenter_id: u64,
        worker_id: u64,
        sequence: u64,
    ) -> Self {
        let id = (timestamp_offset << Self::timestamp_shift())
            | (datacenter_id << Self::datacenter_id_shift())
            | (worker_id << Self::sequence_bits())
            | sequence;
        SnowflakeId(id as i64)
    }

    fn id(&self) -> u64 {
        self.0 as u64
    }

    fn timestamp_bits() -> u64 {
        TIMESTAMP_BITS
    }

    fn datacenter_id_bits() -> u64 {
        DATACENTER_ID_BITS
    }

    fn worker_id_bits() -> u64 {
        WORKER_ID_BITS
    }

    fn sequence_bits() -> u64 {
        SEQUENCE_BITS
    }
}

// ---------------------------------------------------------------------------
// Inherent methods (i64-flavoured surface over the trait)
// ---------------------------------------------------------------------------

impl SnowflakeId {
    pub fn new(value: i64) -> Result<Self, SnowflakeError> {
        if value < 0 {
            return Err(SnowflakeError::InvalidId(
                "Snowflake ID cannot be negative".to_string(),
            ));
        }
        Ok(SnowflakeId(value))
    }

    /// Creates a SnowflakeId without validation. Only use this if you're certain the value is valid.
    ///
    /// # Safety
    /// The caller must ensure that the value is non-negative.
    pub fn new_unchecked(value: i64) -> Self {
        SnowflakeId(value)
    }

    pub fn id(&self) -> i64 {
        self.0
    }

    /// Returns the timestamp offset (in milliseconds) stored in this snowflake ID.
    /// This is NOT a Unix timestamp. To get the actual Unix timestamp, use `timestamp_with_epoch()`.
    pub fn timestamp(&self) -> i64 {
        <Self as Snowflake>::timestamp(self) as i64
    }

    /// Returns the timestamp in milliseconds since Unix epoch, using a custom epoch
    pub fn timestamp_with_epoch(&self, epoch: i64) -> i64 {
        <Self as Snowflake>::timestamp_with_epoch(self, epoch)
    }

    pub fn datacenter_id(&self) -> u64 {
        <Self as Snowflake>::datacenter_id(self)
    }

    pub fn worker_id(&self) -> u64 {
        <Self as Snowflake>::worker_id(self)
    }

    pub fn sequence(&self) -> u64 {
        <Self as Snowflake>::sequence(self)
    }
}

// ---------------------------------------------------------------------------
// FromStr
// ---------------------------------------------------------------------------

impl FromStr for SnowflakeId {
    type Err = SnowflakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .parse::<i64>()
            .map_err(|e| SnowflakeError::InvalidId(format!("Failed to parse: {}", e)))?;

        if value < 0 {
            return Err(SnowflakeError::InvalidId(
                "Snowflake ID cannot be negative".to_string(),
            ));
        }

        Ok(SnowflakeId(value))
    }
}

// ---------------------------------------------------------------------------
// Display, TryFrom, Into, Serde
// ---------------------------------------------------------------------------

impl fmt::Display for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for SnowflakeId {
    type Error = SnowflakeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        SnowflakeId::new(value)
    }
}

impl From<SnowflakeId> for i64 {
    fn from(id: SnowflakeId) -> Self {
        id.0
    }
}

impl Serialize for SnowflakeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.0.to_string())
        } else {
            serializer.serialize_i64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for SnowflakeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SnowflakeIdVisitor;

        impl<'de> serde::de::Visitor<'de> for SnowflakeIdVisitor {
            type Value = SnowflakeId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer representing a snowflake id")
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if value > i64::MAX as u64 {
                    return Err(E::custom("snowflake id value exceeds i64::MAX"));
                }
                Ok(SnowflakeId::new_unchecked(value as i64))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if value < 0 {
                    Err(E::custom("snowflake id cannot be negative"))
                } else {
                    Ok(SnowflakeId::new_unchecked(value))
                }
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let parsed = value
                    .parse::<i64>()
                    .map_err(|_| E::custom("invalid snowflake id string"))?;
                if parsed < 0 {
                    return Err(E::custom("snowflake id cannot be negative"));
                }
                Ok(SnowflakeId::new_unchecked(parsed))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&value)
            }
        }

        deserializer.deserialize_any(SnowflakeIdVisitor)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
