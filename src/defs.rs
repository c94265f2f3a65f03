/// Number of bits for the millisecond timestamp field.
pub const TIMESTAMP_BITS: u64 = 41;

/// Number of bits for the datacenter id field.
pub const DATACENTER_ID_BITS: u64 = 5;

/// Number of bits for the worker id field.
pub const WORKER_ID_BITS: u64 = 5;

/// Number of bits for the per-millisecond sequence counter.
pub const SEQUENCE_BITS: u64 = 12;

/// Default epoch: Thursday, November 4, 2010 01:42:54.657 UTC.
///
/// All producers and consumers of a given id space must agree on the epoch.
/// Changing it after ids have been issued changes the meaning of the
/// timestamp field of every one of them, so it is fixed for the lifetime of
/// the system.
pub const SNOWFLAKE_ID_EPOCH: i64 = 1_288_834_974_657;

/// Largest datacenter id that fits the 5-bit field (31).
pub const MAX_DATACENTER_ID: u64 = (1 << DATACENTER_ID_BITS) - 1;

/// Largest worker id that fits the 5-bit field (31).
pub const MAX_WORKER_ID: u64 = (1 << WORKER_ID_BITS) - 1;

/// Largest sequence value that fits the 12-bit field (4095).
pub const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

/// Largest timestamp offset (in milliseconds) that fits the 41-bit field,
/// roughly 69 years past the epoch.
pub const MAX_TIMESTAMP_MS: i64 = (1 << TIMESTAMP_BITS) - 1;

// The four fields must pack into 63 bits, leaving the top bit of an i64
// clear so every id is non-negative.
const _: () = assert!(TIMESTAMP_BITS + DATACENTER_ID_BITS + WORKER_ID_BITS + SEQUENCE_BITS == 63);
