//! Generated-key SPI.
//!
//! Key generators are the one stateful part of the rule model; they guard
//! their state internally so concurrent executors can share a snapshot.

use std::fmt::Debug;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::KeyGeneratorKind;
use crate::statement::Value;

/// Produces one value per omitted auto-generated column per row.
pub trait KeyGenerator: Debug + Send + Sync {
    fn next_id(&self) -> Value;
}

/// A table's generated-key column and its generator.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub column: String,
    pub generator: Arc<dyn KeyGenerator>,
}

impl GeneratedKey {
    pub fn new(column: impl Into<String>, kind: KeyGeneratorKind) -> Self {
        let generator: Arc<dyn KeyGenerator> = match kind {
            KeyGeneratorKind::Snowflake => Arc::new(Snowflake::new(0)),
            KeyGeneratorKind::Uuid => Arc::new(UuidGenerator),
        };
        Self {
            column: column.into(),
            generator,
        }
    }
}

// 2016-11-01T00:00:00Z, the customary sharding epoch.
const EPOCH_MILLIS: i64 = 1477958400000;

const SEQUENCE_BITS: u8 = 12;
const WORKER_BITS: u8 = 10;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Default)]
struct SnowflakeState {
    sequence: i64,
    last_millis: i64,
}

/// Snowflake-style ids: 41 bits of milliseconds since the epoch,
/// 10 bits of worker id, 12 bits of per-millisecond sequence.
#[derive(Debug)]
pub struct Snowflake {
    worker_id: i64,
    state: Mutex<SnowflakeState>,
}

impl Snowflake {
    pub fn new(worker_id: u16) -> Self {
        Self {
            worker_id: (worker_id as i64) & ((1 << WORKER_BITS) - 1),
            state: Mutex::new(SnowflakeState::default()),
        }
    }

    fn compose(&self, millis: i64, sequence: i64) -> i64 {
        ((millis - EPOCH_MILLIS) << (WORKER_BITS + SEQUENCE_BITS))
            | (self.worker_id << SEQUENCE_BITS)
            | sequence
    }
}

impl KeyGenerator for Snowflake {
    fn next_id(&self) -> Value {
        let mut state = self.state.lock();
        // A clock that moved backwards keeps issuing from the last
        // observed millisecond rather than colliding.
        let mut now = Utc::now().timestamp_millis().max(state.last_millis);

        if now == state.last_millis {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                now += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_millis = now;

        Value::Int(self.compose(now, state.sequence))
    }
}

/// UUID v4 keys, rendered without hyphens.
#[derive(Debug)]
pub struct UuidGenerator;

impl KeyGenerator for UuidGenerator {
    fn next_id(&self) -> Value {
        Value::Text(Uuid::new_v4().simple().to_string())
    }
}
