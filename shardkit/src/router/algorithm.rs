//! Sharding algorithms.
//!
//! A closed set of algorithm shapes: `Precise` routes one literal,
//! `Range` partitions a comparable domain into indexed buckets, `Hint`
//! consumes caller-supplied values. The shape is queried, never
//! downcast. Built-in implementations cover modulo, hashed modulo, and
//! the two range partitioners; anything else plugs in through the
//! traits.

use std::fmt::Debug;
use std::sync::Arc;

use crc32fast::Hasher as Crc32;
use indexmap::IndexSet;
use sha1::{Digest, Sha1};
use tracing::debug;

use super::Error;
use crate::config;
use crate::stats::stats;
use crate::statement::Value;
use crate::util::numeric_suffix;

/// Bounded or half-open range of sharding values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRange {
    pub lower: Option<Value>,
    pub upper: Option<Value>,
}

/// Values attached to one sharding column by the condition extractor
/// (or injected from a hint).
#[derive(Debug, Clone, PartialEq)]
pub enum ShardingValues {
    /// From `=` and `IN`: route per literal, union the results.
    List(Vec<Value>),
    /// From `BETWEEN` and comparison pairs.
    Range(ValueRange),
}

/// Routes a single literal to exactly one target.
pub trait PreciseAlgorithm: Debug + Send + Sync {
    fn route(&self, available: &IndexSet<String>, value: &Value) -> Result<String, Error>;
}

/// Partitions the value domain into `bucket_count` indexed buckets.
pub trait RangeAlgorithm: Debug + Send + Sync {
    fn bucket_count(&self) -> usize;
    fn bucket(&self, value: &Value) -> Result<usize, Error>;
    /// Declared target for a bucket, if the topology names one.
    fn target(&self, bucket: usize, available: &IndexSet<String>) -> Option<String>;
}

/// Routes caller-supplied hint values.
pub trait HintAlgorithm: Debug + Send + Sync {
    fn route(&self, available: &IndexSet<String>, values: &[Value]) -> Result<Vec<String>, Error>;
}

/// An algorithm with its shape.
#[derive(Debug, Clone)]
pub enum Algorithm {
    Precise(Arc<dyn PreciseAlgorithm>),
    Range(Arc<dyn RangeAlgorithm>),
    Hint(Arc<dyn HintAlgorithm>),
}

/// Strategy for one shard dimension: the sharding column and the
/// algorithm deciding where its values go.
#[derive(Debug, Clone)]
pub struct ShardingStrategy {
    pub column: String,
    pub algorithm: Algorithm,
}

impl ShardingStrategy {
    pub fn from_config(config: &config::Strategy) -> Self {
        Self {
            column: config.column.clone(),
            algorithm: Algorithm::from_config(&config.algorithm),
        }
    }
}

impl Algorithm {
    pub fn from_config(config: &config::Algorithm) -> Self {
        match *config {
            config::Algorithm::Modulo { sharding_count } => {
                Algorithm::Precise(Arc::new(Modulo { sharding_count }))
            }
            config::Algorithm::Sha1Modulo { sharding_count } => {
                Algorithm::Precise(Arc::new(Sha1Modulo { sharding_count }))
            }
            config::Algorithm::Crc32Modulo { sharding_count } => {
                Algorithm::Precise(Arc::new(Crc32Modulo { sharding_count }))
            }
            config::Algorithm::VolumeRange {
                lower,
                upper,
                volume,
            } => Algorithm::Range(Arc::new(VolumeRange {
                lower,
                upper,
                volume: volume.max(1),
            })),
            config::Algorithm::BoundaryRange { ref boundaries } => {
                Algorithm::Range(Arc::new(BoundaryRange {
                    boundaries: boundaries.clone(),
                }))
            }
            config::Algorithm::HintModulo { sharding_count } => {
                Algorithm::Hint(Arc::new(HintModulo { sharding_count }))
            }
        }
    }

    pub fn supports_range(&self) -> bool {
        matches!(self, Algorithm::Range(_))
    }

    /// Invoke the algorithm over extracted values and return the routed
    /// subset of `available`.
    ///
    /// Every returned name is validated against `available`; a miss is a
    /// configuration defect and fails the statement. A range query
    /// against an algorithm that can't partition ranges degrades to all
    /// declared targets instead.
    pub fn route(
        &self,
        available: &IndexSet<String>,
        values: &ShardingValues,
    ) -> Result<IndexSet<String>, Error> {
        match (self, values) {
            (Algorithm::Precise(algorithm), ShardingValues::List(list)) => {
                let mut routed = IndexSet::new();
                for value in list {
                    let target = algorithm.route(available, value)?;
                    if !available.contains(&target) {
                        return Err(Error::AlgorithmTargetMismatch(target));
                    }
                    routed.insert(target);
                }
                Ok(routed)
            }

            (Algorithm::Precise(_), ShardingValues::Range(_))
            | (Algorithm::Hint(_), ShardingValues::Range(_)) => {
                debug!("range predicate on a precise algorithm, routing to all targets");
                stats().route_degraded();
                Ok(available.clone())
            }

            (Algorithm::Range(algorithm), ShardingValues::List(list)) => {
                let mut routed = IndexSet::new();
                for value in list {
                    let bucket = algorithm.bucket(value)?;
                    let target = algorithm
                        .target(bucket, available)
                        .ok_or_else(|| Error::AlgorithmTargetMismatch(format!("bucket {}", bucket)))?;
                    routed.insert(target);
                }
                Ok(routed)
            }

            (Algorithm::Range(algorithm), ShardingValues::Range(range)) => {
                let first = match &range.lower {
                    Some(lower) => algorithm.bucket(lower)?,
                    None => 0,
                };
                let last = match &range.upper {
                    Some(upper) => algorithm.bucket(upper)?,
                    None => algorithm.bucket_count().saturating_sub(1),
                };

                let mut routed = IndexSet::new();
                for bucket in first..=last {
                    // Buckets with no declared target are filtered, not fatal:
                    // the topology may cover a subset of the domain.
                    if let Some(target) = algorithm.target(bucket, available) {
                        routed.insert(target);
                    }
                }
                Ok(routed)
            }

            (Algorithm::Hint(algorithm), ShardingValues::List(list)) => {
                let mut routed = IndexSet::new();
                for target in algorithm.route(available, list)? {
                    if !available.contains(&target) {
                        return Err(Error::AlgorithmTargetMismatch(target));
                    }
                    routed.insert(target);
                }
                Ok(routed)
            }
        }
    }
}

fn suffix_target(available: &IndexSet<String>, bucket: usize) -> Option<String> {
    available
        .iter()
        .find(|name| numeric_suffix(name) == Some(bucket))
        .cloned()
}

/// `value % sharding_count`, target picked by numeric suffix.
#[derive(Debug, Clone)]
pub struct Modulo {
    pub sharding_count: usize,
}

impl PreciseAlgorithm for Modulo {
    fn route(&self, available: &IndexSet<String>, value: &Value) -> Result<String, Error> {
        let int = value
            .as_int()
            .ok_or_else(|| Error::UnroutableValue(value.to_string()))?;
        let bucket = int.rem_euclid(self.sharding_count.max(1) as i64) as usize;
        suffix_target(available, bucket)
            .ok_or_else(|| Error::AlgorithmTargetMismatch(format!("shard suffix {}", bucket)))
    }
}

/// SHA-1 of the value's bytes, low 32 bits, modulo.
#[derive(Debug, Clone)]
pub struct Sha1Modulo {
    pub sharding_count: usize,
}

impl PreciseAlgorithm for Sha1Modulo {
    fn route(&self, available: &IndexSet<String>, value: &Value) -> Result<String, Error> {
        let digest = Sha1::digest(value.hash_bytes());
        let hash = u32::from_be_bytes([digest[16], digest[17], digest[18], digest[19]]);
        let bucket = hash as usize % self.sharding_count.max(1);
        suffix_target(available, bucket)
            .ok_or_else(|| Error::AlgorithmTargetMismatch(format!("shard suffix {}", bucket)))
    }
}

/// CRC32 of the value's bytes, modulo.
#[derive(Debug, Clone)]
pub struct Crc32Modulo {
    pub sharding_count: usize,
}

impl PreciseAlgorithm for Crc32Modulo {
    fn route(&self, available: &IndexSet<String>, value: &Value) -> Result<String, Error> {
        let mut hasher = Crc32::new();
        hasher.update(&value.hash_bytes());
        let bucket = hasher.finalize() as usize % self.sharding_count.max(1);
        suffix_target(available, bucket)
            .ok_or_else(|| Error::AlgorithmTargetMismatch(format!("shard suffix {}", bucket)))
    }
}

/// Fixed-width buckets between two bounds; values outside the bounds
/// clamp to the edge buckets.
#[derive(Debug, Clone)]
pub struct VolumeRange {
    pub lower: i64,
    pub upper: i64,
    pub volume: i64,
}

impl RangeAlgorithm for VolumeRange {
    fn bucket_count(&self) -> usize {
        let span = (self.upper - self.lower).max(1);
        ((span + self.volume - 1) / self.volume) as usize
    }

    fn bucket(&self, value: &Value) -> Result<usize, Error> {
        let int = value
            .as_int()
            .ok_or_else(|| Error::UnroutableValue(value.to_string()))?;
        if int < self.lower {
            return Ok(0);
        }
        if int >= self.upper {
            return Ok(self.bucket_count() - 1);
        }
        Ok(((int - self.lower) / self.volume) as usize)
    }

    fn target(&self, bucket: usize, available: &IndexSet<String>) -> Option<String> {
        suffix_target(available, bucket)
    }
}

/// Explicit ascending boundaries; `boundaries.len() + 1` buckets.
#[derive(Debug, Clone)]
pub struct BoundaryRange {
    pub boundaries: Vec<i64>,
}

impl RangeAlgorithm for BoundaryRange {
    fn bucket_count(&self) -> usize {
        self.boundaries.len() + 1
    }

    fn bucket(&self, value: &Value) -> Result<usize, Error> {
        let int = value
            .as_int()
            .ok_or_else(|| Error::UnroutableValue(value.to_string()))?;
        Ok(self.boundaries.partition_point(|boundary| *boundary <= int))
    }

    fn target(&self, bucket: usize, available: &IndexSet<String>) -> Option<String> {
        suffix_target(available, bucket)
    }
}

/// Modulo over hint values.
#[derive(Debug, Clone)]
pub struct HintModulo {
    pub sharding_count: usize,
}

impl HintAlgorithm for HintModulo {
    fn route(&self, available: &IndexSet<String>, values: &[Value]) -> Result<Vec<String>, Error> {
        values
            .iter()
            .map(|value| {
                let int = value
                    .as_int()
                    .ok_or_else(|| Error::UnroutableValue(value.to_string()))?;
                let bucket = int.rem_euclid(self.sharding_count.max(1) as i64) as usize;
                suffix_target(available, bucket).ok_or_else(|| {
                    Error::AlgorithmTargetMismatch(format!("shard suffix {}", bucket))
                })
            })
            .collect()
    }
}
