//! HyperLogLog++ sketch with a dual sparse/dense representation.
//!
//! A sketch is born sparse: observed hashes are encoded into 32-bit words
//! (see [`crate::encoding`]) and buffered in an unordered set, which is
//! periodically compacted into an ordered, delta-compressed list. The
//! sparse form addresses `2^25` virtual registers, so small cardinalities
//! are counted near-exactly by linear counting over the list length.
//!
//! Once the compacted list outgrows the dense register array it would
//! replace (`count > m`), the sketch converts to a fixed array of `m = 2^p`
//! byte registers and never returns. Dense counting blends the raw harmonic
//! estimator with tabulated bias correction and linear counting (see
//! [`crate::bias`]).
//!
//! Transition bookkeeping:
//! - the buffered set is compacted whenever it exceeds `m / 100` entries;
//! - merging always produces a dense result when the source carries sparse
//!   data;
//! - the source of a merge is never mutated.

use std::any::Any;
use std::fmt;

use hashbrown::HashSet;
use xxhash_rust::xxh64::xxh64;

use crate::bias::{alpha, estimate_bias, THRESHOLD};
use crate::compressed::CompressedList;
use crate::encoding::{bextr, decode_hash, encode_hash, MP};
use crate::error::SketchError;
use crate::sketch::Sketch;

/// Default hash applied to added values: 64-bit xxHash with seed 0.
fn default_hash(v: &[u8]) -> u64 {
    xxh64(v, 0)
}

/// HyperLogLog++ cardinality sketch.
///
/// Created with a precision `p` in `[4, 18]` selecting `2^p` registers;
/// relative error is roughly `1.04 / sqrt(2^p)` once dense. Two sketches of
/// equal precision can be merged, yielding the sketch that would have seen
/// the union of both input streams.
#[derive(Clone)]
pub struct HyperLogLogPlus {
    /// Injected byte-hashing function.
    hash: fn(&[u8]) -> u64,
    /// Precision: number of hash bits used for dense register indices.
    p: u8,
    /// Number of dense registers.
    m: u32,
    /// Bias correction constant for the raw estimator.
    alpha: f64,
    repr: Representation,
}

/// The two storage forms a sketch moves through.
#[derive(Clone, Debug, PartialEq)]
enum Representation {
    Sparse(SparseData),
    Dense(Vec<u8>),
}

/// Sparse state: unordered buffer of encoded hashes plus the ordered,
/// delta-compressed run they are periodically folded into.
#[derive(Clone, Debug, PartialEq)]
struct SparseData {
    tmp_set: HashSet<u32>,
    list: CompressedList,
}

impl HyperLogLogPlus {
    /// Create a sketch with precision `p` and the default 64-bit xxhash.
    pub fn new(p: u8) -> Result<Self, SketchError> {
        Self::with_hash(p, default_hash)
    }

    /// Create a sketch with precision `p` and an injected hash function.
    pub fn with_hash(p: u8, hash: fn(&[u8]) -> u64) -> Result<Self, SketchError> {
        if !(4..=18).contains(&p) {
            return Err(SketchError::InvalidPrecision);
        }
        let m = 1u32 << p;
        Ok(Self {
            hash,
            p,
            m,
            alpha: alpha(m as usize),
            repr: Representation::Sparse(SparseData {
                tmp_set: HashSet::new(),
                list: CompressedList::with_capacity(m as usize),
            }),
        })
    }

    /// The precision this sketch was built with.
    #[inline]
    pub fn precision(&self) -> u8 {
        self.p
    }

    /// Whether the sketch still uses the sparse representation.
    #[inline]
    pub fn is_sparse(&self) -> bool {
        matches!(self.repr, Representation::Sparse(_))
    }

    /// Observe a value.
    pub fn add(&mut self, v: &[u8]) {
        let x = (self.hash)(v);
        self.add_hash(x);
    }

    /// Observe an already-hashed value.
    fn add_hash(&mut self, x: u64) {
        let needs_compact = match &mut self.repr {
            Representation::Sparse(data) => {
                data.tmp_set.insert(encode_hash(x, self.p));
                data.tmp_set.len() as u32 * 100 > self.m
            }
            Representation::Dense(registers) => {
                let i = bextr(x, 64 - self.p, self.p) as usize;
                // low bits with a sentinel so the zero run is bounded
                let w = (x << self.p) | (1 << (self.p - 1));
                let rho = w.leading_zeros() as u8 + 1;
                if rho > registers[i] {
                    registers[i] = rho;
                }
                false
            }
        };

        if needs_compact {
            self.merge_sparse();
            let outgrown = matches!(
                &self.repr,
                Representation::Sparse(data) if data.list.count() as u32 > self.m
            );
            if outgrown {
                self.to_dense();
            }
        }
    }

    /// Estimate the number of distinct values observed.
    ///
    /// On the sparse path this first compacts the pending buffer, then
    /// linear-counts the virtual register space. On the dense path the raw
    /// harmonic estimate is bias-corrected in its low range and replaced by
    /// linear counting while enough registers remain zero.
    pub fn count(&mut self) -> u64 {
        self.merge_sparse();
        match &self.repr {
            Representation::Sparse(data) => {
                linear_count(MP, MP - data.list.count() as u32) as u64
            }
            Representation::Dense(registers) => {
                let (mut est, zeros) = raw_estimate(registers, self.alpha);
                if est <= 5.0 * f64::from(self.m) {
                    est -= estimate_bias(est, self.p);
                }

                if zeros > 0 {
                    let lc = linear_count(self.m, zeros);
                    if lc <= THRESHOLD[(self.p - 4) as usize] {
                        return lc as u64;
                    }
                }
                est as u64
            }
        }
    }

    /// Fold `other` into `self`. `other` is left untouched; `self` becomes
    /// dense if it was not already.
    pub fn merge(&mut self, other: &dyn Sketch) -> Result<(), SketchError> {
        let Some(other) = other.as_any().downcast_ref::<HyperLogLogPlus>() else {
            return Err(SketchError::IncompatibleSketch(other.type_name()));
        };

        if self.p != other.p {
            return Err(SketchError::PrecisionMismatch);
        }

        if self.is_sparse() {
            self.to_dense();
        }

        let p = self.p;
        let Representation::Dense(registers) = &mut self.repr else {
            unreachable!("merge destination is dense after conversion");
        };

        match &other.repr {
            Representation::Sparse(data) => {
                // the source keeps its pending buffer; walk both it and the
                // compacted list without flushing
                for &k in &data.tmp_set {
                    let (i, r) = decode_hash(k, p);
                    if registers[i as usize] < r {
                        registers[i as usize] = r;
                    }
                }
                for k in data.list.iter() {
                    let (i, r) = decode_hash(k, p);
                    if registers[i as usize] < r {
                        registers[i as usize] = r;
                    }
                }
            }
            Representation::Dense(other_registers) => {
                for (reg, &o) in registers.iter_mut().zip(other_registers) {
                    if o > *reg {
                        *reg = o;
                    }
                }
            }
        }
        Ok(())
    }

    /// Fold the buffered set into the ordered list, deduplicating on the
    /// way. No-op on a dense sketch or an empty buffer.
    fn merge_sparse(&mut self) {
        let m = self.m;
        let Representation::Sparse(data) = &mut self.repr else {
            return;
        };
        if data.tmp_set.is_empty() {
            return;
        }

        let mut keys: Vec<u32> = data.tmp_set.drain().collect();
        keys.sort_unstable();

        let merged = {
            let mut merged = CompressedList::with_capacity(m as usize);
            let mut iter = data.list.iter().peekable();
            let mut i = 0;
            loop {
                match (iter.peek().copied(), keys.get(i).copied()) {
                    (None, None) => break,
                    (Some(x), None) => {
                        merged.append(x);
                        iter.next();
                    }
                    (None, Some(k)) => {
                        merged.append(k);
                        i += 1;
                    }
                    (Some(x), Some(k)) => {
                        if x == k {
                            merged.append(x);
                            iter.next();
                            i += 1;
                        } else if x > k {
                            merged.append(k);
                            i += 1;
                        } else {
                            merged.append(x);
                            iter.next();
                        }
                    }
                }
            }
            merged
        };
        data.list = merged;
    }

    /// Convert the sparse representation to the dense register array,
    /// releasing the sparse structures. The conversion is one-way.
    fn to_dense(&mut self) {
        self.merge_sparse();
        let Representation::Sparse(data) = &self.repr else {
            return;
        };

        let mut registers = vec![0u8; self.m as usize];
        for k in data.list.iter() {
            let (i, r) = decode_hash(k, self.p);
            if registers[i as usize] < r {
                registers[i as usize] = r;
            }
        }

        tracing::debug!(
            precision = self.p,
            values = data.list.count(),
            "converting sparse representation to dense"
        );
        self.repr = Representation::Dense(registers);
    }
}

impl Sketch for HyperLogLogPlus {
    fn add(&mut self, v: &[u8]) {
        HyperLogLogPlus::add(self, v);
    }

    fn count(&mut self) -> u64 {
        HyperLogLogPlus::count(self)
    }

    fn merge(&mut self, other: &dyn Sketch) -> Result<(), SketchError> {
        HyperLogLogPlus::merge(self, other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl fmt::Debug for HyperLogLogPlus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match &self.repr {
            Representation::Sparse(_) => "sparse",
            Representation::Dense(_) => "dense",
        };
        f.debug_struct("HyperLogLogPlus")
            .field("precision", &self.p)
            .field("representation", &repr)
            .finish()
    }
}

/// Raw harmonic estimate over the dense registers, plus the number of zero
/// registers needed by the linear-counting decision downstream.
fn raw_estimate(registers: &[u8], alpha: f64) -> (f64, u32) {
    let mut sum = 0.0;
    let mut zeros = 0u32;
    for &v in registers {
        sum += 1.0 / ((1u64 << v) as f64);
        if v == 0 {
            zeros += 1;
        }
    }
    let m = registers.len() as f64;
    (alpha * m * m / sum, zeros)
}

/// Classical linear-counting estimator: `m * ln(m / v)` for `v` empty
/// registers out of `m`.
fn linear_count(m: u32, v: u32) -> f64 {
    let m = f64::from(m);
    m * (m / f64::from(v)).ln()
}
