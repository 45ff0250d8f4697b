//! `cardinality-sketch` estimates the number of distinct elements in a
//! stream of opaque byte values in constant memory, using the HyperLogLog++
//! algorithm with a sparse representation for small cardinalities.
//!
//! # Representations
//!
//! ## Sparse
//! Small sets are stored as 32-bit encoded hash prefixes at a fixed sparse
//! precision of 25 bits: a bounded unordered buffer absorbs recent
//! insertions and is periodically folded into an ordered, delta-varint
//! compressed list. Counting is linear counting over `2^25` virtual
//! registers and is near-exact in this range.
//!
//! ## Dense
//! Once the sparse list would occupy more than the register array itself,
//! the sketch converts to `2^p` one-byte registers, each tracking the
//! maximum observed leading-zero run for its hash bucket. Counting applies
//! the bias-corrected raw estimator with a linear-counting fallback while
//! many registers are still empty. The conversion is one-way.
//!
//! # Accuracy
//!
//! Relative error of the dense estimator is roughly `1.04 / sqrt(2^p)`:
//! about 1.6% at `p = 12` and 0.4% at `p = 16`, with near-exact results
//! below the sparse-to-dense threshold.
//!
//! # Merging
//!
//! Sketches built with the same precision merge losslessly: the result is
//! identical to the sketch that would have observed the union of both
//! streams. [`HyperLogLogPlus::merge`] accepts any [`Sketch`] trait object
//! and rejects unknown concrete kinds, so heterogeneous collections of
//! sketches can be folded without knowing their types up front.
//!
//! # Example
//!
//! ```
//! use cardinality_sketch::HyperLogLogPlus;
//!
//! let mut sketch = HyperLogLogPlus::new(14)?;
//! for word in ["to", "be", "or", "not", "to", "be"] {
//!     sketch.add(word.as_bytes());
//! }
//! assert_eq!(sketch.count(), 4);
//! # Ok::<(), cardinality_sketch::SketchError>(())
//! ```

mod bias;
mod compressed;
mod encoding;
mod error;
mod estimator;
mod sketch;

pub use error::SketchError;
pub use estimator::HyperLogLogPlus;
pub use sketch::Sketch;
