use cardinality_sketch::{HyperLogLogPlus, Sketch, SketchError};
use hashbrown::HashSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Exact reference counter implementing the same capability surface, used
/// to exercise merge's rejection of foreign sketch kinds.
struct NaiveSketch {
    values: HashSet<Vec<u8>>,
}

impl Sketch for NaiveSketch {
    fn add(&mut self, v: &[u8]) {
        self.values.insert(v.to_vec());
    }

    fn count(&mut self) -> u64 {
        self.values.len() as u64
    }

    fn merge(&mut self, _other: &dyn Sketch) -> Result<(), SketchError> {
        Err(SketchError::IncompatibleSketch(self.type_name()))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[test]
fn sparse_range_counts_closely() {
    let mut sketch = HyperLogLogPlus::new(14).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..10_000 {
        sketch.add(&rng.gen::<u64>().to_le_bytes());
    }
    assert!(sketch.is_sparse());
    let est = sketch.count() as i64;
    assert!((est - 10_000).abs() <= 50, "estimate {est} too far from 10000");
}

#[test]
fn dense_range_stays_within_error_bounds() {
    let mut sketch = HyperLogLogPlus::new(14).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let n = 100_000u64;
    for _ in 0..n {
        sketch.add(&rng.gen::<u64>().to_le_bytes());
    }
    assert!(!sketch.is_sparse());
    let est = sketch.count() as f64;
    let err = (est - n as f64).abs() / n as f64;
    // expected error at p = 14 is ~0.81%; allow five sigma
    assert!(err < 0.04, "relative error {err:.4} too large (estimate {est})");
}

#[test]
fn duplicates_do_not_inflate_the_estimate() {
    let mut sketch = HyperLogLogPlus::new(14).unwrap();
    for _ in 0..100 {
        for i in 0..500u64 {
            sketch.add(&i.to_le_bytes());
        }
    }
    let est = sketch.count() as i64;
    assert!((est - 500).abs() <= 5, "estimate {est} too far from 500");
}

#[test]
fn merge_of_disjoint_streams_counts_the_union() {
    let mut a = HyperLogLogPlus::new(14).unwrap();
    let mut b = HyperLogLogPlus::new(14).unwrap();
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..50_000 {
        a.add(&rng.gen::<u64>().to_le_bytes());
    }
    for _ in 0..50_000 {
        b.add(&rng.gen::<u64>().to_le_bytes());
    }

    a.merge(&b).unwrap();
    assert!(!a.is_sparse());

    let est = a.count() as f64;
    let err = (est - 100_000.0).abs() / 100_000.0;
    assert!(err < 0.04, "relative error {err:.4} too large (estimate {est})");
}

#[test]
fn merge_through_trait_objects() {
    let mut shards: Vec<Box<dyn Sketch>> = Vec::new();
    for shard in 0..4u64 {
        let mut sketch = HyperLogLogPlus::new(12).unwrap();
        for i in 0..200u64 {
            sketch.add(&(shard * 200 + i).to_le_bytes());
        }
        shards.push(Box::new(sketch));
    }

    let mut total = HyperLogLogPlus::new(12).unwrap();
    for shard in &shards {
        total.merge(shard.as_ref()).unwrap();
    }

    let est = total.count() as i64;
    assert!((est - 800).abs() <= 40, "estimate {est} too far from 800");
}

#[test]
fn merge_rejects_foreign_sketch_kinds() {
    let mut plus = HyperLogLogPlus::new(14).unwrap();
    let mut naive = NaiveSketch {
        values: HashSet::new(),
    };
    naive.add(b"value");

    let err = plus.merge(&naive).unwrap_err();
    match err {
        SketchError::IncompatibleSketch(name) => {
            assert!(name.contains("NaiveSketch"), "unexpected type name {name}")
        }
        other => panic!("expected IncompatibleSketch, got {other:?}"),
    }
}

#[test]
fn merged_sketch_matches_single_stream_sketch() {
    // merging two halves must equal the sketch that saw everything
    let mut left = HyperLogLogPlus::new(12).unwrap();
    let mut right = HyperLogLogPlus::new(12).unwrap();
    let mut whole = HyperLogLogPlus::new(12).unwrap();
    let mut rng = StdRng::seed_from_u64(31);
    for i in 0..20_000u64 {
        let v = rng.gen::<u64>().to_le_bytes();
        if i % 2 == 0 {
            left.add(&v);
        } else {
            right.add(&v);
        }
        whole.add(&v);
    }

    left.merge(&right).unwrap();
    whole.merge(&HyperLogLogPlus::new(12).unwrap()).unwrap();

    assert_eq!(left.count(), whole.count());
}
