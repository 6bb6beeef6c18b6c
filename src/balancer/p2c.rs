use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::BalancerError;

use super::hash::{Crc32, Fnv1a32, KeyHasher};

struct Inner {
    /// Insertion order; candidate indices address this list.
    addrs: Vec<String>,
    loads: HashMap<String, u64>,
    rng: StdRng,
}

impl Inner {
    fn load_mut(&mut self, addr: &str) -> Result<&mut u64, BalancerError> {
        self.loads
            .get_mut(addr)
            .ok_or_else(|| BalancerError::NodeNotExist(addr.to_owned()))
    }
}

/// Power-of-two-choices balancer over a dynamic node set.
///
/// ### Selection
/// [`get`](P2c::get) picks two candidate indices, by two independent key hashes
/// (sticky per key) or uniformly at random for an empty key, and returns the
/// candidate with the lower load (ties go to the first), incrementing its load.
///
/// Loads are plain counters the caller maintains through
/// [`incr_load`](P2c::incr_load), [`decr_load`](P2c::decr_load) and
/// [`update_load`](P2c::update_load).
///
/// # Example
/// ```
/// use flowkit::P2c;
///
/// let lb = P2c::with_seed(7);
/// lb.add_node("10.0.0.1:80", 0);
/// lb.add_node("10.0.0.2:80", 5);
///
/// let addr = lb.get("user-42").unwrap();
/// assert!(lb.nodes().contains(&addr));
/// lb.decr_load(&addr).unwrap();
/// ```
pub struct P2c {
    inner: Mutex<Inner>,
    h1: Box<dyn KeyHasher>,
    h2: Box<dyn KeyHasher>,
}

impl P2c {
    /// Creates an empty balancer with a time-seeded generator and the default hashers.
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64);
        Self::with_seed(seed)
    }

    /// Creates an empty balancer with a fixed generator seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_parts(seed, Crc32, Fnv1a32)
    }

    /// Creates an empty balancer with a fixed seed and custom key hashers.
    pub fn with_parts(seed: u64, h1: impl KeyHasher, h2: impl KeyHasher) -> Self {
        Self {
            inner: Mutex::new(Inner {
                addrs: Vec::new(),
                loads: HashMap::new(),
                rng: StdRng::seed_from_u64(seed),
            }),
            h1: Box::new(h1),
            h2: Box::new(h2),
        }
    }

    /// Adds `addr` with `load`. No-op if the node already exists.
    pub fn add_node(&self, addr: &str, load: u64) {
        let mut inner = self.inner.lock();
        if inner.loads.contains_key(addr) {
            return;
        }
        inner.loads.insert(addr.to_owned(), load);
        inner.addrs.push(addr.to_owned());
    }

    /// Removes `addr`, keeping the order of the remaining nodes. No-op if absent.
    pub fn delete_node(&self, addr: &str) {
        let mut inner = self.inner.lock();
        if inner.loads.remove(addr).is_none() {
            return;
        }
        if let Some(pos) = inner.addrs.iter().position(|a| a == addr) {
            inner.addrs.remove(pos);
        }
    }

    /// Picks a node for `key` and increments its load.
    ///
    /// Fails with [`BalancerError::NoNodes`] when the balancer is empty.
    pub fn get(&self, key: &str) -> Result<String, BalancerError> {
        let mut inner = self.inner.lock();
        let n = inner.addrs.len();
        if n == 0 {
            return Err(BalancerError::NoNodes);
        }

        let (i, j) = if key.is_empty() {
            (inner.rng.random_range(0..n), inner.rng.random_range(0..n))
        } else {
            let bytes = key.as_bytes();
            (
                self.h1.hash32(bytes) as usize % n,
                self.h2.hash32(bytes) as usize % n,
            )
        };

        let load_of = |idx: usize| inner.loads.get(&inner.addrs[idx]).copied().unwrap_or(0);
        let pick = if load_of(i) <= load_of(j) { i } else { j };

        let addr = inner.addrs[pick].clone();
        let load = inner.load_mut(&addr)?;
        *load = load.saturating_add(1);
        Ok(addr)
    }

    /// Increments the load of `addr`.
    pub fn incr_load(&self, addr: &str) -> Result<(), BalancerError> {
        let mut inner = self.inner.lock();
        let load = inner.load_mut(addr)?;
        *load = load.saturating_add(1);
        Ok(())
    }

    /// Decrements the load of `addr`, saturating at zero.
    pub fn decr_load(&self, addr: &str) -> Result<(), BalancerError> {
        let mut inner = self.inner.lock();
        let load = inner.load_mut(addr)?;
        *load = load.saturating_sub(1);
        Ok(())
    }

    /// Overwrites the load of `addr`.
    pub fn update_load(&self, addr: &str, load: u64) -> Result<(), BalancerError> {
        *self.inner.lock().load_mut(addr)? = load;
        Ok(())
    }

    /// Returns the load of `addr`.
    pub fn get_load(&self, addr: &str) -> Result<u64, BalancerError> {
        self.inner
            .lock()
            .loads
            .get(addr)
            .copied()
            .ok_or_else(|| BalancerError::NodeNotExist(addr.to_owned()))
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.inner.lock().addrs.len()
    }

    /// True when no node is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().addrs.is_empty()
    }

    /// Node addresses in insertion order.
    pub fn nodes(&self) -> Vec<String> {
        self.inner.lock().addrs.clone()
    }
}

impl Default for P2c {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for P2c {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("P2c")
            .field("nodes", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_empty_is_no_nodes() {
        let lb = P2c::with_seed(1);
        assert!(matches!(lb.get("k"), Err(BalancerError::NoNodes)));
        assert!(matches!(lb.get(""), Err(BalancerError::NoNodes)));
    }

    #[test]
    fn test_hashed_pair_prefers_lower_load_then_first() {
        // "hello": crc32 % 2 == 0, fnv1a32 % 2 == 1.
        let lb = P2c::with_seed(1);
        lb.add_node("a", 0);
        lb.add_node("b", 0);

        assert_eq!(lb.get("hello").unwrap(), "a");
        assert_eq!(lb.get_load("a").unwrap(), 1);
        assert_eq!(lb.get("hello").unwrap(), "b");
        assert_eq!(lb.get("hello").unwrap(), "a");
    }

    #[test]
    fn test_same_candidate_twice() {
        let lb = P2c::with_seed(1);
        lb.add_node("only", 9);
        assert_eq!(lb.get("any").unwrap(), "only");
        assert_eq!(lb.get("").unwrap(), "only");
        assert_eq!(lb.get_load("only").unwrap(), 11);
    }

    #[test]
    fn test_add_existing_keeps_load() {
        let lb = P2c::with_seed(1);
        lb.add_node("a", 3);
        lb.add_node("a", 100);
        assert_eq!(lb.len(), 1);
        assert_eq!(lb.get_load("a").unwrap(), 3);
    }

    #[test]
    fn test_load_ops() {
        let lb = P2c::with_seed(1);
        lb.add_node("a", 0);

        lb.decr_load("a").unwrap();
        assert_eq!(lb.get_load("a").unwrap(), 0);
        lb.incr_load("a").unwrap();
        lb.incr_load("a").unwrap();
        assert_eq!(lb.get_load("a").unwrap(), 2);
        lb.update_load("a", 40).unwrap();
        assert_eq!(lb.get_load("a").unwrap(), 40);
    }

    #[test]
    fn test_get_saturates_at_max_load() {
        let lb = P2c::with_seed(1);
        lb.add_node("a", u64::MAX);

        assert_eq!(lb.get("k").unwrap(), "a");
        assert_eq!(lb.get("").unwrap(), "a");
        assert_eq!(lb.get_load("a").unwrap(), u64::MAX);

        lb.incr_load("a").unwrap();
        assert_eq!(lb.get_load("a").unwrap(), u64::MAX);
    }

    #[test]
    fn test_unknown_node_errors() {
        let lb = P2c::with_seed(1);
        lb.add_node("a", 0);
        for res in [
            lb.incr_load("x"),
            lb.decr_load("x"),
            lb.update_load("x", 1),
            lb.get_load("x").map(|_| ()),
        ] {
            assert!(matches!(res, Err(BalancerError::NodeNotExist(ref n)) if n == "x"));
        }
    }

    #[test]
    fn test_delete_keeps_order() {
        let lb = P2c::with_seed(1);
        for a in ["a", "b", "c", "d"] {
            lb.add_node(a, 0);
        }
        lb.delete_node("b");
        lb.delete_node("missing");
        assert_eq!(lb.nodes(), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_seeded_random_picks_are_reproducible() {
        let picks = |seed| {
            let lb = P2c::with_seed(seed);
            for a in ["a", "b", "c", "d", "e"] {
                lb.add_node(a, 0);
            }
            (0..20).map(|_| lb.get("").unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(picks(42), picks(42));
    }

    #[test]
    fn test_empty_key_spreads_load() {
        let lb = P2c::with_seed(9);
        for a in ["a", "b", "c", "d"] {
            lb.add_node(a, 0);
        }
        for _ in 0..400 {
            lb.get("").unwrap();
        }
        for a in ["a", "b", "c", "d"] {
            let load = lb.get_load(a).unwrap();
            assert!((60..=140).contains(&load), "{a}: {load}");
        }
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add(u8, u64),
        Delete(u8),
        Get(String),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8, 0u64..16).prop_map(|(n, l)| Op::Add(n, l)),
            (0u8..8).prop_map(Op::Delete),
            "[a-z]{0,4}".prop_map(Op::Get),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn membership_matches_model(ops in prop::collection::vec(op_strategy(), 0..64)) {
            let lb = P2c::with_seed(3);
            let mut model: Vec<String> = Vec::new();

            for op in ops {
                match op {
                    Op::Add(n, load) => {
                        let addr = format!("n{n}");
                        lb.add_node(&addr, load);
                        if !model.contains(&addr) {
                            model.push(addr);
                        }
                    }
                    Op::Delete(n) => {
                        let addr = format!("n{n}");
                        lb.delete_node(&addr);
                        model.retain(|a| *a != addr);
                    }
                    Op::Get(key) => match lb.get(&key) {
                        Ok(addr) => prop_assert!(model.contains(&addr)),
                        Err(e) => {
                            prop_assert!(model.is_empty());
                            prop_assert!(matches!(e, BalancerError::NoNodes));
                        }
                    },
                }
                prop_assert_eq!(lb.nodes(), model.clone());
                prop_assert_eq!(lb.len(), model.len());
            }

            let live: HashSet<String> = model.into_iter().collect();
            for addr in &live {
                prop_assert!(lb.get_load(addr).is_ok());
            }
        }
    }
}
