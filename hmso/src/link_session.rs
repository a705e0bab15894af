//! Whole-program link session: owns the lifetime of a single whole-program
//! link (C6-C10) by pairing the [`GlobalIndex`] built from this run's
//! object files with the [`BuildCache`] that survives across runs, so a
//! driver doesn't have to thread both through every call by hand.

use crate::build_cache::{needs_recompile, BuildCache, CacheEntry};
use crate::index::GlobalIndex;
use rustc_hash::FxHashMap;

/// Counters a caller can report after a link, mirroring §8 scenario 5
/// ("the second invocation records zero recompilations").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub invalidated: usize,
}

pub struct LinkSession {
    pub index: GlobalIndex,
    pub cache: BuildCache,
    pub stats: CacheStats,
}

impl LinkSession {
    pub fn new(units: &[(String, Vec<u8>)], entry_points: &[String], cache: BuildCache) -> Self {
        let index = GlobalIndex::build(units, entry_points);
        Self { index, cache, stats: CacheStats::default() }
    }

    /// A real transitive dependency closure (§9 open question: "the
    /// source's dependency-hash stub equals the file hash ... implementers
    /// must replace the stub"). This index has no notion of textual
    /// includes, so the closure it can see is the call graph: a unit
    /// depends on every unit that defines a function it calls, directly
    /// or transitively. That under-approximates a source-level include
    /// graph (a caller that never calls into a header-only dependency
    /// won't see it) but never over-approximates, which is the bound §4.10
    /// requires.
    ///
    /// The hash folds in each transitively-reached function's content
    /// hash, not just its name, so a callee's body changing (without a
    /// signature change) still invalidates every caller that reaches it.
    pub fn dependency_hash(&self, unit_index: usize) -> u64 {
        let mut callees: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for edge in &self.index.edges {
            callees.entry(edge.caller).or_default().push(edge.callee);
        }

        let roots: Vec<usize> =
            self.index.nodes.iter().enumerate().filter(|(_, n)| n.unit_index == unit_index).map(|(i, _)| i).collect();

        let mut seen: std::collections::HashSet<usize> = roots.iter().copied().collect();
        let mut frontier = roots;
        while let Some(node) = frontier.pop() {
            if let Some(direct) = callees.get(&node) {
                for &callee in direct {
                    if seen.insert(callee) {
                        frontier.push(callee);
                    }
                }
            }
        }

        let mut reached: Vec<usize> = seen.into_iter().collect();
        reached.sort_unstable();

        const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
        const PRIME: u64 = 0x100000001b3;
        let mut hash = OFFSET_BASIS;
        for node_index in reached {
            let content_hash = self.index.summaries[node_index].content_hash;
            for byte in content_hash.to_le_bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(PRIME);
            }
        }
        hash
    }

    /// Decides which of `sources` need recompiling against the cache,
    /// recording a cache entry update and a hit/miss/invalidation count
    /// for each (§4.10, §8 scenario 5). Returns the paths that must be
    /// recompiled, in input order.
    pub fn plan_recompiles(&mut self, sources: &[(String, u64, String, bool)]) -> Vec<String> {
        let mut to_recompile = Vec::new();
        for (unit_index, (path, source_hash, cached_object_path, object_exists)) in sources.iter().enumerate() {
            let dependency_hash = self.dependency_hash(unit_index);
            let stale = needs_recompile(&self.cache, path, *source_hash, dependency_hash, *object_exists);
            if stale {
                if self.cache.get(path).is_some() {
                    self.stats.invalidated += 1;
                } else {
                    self.stats.misses += 1;
                }
                to_recompile.push(path.clone());
                self.cache.insert(CacheEntry {
                    source_path: path.clone(),
                    source_hash: *source_hash,
                    dependency_hash,
                    timestamp: 0,
                    cached_object_path: cached_object_path.clone(),
                });
            } else {
                self.stats.hits += 1;
            }
        }
        to_recompile
    }
}
