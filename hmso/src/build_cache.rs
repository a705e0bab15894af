//! Build cache (§4.10): a separate on-disk index (`FCXC`, distinct from
//! the `FCXO` object-file format) mapping source paths to cached object
//! files, plus the recompilation and dirty-chunk-propagation logic that
//! consults it.

use crate::error::{HmsoError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rustc_hash::FxHashMap;
use std::io::{Read, Write};
use tracing::debug;

pub const CACHE_MAGIC: u32 = 0x4658_4343; // "FCXC" (reversed-endian spelling of the tag)

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_path: String,
    pub source_hash: u64,
    pub dependency_hash: u64,
    pub timestamp: u64,
    pub cached_object_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildCache {
    entries: FxHashMap<String, CacheEntry>,
}

impl BuildCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source_path: &str) -> Option<&CacheEntry> {
        self.entries.get(source_path)
    }

    pub fn insert(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.source_path.clone(), entry);
    }

    pub fn write(&self, w: &mut impl Write) -> Result<()> {
        w.write_u32::<LittleEndian>(CACHE_MAGIC)?;
        w.write_u32::<LittleEndian>(self.entries.len() as u32)?;
        let mut paths: Vec<&String> = self.entries.keys().collect();
        paths.sort();
        for path in paths {
            let entry = &self.entries[path];
            write_string(w, &entry.source_path)?;
            w.write_u64::<LittleEndian>(entry.source_hash)?;
            w.write_u64::<LittleEndian>(entry.dependency_hash)?;
            w.write_u64::<LittleEndian>(entry.timestamp)?;
            write_string(w, &entry.cached_object_path)?;
        }
        Ok(())
    }

    pub fn read(r: &mut impl Read) -> Result<Self> {
        let magic = r.read_u32::<LittleEndian>()?;
        if magic != CACHE_MAGIC {
            return Err(HmsoError::CorruptCache("bad build-cache magic"));
        }
        let count = r.read_u32::<LittleEndian>()?;
        let mut entries = FxHashMap::default();
        for _ in 0..count {
            let source_path = read_string(r)?;
            let source_hash = r.read_u64::<LittleEndian>()?;
            let dependency_hash = r.read_u64::<LittleEndian>()?;
            let timestamp = r.read_u64::<LittleEndian>()?;
            let cached_object_path = read_string(r)?;
            entries.insert(
                source_path.clone(),
                CacheEntry { source_path, source_hash, dependency_hash, timestamp, cached_object_path },
            );
        }
        Ok(Self { entries })
    }
}

fn write_string(w: &mut impl Write, s: &str) -> Result<()> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string(r: &mut impl Read) -> Result<String> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(|_| HmsoError::Truncated("cache string bytes"))?;
    String::from_utf8(buf).map_err(|_| HmsoError::CorruptCache("non-utf8 cache string"))
}

/// A unit needs recompiling when the cache has no entry for it, the
/// source changed, the dependency hash changed, or the cached object no
/// longer exists on disk (§4.10, §8 scenario 5).
pub fn needs_recompile(
    cache: &BuildCache,
    source_path: &str,
    source_hash: u64,
    dependency_hash: u64,
    object_exists: bool,
) -> bool {
    match cache.get(source_path) {
        None => true,
        Some(entry) => {
            entry.source_hash != source_hash || entry.dependency_hash != dependency_hash || !object_exists
        }
    }
}

/// Marks every chunk containing a function from `changed_functions` dirty,
/// then expands transitively along caller edges so anything that calls a
/// changed function is re-optimized too (§4.10).
pub fn dirty_chunks(
    index: &crate::index::GlobalIndex,
    chunks: &[crate::partitioner::OptimizationChunk],
    changed_functions: &[String],
) -> Vec<usize> {
    let mut changed_nodes: Vec<usize> =
        changed_functions.iter().filter_map(|name| index.node_index_by_name(name)).collect();

    let mut callers: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for edge in &index.edges {
        callers.entry(edge.callee).or_default().push(edge.caller);
    }

    let mut seen: std::collections::HashSet<usize> = changed_nodes.iter().copied().collect();
    let mut frontier = changed_nodes.clone();
    while let Some(node) = frontier.pop() {
        if let Some(node_callers) = callers.get(&node) {
            for &caller in node_callers {
                if seen.insert(caller) {
                    frontier.push(caller);
                    changed_nodes.push(caller);
                }
            }
        }
    }

    let mut dirty: Vec<usize> = chunks
        .iter()
        .filter(|chunk| chunk.function_nodes.iter().any(|n| seen.contains(n)))
        .map(|chunk| chunk.id)
        .collect();
    dirty.sort_unstable();
    dirty.dedup();
    debug!(dirty_chunks = dirty.len(), total_chunks = chunks.len(), "computed dirty chunk set");
    dirty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_unit_does_not_need_recompiling() {
        let mut cache = BuildCache::new();
        cache.insert(CacheEntry {
            source_path: "a.fcx".to_string(),
            source_hash: 42,
            dependency_hash: 7,
            timestamp: 100,
            cached_object_path: "a.fcx.o".to_string(),
        });
        assert!(!needs_recompile(&cache, "a.fcx", 42, 7, true));
    }

    #[test]
    fn changed_source_hash_forces_recompile() {
        let mut cache = BuildCache::new();
        cache.insert(CacheEntry {
            source_path: "a.fcx".to_string(),
            source_hash: 42,
            dependency_hash: 7,
            timestamp: 100,
            cached_object_path: "a.fcx.o".to_string(),
        });
        assert!(needs_recompile(&cache, "a.fcx", 43, 7, true));
    }

    #[test]
    fn missing_cached_object_forces_recompile() {
        let mut cache = BuildCache::new();
        cache.insert(CacheEntry {
            source_path: "a.fcx".to_string(),
            source_hash: 42,
            dependency_hash: 7,
            timestamp: 100,
            cached_object_path: "a.fcx.o".to_string(),
        });
        assert!(needs_recompile(&cache, "a.fcx", 42, 7, false));
    }

    #[test]
    fn cache_round_trips_through_bytes() {
        let mut cache = BuildCache::new();
        cache.insert(CacheEntry {
            source_path: "a.fcx".to_string(),
            source_hash: 1,
            dependency_hash: 2,
            timestamp: 3,
            cached_object_path: "a.fcx.o".to_string(),
        });
        let mut bytes = Vec::new();
        cache.write(&mut bytes).unwrap();
        let read_back = BuildCache::read(&mut std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(read_back, cache);
    }

    proptest::proptest! {
        /// Build-cache index write -> read -> write produces byte-identical
        /// output (§8 "round-trip and idempotence laws").
        #[test]
        fn cache_index_write_then_read_then_write_is_byte_identical(
            source_path in "[a-z][a-z0-9_./]{0,20}",
            source_hash in proptest::prelude::any::<u64>(),
            dependency_hash in proptest::prelude::any::<u64>(),
            timestamp in proptest::prelude::any::<u64>(),
            cached_object_path in "[a-z][a-z0-9_./]{0,20}",
        ) {
            let mut cache = BuildCache::new();
            cache.insert(CacheEntry { source_path, source_hash, dependency_hash, timestamp, cached_object_path });

            let mut first_bytes = Vec::new();
            cache.write(&mut first_bytes).unwrap();
            let read_back = BuildCache::read(&mut std::io::Cursor::new(first_bytes.clone())).unwrap();

            let mut second_bytes = Vec::new();
            read_back.write(&mut second_bytes).unwrap();

            proptest::prop_assert_eq!(first_bytes, second_bytes);
        }
    }
}
