//! Scope-indexed bump arenas (§4.11): a direct-index table for the common
//! case of small, densely-numbered scope ids, with a hash-map fallback
//! for anything sparse.

use rustc_hash::FxHashMap;

const DIRECT_TABLE_SIZE: usize = 2048;
const CHUNK_SIZE: usize = 64 * 1024;

struct Arena {
    chunks: Vec<Box<[u8]>>,
    bump: usize,
}

impl Arena {
    fn new() -> Self {
        Arena { chunks: Vec::new(), bump: 0 }
    }

    fn alloc(&mut self, size: usize, align: usize) -> *mut u8 {
        let align = align.max(1);
        if self.chunks.is_empty() {
            self.chunks.push(vec![0u8; CHUNK_SIZE.max(size)].into_boxed_slice());
            self.bump = 0;
        }
        let chunk = self.chunks.last_mut().unwrap();
        let base = chunk.as_mut_ptr() as usize;
        let aligned = (base + self.bump).next_multiple_of(align) - base;
        if aligned + size > chunk.len() {
            let new_len = CHUNK_SIZE.max(size);
            self.chunks.push(vec![0u8; new_len].into_boxed_slice());
            self.bump = size;
            return self.chunks.last_mut().unwrap().as_mut_ptr();
        }
        self.bump = aligned + size;
        unsafe { chunk.as_mut_ptr().add(aligned) }
    }

    fn reset(&mut self) {
        self.chunks.clear();
        self.bump = 0;
    }
}

pub struct ArenaTable {
    direct: Vec<Option<Arena>>,
    fallback: FxHashMap<u32, Arena>,
}

impl ArenaTable {
    pub fn new() -> Self {
        ArenaTable { direct: (0..DIRECT_TABLE_SIZE).map(|_| None).collect(), fallback: FxHashMap::default() }
    }

    fn arena_mut(&mut self, scope_id: u32) -> &mut Arena {
        let idx = scope_id as usize;
        if idx < DIRECT_TABLE_SIZE {
            self.direct[idx].get_or_insert_with(Arena::new)
        } else {
            self.fallback.entry(scope_id).or_insert_with(Arena::new)
        }
    }

    pub fn alloc(&mut self, scope_id: u32, size: u64, align: u64) -> *mut u8 {
        self.arena_mut(scope_id).alloc(size as usize, align as usize)
    }

    /// Releases the entire region for `scope_id` at once (§4.11).
    pub fn reset(&mut self, scope_id: u32) {
        let idx = scope_id as usize;
        if idx < DIRECT_TABLE_SIZE {
            if let Some(arena) = self.direct[idx].as_mut() {
                arena.reset();
            }
        } else if let Some(arena) = self.fallback.get_mut(&scope_id) {
            arena.reset();
        }
    }
}

impl Default for ArenaTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_in_the_same_scope_do_not_overlap() {
        let mut table = ArenaTable::new();
        let a = table.alloc(1, 32, 8) as usize;
        let b = table.alloc(1, 32, 8) as usize;
        assert_ne!(a, b);
        assert!(b >= a + 32);
    }

    #[test]
    fn reset_allows_the_scope_to_be_reused() {
        let mut table = ArenaTable::new();
        table.alloc(5, 16, 8);
        table.reset(5);
        let ptr = table.alloc(5, 16, 8);
        assert!(!ptr.is_null());
    }

    #[test]
    fn scope_ids_past_the_direct_table_use_the_fallback() {
        let mut table = ArenaTable::new();
        let ptr = table.alloc(5000, 16, 8);
        assert!(!ptr.is_null());
    }
}
