//! Type-hashed slab allocator (§4.11): each slab pre-carves a chunk of 64
//! equally-sized objects and serves them LIFO from a per-slab free list.

use rustc_hash::FxHashMap;

const DIRECT_TABLE_SIZE: usize = 32;
const OBJECTS_PER_CHUNK: usize = 64;

struct Slab {
    object_size: usize,
    chunks: Vec<Box<[u8]>>,
    free: Vec<*mut u8>,
}

impl Slab {
    fn new(object_size: usize) -> Self {
        Slab { object_size: object_size.max(1), chunks: Vec::new(), free: Vec::new() }
    }

    fn carve_chunk(&mut self) {
        let chunk_bytes = self.object_size * OBJECTS_PER_CHUNK;
        let mut chunk = vec![0u8; chunk_bytes].into_boxed_slice();
        for i in 0..OBJECTS_PER_CHUNK {
            unsafe { self.free.push(chunk.as_mut_ptr().add(i * self.object_size)) };
        }
        self.chunks.push(chunk);
    }

    fn alloc(&mut self) -> *mut u8 {
        if self.free.is_empty() {
            self.carve_chunk();
        }
        self.free.pop().unwrap()
    }

    fn free_ptr(&mut self, ptr: *mut u8) {
        self.free.push(ptr);
    }
}

// Raw pointers into `chunks`, which this type owns exclusively; never
// shared across threads per the single-threaded contract (§4.11).
unsafe impl Send for Slab {}

pub struct SlabTable {
    direct: Vec<Option<Slab>>,
    fallback: FxHashMap<u32, Slab>,
}

impl SlabTable {
    pub fn new() -> Self {
        SlabTable { direct: (0..DIRECT_TABLE_SIZE).map(|_| None).collect(), fallback: FxHashMap::default() }
    }

    fn slab_mut(&mut self, type_hash: u32, size: u64) -> &mut Slab {
        let idx = type_hash as usize;
        if idx < DIRECT_TABLE_SIZE {
            self.direct[idx].get_or_insert_with(|| Slab::new(size as usize))
        } else {
            self.fallback.entry(type_hash).or_insert_with(|| Slab::new(size as usize))
        }
    }

    pub fn alloc(&mut self, type_hash: u32, size: u64) -> *mut u8 {
        self.slab_mut(type_hash, size).alloc()
    }

    pub fn free(&mut self, type_hash: u32, ptr: *mut u8) {
        let idx = type_hash as usize;
        if idx < DIRECT_TABLE_SIZE {
            if let Some(slab) = self.direct[idx].as_mut() {
                slab.free_ptr(ptr);
            }
        } else if let Some(slab) = self.fallback.get_mut(&type_hash) {
            slab.free_ptr(ptr);
        }
    }
}

impl Default for SlabTable {
    fn default() -> Self {
        Self::new()
    }
}
