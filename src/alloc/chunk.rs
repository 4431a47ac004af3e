//! C2: bump-allocating chunk arena for objects > 8 KiB.
//!
//! Tiered bump-allocation scheme: requests are carved from one of a small set of
//! fixed chunk sizes chosen by request size. Per Open Question #1 in `DESIGN.md`,
//! per-block free-list pooling is deliberately *not* carried over — this allocator only
//! offers bulk reset.

use std::sync::Mutex;

pub const SMALL_CHUNK_SIZE: usize = 1024 * 1024;
pub const MEDIUM_CHUNK_SIZE: usize = 16 * 1024 * 1024;
pub const LARGE_CHUNK_SIZE: usize = 64 * 1024 * 1024;

pub const SMALL_ALLOCATION_THRESHOLD: usize = 64 * 1024;
pub const MEDIUM_ALLOCATION_THRESHOLD: usize = 4 * 1024 * 1024;

pub const DEFAULT_ALIGNMENT: usize = 32;
pub const MAX_CHUNKS: usize = 64;
pub const MAX_TOTAL_MEMORY: usize = 4 * 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ChunkConfig {
    pub alignment: usize,
    pub max_chunks: usize,
    pub memory_limit: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        ChunkConfig {
            alignment: DEFAULT_ALIGNMENT,
            max_chunks: MAX_CHUNKS,
            memory_limit: MAX_TOTAL_MEMORY,
        }
    }
}

/// Picks the chunk tier a request of `size` bytes should be carved from.
pub fn select_chunk_size(size: usize) -> Option<usize> {
    if size <= SMALL_ALLOCATION_THRESHOLD {
        Some(SMALL_CHUNK_SIZE)
    } else if size <= MEDIUM_ALLOCATION_THRESHOLD {
        Some(MEDIUM_CHUNK_SIZE)
    } else if size <= LARGE_CHUNK_SIZE {
        Some(LARGE_CHUNK_SIZE)
    } else {
        None
    }
}

struct Chunk {
    data: Box<[u8]>,
    used: usize,
}

impl Chunk {
    fn new(size: usize) -> Self {
        Chunk {
            data: vec![0u8; size].into_boxed_slice(),
            used: 0,
        }
    }

    fn total_size(&self) -> usize {
        self.data.len()
    }

    fn can_allocate(&self, size: usize, alignment: usize) -> bool {
        let aligned = align_up(self.used, alignment);
        aligned.checked_add(size).is_some_and(|end| end <= self.data.len())
    }

    fn allocate(&mut self, size: usize, alignment: usize) -> Option<*mut u8> {
        let aligned = align_up(self.used, alignment);
        let end = aligned.checked_add(size)?;
        if end > self.data.len() {
            return None;
        }
        self.used = end;
        // SAFETY: `aligned + size <= data.len()`, checked above.
        Some(unsafe { self.data.as_mut_ptr().add(aligned) })
    }

    fn reset(&mut self) {
        self.used = 0;
    }
}

fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkStats {
    pub total_chunks: usize,
    pub total_bytes: usize,
    pub used_bytes: usize,
}

pub struct ChunkAllocator {
    chunks: Mutex<Vec<Chunk>>,
    config: ChunkConfig,
}

impl ChunkAllocator {
    pub fn new(config: ChunkConfig) -> Self {
        ChunkAllocator {
            chunks: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Allocates `size` bytes at `alignment`. Returns `None` if `size` exceeds the
    /// largest chunk tier or the process-wide memory limit would be exceeded.
    pub fn allocate(&self, size: usize, alignment: usize) -> Option<*mut u8> {
        let chunk_size = select_chunk_size(size)?;
        let mut chunks = self.chunks.lock().expect("chunk list mutex poisoned");

        for chunk in chunks.iter_mut() {
            if chunk.can_allocate(size, alignment) {
                return chunk.allocate(size, alignment);
            }
        }

        let total: usize = chunks.iter().map(Chunk::total_size).sum();
        if chunks.len() >= self.config.max_chunks || total + chunk_size > self.config.memory_limit {
            return None;
        }

        log::trace!("chunk allocator: creating new chunk of {chunk_size} bytes");
        let mut new_chunk = Chunk::new(chunk_size);
        let ptr = new_chunk.allocate(size, alignment);
        chunks.push(new_chunk);
        ptr
    }

    /// Resets every chunk's bump pointer to zero. Invalidates all outstanding
    /// pointers previously handed out by this allocator.
    pub fn reset(&self) {
        let mut chunks = self.chunks.lock().expect("chunk list mutex poisoned");
        for chunk in chunks.iter_mut() {
            chunk.reset();
        }
    }

    /// Drops chunks that currently hold zero live bytes.
    pub fn compact(&self) -> usize {
        let mut chunks = self.chunks.lock().expect("chunk list mutex poisoned");
        let before_bytes: usize = chunks.iter().map(Chunk::total_size).sum();
        chunks.retain(|c| c.used > 0);
        let after_bytes: usize = chunks.iter().map(Chunk::total_size).sum();
        let freed = before_bytes - after_bytes;
        if freed > 0 {
            log::debug!("chunk allocator: compact freed {freed} bytes");
        }
        freed
    }

    pub fn stats(&self) -> ChunkStats {
        let chunks = self.chunks.lock().expect("chunk list mutex poisoned");
        ChunkStats {
            total_chunks: chunks.len(),
            total_bytes: chunks.iter().map(Chunk::total_size).sum(),
            used_bytes: chunks.iter().map(|c| c.used).sum(),
        }
    }

    pub fn memory_limit(&self) -> usize {
        self.config.memory_limit
    }

    pub fn generate_report(&self) -> String {
        let stats = self.stats();
        format!(
            "chunk allocator: {} chunks, {}/{} bytes used",
            stats.total_chunks, stats.used_bytes, stats.total_bytes
        )
    }
}

impl Default for ChunkAllocator {
    fn default() -> Self {
        ChunkAllocator::new(ChunkConfig::default())
    }
}

// SAFETY: see the matching note on `SlabAllocator` — memory is owned by `Chunk`s held
// behind this allocator's mutex.
unsafe impl Send for ChunkAllocator {}
unsafe impl Sync for ChunkAllocator {}
