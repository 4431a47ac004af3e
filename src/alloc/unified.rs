//! C3: size-dispatched façade over the slab and chunk allocators.
//!
//! Grounded in `original_source/include/TinaXlsx/TXUnifiedMemoryManager.hpp`: allocate
//! routes by size (`<= 8192` to the slab allocator, else to the chunk allocator);
//! deallocate asks the slab allocator first, and if it disclaims ownership the pointer
//! belongs to a chunk arena and can only be reclaimed by resetting that arena — a
//! deliberate trade-off, not a bug.

use std::ptr::NonNull;

use super::chunk::{ChunkAllocator, ChunkConfig, ChunkStats};
use super::slab::{SlabAllocator, SlabConfig, SlabStats, SIZE_CLASSES};

pub const SLAB_CHUNK_THRESHOLD: usize = 8192;

#[derive(Debug, Clone)]
pub struct UnifiedConfig {
    pub slab: SlabConfig,
    pub chunk: ChunkConfig,
}

impl Default for UnifiedConfig {
    fn default() -> Self {
        UnifiedConfig {
            slab: SlabConfig::default(),
            chunk: ChunkConfig::default(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnifiedStats {
    pub slab: SlabStats,
    pub chunk: ChunkStats,
}

impl UnifiedStats {
    pub fn total_bytes(&self) -> usize {
        self.slab.bytes_reserved + self.chunk.total_bytes
    }
}

/// Size-dispatching allocator: `allocate` routes to the slab allocator for requests
/// `<= 8192` bytes and to the chunk allocator otherwise.
pub struct UnifiedAllocator {
    slab: SlabAllocator,
    chunk: ChunkAllocator,
}

impl UnifiedAllocator {
    pub fn new(config: UnifiedConfig) -> Self {
        UnifiedAllocator {
            slab: SlabAllocator::new(config.slab),
            chunk: ChunkAllocator::new(config.chunk),
        }
    }

    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if size <= SLAB_CHUNK_THRESHOLD {
            self.slab.allocate(size)
        } else {
            self.chunk
                .allocate(size, self.chunk_alignment())
                .and_then(NonNull::new)
        }
    }

    fn chunk_alignment(&self) -> usize {
        super::chunk::DEFAULT_ALIGNMENT
    }

    /// Attempts to free `ptr`. Slab-sized objects are freed immediately; large,
    /// chunk-backed objects cannot be freed individually and are leaked until the
    /// owning chunk arena is reset via [`UnifiedAllocator::clear`] — deliberate, not an
    /// omission.
    pub fn deallocate(&self, ptr: NonNull<u8>) -> bool {
        self.slab.deallocate(ptr.as_ptr())
    }

    pub fn compact_all(&self) -> usize {
        self.slab.compact() + self.chunk.compact()
    }

    pub fn smart_cleanup(&self) -> usize {
        self.slab.smart_compact()
    }

    /// Resets everything: drops all slabs and rewinds every chunk's bump pointer.
    pub fn clear(&self) {
        self.slab.clear();
        self.chunk.reset();
    }

    pub fn stats(&self) -> UnifiedStats {
        UnifiedStats {
            slab: self.slab.stats(),
            chunk: self.chunk.stats(),
        }
    }

    pub fn total_bytes_used(&self) -> usize {
        self.stats().total_bytes()
    }

    pub fn chunk_allocator(&self) -> &ChunkAllocator {
        &self.chunk
    }

    pub fn slab_allocator(&self) -> &SlabAllocator {
        &self.slab
    }

    pub fn generate_comprehensive_report(&self) -> String {
        format!(
            "{}\n{}",
            self.slab.generate_report(),
            self.chunk.generate_report()
        )
    }
}

impl Default for UnifiedAllocator {
    fn default() -> Self {
        UnifiedAllocator::new(UnifiedConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_8192_routes_to_slab_8193_routes_to_chunk() {
        let alloc = UnifiedAllocator::default();
        let small = alloc.allocate(*SIZE_CLASSES.last().unwrap()).unwrap();
        let large = alloc.allocate(*SIZE_CLASSES.last().unwrap() + 1).unwrap();

        // freeing the small pointer through the slab path should succeed...
        assert!(alloc.deallocate(small));
        // ...while the large, chunk-backed pointer cannot be freed individually.
        assert!(!alloc.deallocate(large));
    }

    #[test]
    fn clear_resets_both_backends() {
        let alloc = UnifiedAllocator::default();
        alloc.allocate(100);
        alloc.allocate(100_000);
        alloc.clear();
        assert_eq!(alloc.stats().slab.total_slabs, 0);
        assert_eq!(alloc.stats().chunk.used_bytes, 0);
    }
}
