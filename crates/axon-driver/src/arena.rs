//! Best-fit arena allocator for the device memory window.
//!
//! The AX100's 256 MiB SRAM window is carved up by the host; the device
//! never allocates. Blocks live in a table sorted by offset that exactly
//! tiles the window at all times; allocation may split one block into a
//! used prefix and a free remainder, freeing coalesces with both
//! neighbours, so no two adjacent blocks are ever both free.
//!
//! The allocator deals in *offsets* into the window, never raw pointers.
//! Host access to a buffer goes through the mapped window's bounds-checked
//! byte copies, and the device address for an offset is a fixed affine
//! translation established at context creation.

use crate::error::{AxonError, Result};
use axon_chip::mem::MEM_ALIGN;

/// One entry in the block table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    /// Byte offset from the start of the arena
    offset: u64,
    /// Size in bytes
    size: u64,
    /// Whether the block is allocated
    used: bool,
}

/// A free remainder smaller than this is left attached to the allocation
/// instead of becoming its own block; it could never satisfy an aligned
/// request and would only grow the table.
const MIN_SPLIT_REMAINDER: u64 = std::mem::size_of::<Block>() as u64 + MEM_ALIGN;

/// Best-fit allocator over a fixed byte range.
///
/// Single-threaded by design; callers needing concurrency must serialize
/// externally (the driver holds one arena per device context).
#[derive(Debug)]
pub struct Arena {
    /// Total size of the managed range
    size: u64,
    /// Device-side address of offset 0
    device_base: u64,
    /// Block table, sorted by offset, tiling `[0, size)` exactly
    blocks: Vec<Block>,
}

impl Arena {
    /// Create an arena over `size` bytes whose offset 0 corresponds to
    /// `device_base` in the accelerator's address space.
    pub fn new(size: u64, device_base: u64) -> Self {
        Self {
            size,
            device_base,
            blocks: vec![Block {
                offset: 0,
                size,
                used: false,
            }],
        }
    }

    /// Total size of the managed range in bytes.
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Allocate `size` bytes, 64-byte aligned.
    ///
    /// Selects the smallest free block that fits (best-fit); ties resolve
    /// to the lowest offset. Returns the offset of the allocation.
    ///
    /// # Errors
    ///
    /// Returns `AxonError::NoMemory` if `size` is zero, exceeds the arena,
    /// or no free block is large enough.
    pub fn alloc(&mut self, size: u64) -> Result<u64> {
        if size == 0 || size > self.size {
            return Err(AxonError::no_memory(size, self.available()));
        }

        let rounded = align_up(size);

        // Best-fit scan. Strict `<` keeps the first of equal-smallest
        // candidates, so the choice is deterministic in offset order.
        let mut best: Option<usize> = None;
        for (i, block) in self.blocks.iter().enumerate() {
            if !block.used && block.size >= rounded {
                match best {
                    Some(b) if self.blocks[b].size <= block.size => {}
                    _ => best = Some(i),
                }
            }
        }

        let Some(i) = best else {
            tracing::debug!(requested = rounded, available = self.available(), "arena exhausted");
            return Err(AxonError::no_memory(rounded, self.available()));
        };

        // Split off the remainder when it is worth tracking.
        if self.blocks[i].size > rounded + MIN_SPLIT_REMAINDER {
            let remainder = Block {
                offset: self.blocks[i].offset + rounded,
                size: self.blocks[i].size - rounded,
                used: false,
            };
            self.blocks[i].size = rounded;
            self.blocks.insert(i + 1, remainder);
        }

        self.blocks[i].used = true;
        tracing::trace!(offset = self.blocks[i].offset, size = self.blocks[i].size, "arena alloc");
        Ok(self.blocks[i].offset)
    }

    /// Free the block starting at `offset`.
    ///
    /// A no-op if `offset` does not name an allocated block; freeing an
    /// invalid or already-freed offset must never corrupt the table. After
    /// freeing, the block is merged with free neighbours on both sides.
    pub fn free(&mut self, offset: u64) {
        let Some(i) = self.blocks.iter().position(|b| b.offset == offset) else {
            tracing::debug!(offset, "free of unknown offset ignored");
            return;
        };
        if !self.blocks[i].used {
            tracing::debug!(offset, "double free ignored");
            return;
        }

        self.blocks[i].used = false;

        // Merge forward while the next block is free.
        while i + 1 < self.blocks.len() && !self.blocks[i + 1].used {
            self.blocks[i].size += self.blocks[i + 1].size;
            self.blocks.remove(i + 1);
        }

        // Merge backward into a free predecessor.
        if i > 0 && !self.blocks[i - 1].used {
            self.blocks[i - 1].size += self.blocks[i].size;
            self.blocks.remove(i);
        }

        tracing::trace!(offset, "arena free");
    }

    /// Sum of the sizes of all free blocks.
    pub fn available(&self) -> u64 {
        self.blocks.iter().filter(|b| !b.used).map(|b| b.size).sum()
    }

    /// Translate an arena offset to the accelerator's address space.
    ///
    /// Returns `None` for offsets outside the managed range; the mapping
    /// itself is the fixed affine `device_base + offset`.
    pub fn to_device(&self, offset: u64) -> Option<u64> {
        if offset >= self.size {
            return None;
        }
        Some(self.device_base + offset)
    }
}

/// Round `size` up to the device alignment boundary.
const fn align_up(size: u64) -> u64 {
    (size + MEM_ALIGN - 1) & !(MEM_ALIGN - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_chip::mem::ARENA_DEVICE_BASE;
    use proptest::prelude::*;

    const TEST_SIZE: u64 = 1024 * 1024;

    fn arena() -> Arena {
        Arena::new(TEST_SIZE, ARENA_DEVICE_BASE)
    }

    /// The block table must tile the arena exactly, in offset order, with
    /// no two adjacent free blocks.
    fn assert_invariants(a: &Arena) {
        let mut expected_offset = 0;
        let mut prev_free = false;
        for b in &a.blocks {
            assert_eq!(b.offset, expected_offset, "gap or overlap in block table");
            assert!(b.size > 0, "zero-sized block");
            assert!(!(prev_free && !b.used), "two adjacent free blocks");
            prev_free = !b.used;
            expected_offset += b.size;
        }
        assert_eq!(expected_offset, a.size, "table does not cover the arena");
    }

    #[test]
    fn alloc_is_aligned() {
        let mut a = arena();
        let x = a.alloc(1).unwrap();
        let y = a.alloc(100).unwrap();
        let z = a.alloc(4096).unwrap();
        assert_eq!(x % MEM_ALIGN, 0);
        assert_eq!(y % MEM_ALIGN, 0);
        assert_eq!(z % MEM_ALIGN, 0);
        assert_invariants(&a);
    }

    #[test]
    fn alloc_free_conserves_available() {
        let mut a = arena();
        let before = a.available();
        assert_eq!(before, TEST_SIZE);

        let x = a.alloc(1024).unwrap();
        assert!(a.available() < before);
        a.free(x);
        assert_eq!(a.available(), before);
        assert_invariants(&a);
    }

    #[test]
    fn best_fit_picks_smallest_sufficient_block() {
        let mut a = arena();

        // Carve free holes of 256, 1024 and 512 bytes separated by live
        // allocations, then check a 500-byte request lands in the 512 hole.
        let h256 = a.alloc(256).unwrap();
        let _k1 = a.alloc(64).unwrap();
        let h1024 = a.alloc(1024).unwrap();
        let _k2 = a.alloc(64).unwrap();
        let h512 = a.alloc(512).unwrap();
        let _k3 = a.alloc(64).unwrap();
        a.free(h256);
        a.free(h1024);
        a.free(h512);

        let got = a.alloc(500).unwrap();
        assert_eq!(got, h512);
        assert_invariants(&a);
    }

    #[test]
    fn zero_and_oversized_requests_fail() {
        let mut a = arena();
        assert!(matches!(a.alloc(0), Err(AxonError::NoMemory { .. })));
        assert!(matches!(a.alloc(TEST_SIZE + 1), Err(AxonError::NoMemory { .. })));
        // The whole arena is still intact afterwards.
        assert_eq!(a.available(), TEST_SIZE);
    }

    #[test]
    fn invalid_free_is_a_no_op() {
        let mut a = arena();
        let x = a.alloc(1024).unwrap();

        a.free(0xDEAD_BEEF); // never allocated
        a.free(x);
        a.free(x); // double free
        assert_eq!(a.available(), TEST_SIZE);
        assert_invariants(&a);
    }

    #[test]
    fn coalescing_rebuilds_large_blocks() {
        let mut a = arena();
        let mut ptrs = Vec::new();
        for _ in 0..5 {
            ptrs.push(a.alloc(256).unwrap());
        }

        // Free alternating blocks, then their separators: everything must
        // merge back into one free run that can satisfy a larger request.
        a.free(ptrs[1]);
        a.free(ptrs[3]);
        a.free(ptrs[2]);
        assert_invariants(&a);

        let big = a.alloc(256 * 3).unwrap();
        assert_eq!(big, ptrs[1]);
        assert_invariants(&a);
    }

    #[test]
    fn device_translation_bounds() {
        let a = arena();
        assert_eq!(a.to_device(0), Some(ARENA_DEVICE_BASE));
        assert_eq!(a.to_device(TEST_SIZE - 1), Some(ARENA_DEVICE_BASE + TEST_SIZE - 1));
        assert_eq!(a.to_device(TEST_SIZE), None);
        assert_eq!(a.to_device(0xDEAD_BEEF_DEAD), None);
    }

    proptest! {
        /// Random alloc/free interleavings never break the tiling,
        /// coalescing, or conservation invariants.
        #[test]
        fn random_sequences_preserve_invariants(
            ops in prop::collection::vec((any::<bool>(), 1u64..16 * 1024), 1..128)
        ) {
            let mut a = arena();
            let mut live: Vec<u64> = Vec::new();

            for (is_alloc, n) in ops {
                if is_alloc || live.is_empty() {
                    if let Ok(off) = a.alloc(n) {
                        prop_assert_eq!(off % MEM_ALIGN, 0);
                        live.push(off);
                    }
                } else {
                    let victim = live.swap_remove((n as usize) % live.len());
                    a.free(victim);
                }
                assert_invariants(&a);
            }

            for off in live {
                a.free(off);
            }
            assert_invariants(&a);
            prop_assert_eq!(a.available(), TEST_SIZE);
        }
    }
}
