use log::{debug, trace};
use thiserror::Error;

pub const DEFAULT_SEGMENT_SIZE: usize = 4096;

/// Rule selecting which free block satisfies a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    FirstFit,
    BestFit,
    WorstFit,
}

/// Names an allocated block: arena index plus the block's offset within it.
/// The only external alias to a block; stays valid until released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    pub arena: usize,
    pub offset: usize,
}

/// One row of an arena snapshot, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    pub free: bool,
    pub offset: usize,
    pub size: usize,
}

#[derive(Debug, Error)]
pub enum AllocError {
    #[error("handle does not name a currently allocated block")]
    InvalidHandle,
    #[error("request for {0} bytes cannot be satisfied")]
    Unsatisfiable(usize),
    #[error("zero-size allocations are rejected")]
    ZeroSize,
    #[error("segment size must be nonzero")]
    InvalidConfig,
}

struct Block {
    free: bool,
    offset: usize,
    size: usize,
}

// Blocks are lightweight records into one persistently owned buffer. They
// exactly partition it: contiguous in offset order, sizes summing to the
// capacity. Splitting and coalescing only rewrite records; the backing
// bytes are never reallocated or moved.
struct Arena {
    storage: Box<[u8]>,
    blocks: Vec<Block>,
}

impl Arena {
    fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            blocks: vec![Block {
                free: true,
                offset: 0,
                size: capacity,
            }],
        }
    }

    fn used_block(&self, offset: usize) -> Option<usize> {
        self.blocks
            .iter()
            .position(|b| b.offset == offset && !b.free)
    }
}

pub struct Allocator {
    segment_size: usize,
    max_arenas: Option<usize>,
    arenas: Vec<Arena>,
}

impl Allocator {
    pub fn new(segment_size: usize) -> Result<Self, AllocError> {
        Self::build(segment_size, None)
    }

    /// Caps arena growth at `max_arenas`, simulating memory exhaustion:
    /// requests that would grow past the cap fail with `Unsatisfiable`.
    pub fn with_arena_limit(segment_size: usize, max_arenas: usize) -> Result<Self, AllocError> {
        Self::build(segment_size, Some(max_arenas))
    }

    fn build(segment_size: usize, max_arenas: Option<usize>) -> Result<Self, AllocError> {
        if segment_size == 0 || max_arenas == Some(0) {
            return Err(AllocError::InvalidConfig);
        }

        Ok(Self {
            segment_size,
            max_arenas,
            arenas: vec![Arena::new(segment_size)],
        })
    }

    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    pub fn allocate(&mut self, size: usize, policy: Policy) -> Result<BlockHandle, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        if let Some((arena_idx, block_idx)) = self.find_free(size, policy) {
            let arena = &mut self.arenas[arena_idx];
            let block = &mut arena.blocks[block_idx];
            let offset = block.offset;
            let spare = block.size - size;

            block.free = false;
            block.size = size;

            // Split: the remainder becomes a new free block immediately
            // after the claimed one.
            if spare > 0 {
                arena.blocks.insert(
                    block_idx + 1,
                    Block {
                        free: true,
                        offset: offset + size,
                        size: spare,
                    },
                );
            }

            trace!("placed {size} bytes at arena {arena_idx} offset {offset} ({policy:?})");
            return Ok(BlockHandle {
                arena: arena_idx,
                offset,
            });
        }

        // No free block anywhere fits; grow by one arena.
        self.grow(size)
    }

    // Search order is arena creation order, then offset order within each
    // arena. FirstFit returns on the first fitting block; BestFit and
    // WorstFit scan everything, with strict comparisons so the earliest
    // candidate wins ties.
    fn find_free(&self, size: usize, policy: Policy) -> Option<(usize, usize)> {
        let mut chosen: Option<(usize, usize, usize)> = None;

        for (arena_idx, arena) in self.arenas.iter().enumerate() {
            for (block_idx, block) in arena.blocks.iter().enumerate() {
                if !block.free || block.size < size {
                    continue;
                }

                match policy {
                    Policy::FirstFit => return Some((arena_idx, block_idx)),
                    Policy::BestFit => {
                        if chosen.map_or(true, |(_, _, best)| block.size < best) {
                            chosen = Some((arena_idx, block_idx, block.size));
                        }
                    }
                    Policy::WorstFit => {
                        if chosen.map_or(true, |(_, _, worst)| block.size > worst) {
                            chosen = Some((arena_idx, block_idx, block.size));
                        }
                    }
                }
            }
        }

        chosen.map(|(arena_idx, block_idx, _)| (arena_idx, block_idx))
    }

    // Requests up to the segment size get a fresh standard arena with the
    // claimed block at its start; oversized requests get a dedicated arena
    // of exactly the requested size.
    fn grow(&mut self, size: usize) -> Result<BlockHandle, AllocError> {
        if let Some(limit) = self.max_arenas {
            if self.arenas.len() >= limit {
                return Err(AllocError::Unsatisfiable(size));
            }
        }

        let capacity = self.segment_size.max(size);
        let mut arena = Arena::new(capacity);
        arena.blocks[0].free = false;
        arena.blocks[0].size = size;
        if capacity > size {
            arena.blocks.push(Block {
                free: true,
                offset: size,
                size: capacity - size,
            });
        }

        self.arenas.push(arena);
        debug!(
            "grew to {} arenas ({capacity} bytes) for a {size}-byte request",
            self.arenas.len()
        );

        Ok(BlockHandle {
            arena: self.arenas.len() - 1,
            offset: 0,
        })
    }

    /// Frees the block and coalesces it with free neighbors. A handle that
    /// names no currently-used block (double release included) fails with
    /// `InvalidHandle` and mutates nothing.
    pub fn release(&mut self, handle: BlockHandle) -> Result<(), AllocError> {
        let arena = self
            .arenas
            .get_mut(handle.arena)
            .ok_or(AllocError::InvalidHandle)?;
        let idx = arena
            .used_block(handle.offset)
            .ok_or(AllocError::InvalidHandle)?;

        arena.blocks[idx].free = true;

        // Absorb the following block if free, then let a free predecessor
        // absorb this one. Only the records change; the merged record
        // covers exactly the union of the two ranges.
        if idx + 1 < arena.blocks.len() && arena.blocks[idx + 1].free {
            let next = arena.blocks.remove(idx + 1);
            arena.blocks[idx].size += next.size;
            trace!(
                "coalesced forward at arena {} offset {}",
                handle.arena,
                handle.offset
            );
        }
        if idx > 0 && arena.blocks[idx - 1].free {
            let merged = arena.blocks.remove(idx);
            arena.blocks[idx - 1].size += merged.size;
            trace!(
                "coalesced backward at arena {} offset {}",
                handle.arena,
                handle.offset
            );
        }

        Ok(())
    }

    /// Bytes of a live allocated block.
    pub fn data(&self, handle: BlockHandle) -> Result<&[u8], AllocError> {
        let arena = self
            .arenas
            .get(handle.arena)
            .ok_or(AllocError::InvalidHandle)?;
        let idx = arena
            .used_block(handle.offset)
            .ok_or(AllocError::InvalidHandle)?;
        let block = &arena.blocks[idx];

        Ok(&arena.storage[block.offset..block.offset + block.size])
    }

    pub fn data_mut(&mut self, handle: BlockHandle) -> Result<&mut [u8], AllocError> {
        let arena = self
            .arenas
            .get_mut(handle.arena)
            .ok_or(AllocError::InvalidHandle)?;
        let idx = arena
            .used_block(handle.offset)
            .ok_or(AllocError::InvalidHandle)?;
        let (offset, size) = (arena.blocks[idx].offset, arena.blocks[idx].size);

        Ok(&mut arena.storage[offset..offset + size])
    }

    /// Ordered block records per arena, for display.
    pub fn snapshot(&self) -> Vec<Vec<BlockRecord>> {
        self.arenas
            .iter()
            .map(|arena| {
                arena
                    .blocks
                    .iter()
                    .map(|b| BlockRecord {
                        free: b.free,
                        offset: b.offset,
                        size: b.size,
                    })
                    .collect()
            })
            .collect()
    }
}
