pub mod allocator;
pub mod paging;

pub use allocator::{AllocError, Allocator, BlockHandle, BlockRecord, Policy, DEFAULT_SEGMENT_SIZE};
pub use paging::{Access, PageError, PageTable, PageTableEntry};

use thiserror::Error;

/// Combined error for hosts driving both simulators behind one surface.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("allocator failure: {0}")]
    Alloc(#[from] AllocError),

    #[error("paging failure: {0}")]
    Paging(#[from] PageError),
}
