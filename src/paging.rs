use std::collections::VecDeque;

use log::{debug, trace};
use thiserror::Error;

/// One virtual page. Built at construction for every page in the address
/// space and never destroyed; `backing_location` mirrors the page number
/// (the simulated disk slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry {
    pub present: bool,
    pub dirty: bool,
    pub page_number: usize,
    pub frame_number: Option<usize>,
    pub backing_location: usize,
}

/// Outcome of a page access, for display and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Hit,
    Fault { evicted: Option<usize> },
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("address beyond the configured virtual address space")]
    OutOfRange,
    #[error("vm size, frame size, and resident limit must all be nonzero")]
    InvalidConfig,
}

pub struct PageTable {
    frame_size: usize,
    max_resident: usize,
    entries: Vec<PageTableEntry>,
    // Pages in admission order; the front is the next eviction victim.
    // Length always equals the number of present entries.
    resident: VecDeque<usize>,
}

impl PageTable {
    pub fn new(
        vm_size: usize,
        max_resident_frames: usize,
        frame_size: usize,
    ) -> Result<Self, PageError> {
        if frame_size == 0 || max_resident_frames == 0 {
            return Err(PageError::InvalidConfig);
        }

        let page_count = vm_size / frame_size;
        if page_count == 0 {
            return Err(PageError::InvalidConfig);
        }

        let entries = (0..page_count)
            .map(|page| PageTableEntry {
                present: false,
                dirty: false,
                page_number: page,
                frame_number: None,
                backing_location: page,
            })
            .collect();

        Ok(Self {
            frame_size,
            max_resident: max_resident_frames,
            entries,
            resident: VecDeque::new(),
        })
    }

    pub fn page_count(&self) -> usize {
        self.entries.len()
    }

    /// Accesses a byte address, decomposed as page = address / frame_size.
    pub fn access(&mut self, address: usize, is_write: bool) -> Result<Access, PageError> {
        self.touch(address / self.frame_size, is_write)
    }

    /// Direct page addressing; the offset must fall within one frame.
    pub fn access_page(
        &mut self,
        page_number: usize,
        offset: usize,
        is_write: bool,
    ) -> Result<Access, PageError> {
        if offset >= self.frame_size {
            return Err(PageError::OutOfRange);
        }
        self.touch(page_number, is_write)
    }

    fn touch(&mut self, page: usize, is_write: bool) -> Result<Access, PageError> {
        if page >= self.entries.len() {
            return Err(PageError::OutOfRange);
        }

        if self.entries[page].present {
            // Strict FIFO: a hit never reorders the resident queue.
            if is_write {
                self.entries[page].dirty = true;
            }
            trace!("hit on page {page}");
            return Ok(Access::Hit);
        }

        let (frame, evicted) = if self.resident.len() < self.max_resident {
            // Warm-up: frames are handed out in admission order 0, 1, 2, ...
            (self.resident.len(), None)
        } else {
            // The front of the queue is the longest-resident page. A present
            // entry always carries a frame, so the unwraps hold.
            let victim = self.resident.pop_front().unwrap();
            let entry = &mut self.entries[victim];
            let frame = entry.frame_number.take().unwrap();
            entry.present = false;
            entry.dirty = false;
            debug!("evicted page {victim} from frame {frame}");
            (frame, Some(victim))
        };

        let entry = &mut self.entries[page];
        entry.present = true;
        entry.dirty = is_write;
        entry.frame_number = Some(frame);
        self.resident.push_back(page);
        debug!("fault on page {page}, loaded into frame {frame}");

        Ok(Access::Fault { evicted })
    }

    /// Resident pages in FIFO order, front (next victim) first.
    pub fn resident(&self) -> impl Iterator<Item = usize> + '_ {
        self.resident.iter().copied()
    }

    /// The full page table, in page order, for display.
    pub fn snapshot(&self) -> Vec<PageTableEntry> {
        self.entries.clone()
    }
}
