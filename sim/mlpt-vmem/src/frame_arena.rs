//! Simulated physical memory.
//!
//! Frame `n` (counting from zero) lives at physical address
//! `(n + 1) * G::PAGE_SIZE`; physical page 0 is never handed out. Freed
//! frames go onto a LIFO free list and come back zeroed.

use crate::page_table::PageTable;
use crate::{FrameAlloc, PhysMapper};
use alloc::vec::Vec;
use log::{trace, warn};
use mlpt_addresses::{Geometry, PhysicalPage};

/// In-process backing store for an address space.
pub struct FrameArena<G: Geometry> {
    /// Slot `n` holds frame number `n + 1`; `None` while the slot is free.
    frames: Vec<Option<PageTable<G>>>,
    /// Free slots, most recently freed last.
    free: Vec<usize>,
    /// Maximum number of live frames, if bounded.
    limit: Option<usize>,
    live: usize,
    allocations: u64,
}

impl<G: Geometry> FrameArena<G> {
    /// An unbounded arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames: Vec::new(),
            free: Vec::new(),
            limit: None,
            live: 0,
            allocations: 0,
        }
    }

    /// An arena that refuses to hold more than `limit` live frames.
    #[must_use]
    pub const fn with_frame_limit(limit: usize) -> Self {
        let mut arena = Self::new();
        arena.limit = Some(limit);
        arena
    }

    /// Change (or remove) the live frame limit.
    ///
    /// Lowering the limit below [`live_frames`](Self::live_frames) does not
    /// free anything; it only makes further allocations fail.
    pub const fn set_frame_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    /// Number of frames currently handed out.
    #[must_use]
    pub const fn live_frames(&self) -> usize {
        self.live
    }

    /// Number of successful allocations over the arena's lifetime.
    #[must_use]
    pub const fn total_allocations(&self) -> u64 {
        self.allocations
    }

    /// Whether `page` is a frame currently handed out.
    #[must_use]
    pub fn is_live(&self, page: PhysicalPage<G>) -> bool {
        self.slot_of(page)
            .and_then(|slot| self.frames.get(slot))
            .is_some_and(Option::is_some)
    }

    fn slot_of(&self, page: PhysicalPage<G>) -> Option<usize> {
        let slot = usize::try_from(page.number().checked_sub(1)?).ok()?;
        (slot < self.frames.len()).then_some(slot)
    }

    fn page_of(slot: usize) -> Option<PhysicalPage<G>> {
        let number = u64::try_from(slot).ok()?.checked_add(1)?;
        let page = PhysicalPage::from_number(number)?;
        // The page holding the all-ones address is reserved for the sentinel.
        (page.last_address().as_u64() != u64::MAX).then_some(page)
    }
}

impl<G: Geometry> Default for FrameArena<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Geometry> FrameAlloc<G> for FrameArena<G> {
    fn alloc_frame(&mut self) -> Option<PhysicalPage<G>> {
        if let Some(limit) = self.limit.filter(|&limit| self.live >= limit) {
            warn!("frame limit of {limit} reached ({} live)", self.live);
            return None;
        }

        let (slot, page) = if let Some(slot) = self.free.pop() {
            // Free slots were handed out before, so their page is valid.
            (slot, Self::page_of(slot)?)
        } else {
            let slot = self.frames.len();
            let page = Self::page_of(slot)?;
            self.frames.push(None);
            (slot, page)
        };

        self.frames[slot] = Some(PageTable::zeroed());
        self.live += 1;
        self.allocations += 1;
        trace!("frame {page} allocated ({} live)", self.live);
        Some(page)
    }

    fn free_frame(&mut self, page: PhysicalPage<G>) {
        let Some(slot) = self.slot_of(page) else {
            warn!("free of unknown frame {page}");
            return;
        };
        if self.frames[slot].take().is_none() {
            warn!("double free of frame {page}");
            return;
        }
        self.free.push(slot);
        self.live -= 1;
        trace!("frame {page} freed ({} live)", self.live);
    }
}

impl<G: Geometry> PhysMapper<G> for FrameArena<G> {
    fn table(&self, page: PhysicalPage<G>) -> Option<&PageTable<G>> {
        self.frames.get(self.slot_of(page)?)?.as_ref()
    }

    fn table_mut(&mut self, page: PhysicalPage<G>) -> Option<&mut PageTable<G>> {
        let slot = self.slot_of(page)?;
        self.frames.get_mut(slot)?.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_table::{PageTableEntry, TableIndex};
    use mlpt_addresses::ThreeLevel1K;

    type Arena = FrameArena<ThreeLevel1K>;

    #[test]
    fn hands_out_distinct_aligned_frames() {
        let mut arena = Arena::new();
        let a = arena.alloc_frame().unwrap();
        let b = arena.alloc_frame().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.base().as_u64(), 0x400);
        assert_eq!(b.base().as_u64(), 0x800);
        assert_eq!(a.base().as_u64() % ThreeLevel1K::PAGE_SIZE, 0);
        assert_eq!(arena.live_frames(), 2);
    }

    #[test]
    fn frames_come_back_zeroed() {
        let mut arena = Arena::new();
        let a = arena.alloc_frame().unwrap();
        let i = TableIndex::new(9).unwrap();
        arena
            .table_mut(a)
            .unwrap()
            .set(i, PageTableEntry::link(a));
        arena.free_frame(a);
        assert!(!arena.is_live(a));
        assert!(arena.table(a).is_none());

        let again = arena.alloc_frame().unwrap();
        assert_eq!(again, a, "free list is LIFO");
        assert!(arena.table(again).unwrap().is_empty());
        assert_eq!(arena.total_allocations(), 2);
    }

    #[test]
    fn limit_bounds_live_frames() {
        let mut arena = Arena::with_frame_limit(1);
        let a = arena.alloc_frame().unwrap();
        assert!(arena.alloc_frame().is_none());
        arena.free_frame(a);
        assert!(arena.alloc_frame().is_some());

        arena.set_frame_limit(None);
        assert!(arena.alloc_frame().is_some());
    }

    #[test]
    fn lowering_the_limit_keeps_live_frames() {
        let mut arena = Arena::new();
        let a = arena.alloc_frame().unwrap();
        let b = arena.alloc_frame().unwrap();
        let c = arena.alloc_frame().unwrap();

        arena.set_frame_limit(Some(1));
        assert!(arena.alloc_frame().is_none());
        assert_eq!(arena.live_frames(), 3);
        assert!(arena.is_live(a) && arena.is_live(b) && arena.is_live(c));

        arena.free_frame(b);
        arena.free_frame(c);
        assert!(arena.alloc_frame().is_none(), "still at the limit");
        arena.free_frame(a);
        assert_eq!(arena.alloc_frame(), Some(a));
    }

    #[test]
    fn double_and_unknown_frees_are_ignored() {
        let mut arena = Arena::new();
        let a = arena.alloc_frame().unwrap();
        arena.free_frame(a);
        arena.free_frame(a);
        arena.free_frame(PhysicalPage::from_number(0).unwrap());
        arena.free_frame(PhysicalPage::from_number(99).unwrap());
        assert_eq!(arena.live_frames(), 0);
    }
}
