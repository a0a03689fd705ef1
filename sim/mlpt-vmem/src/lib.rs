//! # Multi-Level Page Table Simulation
//!
//! A software-walked page table in the shape an MMU expects: a root table,
//! zero or more intermediate tables and leaf-level tables whose entries name
//! data pages. Nothing here touches real paging hardware; frames come from a
//! pluggable [`FrameAlloc`] and tables are read through a [`PhysMapper`].
//!
//! ## What you get
//! - An [`AddressSpace`] with the three operations of the walker:
//!   [`translate`](AddressSpace::translate),
//!   [`allocate`](AddressSpace::allocate) and
//!   [`deallocate`](AddressSpace::deallocate).
//! - A [`PageTableEntry`] / [`PageTable`] pair sized by a compile-time
//!   [`Geometry`](addresses::Geometry).
//! - A simulated physical memory, [`FrameArena`], with frame accounting and
//!   an optional frame limit.
//!
//! ## Walk
//!
//! ```text
//!  root (level L-1) → … → level 1 table → level 0 table → data page
//!        │                     │                │
//!        └─ index(L-1)         └─ index(1)      └─ index(0)   + page offset
//! ```
//!
//! Tables below the root are created lazily by `allocate` and reclaimed by
//! `deallocate` as soon as they hold no valid entry. The root is created by
//! the first `allocate` and lives as long as the address space.
//!
//! ## Example
//!
//! ```rust
//! use mlpt_vmem::addresses::{ThreeLevel1K, VirtualAddress};
//! use mlpt_vmem::{AddressSpace, FrameArena, NOT_MAPPED};
//!
//! let mut aspace = AddressSpace::<ThreeLevel1K, _>::new(FrameArena::new());
//! let va = VirtualAddress::new(0x0001_2345);
//!
//! assert_eq!(aspace.translate_raw(va.as_u64()), NOT_MAPPED);
//! aspace.allocate(va).expect("allocate");
//!
//! let pa = aspace.translate(va).expect("mapped");
//! assert_eq!(pa.as_u64() & 0x3FF, va.as_u64() & 0x3FF);
//!
//! assert!(aspace.deallocate(va));
//! assert_eq!(aspace.translate(va), None);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod address_space;
mod frame_arena;
mod page_table;

extern crate alloc;

pub use crate::address_space::{
    AddressSpace, AllocateError, Allocation, FrameRole, NOT_MAPPED, Walk, WalkStep,
};
pub use crate::frame_arena::FrameArena;
pub use crate::page_table::{EntryBits, PageTable, PageTableEntry, TableIndex};

/// Re-export of the address and geometry types.
pub use mlpt_addresses as addresses;

use mlpt_addresses::{Geometry, PhysicalPage};

/// Source of page-sized, page-aligned frames for tables and data pages.
///
/// The implementation decides where frames come from. Returned frames
/// **must** be zeroed (every entry reads as invalid when viewed as a table)
/// and must never be the page containing `u64::MAX`, so that
/// [`NOT_MAPPED`] can never be a real translation.
pub trait FrameAlloc<G: Geometry> {
    /// Allocate one frame. Returns `None` on out-of-memory.
    fn alloc_frame(&mut self) -> Option<PhysicalPage<G>>;

    /// Give a frame back. Freeing a frame that is not live is a no-op.
    fn free_frame(&mut self, page: PhysicalPage<G>);
}

/// Gives access to the frame behind a physical page, viewed as a table.
///
/// Returns `None` for pages that are not live frames.
pub trait PhysMapper<G: Geometry> {
    fn table(&self, page: PhysicalPage<G>) -> Option<&PageTable<G>>;

    fn table_mut(&mut self, page: PhysicalPage<G>) -> Option<&mut PageTable<G>>;
}

/// Backing memory of an [`AddressSpace`]: hands out frames and maps them.
///
/// Implemented for every type that is both a [`FrameAlloc`] and a
/// [`PhysMapper`].
pub trait PhysMemory<G: Geometry>: FrameAlloc<G> + PhysMapper<G> {}

impl<G: Geometry, T: FrameAlloc<G> + PhysMapper<G>> PhysMemory<G> for T {}
