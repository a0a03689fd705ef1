//! # Simulated Address Types and Table Geometry
//!
//! Strongly typed wrappers for the addresses a simulated multi-level page
//! table works with, plus the compile-time [`Geometry`] that decides how a
//! virtual address is cut into per-level table indices.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | An address in the translated (virtual) space. |
//! | [`PhysicalAddress`] | An address in the simulated backing memory. |
//! | [`PhysicalPage<G>`] | A page-aligned physical frame base for geometry `G`. |
//! | [`PageOffset<G>`] | The in-page offset for geometry `G`. |
//!
//! ## Address layout
//!
//! For a geometry with `LEVELS = 3` and `PAGE_OFFSET_BITS = 10`, every
//! table entry is an 8-byte word, so one 1 KiB page holds 128 entries and
//! each level consumes 7 bits:
//!
//! ```text
//! | 30‒24  | 23‒17  | 16‒10  | 9‒0    |
//! | level2 | level1 | level0 | Offset |
//! ```
//!
//! Level `LEVELS - 1` is the root-adjacent level; level `0` selects the
//! entry naming the data page.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use mlpt_addresses::*;
//! let va = VirtualAddress::new(0x0123_4567);
//! assert_eq!(va.page_offset::<ThreeLevel1K>().as_u64(), 0x167);
//! assert_eq!(va.level_index::<ThreeLevel1K>(0), 0x51);
//! assert!(va.is_in_bounds::<ThreeLevel1K>());
//! assert!(!VirtualAddress::new(1 << 31).is_in_bounds::<ThreeLevel1K>());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod geometry;
mod page_offset;
mod physical_address;
mod physical_page;
mod virtual_address;

pub use crate::geometry::{ENTRY_SHIFT, FourLevel4K, Geometry, OneLevel1K, ThreeLevel1K, TwoLevel4K};
pub use crate::page_offset::PageOffset;
pub use crate::physical_address::PhysicalAddress;
pub use crate::physical_page::PhysicalPage;
pub use crate::virtual_address::VirtualAddress;
