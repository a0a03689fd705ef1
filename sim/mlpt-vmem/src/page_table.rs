//! # Page Table Entries and Tables
//!
//! - [`EntryBits`]: the raw 64-bit entry layout.
//! - [`PageTableEntry`]: a typed entry; either invalid (all zero) or a link to
//!   a page-aligned frame.
//! - [`TableIndex`]: an index that is in range for tables of geometry `G`.
//! - [`PageTable`]: exactly `G::ENTRIES_PER_TABLE` entries, i.e. one page.
//!
//! ## Semantics
//!
//! Every level uses the same entry format. Whether a link names the next
//! table or the mapped data page depends only on the level it is read at:
//! level `0` entries name data pages, all others name tables.

use alloc::boxed::Box;
use alloc::vec;
use bitfield_struct::bitfield;
use core::marker::PhantomData;
use mlpt_addresses::{Geometry, PhysicalAddress, PhysicalPage, VirtualAddress};

/// Raw layout of a single 64-bit page table entry.
///
/// | Bits  | Name    | Meaning |
/// |-------|---------|---------|
/// | 0     | `valid` | Entry links to a frame if set |
/// | 1..=63| `upper` | Frame address bits `[63:1]` |
///
/// A frame address is page-aligned, so bits `1..PAGE_OFFSET_BITS` of the
/// stored address are always zero; only the page-aligned part carries
/// information.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct EntryBits {
    /// Valid (bit 0).
    pub valid: bool,

    /// Frame address bits `[63:1]`.
    #[bits(63)]
    upper: u64,
}

/// A single page table entry (PTE).
///
/// An invalid entry is always all-zero; there is no "invalid but carrying an
/// address" state.
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct PageTableEntry(EntryBits);

/// Index into a table of geometry `G`; always `< G::ENTRIES_PER_TABLE`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex<G: Geometry> {
    value: usize,
    _geometry: PhantomData<G>,
}

/// One table: a page-sized array of entries.
///
/// Root, intermediate and leaf-level tables all share this shape.
pub struct PageTable<G: Geometry> {
    entries: Box<[PageTableEntry]>,
    _geometry: PhantomData<G>,
}

impl PageTableEntry {
    /// Create a zero (invalid) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(EntryBits::new())
    }

    /// Create a valid entry linking to `page`.
    #[inline]
    #[must_use]
    pub const fn link<G: Geometry>(page: PhysicalPage<G>) -> Self {
        Self(
            EntryBits::new()
                .with_valid(true)
                .with_upper(page.base().as_u64() >> 1),
        )
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0.valid()
    }

    /// The linked frame, if the entry is valid.
    #[inline]
    #[must_use]
    pub const fn page<G: Geometry>(self) -> Option<PhysicalPage<G>> {
        if !self.is_valid() {
            return None;
        }
        Some(PhysicalPage::from_addr(PhysicalAddress::new(
            self.0.upper() << 1,
        )))
    }

    /// Expose the underlying bitfield.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> EntryBits {
        self.0
    }

    /// Return the raw 64-bit value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0.into_bits()
    }

    /// Construct from a raw 64-bit value. No validation is performed.
    #[inline]
    #[must_use]
    pub const fn from_raw(v: u64) -> Self {
        Self(EntryBits::from_bits(v))
    }
}

impl core::fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_valid() {
            write!(f, "PTE(0x{:016X} | V)", self.raw() & !1)
        } else {
            f.write_str("PTE(-)")
        }
    }
}

impl<G: Geometry> TableIndex<G> {
    /// The index `va` selects at `level`.
    #[inline]
    #[must_use]
    pub const fn of(va: VirtualAddress, level: usize) -> Self {
        Self {
            value: va.level_index::<G>(level),
            _geometry: PhantomData,
        }
    }

    /// Construct from a raw value; `None` if out of range.
    #[inline]
    #[must_use]
    pub const fn new(value: usize) -> Option<Self> {
        if value >= G::ENTRIES_PER_TABLE {
            return None;
        }
        Some(Self {
            value,
            _geometry: PhantomData,
        })
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.value
    }
}

impl<G: Geometry> core::fmt::Debug for TableIndex<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "TableIndex({})", self.value)
    }
}

impl<G: Geometry> PageTable<G> {
    /// Create a fully zeroed table (all entries invalid).
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            entries: vec![PageTableEntry::zero(); G::ENTRIES_PER_TABLE].into_boxed_slice(),
            _geometry: PhantomData,
        }
    }

    /// Read the entry at `i`.
    #[inline]
    #[must_use]
    pub fn get(&self, i: TableIndex<G>) -> PageTableEntry {
        self.entries[i.as_usize()]
    }

    /// Write the entry at `i`.
    #[inline]
    pub fn set(&mut self, i: TableIndex<G>, e: PageTableEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Invalidate the entry at `i`.
    #[inline]
    pub fn clear(&mut self, i: TableIndex<G>) {
        self.set(i, PageTableEntry::zero());
    }

    /// `true` if no entry is valid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.entries.iter().any(|e| e.is_valid())
    }

    /// Valid entries with their index.
    pub fn valid_entries(&self) -> impl Iterator<Item = (usize, PageTableEntry)> + '_ {
        self.entries
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, e)| e.is_valid())
    }

    /// Number of entries (always `G::ENTRIES_PER_TABLE`).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<G: Geometry> Default for PageTable<G> {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlpt_addresses::{FourLevel4K, ThreeLevel1K};

    #[test]
    fn zero_entry_is_invalid_and_zero() {
        let e = PageTableEntry::zero();
        assert!(!e.is_valid());
        assert_eq!(e.raw(), 0);
        assert!(e.page::<ThreeLevel1K>().is_none());
    }

    #[test]
    fn link_sets_valid_bit_and_address() {
        let page = PhysicalPage::<ThreeLevel1K>::from_number(0x2A).unwrap();
        let e = PageTableEntry::link(page);
        assert!(e.is_valid());
        assert_eq!(e.raw(), (0x2A << 10) | 1);
        assert_eq!(e.page::<ThreeLevel1K>(), Some(page));
    }

    #[test]
    fn link_round_trips_high_addresses() {
        let page = PhysicalPage::<FourLevel4K>::from_number(u64::MAX >> 12).unwrap();
        let e = PageTableEntry::link(page);
        assert_eq!(e.page::<FourLevel4K>(), Some(page));
        assert_eq!(e.raw(), (u64::MAX & !0xFFF) | 1);
    }

    #[test]
    fn raw_words_decode_through_the_bitfield() {
        let page = PhysicalPage::<ThreeLevel1K>::from_number(0x15).unwrap();
        let e = PageTableEntry::from_raw(0x5401);
        assert_eq!(e, PageTableEntry::link(page));
        assert!(e.bits().valid());
        assert_eq!(PageTableEntry::from_raw(e.raw()), e);

        let cleared = PageTableEntry::from_raw(0);
        assert!(!cleared.bits().valid());
        assert_eq!(cleared, PageTableEntry::zero());
    }

    #[test]
    fn table_fills_one_page() {
        let t = PageTable::<ThreeLevel1K>::zeroed();
        assert_eq!(t.len(), 128);
        assert_eq!(
            (t.len() * core::mem::size_of::<PageTableEntry>()) as u64,
            ThreeLevel1K::PAGE_SIZE
        );
        assert!(t.is_empty());
    }

    #[test]
    fn set_and_clear_track_emptiness() {
        let mut t = PageTable::<ThreeLevel1K>::zeroed();
        let i = TableIndex::new(127).unwrap();
        let page = PhysicalPage::<ThreeLevel1K>::from_number(3).unwrap();

        t.set(i, PageTableEntry::link(page));
        assert!(!t.is_empty());
        assert_eq!(t.valid_entries().count(), 1);
        assert_eq!(t.get(i).page::<ThreeLevel1K>(), Some(page));

        t.clear(i);
        assert!(t.is_empty());
        assert_eq!(t.get(i).raw(), 0);
    }

    #[test]
    fn table_index_rejects_out_of_range() {
        assert!(TableIndex::<ThreeLevel1K>::new(128).is_none());
        assert_eq!(TableIndex::<ThreeLevel1K>::new(5).map(TableIndex::as_usize), Some(5));
        let i = TableIndex::<ThreeLevel1K>::of(VirtualAddress::new(0x7F << 24), 2);
        assert_eq!(i.as_usize(), 0x7F);
    }
}
