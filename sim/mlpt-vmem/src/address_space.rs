//! # Address Space
//!
//! One simulated address space: a root handle plus the backing memory the
//! tables and data pages live in.
//!
//! ## Highlights
//!
//! - [`AddressSpace::translate`] walks root to leaf without mutating anything.
//! - [`AddressSpace::allocate`] creates missing tables and the data page;
//!   an existing mapping is left alone.
//! - [`AddressSpace::deallocate`] removes one mapping and reclaims every
//!   table below the root that became empty, bottom-up.
//! - [`AddressSpace::walk`] and [`AddressSpace::root`] expose the structure
//!   for inspection.
//!
//! ## Partial failure
//!
//! `allocate` does not roll back. If the backing memory runs out midway, the
//! tables created so far stay linked (without a data page at the end). They
//! hold a valid entry each, so `deallocate` never reclaims them; a later
//! `allocate` of the same address reuses them and finishes the chain.

mod walk;

pub use crate::address_space::walk::{Walk, WalkStep};
use crate::page_table::{PageTable, PageTableEntry, TableIndex};
use crate::PhysMemory;
use alloc::vec::Vec;
use core::fmt;
use log::{debug, trace, warn};
use mlpt_addresses::{Geometry, PhysicalAddress, PhysicalPage, VirtualAddress};

/// Value of [`AddressSpace::translate_raw`] for an address without mapping.
pub const NOT_MAPPED: u64 = u64::MAX;

/// Handle to a single simulated address space.
pub struct AddressSpace<G: Geometry, M: PhysMemory<G>> {
    root: Option<PhysicalPage<G>>,
    memory: M,
}

/// Successful outcome of [`AddressSpace::allocate`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Allocation<G: Geometry> {
    /// A new data page was installed.
    Created(PhysicalPage<G>),
    /// The virtual page was mapped already; nothing changed.
    AlreadyMapped(PhysicalPage<G>),
}

/// What a frame was requested for when the backing memory ran out.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameRole {
    /// The root table.
    RootTable,
    /// A table below the root, at the given level.
    Table { level: usize },
    /// The data page at the end of the walk.
    DataPage,
}

/// Error returned by [`AddressSpace::allocate`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocateError {
    #[error("virtual address {0} lies outside the translated range")]
    InvalidAddress(VirtualAddress),
    #[error("out of memory ({0})")]
    OutOfMemory(FrameRole),
    #[error("level {level} table at {page} is not a live frame")]
    DanglingLink { level: usize, page: PhysicalAddress },
}

impl<G: Geometry> Allocation<G> {
    /// The data page backing the virtual page.
    #[must_use]
    pub const fn page(self) -> PhysicalPage<G> {
        match self {
            Self::Created(page) | Self::AlreadyMapped(page) => page,
        }
    }

    #[must_use]
    pub const fn is_created(self) -> bool {
        matches!(self, Self::Created(_))
    }
}

impl fmt::Display for FrameRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootTable => f.write_str("root table"),
            Self::Table { level } => write!(f, "level {level} table"),
            Self::DataPage => f.write_str("data page"),
        }
    }
}

impl<G: Geometry, M: PhysMemory<G>> AddressSpace<G, M> {
    /// An empty address space over `memory`. No frame is allocated until the
    /// first [`allocate`](Self::allocate).
    #[must_use]
    pub fn new(memory: M) -> Self {
        let () = G::VALID;
        Self { root: None, memory }
    }

    /// The root table, if one was created.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> Option<PhysicalPage<G>> {
        self.root
    }

    /// The backing memory.
    #[inline]
    #[must_use]
    pub const fn memory(&self) -> &M {
        &self.memory
    }

    /// The backing memory, mutably.
    ///
    /// Freeing or rewriting frames the address space links to breaks its
    /// invariants; use this for knobs such as frame limits.
    #[inline]
    pub const fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Borrow the table in `page`.
    #[inline]
    #[must_use]
    pub fn table(&self, page: PhysicalPage<G>) -> Option<&PageTable<G>> {
        self.memory.table(page)
    }

    /// Translate `va` to the physical address it is mapped to.
    ///
    /// The returned address carries the page offset of `va`. Returns `None`
    /// if there is no root, `va` is out of bounds, or any entry on the way is
    /// invalid.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        if !va.is_in_bounds::<G>() {
            return None;
        }

        let mut table_page = self.root?;
        for level in (0..G::LEVELS).rev() {
            let Some(table) = self.memory.table(table_page) else {
                warn!("level {level} table {table_page} is not a live frame");
                return None;
            };
            let next = table.get(TableIndex::of(va, level)).page::<G>()?;
            if level == 0 {
                return Some(next.join(va.page_offset::<G>()));
            }
            table_page = next;
        }
        None
    }

    /// Like [`translate`](Self::translate) on raw words: the physical
    /// address, or [`NOT_MAPPED`].
    #[must_use]
    pub fn translate_raw(&self, va: u64) -> u64 {
        self.translate(VirtualAddress::new(va))
            .map_or(NOT_MAPPED, PhysicalAddress::as_u64)
    }

    /// Make sure the virtual page containing `va` is backed by a data page.
    ///
    /// Creates the root, any missing table and the data page. If the page is
    /// mapped already, nothing is allocated and the existing page is kept.
    ///
    /// # Errors
    /// - [`AllocateError::InvalidAddress`] if `va` is out of bounds; nothing
    ///   is touched.
    /// - [`AllocateError::OutOfMemory`] if a frame cannot be allocated. Tables
    ///   created before the failure stay in place.
    /// - [`AllocateError::DanglingLink`] if an entry names a frame the backing
    ///   memory does not know.
    pub fn allocate(&mut self, va: VirtualAddress) -> Result<Allocation<G>, AllocateError> {
        if !va.is_in_bounds::<G>() {
            debug!("allocate {va}: out of bounds");
            return Err(AllocateError::InvalidAddress(va));
        }

        let mut table_page = self.ensure_root()?;
        for level in (1..G::LEVELS).rev() {
            table_page = self.ensure_table(table_page, va, level)?;
        }

        let index = TableIndex::of(va, 0);
        if let Some(page) = self.table_at(table_page, 0)?.get(index).page::<G>() {
            debug!("allocate {va}: already mapped to {page}");
            return Ok(Allocation::AlreadyMapped(page));
        }

        let page = self.alloc(FrameRole::DataPage)?;
        self.table_at_mut(table_page, 0)?
            .set(index, PageTableEntry::link(page));
        debug!("allocate {va}: mapped to {page}");
        Ok(Allocation::Created(page))
    }

    /// Remove the mapping for the virtual page containing `va`.
    ///
    /// Returns `false` without changing anything if there is no such
    /// mapping. Otherwise clears the leaf entry, frees the data page, and
    /// frees each table below the root that is left without a valid entry,
    /// walking upwards until the first table that still has one.
    pub fn deallocate(&mut self, va: VirtualAddress) -> bool {
        if !va.is_in_bounds::<G>() {
            return false;
        }
        let Some(root) = self.root else {
            return false;
        };

        // path[level] is the table visited at `level` and the index used in it.
        let mut path: Vec<(PhysicalPage<G>, TableIndex<G>)> = Vec::with_capacity(G::LEVELS);
        let mut table_page = root;
        let mut data_page = None;
        for level in (0..G::LEVELS).rev() {
            let index = TableIndex::of(va, level);
            let Some(table) = self.memory.table(table_page) else {
                warn!("deallocate {va}: level {level} table {table_page} is not a live frame");
                return false;
            };
            let Some(next) = table.get(index).page::<G>() else {
                debug!("deallocate {va}: not mapped");
                return false;
            };
            path.push((table_page, index));
            if level == 0 {
                data_page = Some(next);
            } else {
                table_page = next;
            }
        }
        path.reverse();

        let (leaf_table, leaf_index) = path[0];
        if let Some(table) = self.memory.table_mut(leaf_table) {
            table.clear(leaf_index);
        }
        if let Some(page) = data_page {
            self.memory.free_frame(page);
            debug!("deallocate {va}: released {page}");
        }

        for (level, pair) in path.windows(2).enumerate() {
            let (child, _) = pair[0];
            let (parent, parent_index) = pair[1];
            if !self.memory.table(child).is_some_and(PageTable::is_empty) {
                break;
            }
            self.memory.free_frame(child);
            if let Some(table) = self.memory.table_mut(parent) {
                table.clear(parent_index);
            }
            trace!("deallocate {va}: reclaimed level {level} table {child}");
        }
        true
    }

    /// Record the entries a translation of `va` reads, root first.
    ///
    /// The walk stops after the first invalid entry, or after the leaf.
    #[must_use]
    pub fn walk(&self, va: VirtualAddress) -> Walk<G> {
        let mut steps = Vec::with_capacity(G::LEVELS);
        let mut current = if va.is_in_bounds::<G>() {
            self.root
        } else {
            None
        };

        for level in (0..G::LEVELS).rev() {
            let Some(table_page) = current else {
                break;
            };
            let Some(table) = self.memory.table(table_page) else {
                break;
            };
            let index = TableIndex::of(va, level);
            let entry = table.get(index);
            steps.push(WalkStep {
                level,
                table: table_page,
                index,
                entry,
            });
            current = entry.page::<G>();
        }

        Walk::new(va, steps)
    }

    /// Number of virtual pages currently mapped.
    #[must_use]
    pub fn mapped_pages(&self) -> usize {
        self.root
            .map_or(0, |root| self.count_leaves(root, G::LEVELS - 1))
    }

    fn count_leaves(&self, page: PhysicalPage<G>, level: usize) -> usize {
        let Some(table) = self.memory.table(page) else {
            return 0;
        };
        if level == 0 {
            return table.valid_entries().count();
        }
        table
            .valid_entries()
            .filter_map(|(_, e)| e.page::<G>())
            .map(|child| self.count_leaves(child, level - 1))
            .sum()
    }

    /// Free every table and data page, root included, and hand the backing
    /// memory back.
    #[must_use]
    pub fn teardown(mut self) -> M {
        if let Some(root) = self.root.take() {
            self.release_table(root, G::LEVELS - 1);
        }
        self.memory
    }

    fn release_table(&mut self, page: PhysicalPage<G>, level: usize) {
        let children: Vec<PhysicalPage<G>> = match self.memory.table(page) {
            Some(table) => table
                .valid_entries()
                .filter_map(|(_, e)| e.page::<G>())
                .collect(),
            None => {
                warn!("teardown: level {level} table {page} is not a live frame");
                return;
            }
        };

        for child in children {
            if level == 0 {
                self.memory.free_frame(child);
            } else {
                self.release_table(child, level - 1);
            }
        }
        self.memory.free_frame(page);
        trace!("teardown: released level {level} table {page}");
    }

    fn ensure_root(&mut self) -> Result<PhysicalPage<G>, AllocateError> {
        if let Some(root) = self.root {
            return Ok(root);
        }
        let root = self.alloc(FrameRole::RootTable)?;
        self.root = Some(root);
        trace!("created root table {root}");
        Ok(root)
    }

    /// Follow (or create) the link at `level` in `table_page` to the table
    /// one level down.
    fn ensure_table(
        &mut self,
        table_page: PhysicalPage<G>,
        va: VirtualAddress,
        level: usize,
    ) -> Result<PhysicalPage<G>, AllocateError> {
        let index = TableIndex::of(va, level);
        if let Some(child) = self.table_at(table_page, level)?.get(index).page::<G>() {
            return Ok(child);
        }

        let child = self.alloc(FrameRole::Table { level: level - 1 })?;
        self.table_at_mut(table_page, level)?
            .set(index, PageTableEntry::link(child));
        trace!("created level {} table {child}", level - 1);
        Ok(child)
    }

    fn alloc(&mut self, role: FrameRole) -> Result<PhysicalPage<G>, AllocateError> {
        self.memory.alloc_frame().ok_or_else(|| {
            warn!("out of memory allocating {role}");
            AllocateError::OutOfMemory(role)
        })
    }

    fn table_at(
        &self,
        page: PhysicalPage<G>,
        level: usize,
    ) -> Result<&PageTable<G>, AllocateError> {
        self.memory
            .table(page)
            .ok_or(AllocateError::DanglingLink {
                level,
                page: page.base(),
            })
    }

    fn table_at_mut(
        &mut self,
        page: PhysicalPage<G>,
        level: usize,
    ) -> Result<&mut PageTable<G>, AllocateError> {
        self.memory
            .table_mut(page)
            .ok_or(AllocateError::DanglingLink {
                level,
                page: page.base(),
            })
    }
}

impl<G: Geometry, M: PhysMemory<G> + Default> Default for AddressSpace<G, M> {
    fn default() -> Self {
        Self::new(M::default())
    }
}

impl<G: Geometry, M: PhysMemory<G>> fmt::Debug for AddressSpace<G, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("geometry", &G::as_str())
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
