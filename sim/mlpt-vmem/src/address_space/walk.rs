use crate::page_table::{PageTableEntry, TableIndex};
use alloc::vec::Vec;
use core::fmt;
use mlpt_addresses::{Geometry, PhysicalAddress, PhysicalPage, VirtualAddress};

/// One entry read during a walk.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WalkStep<G: Geometry> {
    /// Level of the table the entry was read from.
    pub level: usize,
    /// The table the entry was read from.
    pub table: PhysicalPage<G>,
    pub index: TableIndex<G>,
    pub entry: PageTableEntry,
}

/// The entries a translation of one virtual address reads, root first.
///
/// Produced by [`AddressSpace::walk`](crate::AddressSpace::walk). A walk is
/// complete when it has one step per level and its last entry is valid.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Walk<G: Geometry> {
    va: VirtualAddress,
    steps: Vec<WalkStep<G>>,
}

impl<G: Geometry> Walk<G> {
    pub(crate) const fn new(va: VirtualAddress, steps: Vec<WalkStep<G>>) -> Self {
        Self { va, steps }
    }

    #[must_use]
    pub const fn va(&self) -> VirtualAddress {
        self.va
    }

    #[must_use]
    pub fn steps(&self) -> &[WalkStep<G>] {
        &self.steps
    }

    /// Whether the walk reached a valid leaf entry.
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        self.leaf_page().is_some()
    }

    /// The data page named by the leaf entry, if reached.
    #[must_use]
    pub fn leaf_page(&self) -> Option<PhysicalPage<G>> {
        self.steps
            .last()
            .filter(|step| step.level == 0)
            .and_then(|step| step.entry.page::<G>())
    }

    /// The translated address, if mapped.
    #[must_use]
    pub fn physical_address(&self) -> Option<PhysicalAddress> {
        self.leaf_page()
            .map(|page| page.join(self.va.page_offset::<G>()))
    }

    /// Level at which the walk stopped on an invalid entry, if it did.
    #[must_use]
    pub fn fault_level(&self) -> Option<usize> {
        self.steps
            .last()
            .filter(|step| !step.entry.is_valid())
            .map(|step| step.level)
    }
}

impl<G: Geometry> fmt::Display for Walk<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "walk {}", self.va())?;
        if self.steps.is_empty() {
            return f.write_str(": no root");
        }
        for step in &self.steps {
            write!(
                f,
                "\n  L{} {}[{:>4}] = {:?}",
                step.level,
                step.table.base(),
                step.index.as_usize(),
                step.entry
            )?;
        }
        match self.physical_address() {
            Some(pa) => write!(f, "\n  -> {pa}"),
            None => f.write_str("\n  -> not mapped"),
        }
    }
}
