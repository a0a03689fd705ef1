use crate::{Geometry, PageOffset, PhysicalAddress};
use core::fmt;
use core::marker::PhantomData;

/// Physical page base for geometry `G`.
///
/// A `PhysicalPage<G>` is the **page-aligned base** of one frame of
/// `G::PAGE_SIZE` bytes. Table entries store exactly this value (plus the
/// validity bit), so the type is also the link from one table to the next.
///
/// ### Invariants
/// - The low `G::PAGE_OFFSET_BITS` bits of the base are always zero.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage<G: Geometry> {
    base: u64,
    _geometry: PhantomData<G>,
}

impl<G: Geometry> PhysicalPage<G> {
    /// Page that contains `addr` (aligns down).
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: PhysicalAddress) -> Self {
        Self {
            base: addr.as_u64() & G::PAGE_MASK,
            _geometry: PhantomData,
        }
    }

    /// Page with the given frame number, i.e. base `number << PAGE_OFFSET_BITS`.
    ///
    /// Returns `None` if the base does not fit into 64 bits.
    #[inline]
    #[must_use]
    pub const fn from_number(number: u64) -> Option<Self> {
        if number > (u64::MAX >> G::PAGE_OFFSET_BITS) {
            return None;
        }
        Some(Self {
            base: number << G::PAGE_OFFSET_BITS,
            _geometry: PhantomData,
        })
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.base)
    }

    /// The frame number (`base >> PAGE_OFFSET_BITS`).
    #[inline]
    #[must_use]
    pub const fn number(self) -> u64 {
        self.base >> G::PAGE_OFFSET_BITS
    }

    /// Combine with an in-page offset to form a full address.
    ///
    /// The offset occupies only bits below the page boundary, so this is a
    /// plain bitwise OR and cannot overflow.
    #[inline]
    #[must_use]
    pub const fn join(self, off: PageOffset<G>) -> PhysicalAddress {
        PhysicalAddress::new(self.base | off.as_u64())
    }

    /// The highest address inside this page.
    #[inline]
    #[must_use]
    pub const fn last_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.base | G::OFFSET_MASK)
    }
}

impl<G: Geometry> fmt::Display for PhysicalPage<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}/{}", self.base, G::as_str())
    }
}

impl<G: Geometry> fmt::Debug for PhysicalPage<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage<{}>({:#018X})", G::as_str(), self.base)
    }
}

impl<G: Geometry> From<PhysicalPage<G>> for PhysicalAddress {
    #[inline]
    fn from(page: PhysicalPage<G>) -> Self {
        page.base()
    }
}
