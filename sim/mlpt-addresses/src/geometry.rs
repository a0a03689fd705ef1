use core::fmt;
use core::hash::Hash;

/// `log2` of the entry width in bytes; entries are 64-bit words.
pub const ENTRY_SHIFT: u32 = 3;

/// Compile-time shape of a page table.
///
/// Implementors only pick [`LEVELS`](Self::LEVELS) and
/// [`PAGE_OFFSET_BITS`](Self::PAGE_OFFSET_BITS); everything else is derived
/// so that one table of 8-byte entries exactly fills one page.
///
/// ### Constraints
/// Checked at compile time through [`VALID`](Self::VALID), which every
/// address space forces when it is built:
/// - `LEVELS >= 1`
/// - `PAGE_OFFSET_BITS > ENTRY_SHIFT` (a table holds at least two entries)
/// - `PAGE_OFFSET_BITS + LEVELS * BITS_PER_LEVEL <= 64`
///
/// ### Example
/// ```rust
/// # use mlpt_addresses::Geometry;
/// #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
/// struct Sv39Like;
///
/// impl Geometry for Sv39Like {
///     const LEVELS: usize = 3;
///     const PAGE_OFFSET_BITS: u32 = 12;
///
///     fn as_str() -> &'static str {
///         "3x4K"
///     }
/// }
///
/// assert_eq!(Sv39Like::ENTRIES_PER_TABLE, 512);
/// assert_eq!(Sv39Like::VIRTUAL_BITS, 39);
/// ```
pub trait Geometry: Copy + Eq + Ord + Hash + fmt::Debug + 'static {
    /// Number of tables walked to resolve one address.
    const LEVELS: usize;

    /// Number of low address bits that select a byte within a page.
    const PAGE_OFFSET_BITS: u32;

    /// Page size in bytes.
    const PAGE_SIZE: u64 = 1 << Self::PAGE_OFFSET_BITS;

    /// Mask selecting the in-page offset.
    const OFFSET_MASK: u64 = Self::PAGE_SIZE - 1;

    /// Mask selecting a page-aligned base.
    const PAGE_MASK: u64 = !Self::OFFSET_MASK;

    /// Width of one level's table index.
    const BITS_PER_LEVEL: u32 = Self::PAGE_OFFSET_BITS - ENTRY_SHIFT;

    /// Entries in one table.
    const ENTRIES_PER_TABLE: usize = 1 << Self::BITS_PER_LEVEL;

    /// Mask selecting one level's index after shifting.
    const INDEX_MASK: u64 = (1 << Self::BITS_PER_LEVEL) - 1;

    /// Number of virtual address bits covered by the walk.
    #[allow(clippy::cast_possible_truncation)]
    const VIRTUAL_BITS: u32 = Self::PAGE_OFFSET_BITS + Self::LEVELS as u32 * Self::BITS_PER_LEVEL;

    /// Evaluating this constant fails the build for an unusable geometry.
    const VALID: () = {
        assert!(Self::LEVELS >= 1, "a page table needs at least one level");
        assert!(
            Self::PAGE_OFFSET_BITS > ENTRY_SHIFT && Self::PAGE_OFFSET_BITS < 64,
            "a page must hold at least two entries"
        );
        assert!(
            Self::VIRTUAL_BITS <= 64,
            "the walk covers more than 64 virtual address bits"
        );
    };

    /// Short human-readable name, e.g. `"3x1K"`.
    fn as_str() -> &'static str;
}

macro_rules! geometry {
    ($(#[$meta:meta])* $name:ident, levels = $levels:literal, offset_bits = $bits:literal, $label:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name;

        impl Geometry for $name {
            const LEVELS: usize = $levels;
            const PAGE_OFFSET_BITS: u32 = $bits;

            fn as_str() -> &'static str {
                $label
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(Self::as_str())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&self, f)
            }
        }
    };
}

geometry!(
    /// Three levels of 128-entry tables over 1 KiB pages (31-bit virtual space).
    ///
    /// This is the reference configuration of the simulator.
    ThreeLevel1K, levels = 3, offset_bits = 10, "3x1K"
);

geometry!(
    /// Four levels of 512-entry tables over 4 KiB pages (48-bit virtual space),
    /// the shape of x86-64 4-level paging.
    FourLevel4K, levels = 4, offset_bits = 12, "4x4K"
);

geometry!(
    /// Two levels of 512-entry tables over 4 KiB pages (30-bit virtual space).
    TwoLevel4K, levels = 2, offset_bits = 12, "2x4K"
);

geometry!(
    /// A single 128-entry table over 1 KiB pages (17-bit virtual space).
    OneLevel1K, levels = 1, offset_bits = 10, "1x1K"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_constants_fill_one_page() {
        assert_eq!(ThreeLevel1K::PAGE_SIZE, 1024);
        assert_eq!(ThreeLevel1K::BITS_PER_LEVEL, 7);
        assert_eq!(ThreeLevel1K::ENTRIES_PER_TABLE, 128);
        assert_eq!(ThreeLevel1K::VIRTUAL_BITS, 31);
        assert_eq!(
            ThreeLevel1K::ENTRIES_PER_TABLE as u64 * (1 << ENTRY_SHIFT),
            ThreeLevel1K::PAGE_SIZE
        );

        assert_eq!(FourLevel4K::ENTRIES_PER_TABLE, 512);
        assert_eq!(FourLevel4K::VIRTUAL_BITS, 48);
        assert_eq!(TwoLevel4K::VIRTUAL_BITS, 30);
        assert_eq!(OneLevel1K::VIRTUAL_BITS, 17);
    }

    #[test]
    fn masks_are_complementary() {
        assert_eq!(ThreeLevel1K::OFFSET_MASK, 0x3FF);
        assert_eq!(ThreeLevel1K::PAGE_MASK, !0x3FF);
        assert_eq!(ThreeLevel1K::INDEX_MASK, 0x7F);
    }

    #[test]
    fn presets_pass_validation() {
        let () = ThreeLevel1K::VALID;
        let () = FourLevel4K::VALID;
        let () = TwoLevel4K::VALID;
        let () = OneLevel1K::VALID;
    }

    #[test]
    fn display_names() {
        assert_eq!(format!("{ThreeLevel1K}"), "3x1K");
        assert_eq!(format!("{FourLevel4K:?}"), "4x4K");
    }
}
