//! Walks through one address space on the 3-level / 1 KiB geometry.
//!
//! Usage: `mlpt-demo [LEVEL] [VADDR...]`, where `LEVEL` is a log level
//! (`error` .. `trace`, default `debug`) and each `VADDR` is a hex address to
//! map in addition to the built-in ones.

mod logger;

use crate::logger::StderrLogger;
use log::{LevelFilter, info, warn};
use mlpt_vmem::addresses::{Geometry, ThreeLevel1K, VirtualAddress};
use mlpt_vmem::{AddressSpace, AllocateError, FrameArena, NOT_MAPPED};
use std::env;

type Space = AddressSpace<ThreeLevel1K, FrameArena<ThreeLevel1K>>;

/// Addresses mapped in every run: the zero page, a neighbour sharing its
/// level-0 table, and one in a separate level-2 subtree.
const BUILTIN: [u64; 3] = [0x0000_0000, 0x0000_0400, 0x4567_89AB];

fn main() -> Result<(), AllocateError> {
    let mut args = env::args().skip(1);
    let level = args
        .next()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Debug);
    let extra: Vec<u64> = args.filter_map(|s| parse_hex(&s)).collect();

    if StderrLogger::new(level).init().is_err() {
        eprintln!("logger already installed");
    }

    info!(
        "geometry {}: {} levels, {} entries per table, {}-bit virtual space",
        ThreeLevel1K::as_str(),
        ThreeLevel1K::LEVELS,
        ThreeLevel1K::ENTRIES_PER_TABLE,
        ThreeLevel1K::VIRTUAL_BITS
    );

    let mut aspace = Space::default();
    info!("translate 0x0 before allocation: {:#X}", aspace.translate_raw(0));

    let addresses: Vec<u64> = BUILTIN.iter().copied().chain(extra).collect();
    for &raw in &addresses {
        let va = VirtualAddress::new(raw);
        match aspace.allocate(va) {
            Ok(allocation) => info!("allocate {va}: {allocation:?}"),
            Err(AllocateError::InvalidAddress(_)) => {
                warn!("allocate {va}: outside the {}-bit space", ThreeLevel1K::VIRTUAL_BITS);
                continue;
            }
            Err(e) => return Err(e),
        }
        info!("{}", aspace.walk(va));
    }
    info!(
        "{} pages mapped, {} frames live",
        aspace.mapped_pages(),
        aspace.memory().live_frames()
    );

    for &raw in addresses.iter().rev() {
        let va = VirtualAddress::new(raw);
        let removed = aspace.deallocate(va);
        let after = aspace.translate_raw(raw);
        info!(
            "deallocate {va}: {} (translate now {})",
            if removed { "removed" } else { "nothing mapped" },
            if after == NOT_MAPPED { "unmapped".into() } else { format!("{after:#X}") }
        );
    }
    info!("{} frames live after deallocation", aspace.memory().live_frames());

    let arena = aspace.teardown();
    info!(
        "teardown: {} frames live, {} allocations in total",
        arena.live_frames(),
        arena.total_allocations()
    );
    Ok(())
}

fn parse_hex(s: &str) -> Option<u64> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X").replace('_', "");
    match u64::from_str_radix(&digits, 16) {
        Ok(v) => Some(v),
        Err(e) => {
            eprintln!("ignoring {s:?}: {e}");
            None
        }
    }
}
