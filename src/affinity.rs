//! CPU-affinity masks for run-queue selection.
//!
//! A process carries a 16-bit affinity mask: bit *i* set means the process may
//! run on logical processor *i*. Selection operations take a filter mask and
//! consider only processes whose mask intersects it. The number of set bits
//! also acts as the tie-break signal in the priority order: a process confined
//! to fewer processors is scheduled ahead of an equally-weighted one with more
//! placement freedom, which reduces starvation risk for constrained processes.

/// Width of the affinity mask in bits (one bit per logical processor).
pub const CPU_MASK_WIDTH: u32 = 16;

/// Mask with every logical processor allowed.
pub const CPU_MASK_MAX: u16 = u16::MAX;

// The mask type and the advertised width must agree.
const _: () = assert!(CPU_MASK_WIDTH == u16::BITS);

/// Returns the number of processors the mask allows.
#[inline]
pub fn cpu_count(mask: u16) -> u16 {
    mask.count_ones() as u16
}

/// Returns `true` if the process mask shares at least one processor with the
/// filter mask.
#[inline]
pub fn intersects(mask: u16, filter: u16) -> bool {
    mask & filter != 0
}
