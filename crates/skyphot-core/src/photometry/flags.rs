//! Per-measurement quality bits.
//!
//! A zero flag means the cell is trustworthy; any set bit marks a degraded
//! measurement that is still stored.

/// Aperture extends beyond the frame edge.
pub const APER_TRUNC: u16 = 0x0010;
/// At least one aperture pixel was masked.
pub const APER_HASMASKED: u16 = 0x0020;
/// Every aperture pixel was masked.
pub const APER_ALLMASKED: u16 = 0x0040;
/// Non-finite position or pixel values inside the aperture.
pub const APER_NONFINITE: u16 = 0x0080;
/// The half-flux radius could not be measured.
pub const RADIUS_FAILED: u16 = 0x0100;
/// The windowed centroid diverged; the input position was kept.
pub const CENTROID_DIVERGED: u16 = 0x0200;

const NAMES: [(u16, &str); 6] = [
    (APER_TRUNC, "truncated"),
    (APER_HASMASKED, "partially masked"),
    (APER_ALLMASKED, "fully masked"),
    (APER_NONFINITE, "non-finite"),
    (RADIUS_FAILED, "radius failed"),
    (CENTROID_DIVERGED, "centroid diverged"),
];

/// Human-readable names of the bits set in `flag`.
pub fn describe(flag: u16) -> Vec<&'static str> {
    NAMES
        .iter()
        .filter(|(bit, _)| flag & bit != 0)
        .map(|&(_, name)| name)
        .collect()
}
