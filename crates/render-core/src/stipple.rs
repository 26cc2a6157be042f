//! Line stipple masks as dash arrays.

use vexport_capture::Stipple;

/// PostScript limits dash arrays to 11 elements; five on/off pairs fit. The
/// other formats use the same arrays so the pattern is identical everywhere.
const MAX_PAIRS: usize = 5;

/// Converts a 16-bit stipple mask into an on/off dash array in device pixels.
///
/// The mask is read from its most significant bit as alternating off/on runs.
/// The runs are emitted right to left starting with an "on" length, so the
/// pattern phase matches the way the mask is consumed along the line. An empty
/// array means a solid line.
pub fn stipple_dash_array(stipple: Stipple) -> Vec<f64> {
    if stipple.pattern == 0 || stipple.factor == 0 {
        return Vec::new();
    }
    let bits: Vec<bool> = (0..16).map(|n| stipple.pattern & (0x8000 >> n) != 0).collect();

    let mut runs: Vec<(u32, u32)> = Vec::with_capacity(8);
    let mut n = 0;
    for _ in 0..8 {
        let mut off = 0;
        while n < 16 && !bits[n] {
            off += 1;
            n += 1;
        }
        let mut on = 0;
        while n < 16 && bits[n] {
            on += 1;
            n += 1;
        }
        runs.push((on, off));
        if n >= 15 {
            break;
        }
    }

    let factor = stipple.factor as f64;
    runs.iter()
        .rev()
        .take(MAX_PAIRS)
        .flat_map(|&(on, off)| [factor * on as f64, factor * off as f64])
        .collect()
}
