//! Monitor scale selection.
//!
//! HiDPI detection and supported-scale quantization, following the heuristics
//! of the GNOME and Cinnamon monitor backends: a display only gets scale 2.0
//! when it is tall enough, not a 4K TV on HDMI, and dense enough on both axes;
//! fractional scales are quantized to values that divide the mode size into
//! integer logical pixels.

use bitflags::bitflags;

pub const MIN_SCALE: f64 = 1.0;
pub const MAX_SCALE: f64 = 4.0;
pub const SCALE_FACTORS_PER_INTEGER: u32 = 4;
pub const SCALE_STEP: f64 = 1.0 / SCALE_FACTORS_PER_INTEGER as f64;
pub const MINIMUM_LOGICAL_AREA: i64 = 800 * 576;

/// The minimum DPI (on both axes) at which we turn on a scale of 2.
const HIDPI_LIMIT: f64 = 192.0;

/// The minimum mode height at which we turn on a scale of 2; below this there
/// just isn't enough vertical real estate for applications to work.
const HIDPI_MIN_HEIGHT: i32 = 1200;

/// From <http://en.wikipedia.org/wiki/4K_resolution#Resolutions_of_common_formats>.
const SMALLEST_4K_WIDTH: i32 = 3656;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ScaleConstraints: u8 {
        /// Only integer scales.
        const NO_FRACTIONAL = 1 << 0;
        /// Scales must divide the mode size into integer logical pixels.
        const NO_LOGICAL_REMAINDER = 1 << 1;
    }
}

/// Whether the reported physical size is actually the aspect ratio, a known
/// vendor malformation.
pub fn is_aspect_as_size(width_mm: i32, height_mm: i32) -> bool {
    matches!(
        (width_mm, height_mm),
        (1600, 900) | (1600, 1000) | (160, 90) | (160, 100) | (16, 9) | (16, 10)
    )
}

/// Calculates the default scale for a mode: 2.0 for HiDPI panels, 1.0
/// otherwise.
pub fn calculate(
    width: i32,
    height: i32,
    width_mm: i32,
    height_mm: i32,
    is_hdmi: bool,
) -> f64 {
    if height < HIDPI_MIN_HEIGHT {
        return 1.0;
    }

    // 4K TV at normal viewing distance.
    if is_hdmi && width < SMALLEST_4K_WIDTH {
        return 1.0;
    }

    if is_aspect_as_size(width_mm, height_mm) {
        return 1.0;
    }

    if width_mm > 0 && height_mm > 0 {
        let dpi_x = f64::from(width) / (f64::from(width_mm) / 25.4);
        let dpi_y = f64::from(height) / (f64::from(height_mm) / 25.4);

        // We don't completely trust these values so both must be high, and
        // never pick a ratio higher than 2 automatically.
        if dpi_x > HIDPI_LIMIT && dpi_y > HIDPI_LIMIT {
            return 2.0;
        }
    }

    1.0
}

fn is_logical_size_large_enough(width: i32, height: i32) -> bool {
    i64::from(width) * i64::from(height) >= MINIMUM_LOGICAL_AREA
}

fn is_scale_valid_for_size(width: f64, height: f64, scale: f64) -> bool {
    (MIN_SCALE..=MAX_SCALE).contains(&scale)
        && is_logical_size_large_enough(
            (width / scale).floor() as i32,
            (height / scale).floor() as i32,
        )
}

/// Whether a mode is worth offering to the user: either it matches the
/// preferred mode's resolution, or it is large enough to be usable.
pub fn mode_should_be_advertised(
    width: i32,
    height: i32,
    preferred_width: i32,
    preferred_height: i32,
) -> bool {
    if width == preferred_width && height == preferred_height {
        return true;
    }

    is_logical_size_large_enough(width, height)
}

/// Snaps a candidate scale to the closest value that divides both axes into
/// integer logical sizes, searching outward from `floor(width / scale)` until
/// the resulting scale leaves the ±[`SCALE_STEP`] band around the candidate.
fn closest_scale_factor(width: f64, height: f64, scale: f64) -> Option<f64> {
    if !is_scale_valid_for_size(width, height, scale) {
        return None;
    }

    if width % scale == 0.0 && height % scale == 0.0 {
        return Some(scale);
    }

    let base_scaled_w = (width / scale).floor();
    let mut best: Option<f64> = None;

    for i in 0.. {
        for j in 0..2 {
            let offset = f64::from(i * if j == 0 { -1 } else { 1 });
            let scaled_w = base_scaled_w + offset;
            let current = width / scaled_w;
            let scaled_h = height / current;

            if current >= scale + SCALE_STEP
                || current <= scale - SCALE_STEP
                || !(MIN_SCALE..=MAX_SCALE).contains(&current)
            {
                return best;
            }

            if scaled_h.floor() == scaled_h {
                let better = match best {
                    Some(best) => (current - scale).abs() < (best - scale).abs(),
                    None => true,
                };
                if better {
                    best = Some(current);
                }
            }
        }

        if best.is_some() {
            break;
        }
    }

    best
}

/// Enumerates every scale the mode size can be displayed at, never empty.
pub fn supported_scales(width: i32, height: i32, constraints: ScaleConstraints) -> Vec<f64> {
    let mut scales = Vec::new();

    for i in MIN_SCALE.floor() as u32..=MAX_SCALE.ceil() as u32 {
        for j in 0..SCALE_FACTORS_PER_INTEGER {
            let value = f64::from(i) + f64::from(j) * SCALE_STEP;

            if constraints.contains(ScaleConstraints::NO_FRACTIONAL) && value.fract() != 0.0 {
                continue;
            }

            let scale = if constraints
                .intersects(ScaleConstraints::NO_FRACTIONAL | ScaleConstraints::NO_LOGICAL_REMAINDER)
            {
                if !is_scale_valid_for_size(f64::from(width), f64::from(height), value) {
                    continue;
                }
                Some(value)
            } else {
                closest_scale_factor(f64::from(width), f64::from(height), value)
            };

            scales.extend(scale);
        }
    }

    if scales.is_empty() {
        scales.push(1.0);
    }

    scales
}
