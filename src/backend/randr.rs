//! Decoding of XRandR-shaped snapshots into the typed hardware model.
//!
//! The raw records cross-reference each other through display-server ids
//! (XIDs); this module resolves them into typed indices and drops everything
//! the engine can't use, like disconnected outputs or outputs without modes.

use std::collections::HashMap;

use madori_state::{CrtcRecord, GpuRecord, ModeRecord, OutputRecord, ScreenSnapshot, Transform};

use crate::geometry::Rect;
use crate::gpu::{
    ConnectorType, Crtc, CrtcId, Gpu, Mode, ModeFlags, ModeId, Output, OutputId, TileInfo,
    TransformSet,
};

// RandR rotation and reflection bits.
const ROTATE_0: u32 = 1 << 0;
const ROTATE_90: u32 = 1 << 1;
const ROTATE_180: u32 = 1 << 2;
const ROTATE_270: u32 = 1 << 3;
const REFLECT_X: u32 = 1 << 4;
const REFLECT_Y: u32 = 1 << 5;

/// A fully decoded snapshot: screen size bounds plus the typed per-GPU model.
#[derive(Debug, Default)]
pub struct DecodedScreen {
    pub min_size: (i32, i32),
    pub max_size: (i32, i32),
    pub screen_size: (i32, i32),
    pub gpus: Vec<Gpu>,
}

/// Decodes a raw snapshot wholesale. The previous decoded state, if any, is
/// meant to be replaced rather than patched.
pub fn decode_snapshot(snapshot: &ScreenSnapshot, fractional_scaling: bool) -> DecodedScreen {
    let mut gpus: Vec<Gpu> = snapshot
        .gpus
        .iter()
        .map(|gpu| decode_gpu(gpu, snapshot.primary))
        .collect();

    if fractional_scaling {
        apply_dpi_scale(&mut gpus, snapshot.dpi_scale_factor);
    }

    DecodedScreen {
        min_size: snapshot.min_size,
        max_size: snapshot.max_size,
        screen_size: snapshot.screen_size,
        gpus,
    }
}

/// X servers without native output scaling only communicate a global UI scale
/// through `Xft.dpi`; fold it into the CRTC scales so the rest of the engine
/// sees one consistent number. Without the hint, fall back to the ceiling of
/// the largest decoded CRTC scale.
fn apply_dpi_scale(gpus: &mut [Gpu], dpi_scale_factor: Option<f64>) {
    let factor = match dpi_scale_factor {
        Some(dpi) => f64::max(1.0, dpi.round()),
        None => {
            let max_scale = gpus
                .iter()
                .flat_map(|gpu| &gpu.crtcs)
                .filter_map(|crtc| crtc.scale)
                .fold(1.0, f64::max);
            max_scale.ceil()
        }
    };

    if factor > 1.0 {
        for crtc in gpus.iter_mut().flat_map(|gpu| &mut gpu.crtcs) {
            if let Some(scale) = &mut crtc.scale {
                *scale *= factor;
            }
        }
    }
}

fn decode_gpu(record: &GpuRecord, primary: Option<u64>) -> Gpu {
    let modes: Vec<Mode> = record.modes.iter().map(decode_mode).collect();
    let mode_ids: HashMap<u64, ModeId> = modes
        .iter()
        .enumerate()
        .map(|(idx, mode)| (mode.winsys_id, ModeId(idx)))
        .collect();

    let crtcs: Vec<Crtc> = record
        .crtcs
        .iter()
        .map(|crtc| decode_crtc(crtc, &mode_ids))
        .collect();
    let crtc_ids: HashMap<u64, CrtcId> = crtcs
        .iter()
        .enumerate()
        .map(|(idx, crtc)| (crtc.winsys_id, CrtcId(idx)))
        .collect();

    let mut outputs: Vec<Output> = record
        .outputs
        .iter()
        .filter(|output| output.connected)
        .filter_map(|output| decode_output(output, primary, &mode_ids, &crtc_ids))
        .collect();

    // Deterministic iteration order regardless of how the server enumerated
    // the connectors.
    outputs.sort_by(|a, b| a.name.cmp(&b.name));

    // Clones arrive as winsys ids; they can only be resolved once the final
    // output set and order are known.
    let output_ids: HashMap<u64, OutputId> = outputs
        .iter()
        .enumerate()
        .map(|(idx, output)| (output.winsys_id, OutputId(idx)))
        .collect();
    let records_by_id: HashMap<u64, &OutputRecord> =
        record.outputs.iter().map(|o| (o.id, o)).collect();
    for output in &mut outputs {
        if let Some(rec) = records_by_id.get(&output.winsys_id) {
            output.possible_clones = rec
                .clones
                .iter()
                .filter_map(|id| output_ids.get(id).copied())
                .collect();
        }
    }

    Gpu {
        modes,
        crtcs,
        outputs,
    }
}

fn decode_mode(record: &ModeRecord) -> Mode {
    Mode {
        winsys_id: record.id,
        name: format!("{}x{}", record.width, record.height),
        width: record.width as i32,
        height: record.height as i32,
        refresh_rate: mode_refresh_rate(record),
        flags: ModeFlags::from_bits_truncate(record.flags),
    }
}

fn mode_refresh_rate(record: &ModeRecord) -> f64 {
    if record.h_total == 0 || record.v_total == 0 {
        return 0.0;
    }

    record.dot_clock as f64 / (f64::from(record.h_total) * f64::from(record.v_total))
}

fn decode_crtc(record: &CrtcRecord, mode_ids: &HashMap<u64, ModeId>) -> Crtc {
    // Panning takes precedence over the raw geometry when configured.
    let rect = match record.panning {
        Some([x, y, w, h]) if w > 0 && h > 0 => Rect::new(x, y, w, h),
        _ => Rect::new(
            record.x,
            record.y,
            record.width as i32,
            record.height as i32,
        ),
    };

    Crtc {
        winsys_id: record.id,
        rect,
        transform: transform_from_rotation(record.rotation),
        scale: record.transform_matrix.map(scale_from_matrix),
        current_mode: record.mode.and_then(|id| mode_ids.get(&id).copied()),
        all_transforms: transform_set_from_rotations(record.rotations),
    }
}

fn transform_from_rotation(rotation: u32) -> Transform {
    let base = match rotation & 0x7f {
        ROTATE_90 => Transform::_90,
        ROTATE_180 => Transform::_180,
        ROTATE_270 => Transform::_270,
        _ => Transform::Normal,
    };

    if rotation & REFLECT_X != 0 {
        match base {
            Transform::Normal => Transform::Flipped,
            Transform::_90 => Transform::Flipped90,
            Transform::_180 => Transform::Flipped180,
            _ => Transform::Flipped270,
        }
    } else if rotation & REFLECT_Y != 0 {
        // A Y reflection is an X reflection composed with a 180° rotation.
        match base {
            Transform::Normal => Transform::Flipped180,
            Transform::_90 => Transform::Flipped90,
            Transform::_180 => Transform::Flipped,
            _ => Transform::Flipped270,
        }
    } else {
        base
    }
}

fn transform_set_from_rotations(rotations: u32) -> TransformSet {
    const ALL_ROTATIONS: u32 = ROTATE_0 | ROTATE_90 | ROTATE_180 | ROTATE_270;

    // The common cases first: none, or everything by composition. Any
    // rotation combined with a reflection already spans the full set.
    if rotations == 0 || rotations == ROTATE_0 {
        return TransformSet::NORMAL;
    }
    if rotations & ALL_ROTATIONS != 0 && rotations & (REFLECT_X | REFLECT_Y) != 0 {
        return TransformSet::all();
    }

    let mut set = TransformSet::NORMAL;
    if rotations & ROTATE_90 != 0 {
        set |= TransformSet::ROTATE_90;
    }
    if rotations & ROTATE_180 != 0 {
        set |= TransformSet::ROTATE_180;
    }
    if rotations & ROTATE_270 != 0 {
        set |= TransformSet::ROTATE_270;
    }
    if rotations & (ROTATE_0 | REFLECT_X) != 0 {
        set |= TransformSet::FLIPPED;
    }
    if rotations & (ROTATE_90 | REFLECT_X) != 0 {
        set |= TransformSet::FLIPPED_90;
    }
    if rotations & (ROTATE_180 | REFLECT_X) != 0 {
        set |= TransformSet::FLIPPED_180;
    }
    if rotations & (ROTATE_270 | REFLECT_X) != 0 {
        set |= TransformSet::FLIPPED_270;
    }
    set
}

/// The transform matrix stores the inverse of the output scale in its
/// diagonal.
fn scale_from_matrix(matrix: [f64; 2]) -> f64 {
    let [xx, yy] = matrix;
    let scale = if xx == yy { 1.0 / xx } else { 2.0 / (xx + yy) };
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

fn decode_output(
    record: &OutputRecord,
    primary: Option<u64>,
    mode_ids: &HashMap<u64, ModeId>,
    crtc_ids: &HashMap<u64, CrtcId>,
) -> Option<Output> {
    let modes: Vec<ModeId> = record
        .modes
        .iter()
        .filter_map(|id| mode_ids.get(id).copied())
        .collect();
    if modes.is_empty() {
        warn!("output {} has no modes, ignoring", record.name);
        return None;
    }

    let possible_crtcs: Vec<CrtcId> = record
        .possible_crtcs
        .iter()
        .filter_map(|id| crtc_ids.get(id).copied())
        .collect();
    if possible_crtcs.is_empty() {
        warn!("output {} has no possible CRTCs, ignoring", record.name);
        return None;
    }

    let connector_type = match &record.connector_type {
        Some(value) => ConnectorType::from_property(value),
        None => ConnectorType::from_connector_name(&record.name),
    };

    let panel_orientation_transform = match record.panel_orientation.as_deref() {
        Some("Upside Down") => Transform::_180,
        Some("Left Side Up") => Transform::_90,
        Some("Right Side Up") => Transform::_270,
        _ => Transform::Normal,
    };

    // The EDID reports physical size in the panel's native orientation.
    let (width_mm, height_mm) = if panel_orientation_transform.is_rotated() {
        (record.height_mm, record.width_mm)
    } else {
        (record.width_mm, record.height_mm)
    };

    let preferred_mode = modes[0];

    Some(Output {
        winsys_id: record.id,
        name: record.name.clone(),
        vendor: unknown_if_missing(&record.vendor),
        product: unknown_if_missing(&record.product),
        serial: unknown_if_missing(&record.serial),
        width_mm,
        height_mm,
        modes,
        preferred_mode,
        connector_type,
        panel_orientation_transform,
        tile_info: record.tile.map(TileInfo::from_property),
        assigned_crtc: record.crtc.and_then(|id| crtc_ids.get(&id).copied()),
        possible_crtcs,
        possible_clones: Vec::new(),
        is_primary: primary == Some(record.id),
        is_presentation: record.presentation,
        is_underscanning: record.underscanning,
        subpixel_order: record.subpixel,
        suggested_pos: record.suggested_pos,
    })
}

fn unknown_if_missing(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| String::from("unknown"))
}

/// The desired configuration of one CRTC, as a composer would request it.
#[derive(Debug, Clone)]
pub struct CrtcAssignment {
    pub mode: Option<ModeId>,
    pub pos: (f64, f64),
    pub transform: Transform,
    pub outputs: Vec<OutputId>,
}

/// Whether applying `assignment` to the CRTC would change anything. Lets a
/// composer skip redundant mode-sets, which blank the screen on some drivers.
pub fn is_assignment_changed(gpu: &Gpu, crtc_id: CrtcId, assignment: &CrtcAssignment) -> bool {
    let crtc = gpu.crtc(crtc_id);

    if crtc.current_mode != assignment.mode {
        return true;
    }
    if crtc.rect.x != assignment.pos.0.round() as i32 {
        return true;
    }
    if crtc.rect.y != assignment.pos.1.round() as i32 {
        return true;
    }
    if crtc.transform != assignment.transform {
        return true;
    }

    assignment
        .outputs
        .iter()
        .any(|id| gpu.output(*id).assigned_crtc != Some(crtc_id))
}
