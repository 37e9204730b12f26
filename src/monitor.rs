//! Monitors: one or more outputs of a GPU exposed as a single panel.
//!
//! A normal monitor wraps a single output. A tiled monitor groups every
//! output of one DisplayPort tile group and reconciles their per-tile mode
//! lists into combined monitor modes, tolerating the inconsistent preferred
//! modes that tiled panels are known to report.

use std::collections::HashMap;

use madori_state::Transform;

use crate::geometry::Rect;
use crate::gpu::{Gpu, Mode, ModeFlags, ModeId, Output, OutputId};
use crate::scale;

/// Identity of a monitor, used to match configuration entries to live
/// monitors across reconfigurations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSpec {
    pub connector: String,
    pub vendor: String,
    pub product: String,
    pub serial: String,
}

impl MonitorSpec {
    fn from_output(output: &Output) -> Self {
        Self {
            connector: output.name.clone(),
            vendor: output.vendor.clone(),
            product: output.product.clone(),
            serial: output.serial.clone(),
        }
    }
}

impl Ord for MonitorSpec {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.vendor
            .cmp(&other.vendor)
            .then_with(|| self.product.cmp(&other.product))
            .then_with(|| self.serial.cmp(&other.serial))
            .then_with(|| self.connector.cmp(&other.connector))
    }
}

impl PartialOrd for MonitorSpec {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// One derived mode of a monitor.
#[derive(Debug, Clone)]
pub struct MonitorMode {
    /// Stable id of the form `{width}x{height}{i?}@{refresh}`.
    pub id: String,
    pub width: i32,
    pub height: i32,
    pub refresh_rate: f64,
    /// Only the handled (interlace) bit is kept.
    pub flags: ModeFlags,
    pub is_tiled: bool,
    /// Hardware mode per member output, parallel to the monitor's output
    /// list; `None` means the output is off in this mode.
    pub crtc_modes: Vec<Option<ModeId>>,
}

pub fn generate_mode_id(width: i32, height: i32, refresh_rate: f64, flags: ModeFlags) -> String {
    let interlace = if flags.contains(ModeFlags::INTERLACE) {
        "i"
    } else {
        ""
    };
    format!("{width}x{height}{interlace}@{refresh_rate:.3}")
}

#[derive(Debug, Clone)]
pub enum MonitorKind {
    Normal,
    Tiled {
        tile_group_id: u32,
        /// The (0, 0) tile.
        origin_output: OutputId,
        /// The tile that stays enabled when an untiled mode is used.
        main_output: OutputId,
    },
}

#[derive(Debug, Clone)]
pub struct Monitor {
    pub kind: MonitorKind,
    /// Index of the owning GPU in the manager's GPU list.
    pub gpu: usize,
    pub spec: MonitorSpec,
    /// Member outputs, in GPU order; a single entry for a normal monitor.
    pub outputs: Vec<OutputId>,
    pub modes: Vec<MonitorMode>,
    mode_ids: HashMap<String, usize>,
    pub preferred_mode: Option<usize>,
    pub current_mode: Option<usize>,
    /// Back-reference into the manager's logical monitor list.
    pub logical_monitor: Option<usize>,
    /// Opaque stable token of the underlying display-server output, used to
    /// re-associate windows across reconfiguration.
    pub winsys_id: u64,
    pub display_name: String,
}

impl Monitor {
    pub fn new_normal(gpu_index: usize, gpu: &Gpu, output_id: OutputId) -> Self {
        let output = gpu.output(output_id);
        let mut monitor = Self {
            kind: MonitorKind::Normal,
            gpu: gpu_index,
            spec: MonitorSpec::from_output(output),
            outputs: vec![output_id],
            modes: Vec::new(),
            mode_ids: HashMap::new(),
            preferred_mode: None,
            current_mode: None,
            logical_monitor: None,
            winsys_id: output.winsys_id,
            display_name: String::new(),
        };

        monitor.generate_normal_modes(gpu);
        monitor.display_name = monitor.make_display_name(gpu);
        monitor
    }

    /// Creates the monitor for a tile group, given its (0, 0) tile.
    pub fn new_tiled(gpu_index: usize, gpu: &Gpu, origin_output_id: OutputId) -> Self {
        let origin_output = gpu.output(origin_output_id);
        let tile_group_id = origin_output.tile_info.unwrap().group_id;

        let outputs: Vec<OutputId> = gpu
            .output_ids()
            .filter(|id| {
                let tile_info = gpu.output(*id).tile_info;
                tile_info.is_some_and(|info| info.group_id == tile_group_id)
            })
            .collect();

        for &id in &outputs {
            let output = gpu.output(id);
            if output.subpixel_order != origin_output.subpixel_order {
                debug!(
                    "tile {} has a different subpixel order than its group origin",
                    output.name
                );
            }
        }

        let main_output_id = find_untiled_output(gpu, origin_output_id, &outputs);

        let mut monitor = Self {
            kind: MonitorKind::Tiled {
                tile_group_id,
                origin_output: origin_output_id,
                main_output: main_output_id,
            },
            gpu: gpu_index,
            spec: MonitorSpec::from_output(gpu.output(main_output_id)),
            outputs,
            modes: Vec::new(),
            mode_ids: HashMap::new(),
            preferred_mode: None,
            current_mode: None,
            logical_monitor: None,
            winsys_id: origin_output.winsys_id,
            display_name: String::new(),
        };

        monitor.generate_tiled_monitor_modes(gpu);
        monitor.display_name = monitor.make_display_name(gpu);
        monitor
    }

    pub fn main_output(&self) -> OutputId {
        match self.kind {
            MonitorKind::Normal => self.outputs[0],
            MonitorKind::Tiled { main_output, .. } => main_output,
        }
    }

    pub fn is_tiled(&self) -> bool {
        matches!(self.kind, MonitorKind::Tiled { .. })
    }

    pub fn is_active(&self) -> bool {
        self.current_mode.is_some()
    }

    pub fn is_primary(&self, gpu: &Gpu) -> bool {
        gpu.output(self.main_output()).is_primary
    }

    pub fn is_laptop_panel(&self, gpu: &Gpu) -> bool {
        let name = &gpu.output(self.main_output()).name;
        ["eDP-", "LVDS-", "DSI-"]
            .iter()
            .any(|prefix| name.starts_with(prefix))
    }

    pub fn physical_dimensions(&self, gpu: &Gpu) -> (i32, i32) {
        let output = gpu.output(self.main_output());
        (output.width_mm, output.height_mm)
    }

    pub fn has_aspect_as_size(&self, gpu: &Gpu) -> bool {
        let (width_mm, height_mm) = self.physical_dimensions(gpu);
        scale::is_aspect_as_size(width_mm, height_mm)
    }

    pub fn mode_index_from_id(&self, id: &str) -> Option<usize> {
        self.mode_ids.get(id).copied()
    }

    /// The default scale for one of this monitor's modes. A configured
    /// global scale factor overrides the heuristics.
    pub fn calculate_mode_scale(
        &self,
        gpu: &Gpu,
        mode: &MonitorMode,
        global_scale_factor: Option<u32>,
    ) -> f64 {
        if let Some(factor) = global_scale_factor {
            return f64::from(factor);
        }

        let (width_mm, height_mm) = self.physical_dimensions(gpu);
        let is_hdmi = gpu.output(self.main_output()).connector_type.is_hdmi();
        scale::calculate(mode.width, mode.height, width_mm, height_mm, is_hdmi)
    }

    /// The monitor's rectangle as currently configured in hardware, or `None`
    /// when no member output is driven by a CRTC.
    pub fn derive_layout(&self, gpu: &Gpu) -> Option<Rect> {
        match self.kind {
            MonitorKind::Normal => {
                let output = gpu.output(self.main_output());
                let crtc = gpu.crtc(output.assigned_crtc?);
                crtc.is_active().then_some(crtc.rect)
            }
            MonitorKind::Tiled { .. } => {
                // Bounding box over the member CRTCs.
                let mut layout: Option<Rect> = None;
                for &output_id in &self.outputs {
                    let output = gpu.output(output_id);
                    let Some(crtc_id) = output.assigned_crtc else {
                        continue;
                    };
                    let crtc = gpu.crtc(crtc_id);
                    if !crtc.is_active() {
                        continue;
                    }
                    layout = Some(match layout {
                        Some(layout) => layout.union(crtc.rect),
                        None => crtc.rect,
                    });
                }
                layout
            }
        }
    }

    /// Where an output's CRTC goes within the monitor under a given CRTC
    /// transform. Only tiles of a tiled mode land anywhere but the origin.
    pub fn calculate_crtc_pos(
        &self,
        gpu: &Gpu,
        mode: &MonitorMode,
        output_id: OutputId,
        crtc_transform: Transform,
    ) -> (i32, i32) {
        match self.kind {
            MonitorKind::Normal => (0, 0),
            MonitorKind::Tiled { .. } => {
                if mode.is_tiled {
                    self.calculate_tile_coordinate(gpu, output_id, crtc_transform)
                } else {
                    (0, 0)
                }
            }
        }
    }

    fn calculate_tile_coordinate(
        &self,
        gpu: &Gpu,
        output_id: OutputId,
        crtc_transform: Transform,
    ) -> (i32, i32) {
        let tile = gpu.output(output_id).tile_info.unwrap();
        let mut x = 0;
        let mut y = 0;

        for &other_id in &self.outputs {
            let other = gpu.output(other_id).tile_info.unwrap();
            let same_row = other.loc_v_tile == tile.loc_v_tile;
            let same_col = other.loc_h_tile == tile.loc_h_tile;

            match crtc_transform {
                Transform::Normal | Transform::Flipped => {
                    if same_row && other.loc_h_tile < tile.loc_h_tile {
                        x += other.tile_w as i32;
                    }
                    if same_col && other.loc_v_tile < tile.loc_v_tile {
                        y += other.tile_h as i32;
                    }
                }
                Transform::_180 | Transform::Flipped180 => {
                    if same_row && other.loc_h_tile > tile.loc_h_tile {
                        x += other.tile_w as i32;
                    }
                    if same_col && other.loc_v_tile > tile.loc_v_tile {
                        y += other.tile_h as i32;
                    }
                }
                Transform::_270 | Transform::Flipped270 => {
                    if same_row && other.loc_h_tile > tile.loc_h_tile {
                        y += other.tile_w as i32;
                    }
                    if same_col && other.loc_v_tile > tile.loc_v_tile {
                        x += other.tile_h as i32;
                    }
                }
                Transform::_90 | Transform::Flipped90 => {
                    if same_row && other.loc_h_tile < tile.loc_h_tile {
                        y += other.tile_w as i32;
                    }
                    if same_col && other.loc_v_tile < tile.loc_v_tile {
                        x += other.tile_h as i32;
                    }
                }
            }
        }

        (x, y)
    }

    /// The position hint from the connector properties, if any. Tiled
    /// monitors report none.
    pub fn suggested_position(&self, gpu: &Gpu) -> Option<(i32, i32)> {
        match self.kind {
            MonitorKind::Normal => gpu.output(self.main_output()).suggested_pos,
            MonitorKind::Tiled { .. } => None,
        }
    }

    /// Re-derives `current_mode` from live CRTC assignments.
    pub fn derive_current_mode(&mut self, gpu: &Gpu) {
        self.current_mode = self
            .modes
            .iter()
            .position(|mode| self.is_mode_assigned(gpu, mode));
    }

    fn is_mode_assigned(&self, gpu: &Gpu, mode: &MonitorMode) -> bool {
        for (&output_id, &component) in self.outputs.iter().zip(&mode.crtc_modes) {
            let output = gpu.output(output_id);
            let crtc = output.assigned_crtc.map(|id| gpu.crtc(id));

            match component {
                Some(mode_id) => {
                    if crtc.and_then(|crtc| crtc.current_mode) != Some(mode_id) {
                        return false;
                    }
                }
                None => {
                    if crtc.is_some() {
                        return false;
                    }
                }
            }
        }

        true
    }

    fn create_mode(
        &self,
        gpu: &Gpu,
        width: i32,
        height: i32,
        reference_mode: &Mode,
        is_tiled: bool,
        crtc_modes: Vec<Option<ModeId>>,
    ) -> MonitorMode {
        let (width, height) = if gpu
            .output(self.main_output())
            .panel_orientation_transform
            .is_rotated()
        {
            (height, width)
        } else {
            (width, height)
        };

        let flags = reference_mode.flags & ModeFlags::HANDLED;
        MonitorMode {
            id: generate_mode_id(width, height, reference_mode.refresh_rate, flags),
            width,
            height,
            refresh_rate: reference_mode.refresh_rate,
            flags,
            is_tiled,
            crtc_modes,
        }
    }

    /// Adds a derived mode, returning its index. On an id collision the
    /// existing mode is kept unless `replace` is set, in which case it is
    /// overwritten in place.
    fn add_mode(&mut self, mode: MonitorMode, replace: bool) -> Option<usize> {
        if let Some(&existing) = self.mode_ids.get(&mode.id) {
            if !replace {
                return None;
            }
            self.modes[existing] = mode;
            return Some(existing);
        }

        let index = self.modes.len();
        self.mode_ids.insert(mode.id.clone(), index);
        self.modes.push(mode);
        Some(index)
    }

    fn generate_normal_modes(&mut self, gpu: &Gpu) {
        let output_id = self.outputs[0];
        let output = gpu.output(output_id);
        let preferred_mode_flags = gpu.mode(output.preferred_mode).flags;
        let active_mode = gpu.active_crtc_mode(output);

        for &mode_id in &output.modes {
            let crtc_mode = gpu.mode(mode_id);
            let mode = self.create_mode(
                gpu,
                crtc_mode.width,
                crtc_mode.height,
                crtc_mode,
                false,
                vec![Some(mode_id)],
            );

            // We don't distinguish between all available mode flags, just the
            // ones that are configurable. We still need to pick some mode
            // though, so prefer ones that have the same set of flags as the
            // preferred mode; otherwise take the first one in the list. This
            // guarantees that the preferred mode is always added.
            let replace = crtc_mode.flags == preferred_mode_flags;

            let Some(index) = self.add_mode(mode, replace) else {
                continue;
            };

            if mode_id == output.preferred_mode {
                self.preferred_mode = Some(index);
            }
            if active_mode == Some(mode_id) {
                self.current_mode = Some(index);
            }
        }
    }

    /// Derives the mode set of a tiled monitor.
    ///
    /// Tiled panels may look a bit different from each other. On some, the
    /// tiled modes are the preferred CRTC modes and running untiled is done
    /// by only enabling the (0, 0) tile. Others report a bogus preferred mode
    /// on the main tile and an untiled preferred mode on another tile, with
    /// no guarantee that the (0, 0) tile is the one driving untiled modes.
    /// Both cases are handled by an ordered fallback sequence:
    ///
    ///  1) build tiled monitor modes from every tiled CRTC mode of the (0, 0)
    ///     tile, marking one preferred when every member's chosen CRTC mode
    ///     is its own preferred mode;
    ///  2) failing that, assume the tiled mode with the highest refresh rate
    ///     is preferred;
    ///  3) build untiled monitor modes from the tile with the most untiled
    ///     CRTC modes, preferring the one built from its preferred CRTC mode
    ///     if nothing is preferred yet;
    ///  4) if there is still no preferred mode, pick the one with the most
    ///     pixels and the highest refresh rate.
    fn generate_tiled_monitor_modes(&mut self, gpu: &Gpu) {
        self.generate_tiled_modes(gpu);

        if self.preferred_mode.is_none() {
            warn!(
                "tiled monitor on {} didn't have any tiled modes",
                self.spec.connector
            );
        }

        self.generate_untiled_modes(gpu);

        if self.preferred_mode.is_none() {
            warn!(
                "tiled monitor on {} didn't have a valid preferred mode",
                self.spec.connector
            );
            self.preferred_mode = self.find_best_mode();
        }
    }

    fn generate_tiled_modes(&mut self, gpu: &Gpu) {
        let MonitorKind::Tiled { origin_output, .. } = self.kind else {
            unreachable!();
        };
        let origin = gpu.output(origin_output);
        let mut best_mode: Option<usize> = None;

        for &reference_id in &origin.modes {
            let reference_mode = gpu.mode(reference_id);
            if !is_crtc_mode_tiled(origin, reference_mode) {
                continue;
            }

            let Some((mode, is_preferred)) = self.create_tiled_mode(gpu, reference_id) else {
                continue;
            };

            let is_assigned = self.is_mode_assigned(gpu, &mode);
            let Some(index) = self.add_mode(mode, false) else {
                continue;
            };

            if is_assigned {
                self.current_mode = Some(index);
            }
            if is_preferred {
                self.preferred_mode = Some(index);
            }

            best_mode = match best_mode {
                Some(best)
                    if self.modes[best].refresh_rate >= self.modes[index].refresh_rate =>
                {
                    Some(best)
                }
                _ => Some(index),
            };
        }

        if self.preferred_mode.is_none() {
            self.preferred_mode = best_mode;
        }
    }

    /// Builds one tiled monitor mode from a tiled CRTC mode of the origin
    /// tile, or `None` when some member tile has no matching CRTC mode.
    fn create_tiled_mode(
        &self,
        gpu: &Gpu,
        reference_id: ModeId,
    ) -> Option<(MonitorMode, bool)> {
        let reference_mode = gpu.mode(reference_id);
        let (width, height) = self.calculate_tiled_size(gpu);

        let mut crtc_modes = Vec::with_capacity(self.outputs.len());
        let mut is_preferred = true;

        for &output_id in &self.outputs {
            let output = gpu.output(output_id);
            let Some(tiled_mode_id) = find_tiled_crtc_mode(gpu, output, reference_mode) else {
                warn!("no tiled mode found on {}", output.name);
                return None;
            };

            is_preferred = is_preferred && tiled_mode_id == output.preferred_mode;
            crtc_modes.push(Some(tiled_mode_id));
        }

        let mode = self.create_mode(gpu, width, height, reference_mode, true, crtc_modes);
        Some((mode, is_preferred))
    }

    /// The combined size of the tile grid: tiles in the first row contribute
    /// width, tiles in the first column contribute height.
    fn calculate_tiled_size(&self, gpu: &Gpu) -> (i32, i32) {
        let mut width = 0;
        let mut height = 0;

        for &output_id in &self.outputs {
            let tile = gpu.output(output_id).tile_info.unwrap();
            if tile.loc_v_tile == 0 {
                width += tile.tile_w as i32;
            }
            if tile.loc_h_tile == 0 {
                height += tile.tile_h as i32;
            }
        }

        (width, height)
    }

    fn generate_untiled_modes(&mut self, gpu: &Gpu) {
        let main_output_id = self.main_output();
        let main_output = gpu.output(main_output_id);

        for &mode_id in &main_output.modes {
            let crtc_mode = gpu.mode(mode_id);
            if is_crtc_mode_tiled(main_output, crtc_mode) {
                continue;
            }

            let crtc_modes = self
                .outputs
                .iter()
                .map(|&id| (id == main_output_id).then_some(mode_id))
                .collect();
            let mode = self.create_mode(
                gpu,
                crtc_mode.width,
                crtc_mode.height,
                crtc_mode,
                false,
                crtc_modes,
            );

            let is_assigned = self.is_mode_assigned(gpu, &mode);
            let Some(index) = self.add_mode(mode, false) else {
                continue;
            };

            if is_assigned {
                self.current_mode = Some(index);
            }
            if self.preferred_mode.is_none() && mode_id == main_output.preferred_mode {
                self.preferred_mode = Some(index);
            }
        }
    }

    /// Last-resort preferred mode: most pixels, then highest refresh rate;
    /// full ties keep the earlier mode.
    fn find_best_mode(&self) -> Option<usize> {
        let mut best: Option<usize> = None;

        for (index, mode) in self.modes.iter().enumerate() {
            let Some(best_index) = best else {
                best = Some(index);
                continue;
            };
            let best_mode = &self.modes[best_index];

            let area = i64::from(mode.width) * i64::from(mode.height);
            let best_area = i64::from(best_mode.width) * i64::from(best_mode.height);
            if area > best_area {
                best = Some(index);
                continue;
            }

            if mode.refresh_rate > best_mode.refresh_rate {
                best = Some(index);
            }
        }

        best
    }

    fn make_display_name(&self, gpu: &Gpu) -> String {
        if self.is_laptop_panel(gpu) {
            return String::from("Built-in display");
        }

        let (width_mm, height_mm) = self.physical_dimensions(gpu);
        let main_output = gpu.output(self.main_output());

        let mut inches = None;
        let mut product_name = None;
        if width_mm > 0 && height_mm > 0 {
            if !self.has_aspect_as_size(gpu) {
                let diagonal_mm =
                    f64::from(width_mm * width_mm + height_mm * height_mm).sqrt();
                inches = Some(diagonal_to_string(diagonal_mm / 25.4));
            } else {
                product_name = Some(main_output.product.as_str());
            }
        }

        let vendor = main_output.vendor.as_str();
        let vendor_name = if vendor != "unknown" {
            vendor
        } else if inches.is_some() {
            "Unknown"
        } else {
            "Unknown Display"
        };

        match (inches, product_name) {
            (Some(inches), _) => format!("{vendor_name} {inches}"),
            (None, Some(product)) => format!("{vendor_name} {product}"),
            (None, None) => String::from(vendor_name),
        }
    }
}

const KNOWN_DIAGONALS: [f64; 3] = [12.1, 13.3, 15.6];

fn diagonal_to_string(diagonal: f64) -> String {
    for known in KNOWN_DIAGONALS {
        if (known - diagonal).abs() < 0.1 {
            return format!("{known:.1}\"");
        }
    }

    format!("{}\"", (diagonal + 0.5) as i32)
}

fn is_crtc_mode_tiled(output: &Output, mode: &Mode) -> bool {
    let Some(tile) = output.tile_info else {
        return false;
    };
    mode.width == tile.tile_w as i32 && mode.height == tile.tile_h as i32
}

/// Finds the tiled CRTC mode of an output matching the reference mode: the
/// output's preferred mode if itself tiled, else any tiled mode with the same
/// refresh rate and flags.
fn find_tiled_crtc_mode(gpu: &Gpu, output: &Output, reference_mode: &Mode) -> Option<ModeId> {
    if is_crtc_mode_tiled(output, gpu.mode(output.preferred_mode)) {
        return Some(output.preferred_mode);
    }

    for &mode_id in &output.modes {
        let mode = gpu.mode(mode_id);
        if !is_crtc_mode_tiled(output, mode) {
            continue;
        }
        if mode.refresh_rate != reference_mode.refresh_rate {
            continue;
        }
        if mode.flags != reference_mode.flags {
            continue;
        }
        return Some(mode_id);
    }

    None
}

/// The tile with the most untiled CRTC modes; ties keep the origin tile.
fn find_untiled_output(gpu: &Gpu, origin: OutputId, outputs: &[OutputId]) -> OutputId {
    let count_untiled = |id: OutputId| {
        let output = gpu.output(id);
        output
            .modes
            .iter()
            .filter(|&&mode_id| !is_crtc_mode_tiled(output, gpu.mode(mode_id)))
            .count()
    };

    let mut best_output = origin;
    let mut best_count = count_untiled(origin);

    for &output_id in outputs {
        if output_id == origin {
            continue;
        }

        let count = count_untiled(output_id);
        if count > best_count {
            best_count = count;
            best_output = output_id;
        }
    }

    best_output
}

#[cfg(test)]
mod tests {
    use madori_state::SubpixelOrder;

    use super::*;
    use crate::gpu::{ConnectorType, Crtc, CrtcId, TileInfo, TransformSet};

    fn mode(winsys_id: u64, width: i32, height: i32, refresh_rate: f64) -> Mode {
        Mode {
            winsys_id,
            name: format!("{width}x{height}"),
            width,
            height,
            refresh_rate,
            flags: ModeFlags::empty(),
        }
    }

    fn output(winsys_id: u64, name: &str, modes: Vec<ModeId>) -> Output {
        Output {
            winsys_id,
            name: name.to_owned(),
            vendor: String::from("ACME"),
            product: String::from("Panel Pro"),
            serial: String::from("1234"),
            width_mm: 530,
            height_mm: 300,
            preferred_mode: modes[0],
            modes,
            connector_type: ConnectorType::DisplayPort,
            panel_orientation_transform: Transform::Normal,
            tile_info: None,
            assigned_crtc: None,
            possible_crtcs: vec![CrtcId(0)],
            possible_clones: Vec::new(),
            is_primary: false,
            is_presentation: false,
            is_underscanning: false,
            subpixel_order: SubpixelOrder::Unknown,
            suggested_pos: None,
        }
    }

    fn crtc(rect: Rect, current_mode: Option<ModeId>) -> Crtc {
        Crtc {
            winsys_id: 100,
            rect,
            transform: Transform::Normal,
            scale: None,
            current_mode,
            all_transforms: TransformSet::NORMAL,
        }
    }

    fn single_output_gpu(modes: Vec<Mode>) -> Gpu {
        let ids = (0..modes.len()).map(ModeId).collect();
        Gpu {
            modes,
            crtcs: vec![crtc(Rect::new(0, 0, 1920, 1080), None)],
            outputs: vec![output(10, "DP-1", ids)],
        }
    }

    #[test]
    fn normal_monitor_mode_ids() {
        let gpu = single_output_gpu(vec![
            mode(1, 1920, 1080, 60.0),
            mode(2, 1920, 1080, 50.0),
            mode(3, 1280, 720, 60.0),
        ]);
        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));

        let ids: Vec<&str> = monitor.modes.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["1920x1080@60.000", "1920x1080@50.000", "1280x720@60.000"]);
        assert_eq!(monitor.preferred_mode, Some(0));
        assert_eq!(monitor.current_mode, None);
        assert!(!monitor.is_active());
    }

    #[test]
    fn mode_id_round_trip() {
        let gpu = single_output_gpu(vec![mode(1, 1920, 1080, 59.94)]);
        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));

        for (index, m) in monitor.modes.iter().enumerate() {
            assert_eq!(m.id, generate_mode_id(m.width, m.height, m.refresh_rate, m.flags));
            assert_eq!(monitor.mode_index_from_id(&m.id), Some(index));
        }
    }

    #[test]
    fn interlaced_modes_get_distinct_ids() {
        let mut interlaced = mode(2, 1920, 1080, 60.0);
        interlaced.flags = ModeFlags::INTERLACE;
        let gpu = single_output_gpu(vec![mode(1, 1920, 1080, 60.0), interlaced]);
        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));

        let ids: Vec<&str> = monitor.modes.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["1920x1080@60.000", "1920x1080i@60.000"]);
    }

    #[test]
    fn duplicate_id_keeps_preferred_mode() {
        // Two hardware modes with the same id; the one whose flags match the
        // preferred mode's must win even when it comes second.
        let mut doublescan = mode(1, 1920, 1080, 60.0);
        doublescan.flags = ModeFlags::DOUBLE_SCAN;
        let plain = mode(2, 1920, 1080, 60.0);

        let mut gpu = single_output_gpu(vec![doublescan, plain]);
        // Preferred is the plain-flags mode listed second.
        gpu.outputs[0].preferred_mode = ModeId(1);
        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));

        assert_eq!(monitor.modes.len(), 1);
        let preferred = monitor.preferred_mode.unwrap();
        assert_eq!(monitor.modes[preferred].crtc_modes, [Some(ModeId(1))]);
    }

    #[test]
    fn current_mode_follows_crtc_assignment() {
        let mut gpu = single_output_gpu(vec![
            mode(1, 1920, 1080, 60.0),
            mode(2, 1280, 720, 60.0),
        ]);
        gpu.crtcs[0].current_mode = Some(ModeId(1));
        gpu.outputs[0].assigned_crtc = Some(CrtcId(0));

        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));
        assert_eq!(monitor.current_mode, Some(1));
        assert!(monitor.is_active());
    }

    #[test]
    fn current_mode_rederives_after_crtc_change() {
        let mut gpu = single_output_gpu(vec![
            mode(1, 1920, 1080, 60.0),
            mode(2, 1280, 720, 60.0),
        ]);
        gpu.outputs[0].assigned_crtc = Some(CrtcId(0));
        gpu.crtcs[0].current_mode = Some(ModeId(0));

        let mut monitor = Monitor::new_normal(0, &gpu, OutputId(0));
        assert_eq!(monitor.current_mode, Some(0));

        gpu.crtcs[0].current_mode = Some(ModeId(1));
        monitor.derive_current_mode(&gpu);
        assert_eq!(monitor.current_mode, Some(1));

        gpu.crtcs[0].current_mode = None;
        gpu.outputs[0].assigned_crtc = None;
        monitor.derive_current_mode(&gpu);
        assert_eq!(monitor.current_mode, None);
    }

    #[test]
    fn suggested_position_only_on_normal_monitors() {
        let mut gpu = single_output_gpu(vec![mode(1, 1920, 1080, 60.0)]);
        gpu.outputs[0].suggested_pos = Some((1920, 0));
        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));
        assert_eq!(monitor.suggested_position(&gpu), Some((1920, 0)));
        assert!(!monitor.is_tiled());

        let mut gpu = tiled_gpu();
        gpu.outputs[0].suggested_pos = Some((0, 0));
        let monitor = Monitor::new_tiled(0, &gpu, OutputId(0));
        assert!(monitor.is_tiled());
        assert_eq!(monitor.suggested_position(&gpu), None);
    }

    #[test]
    fn rotated_panel_orientation_swaps_logical_size() {
        let mut gpu = single_output_gpu(vec![mode(1, 1200, 1920, 60.0)]);
        gpu.outputs[0].panel_orientation_transform = Transform::_90;
        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));

        assert_eq!(
            (monitor.modes[0].width, monitor.modes[0].height),
            (1920, 1200)
        );
        assert_eq!(monitor.modes[0].id, "1920x1200@60.000");
    }

    fn tile_info(loc_h_tile: u32) -> TileInfo {
        TileInfo {
            group_id: 7,
            flags: 0,
            max_h_tiles: 2,
            max_v_tiles: 1,
            loc_h_tile,
            loc_v_tile: 0,
            tile_w: 1920,
            tile_h: 1200,
        }
    }

    fn tiled_gpu() -> Gpu {
        // 2x1 grid of 1920x1200 tiles at 60 Hz, plus one untiled mode on the
        // second tile.
        let modes = vec![mode(1, 1920, 1200, 60.0), mode(2, 1280, 1024, 60.0)];

        let mut left = output(10, "DP-1", vec![ModeId(0)]);
        left.tile_info = Some(tile_info(0));
        let mut right = output(11, "DP-2", vec![ModeId(0), ModeId(1)]);
        right.tile_info = Some(tile_info(1));

        Gpu {
            modes,
            crtcs: vec![
                crtc(Rect::new(0, 0, 1920, 1200), None),
                crtc(Rect::new(1920, 0, 1920, 1200), None),
            ],
            outputs: vec![left, right],
        }
    }

    #[test]
    fn tiled_modes_sum_tile_sizes() {
        let gpu = tiled_gpu();
        let monitor = Monitor::new_tiled(0, &gpu, OutputId(0));

        let tiled: Vec<&MonitorMode> =
            monitor.modes.iter().filter(|m| m.is_tiled).collect();
        assert_eq!(tiled.len(), 1);
        assert_eq!((tiled[0].width, tiled[0].height), (3840, 1200));

        // Both tiles prefer the 60 Hz tiled mode, so it is the monitor's
        // preferred mode.
        let preferred = &monitor.modes[monitor.preferred_mode.unwrap()];
        assert!(preferred.is_tiled);
        assert_eq!(preferred.refresh_rate, 60.0);
        assert_eq!(preferred.crtc_modes, [Some(ModeId(0)), Some(ModeId(0))]);
        assert_eq!(preferred.id, "3840x1200@60.000");
    }

    #[test]
    fn untiled_fallback_uses_the_richer_tile() {
        let gpu = tiled_gpu();
        let monitor = Monitor::new_tiled(0, &gpu, OutputId(0));

        // DP-2 has the only untiled mode, so it is the main output.
        assert_eq!(monitor.main_output(), OutputId(1));
        assert_eq!(monitor.spec.connector, "DP-2");

        let untiled = monitor
            .modes
            .iter()
            .find(|m| !m.is_tiled)
            .expect("untiled fallback mode");
        assert_eq!((untiled.width, untiled.height), (1280, 1024));
        // Everything but the main tile is off.
        assert_eq!(untiled.crtc_modes, [None, Some(ModeId(1))]);
    }

    #[test]
    fn tiled_current_mode_requires_all_members() {
        let mut gpu = tiled_gpu();
        gpu.outputs[0].assigned_crtc = Some(CrtcId(0));
        gpu.outputs[1].assigned_crtc = Some(CrtcId(1));
        gpu.crtcs[0].current_mode = Some(ModeId(0));
        gpu.crtcs[1].current_mode = Some(ModeId(0));

        let monitor = Monitor::new_tiled(0, &gpu, OutputId(0));
        let current = &monitor.modes[monitor.current_mode.unwrap()];
        assert!(current.is_tiled);
        assert_eq!(current.refresh_rate, 60.0);

        // One member on the wrong mode means no current mode at all.
        let mut gpu = tiled_gpu();
        gpu.outputs[0].assigned_crtc = Some(CrtcId(0));
        gpu.outputs[1].assigned_crtc = Some(CrtcId(1));
        gpu.crtcs[0].current_mode = Some(ModeId(0));
        gpu.crtcs[1].current_mode = Some(ModeId(1));
        let monitor = Monitor::new_tiled(0, &gpu, OutputId(0));
        assert_eq!(monitor.current_mode, None);
    }

    #[test]
    fn missing_tile_component_discards_candidate() {
        let mut gpu = tiled_gpu();
        // Add a 30 Hz tiled mode on the left tile only; the right tile can't
        // contribute a matching mode, so only the 60 Hz combination survives.
        gpu.modes.push(mode(3, 1920, 1200, 30.0));
        gpu.outputs[0].modes = vec![ModeId(0), ModeId(2)];
        gpu.outputs[1].preferred_mode = ModeId(1);

        let monitor = Monitor::new_tiled(0, &gpu, OutputId(0));
        let tiled: Vec<&MonitorMode> =
            monitor.modes.iter().filter(|m| m.is_tiled).collect();
        assert_eq!(tiled.len(), 1);
        assert_eq!(tiled[0].refresh_rate, 60.0);
    }

    #[test]
    fn tiled_fallback_preferred_by_refresh_rate() {
        let mut gpu = tiled_gpu();
        // Both tiles prefer an untiled mode, so no tiled combination is
        // everyone's preference and the highest refresh rate wins.
        gpu.modes.push(mode(3, 1920, 1200, 30.0));
        gpu.outputs[0].modes = vec![ModeId(0), ModeId(2), ModeId(1)];
        gpu.outputs[0].preferred_mode = ModeId(1);
        gpu.outputs[1].modes = vec![ModeId(0), ModeId(2), ModeId(1)];
        gpu.outputs[1].preferred_mode = ModeId(1);

        let monitor = Monitor::new_tiled(0, &gpu, OutputId(0));
        let preferred = &monitor.modes[monitor.preferred_mode.unwrap()];
        assert!(preferred.is_tiled);
        assert_eq!(preferred.refresh_rate, 60.0);
    }

    #[test]
    fn monitor_without_tiled_modes_prefers_untiled() {
        let mut gpu = tiled_gpu();
        // No tile has any tiled mode; the untiled fallback still produces a
        // preferred mode.
        gpu.outputs[0].modes = vec![ModeId(1)];
        gpu.outputs[0].preferred_mode = ModeId(1);
        gpu.outputs[1].modes = vec![ModeId(1)];
        gpu.outputs[1].preferred_mode = ModeId(1);

        let monitor = Monitor::new_tiled(0, &gpu, OutputId(0));
        assert!(!monitor.is_active());
        let preferred = &monitor.modes[monitor.preferred_mode.unwrap()];
        assert!(!preferred.is_tiled);
        assert_eq!((preferred.width, preferred.height), (1280, 1024));
    }

    #[test]
    fn derive_layout_tiled_bounding_box() {
        let mut gpu = tiled_gpu();
        gpu.outputs[0].assigned_crtc = Some(CrtcId(0));
        gpu.outputs[1].assigned_crtc = Some(CrtcId(1));
        gpu.crtcs[0].current_mode = Some(ModeId(0));
        gpu.crtcs[1].current_mode = Some(ModeId(0));

        let monitor = Monitor::new_tiled(0, &gpu, OutputId(0));
        assert_eq!(monitor.derive_layout(&gpu), Some(Rect::new(0, 0, 3840, 1200)));
    }

    #[test]
    fn tile_coordinates_per_transform() {
        let gpu = tiled_gpu();
        let monitor = Monitor::new_tiled(0, &gpu, OutputId(0));
        let tiled_mode = monitor.modes.iter().find(|m| m.is_tiled).unwrap();

        let right = OutputId(1);
        assert_eq!(
            monitor.calculate_crtc_pos(&gpu, tiled_mode, right, Transform::Normal),
            (1920, 0)
        );
        assert_eq!(
            monitor.calculate_crtc_pos(&gpu, tiled_mode, right, Transform::_180),
            (0, 0)
        );
        assert_eq!(
            monitor.calculate_crtc_pos(&gpu, tiled_mode, right, Transform::_90),
            (0, 1920)
        );

        let untiled_mode = monitor.modes.iter().find(|m| !m.is_tiled).unwrap();
        assert_eq!(
            monitor.calculate_crtc_pos(&gpu, untiled_mode, right, Transform::Normal),
            (0, 0)
        );
    }

    #[test]
    fn display_name_with_diagonal() {
        let gpu = single_output_gpu(vec![mode(1, 1920, 1080, 60.0)]);
        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));
        // 530x300 mm is a 24" diagonal.
        assert_eq!(monitor.display_name, "ACME 24\"");
    }

    #[test]
    fn display_name_known_diagonal_keeps_decimal() {
        let mut gpu = single_output_gpu(vec![mode(1, 1920, 1080, 60.0)]);
        // 277x156 mm diagonal is about 12.5"; 268x151 mm is 12.1".
        gpu.outputs[0].width_mm = 268;
        gpu.outputs[0].height_mm = 151;
        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));
        assert_eq!(monitor.display_name, "ACME 12.1\"");
    }

    #[test]
    fn display_name_laptop_panel() {
        let mut gpu = single_output_gpu(vec![mode(1, 2560, 1600, 60.0)]);
        gpu.outputs[0].name = String::from("eDP-1");
        gpu.outputs[0].connector_type = ConnectorType::Edp;
        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));
        assert_eq!(monitor.display_name, "Built-in display");
    }

    #[test]
    fn display_name_aspect_as_size_uses_product() {
        let mut gpu = single_output_gpu(vec![mode(1, 1920, 1080, 60.0)]);
        gpu.outputs[0].width_mm = 16;
        gpu.outputs[0].height_mm = 9;
        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));
        assert_eq!(monitor.display_name, "ACME Panel Pro");
    }

    #[test]
    fn display_name_unknown_vendor() {
        let mut gpu = single_output_gpu(vec![mode(1, 1920, 1080, 60.0)]);
        gpu.outputs[0].vendor = String::from("unknown");
        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));
        assert_eq!(monitor.display_name, "Unknown 24\"");

        let mut gpu = single_output_gpu(vec![mode(1, 1920, 1080, 60.0)]);
        gpu.outputs[0].vendor = String::from("unknown");
        gpu.outputs[0].width_mm = 0;
        gpu.outputs[0].height_mm = 0;
        let monitor = Monitor::new_normal(0, &gpu, OutputId(0));
        assert_eq!(monitor.display_name, "Unknown Display");
    }

    #[test]
    fn preferred_mode_is_always_present() {
        let gpu = tiled_gpu();
        let monitor = Monitor::new_tiled(0, &gpu, OutputId(0));
        let preferred = monitor.preferred_mode.unwrap();
        assert!(preferred < monitor.modes.len());
        assert_eq!(
            monitor.mode_index_from_id(&monitor.modes[preferred].id),
            Some(preferred)
        );
    }

    #[test]
    fn spec_ordering_groups_by_identity_first() {
        let a = MonitorSpec {
            connector: String::from("DP-2"),
            vendor: String::from("ACME"),
            product: String::from("A"),
            serial: String::from("1"),
        };
        let b = MonitorSpec {
            connector: String::from("DP-1"),
            vendor: String::from("ACME"),
            product: String::from("B"),
            serial: String::from("1"),
        };
        assert!(a < b);
    }
}
