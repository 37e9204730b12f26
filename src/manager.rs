//! The monitor manager: owns the decoded GPUs, the derived monitors and the
//! placed logical monitors, and rebuilds all of them wholesale on every
//! reload.

use madori_config::{Config, OutputName};
use madori_state::{
    LayoutReport, LogicalMonitorReport, ModeReport, MonitorReport, ScreenSnapshot, Transform,
};

use crate::backend::randr;
use crate::geometry::{Point, Rect};
use crate::gpu::{Gpu, ModeFlags};
use crate::logical::{Direction, LogicalMonitor};
use crate::monitor::{Monitor, MonitorMode, MonitorSpec};
use crate::scale::{self, ScaleConstraints};

/// Tolerance when checking whether an exact scale is supported.
const SCALE_EPSILON: f64 = 0.000001;

/// Due to integer and possibly inverse scaling applied to the CRTC the
/// decoded scale may not match a supported scale exactly, so snapping from
/// CRTC state uses a more relaxed threshold.
const CRTC_SCALE_THRESHOLD: f64 = 0.001;

/// One entry of a requested layout for the configured rebuild path.
#[derive(Debug, Clone)]
pub struct LayoutEntry {
    /// Identities of the monitors backing this logical monitor; more than
    /// one when mirroring.
    pub monitor_specs: Vec<MonitorSpec>,
    pub rect: Rect,
    pub scale: f64,
    pub transform: Transform,
    pub is_primary: bool,
}

#[derive(Debug, Default)]
pub struct MonitorManager {
    pub gpus: Vec<Gpu>,
    pub monitors: Vec<Monitor>,
    pub logical_monitors: Vec<LogicalMonitor>,
    pub primary_logical_monitor: Option<usize>,
    pub min_size: (i32, i32),
    pub max_size: (i32, i32),
    pub screen_size: (i32, i32),
}

impl MonitorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds everything from a fresh hardware snapshot. The previous
    /// monitor and logical monitor sets are dropped, never mutated in place.
    pub fn reload(&mut self, snapshot: &ScreenSnapshot, config: &Config) {
        let screen = randr::decode_snapshot(snapshot, config.fractional_scaling);
        self.min_size = screen.min_size;
        self.max_size = screen.max_size;
        self.screen_size = screen.screen_size;
        self.gpus = screen.gpus;

        self.rebuild_monitors();
        self.rebuild_logical_derived(config);
    }

    fn rebuild_monitors(&mut self) {
        self.monitors.clear();

        for (gpu_index, gpu) in self.gpus.iter().enumerate() {
            for output_id in gpu.output_ids() {
                let output = gpu.output(output_id);

                match output.tile_info {
                    Some(info) if info.group_id != 0 => {
                        // One monitor per tile group, built from its origin
                        // tile; the other tiles are members, not monitors.
                        if info.is_origin() {
                            self.monitors
                                .push(Monitor::new_tiled(gpu_index, gpu, output_id));
                        }
                    }
                    _ => self
                        .monitors
                        .push(Monitor::new_normal(gpu_index, gpu, output_id)),
                }
            }
        }
    }

    /// Rebuilds the logical monitor set from live CRTC state, used when the
    /// display server owns the layout. Monitors with equal derived
    /// rectangles merge into one logical monitor (mirroring).
    pub fn rebuild_logical_derived(&mut self, config: &Config) {
        self.logical_monitors.clear();
        self.primary_logical_monitor = None;
        for monitor in &mut self.monitors {
            monitor.logical_monitor = None;
        }

        // Without fractional scaling every logical monitor shares one
        // integer scale.
        let global_scale = if config.fractional_scaling {
            None
        } else {
            Some(match config.scale_factor {
                Some(factor) => f64::from(factor),
                None => self.derive_calculated_global_scale(config),
            })
        };

        let mut primary_logical_monitor = None;

        for index in 0..self.monitors.len() {
            if !self.monitors[index].is_active() {
                continue;
            }

            let monitor = &self.monitors[index];
            let gpu = &self.gpus[monitor.gpu];
            let Some(layout) = monitor.derive_layout(gpu) else {
                continue;
            };
            let is_primary = monitor.is_primary(gpu);

            let logical_index = match self
                .logical_monitors
                .iter()
                .position(|logical| logical.rect == layout)
            {
                Some(existing) => existing,
                None => {
                    let scale = match global_scale {
                        Some(global) => global.round(),
                        None => self.derive_monitor_scale(config, index),
                    };

                    let monitor = &self.monitors[index];
                    let gpu = &self.gpus[monitor.gpu];
                    let number = self.logical_monitors.len();
                    self.logical_monitors.push(LogicalMonitor {
                        number,
                        winsys_id: gpu.output(monitor.main_output()).winsys_id,
                        rect: layout,
                        scale,
                        transform: self.derive_monitor_transform(monitor),
                        is_primary: false,
                        is_presentation: true,
                        monitors: Vec::new(),
                    });
                    number
                }
            };

            self.add_monitor_to_logical(logical_index, index);

            if is_primary {
                primary_logical_monitor = Some(logical_index);
            }
        }

        // If no monitor was marked as primary, fall back on marking the
        // first logical monitor the primary one.
        if primary_logical_monitor.is_none() && !self.logical_monitors.is_empty() {
            primary_logical_monitor = Some(0);
        }
        self.set_primary_logical_monitor(primary_logical_monitor);
    }

    /// Rebuilds the logical monitor set from a requested layout. Entries
    /// whose monitor specs resolve to nothing are skipped with a warning.
    pub fn rebuild_logical_configured(&mut self, layout: &[LayoutEntry]) {
        self.logical_monitors.clear();
        self.primary_logical_monitor = None;
        for monitor in &mut self.monitors {
            monitor.logical_monitor = None;
        }

        let mut primary_logical_monitor = None;

        for entry in layout {
            let mut monitor_indices = Vec::with_capacity(entry.monitor_specs.len());
            for spec in &entry.monitor_specs {
                match self.monitors.iter().position(|m| m.spec == *spec) {
                    Some(index) => monitor_indices.push(index),
                    None => warn!("no monitor matching {}, skipping it", spec.connector),
                }
            }

            let Some(&first) = monitor_indices.first() else {
                warn!("requested logical monitor at {:?} has no monitors", entry.rect);
                continue;
            };

            let number = self.logical_monitors.len();
            let monitor = &self.monitors[first];
            let winsys_id = self.gpus[monitor.gpu]
                .output(monitor.main_output())
                .winsys_id;
            self.logical_monitors.push(LogicalMonitor {
                number,
                winsys_id,
                rect: entry.rect,
                scale: entry.scale,
                transform: entry.transform,
                is_primary: false,
                is_presentation: true,
                monitors: Vec::new(),
            });

            for monitor_index in monitor_indices {
                self.add_monitor_to_logical(number, monitor_index);
            }

            if entry.is_primary {
                primary_logical_monitor = Some(number);
            }
        }

        if primary_logical_monitor.is_none() && !self.logical_monitors.is_empty() {
            primary_logical_monitor = Some(0);
        }
        self.set_primary_logical_monitor(primary_logical_monitor);
    }

    fn set_primary_logical_monitor(&mut self, index: Option<usize>) {
        self.primary_logical_monitor = index;
        if let Some(index) = index {
            self.logical_monitors[index].is_primary = true;
        }
    }

    fn add_monitor_to_logical(&mut self, logical_index: usize, monitor_index: usize) {
        self.logical_monitors[logical_index]
            .monitors
            .push(monitor_index);

        // Presentation status is the AND over every member output.
        let mut is_presentation = self.logical_monitors[logical_index].is_presentation;
        for &index in &self.logical_monitors[logical_index].monitors {
            let monitor = &self.monitors[index];
            let gpu = &self.gpus[monitor.gpu];
            for &output_id in &monitor.outputs {
                is_presentation = is_presentation && gpu.output(output_id).is_presentation;
            }
        }
        self.logical_monitors[logical_index].is_presentation = is_presentation;

        self.monitors[monitor_index].logical_monitor = Some(logical_index);
    }

    /// The transform a logical monitor inherits from live CRTC state: the
    /// main output's CRTC transform with the fixed panel orientation undone.
    fn derive_monitor_transform(&self, monitor: &Monitor) -> Transform {
        let gpu = &self.gpus[monitor.gpu];
        let output = gpu.output(monitor.main_output());
        let transform = match output.assigned_crtc {
            Some(crtc) => gpu.crtc(crtc).transform,
            None => Transform::Normal,
        };

        transform.compose(output.panel_orientation_transform.invert())
    }

    fn derive_monitor_scale(&self, config: &Config, index: usize) -> f64 {
        let monitor = &self.monitors[index];

        if let Some(scale) = self.derive_scale_from_crtc(config, monitor) {
            return scale;
        }

        if !config.outputs.0.is_empty() {
            let entry = config.outputs.find(&output_name(&monitor.spec));
            if let Some(scale) = entry.and_then(|entry| entry.scale) {
                return scale.0;
            }
            warn!(
                "no configured scale for {}, using scale 1",
                monitor.spec.connector
            );
            return 1.0;
        }

        self.calculate_monitor_scale(config, monitor)
    }

    /// Recovers the logical scale from the CRTC transform matrix, snapped to
    /// the monitor's supported scales.
    fn derive_scale_from_crtc(&self, config: &Config, monitor: &Monitor) -> Option<f64> {
        if !config.fractional_scaling {
            return None;
        }

        let gpu = &self.gpus[monitor.gpu];
        let output = gpu.output(monitor.main_output());
        let crtc_scale = gpu.crtc(output.assigned_crtc?).scale?;
        let mode = &monitor.modes[monitor.current_mode?];

        match self.is_scale_supported_with_threshold(config, mode, crtc_scale, CRTC_SCALE_THRESHOLD)
        {
            Some(snapped) => Some(snapped),
            None => {
                warn!(
                    "CRTC scale {crtc_scale} is not a supported scale on {}, keeping it",
                    monitor.spec.connector
                );
                Some(crtc_scale)
            }
        }
    }

    fn calculate_monitor_scale(&self, config: &Config, monitor: &Monitor) -> f64 {
        let gpu = &self.gpus[monitor.gpu];
        match monitor.current_mode {
            Some(index) => {
                monitor.calculate_mode_scale(gpu, &monitor.modes[index], config.scale_factor)
            }
            None => 1.0,
        }
    }

    /// The one scale shared by every logical monitor when fractional scaling
    /// is off: the primary monitor's calculated scale when every other
    /// active monitor supports it, else the largest scale of the remaining
    /// monitors that everyone supports.
    fn derive_calculated_global_scale(&self, config: &Config) -> f64 {
        let mut scale = 1.0;
        let primary = self.primary_monitor_index();

        if let Some(primary) = primary.filter(|&index| self.monitors[index].is_active()) {
            scale = self.calculate_monitor_scale(config, &self.monitors[primary]);
            if self.is_scale_supported_by_other_monitors(config, primary, scale) {
                return scale;
            }
        }

        for (index, monitor) in self.monitors.iter().enumerate() {
            if Some(index) == primary || !monitor.is_active() {
                continue;
            }

            let monitor_scale = self.calculate_monitor_scale(config, monitor);
            if self.is_scale_supported_by_other_monitors(config, index, monitor_scale) {
                scale = scale.max(monitor_scale);
            }
        }

        scale
    }

    fn is_scale_supported_by_other_monitors(
        &self,
        config: &Config,
        skip: usize,
        scale: f64,
    ) -> bool {
        for (index, monitor) in self.monitors.iter().enumerate() {
            if index == skip || !monitor.is_active() {
                continue;
            }

            let Some(mode) = monitor.current_mode.map(|i| &monitor.modes[i]) else {
                continue;
            };
            if self
                .is_scale_supported_with_threshold(config, mode, scale, SCALE_EPSILON)
                .is_none()
            {
                return false;
            }
        }

        true
    }

    /// Finds a supported scale within `threshold` of `scale` for the mode and
    /// returns the snapped value.
    pub fn is_scale_supported_with_threshold(
        &self,
        config: &Config,
        mode: &MonitorMode,
        scale: f64,
        threshold: f64,
    ) -> Option<f64> {
        self.supported_scales_for_mode(config, mode)
            .into_iter()
            .find(|supported| (supported - scale).abs() < threshold)
    }

    pub fn supported_scales_for_mode(&self, config: &Config, mode: &MonitorMode) -> Vec<f64> {
        let mut constraints = ScaleConstraints::empty();
        if !config.fractional_scaling {
            constraints |= ScaleConstraints::NO_FRACTIONAL;
        }
        scale::supported_scales(mode.width, mode.height, constraints)
    }

    /// The largest CRTC scale currently in use, at least 1.0.
    pub fn max_crtc_scale(&self) -> f64 {
        let mut scale = 1.0f64;
        for monitor in &self.monitors {
            let gpu = &self.gpus[monitor.gpu];
            let output = gpu.output(monitor.main_output());
            if let Some(crtc) = output.assigned_crtc {
                scale = scale.max(gpu.crtc(crtc).scale.unwrap_or(1.0));
            }
        }
        scale
    }

    fn primary_monitor_index(&self) -> Option<usize> {
        self.monitors.iter().position(|monitor| {
            let gpu = &self.gpus[monitor.gpu];
            monitor.is_primary(gpu)
        })
    }

    pub fn monitor_from_spec(&self, spec: &MonitorSpec) -> Option<&Monitor> {
        self.monitors.iter().find(|monitor| monitor.spec == *spec)
    }

    pub fn monitor_from_connector(&self, connector: &str) -> Option<&Monitor> {
        self.monitors
            .iter()
            .find(|monitor| monitor.spec.connector == connector)
    }

    pub fn logical_monitor_by_number(&self, number: usize) -> Option<&LogicalMonitor> {
        self.logical_monitors.get(number)
    }

    pub fn logical_monitor_at(&self, point: Point) -> Option<&LogicalMonitor> {
        self.logical_monitors
            .iter()
            .find(|logical| logical.rect.contains(point))
    }

    /// The logical monitor with the largest overlap with `rect`. An empty
    /// rectangle matches by position; with no overlap at all the primary
    /// logical monitor wins.
    pub fn logical_monitor_from_rect(&self, rect: Rect) -> Option<&LogicalMonitor> {
        let mut best: Option<&LogicalMonitor> = None;
        let mut best_area = 0;

        for logical in &self.logical_monitors {
            let Some(intersection) = logical.rect.intersection(rect) else {
                continue;
            };
            let area = intersection.area();
            if area > best_area {
                best_area = area;
                best = Some(logical);
            }
        }

        if best.is_none() && (rect.w == 0 || rect.h == 0) {
            best = self.logical_monitor_at(Point::new(rect.x, rect.y));
        }

        best.or_else(|| {
            self.primary_logical_monitor
                .map(|index| &self.logical_monitors[index])
        })
    }

    pub fn logical_monitor_neighbor(
        &self,
        logical: &LogicalMonitor,
        direction: Direction,
    ) -> Option<&LogicalMonitor> {
        self.logical_monitors
            .iter()
            .find(|other| logical.has_neighbor(other, direction))
    }

    /// The full derived state in wire form, monitors sorted builtin-first
    /// then by connector name.
    pub fn layout_report(&self, config: &Config) -> LayoutReport {
        let mut indices: Vec<usize> = (0..self.monitors.len()).collect();
        indices.sort_by(|&a, &b| {
            let monitor_a = &self.monitors[a];
            let monitor_b = &self.monitors[b];
            let builtin_a = monitor_a.is_laptop_panel(&self.gpus[monitor_a.gpu]);
            let builtin_b = monitor_b.is_laptop_panel(&self.gpus[monitor_b.gpu]);
            builtin_b
                .cmp(&builtin_a)
                .then_with(|| monitor_a.spec.connector.cmp(&monitor_b.spec.connector))
        });

        let monitors = indices
            .into_iter()
            .map(|index| {
                let monitor = &self.monitors[index];
                let gpu = &self.gpus[monitor.gpu];

                MonitorReport {
                    connector: monitor.spec.connector.clone(),
                    vendor: monitor.spec.vendor.clone(),
                    product: monitor.spec.product.clone(),
                    serial: monitor.spec.serial.clone(),
                    display_name: monitor.display_name.clone(),
                    is_builtin: monitor.is_laptop_panel(gpu),
                    is_active: monitor.is_active(),
                    modes: monitor
                        .modes
                        .iter()
                        .enumerate()
                        .filter(|&(mode_index, mode)| {
                            // Small non-preferred modes aren't worth listing.
                            match monitor.preferred_mode.map(|i| &monitor.modes[i]) {
                                Some(preferred) => scale::mode_should_be_advertised(
                                    mode.width,
                                    mode.height,
                                    preferred.width,
                                    preferred.height,
                                ),
                                None => monitor.current_mode == Some(mode_index),
                            }
                        })
                        .map(|(mode_index, mode)| ModeReport {
                            id: mode.id.clone(),
                            width: mode.width,
                            height: mode.height,
                            refresh_rate: mode.refresh_rate,
                            preferred_scale: monitor.calculate_mode_scale(
                                gpu,
                                mode,
                                config.scale_factor,
                            ),
                            supported_scales: self.supported_scales_for_mode(config, mode),
                            is_preferred: monitor.preferred_mode == Some(mode_index),
                            is_current: monitor.current_mode == Some(mode_index),
                            is_interlaced: mode.flags.contains(ModeFlags::INTERLACE),
                        })
                        .collect(),
                }
            })
            .collect();

        let logical_monitors = self
            .logical_monitors
            .iter()
            .map(|logical| LogicalMonitorReport {
                x: logical.rect.x,
                y: logical.rect.y,
                width: logical.rect.w as u32,
                height: logical.rect.h as u32,
                scale: logical.scale,
                transform: logical.transform,
                is_primary: logical.is_primary,
                is_presentation: logical.is_presentation,
                monitors: logical
                    .monitors
                    .iter()
                    .map(|&index| self.monitors[index].spec.connector.clone())
                    .collect(),
            })
            .collect();

        LayoutReport {
            monitors,
            logical_monitors,
        }
    }
}

fn output_name(spec: &MonitorSpec) -> OutputName {
    let known = |value: &str| (value != "unknown").then(|| value.to_owned());
    OutputName {
        connector: spec.connector.clone(),
        make: known(&spec.vendor),
        model: known(&spec.product),
        serial: known(&spec.serial),
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;
    use madori_state::{CrtcRecord, GpuRecord, ModeRecord, OutputRecord, SubpixelOrder};

    use super::*;

    fn mode_record(id: u64, width: u32, height: u32, refresh: f64) -> ModeRecord {
        // Encode the refresh rate through the timing totals.
        let h_total = width + 80;
        let v_total = height + 40;
        let dot_clock = (refresh * f64::from(h_total) * f64::from(v_total)).round() as u64;
        ModeRecord {
            id,
            width,
            height,
            dot_clock,
            h_total,
            v_total,
            flags: 0,
        }
    }

    fn crtc_record(id: u64, x: i32, y: i32, width: u32, height: u32, mode: Option<u64>) -> CrtcRecord {
        CrtcRecord {
            id,
            x,
            y,
            width,
            height,
            panning: None,
            mode,
            rotation: 1,
            rotations: 1,
            transform_matrix: None,
        }
    }

    fn output_record(id: u64, name: &str, modes: Vec<u64>, crtc: Option<u64>) -> OutputRecord {
        OutputRecord {
            id,
            name: name.to_owned(),
            vendor: Some("ACME".to_owned()),
            product: Some("Panel Pro".to_owned()),
            serial: Some(format!("{id}")),
            width_mm: 530,
            height_mm: 300,
            connected: true,
            modes,
            crtc,
            possible_crtcs: vec![100, 101],
            clones: Vec::new(),
            connector_type: None,
            panel_orientation: None,
            tile: None,
            presentation: false,
            underscanning: false,
            subpixel: SubpixelOrder::Unknown,
            suggested_pos: None,
        }
    }

    fn two_output_snapshot() -> ScreenSnapshot {
        ScreenSnapshot {
            min_size: (320, 200),
            max_size: (16384, 16384),
            screen_size: (3840, 1080),
            dpi_scale_factor: None,
            primary: Some(11),
            gpus: vec![GpuRecord {
                modes: vec![
                    mode_record(1, 1920, 1080, 60.0),
                    mode_record(2, 1280, 720, 60.0),
                ],
                crtcs: vec![
                    crtc_record(100, 0, 0, 1920, 1080, Some(1)),
                    crtc_record(101, 1920, 0, 1920, 1080, Some(1)),
                ],
                outputs: vec![
                    output_record(10, "DP-1", vec![1, 2], Some(100)),
                    output_record(11, "HDMI-1", vec![1], Some(101)),
                ],
            }],
        }
    }

    #[test]
    fn reload_builds_side_by_side_layout() {
        let mut manager = MonitorManager::new();
        manager.reload(&two_output_snapshot(), &Config::default());

        assert_eq!(manager.monitors.len(), 2);
        assert_eq!(manager.logical_monitors.len(), 2);
        assert_eq!(manager.screen_size, (3840, 1080));

        let left = manager.logical_monitor_at(Point::new(0, 0)).unwrap();
        assert_eq!(left.rect, Rect::new(0, 0, 1920, 1080));
        let right = manager.logical_monitor_at(Point::new(1920, 0)).unwrap();
        assert_eq!(right.rect, Rect::new(1920, 0, 1920, 1080));
        assert_eq!(
            manager.logical_monitor_neighbor(left, Direction::Right).unwrap().number,
            right.number
        );

        // HDMI-1 is the hardware primary.
        assert!(right.is_primary);
        assert_eq!(manager.primary_logical_monitor, Some(right.number));
        let monitor = manager.monitor_from_connector("HDMI-1").unwrap();
        assert_eq!(monitor.logical_monitor, Some(right.number));

        let spec = monitor.spec.clone();
        assert_eq!(
            manager.monitor_from_spec(&spec).unwrap().spec.connector,
            "HDMI-1"
        );
        assert_eq!(
            manager.logical_monitor_by_number(right.number).unwrap().rect,
            right.rect
        );
        assert!(manager.logical_monitor_by_number(99).is_none());
    }

    #[test]
    fn mirrored_monitors_share_a_logical_monitor() {
        let mut snapshot = two_output_snapshot();
        // Both CRTCs scan out the same rectangle.
        snapshot.gpus[0].crtcs[1].x = 0;
        snapshot.screen_size = (1920, 1080);

        let mut manager = MonitorManager::new();
        manager.reload(&snapshot, &Config::default());

        assert_eq!(manager.monitors.len(), 2);
        assert_eq!(manager.logical_monitors.len(), 1);
        let logical = &manager.logical_monitors[0];
        assert_eq!(logical.monitors.len(), 2);
        assert!(logical.is_primary);
    }

    #[test]
    fn presentation_flag_is_the_and_over_members() {
        let mut snapshot = two_output_snapshot();
        snapshot.gpus[0].crtcs[1].x = 0;
        snapshot.gpus[0].outputs[0].presentation = true;

        let mut manager = MonitorManager::new();
        manager.reload(&snapshot, &Config::default());
        assert!(!manager.logical_monitors[0].is_presentation);

        snapshot.gpus[0].outputs[1].presentation = true;
        manager.reload(&snapshot, &Config::default());
        assert!(manager.logical_monitors[0].is_presentation);
    }

    #[test]
    fn inactive_monitor_gets_no_logical_monitor() {
        let mut snapshot = two_output_snapshot();
        snapshot.gpus[0].outputs[1].crtc = None;
        snapshot.gpus[0].crtcs[1].mode = None;

        let mut manager = MonitorManager::new();
        manager.reload(&snapshot, &Config::default());

        assert_eq!(manager.monitors.len(), 2);
        assert_eq!(manager.logical_monitors.len(), 1);
        let monitor = manager.monitor_from_connector("HDMI-1").unwrap();
        assert!(!monitor.is_active());
        assert_eq!(monitor.logical_monitor, None);
        // The primary fell back to the only logical monitor.
        assert_eq!(manager.primary_logical_monitor, Some(0));
    }

    #[test]
    fn global_scale_factor_applies_to_every_logical_monitor() {
        let config = Config {
            scale_factor: Some(2),
            ..Default::default()
        };

        let mut manager = MonitorManager::new();
        manager.reload(&two_output_snapshot(), &config);

        for logical in &manager.logical_monitors {
            assert_eq!(logical.scale, 2.0);
        }
    }

    #[test]
    fn global_scale_factor_wins_on_the_calculated_fallback() {
        let config = Config::parse(
            "test.kdl",
            r#"
            scale-factor 2
            fractional-scaling
            "#,
        )
        .unwrap();

        // No transform matrices and no per-output entries, so the scale
        // falls through to the mode heuristics, where the configured
        // factor still takes precedence.
        let mut manager = MonitorManager::new();
        manager.reload(&two_output_snapshot(), &config);

        assert_eq!(manager.logical_monitors.len(), 2);
        for logical in &manager.logical_monitors {
            assert_eq!(logical.scale, 2.0);
        }

        let report = manager.layout_report(&config);
        for mode in &report.monitors[0].modes {
            assert_eq!(mode.preferred_scale, 2.0);
        }
    }

    #[test]
    fn fractional_scaling_derives_scale_from_crtc() {
        let mut snapshot = two_output_snapshot();
        // 1.5 decoded from the transform matrix; the explicit DPI factor
        // keeps the multiplier at 1.
        snapshot.gpus[0].crtcs[0].transform_matrix = Some([1.0 / 1.5, 1.0 / 1.5]);
        snapshot.dpi_scale_factor = Some(1.0);

        let config = Config {
            fractional_scaling: true,
            ..Default::default()
        };
        let mut manager = MonitorManager::new();
        manager.reload(&snapshot, &config);

        let left = manager.logical_monitor_at(Point::new(0, 0)).unwrap();
        assert!((left.scale - 1.5).abs() < 1e-9);
        let right = manager.logical_monitor_at(Point::new(1920, 0)).unwrap();
        assert_eq!(right.scale, 1.0);
    }

    #[test]
    fn per_output_config_scale_applies_without_native_scaling() {
        let config = Config::parse(
            "test.kdl",
            r#"
            fractional-scaling
            output "DP-1" { scale 1.25; }
            "#,
        )
        .unwrap();

        let mut manager = MonitorManager::new();
        manager.reload(&two_output_snapshot(), &config);

        // No transform matrix means no CRTC scale to derive, so the config
        // entry applies; HDMI-1 has no entry and falls back to 1.0.
        let left = manager.logical_monitor_at(Point::new(0, 0)).unwrap();
        assert_eq!(left.scale, 1.25);
        let right = manager.logical_monitor_at(Point::new(1920, 0)).unwrap();
        assert_eq!(right.scale, 1.0);
    }

    #[test]
    fn configured_rebuild_places_entries_and_skips_unresolved() {
        let mut manager = MonitorManager::new();
        manager.reload(&two_output_snapshot(), &Config::default());

        let spec = manager.monitor_from_connector("DP-1").unwrap().spec.clone();
        let missing = MonitorSpec {
            connector: "DP-9".to_owned(),
            vendor: "ACME".to_owned(),
            product: "Panel Pro".to_owned(),
            serial: "9".to_owned(),
        };

        let layout = vec![
            LayoutEntry {
                monitor_specs: vec![spec],
                rect: Rect::new(0, 0, 960, 540),
                scale: 2.0,
                transform: Transform::Normal,
                is_primary: true,
            },
            LayoutEntry {
                monitor_specs: vec![missing],
                rect: Rect::new(960, 0, 1920, 1080),
                scale: 1.0,
                transform: Transform::Normal,
                is_primary: false,
            },
        ];
        manager.rebuild_logical_configured(&layout);

        assert_eq!(manager.logical_monitors.len(), 1);
        let logical = &manager.logical_monitors[0];
        assert_eq!(logical.rect, Rect::new(0, 0, 960, 540));
        assert_eq!(logical.scale, 2.0);
        assert!(logical.is_primary);
        assert_eq!(manager.primary_logical_monitor, Some(0));
    }

    #[test]
    fn lookup_from_rect_prefers_largest_overlap() {
        let mut manager = MonitorManager::new();
        manager.reload(&two_output_snapshot(), &Config::default());

        // 420 px of the window are on the left monitor, 780 px on the right.
        let window = Rect::new(1500, 100, 1200, 800);
        let logical = manager.logical_monitor_from_rect(window).unwrap();
        assert_eq!(logical.rect.x, 1920);

        // Shifted left, the larger share moves to the left monitor.
        let window = Rect::new(900, 100, 1200, 800);
        let logical = manager.logical_monitor_from_rect(window).unwrap();
        assert_eq!(logical.rect.x, 0);

        // An empty rectangle matches by position.
        let logical = manager
            .logical_monitor_from_rect(Rect::new(5, 5, 0, 0))
            .unwrap();
        assert_eq!(logical.rect.x, 0);

        // A rectangle off every monitor falls back to the primary.
        let logical = manager
            .logical_monitor_from_rect(Rect::new(-5000, -5000, 10, 10))
            .unwrap();
        assert!(logical.is_primary);
    }

    #[test]
    fn layout_report_snapshot() {
        let mut manager = MonitorManager::new();
        manager.reload(&two_output_snapshot(), &Config::default());

        let report = manager.layout_report(&Config::default());
        assert_eq!(report.monitors.len(), 2);
        assert_eq!(report.monitors[0].connector, "DP-1");
        assert_eq!(report.monitors[0].modes.len(), 2);
        assert!(report.monitors[0].modes[0].is_preferred);
        assert!(report.monitors[0].modes[0].is_current);
        assert_eq!(report.monitors[0].modes[0].supported_scales, vec![1.0, 2.0]);

        assert_debug_snapshot!(report.logical_monitors, @r#"
        [
            LogicalMonitorReport {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
                scale: 1.0,
                transform: Normal,
                is_primary: false,
                is_presentation: false,
                monitors: [
                    "DP-1",
                ],
            },
            LogicalMonitorReport {
                x: 1920,
                y: 0,
                width: 1920,
                height: 1080,
                scale: 1.0,
                transform: Normal,
                is_primary: true,
                is_presentation: false,
                monitors: [
                    "HDMI-1",
                ],
            },
        ]
        "#);
    }

    #[test]
    fn report_omits_small_non_preferred_modes() {
        let mut snapshot = two_output_snapshot();
        snapshot.gpus[0].modes.push(mode_record(3, 640, 480, 60.0));
        snapshot.gpus[0].outputs[0].modes.push(3);

        let mut manager = MonitorManager::new();
        manager.reload(&snapshot, &Config::default());

        let report = manager.layout_report(&Config::default());
        let modes = &report.monitors[0].modes;
        // 640x480 is below the minimum logical area and isn't preferred.
        assert_eq!(modes.len(), 2);
        assert!(modes.iter().all(|mode| mode.width > 640));
        // 1280x720 is small but large enough to stay listed.
        assert!(modes.iter().any(|mode| mode.width == 1280));
    }

    #[test]
    fn report_sorts_builtin_panels_first() {
        let mut snapshot = two_output_snapshot();
        snapshot.gpus[0].outputs[1].name = "eDP-1".to_owned();

        let mut manager = MonitorManager::new();
        manager.reload(&snapshot, &Config::default());

        let report = manager.layout_report(&Config::default());
        assert_eq!(report.monitors[0].connector, "eDP-1");
        assert!(report.monitors[0].is_builtin);
        assert_eq!(report.monitors[0].display_name, "Built-in display");
        assert_eq!(report.monitors[1].connector, "DP-1");
    }
}
