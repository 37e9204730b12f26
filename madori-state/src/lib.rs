//! Types for feeding hardware snapshots to madori and reading layout reports back.
#![warn(missing_docs)]

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Everything an XRandR-style reader captured in one hardware query.
///
/// A snapshot is self-contained: all cross-references between records are
/// expressed through the display server's numeric ids (XIDs), resolved by the
/// decoder rather than by the reader.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ScreenSnapshot {
    /// Minimum screen size supported by the display server, in pixels.
    #[serde(default)]
    pub min_size: (i32, i32),
    /// Maximum screen size supported by the display server, in pixels.
    #[serde(default)]
    pub max_size: (i32, i32),
    /// Current screen size in pixels.
    #[serde(default)]
    pub screen_size: (i32, i32),
    /// Scale multiplier hint derived from `Xft.dpi` (dpi / 96, divided by the
    /// desktop font scaling factor), when the reader could determine it.
    #[serde(default)]
    pub dpi_scale_factor: Option<f64>,
    /// Id of the output the display server marks as primary, if any.
    #[serde(default)]
    pub primary: Option<u64>,
    /// Per-GPU hardware records.
    pub gpus: Vec<GpuRecord>,
}

/// Modes, CRTCs and outputs reported for one GPU.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GpuRecord {
    /// All hardware timing modes known to this GPU.
    pub modes: Vec<ModeRecord>,
    /// All scan-out engines of this GPU, enabled or not.
    pub crtcs: Vec<CrtcRecord>,
    /// All connectors of this GPU, connected or not.
    pub outputs: Vec<OutputRecord>,
}

/// One hardware timing mode, as reported by the display server.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct ModeRecord {
    /// Display server id of the mode.
    pub id: u64,
    /// Width in physical pixels.
    pub width: u32,
    /// Height in physical pixels.
    pub height: u32,
    /// Pixel clock in Hz.
    pub dot_clock: u64,
    /// Total horizontal timing including blanking, in pixels.
    pub h_total: u32,
    /// Total vertical timing including blanking, in lines.
    pub v_total: u32,
    /// Raw mode flag bits (interlace, double-scan, sync polarity).
    #[serde(default)]
    pub flags: u32,
}

/// One scan-out engine (CRTC), as reported by the display server.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CrtcRecord {
    /// Display server id of the CRTC.
    pub id: u64,
    /// X position of the scan-out rectangle.
    #[serde(default)]
    pub x: i32,
    /// Y position of the scan-out rectangle.
    #[serde(default)]
    pub y: i32,
    /// Width of the scan-out rectangle; 0 when the CRTC is disabled.
    #[serde(default)]
    pub width: u32,
    /// Height of the scan-out rectangle; 0 when the CRTC is disabled.
    #[serde(default)]
    pub height: u32,
    /// Panning rectangle `[x, y, width, height]`, if panning is configured.
    ///
    /// Takes precedence over the raw geometry when its size is non-zero.
    #[serde(default)]
    pub panning: Option<[i32; 4]>,
    /// Id of the mode currently driving this CRTC, if it is enabled.
    #[serde(default)]
    pub mode: Option<u64>,
    /// Current rotation and reflection bits (RandR encoding).
    #[serde(default = "default_rotation")]
    pub rotation: u32,
    /// All rotation and reflection bits this CRTC supports.
    #[serde(default = "default_rotation")]
    pub rotations: u32,
    /// The `xx` and `yy` entries of the CRTC's current transform matrix, when
    /// the display server exposes one. The output scale is their inverse.
    #[serde(default)]
    pub transform_matrix: Option<[f64; 2]>,
}

/// One connector, as reported by the display server.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputRecord {
    /// Display server id of the output.
    pub id: u64,
    /// Connector name, e.g. `DP-1` or `eDP-1`.
    pub name: String,
    /// Monitor manufacturer from EDID, if known.
    #[serde(default)]
    pub vendor: Option<String>,
    /// Monitor product name from EDID, if known.
    #[serde(default)]
    pub product: Option<String>,
    /// Monitor serial from EDID, if known.
    #[serde(default)]
    pub serial: Option<String>,
    /// Physical width in millimeters, 0 when unknown.
    #[serde(default)]
    pub width_mm: i32,
    /// Physical height in millimeters, 0 when unknown.
    #[serde(default)]
    pub height_mm: i32,
    /// Whether a monitor is attached to the connector.
    #[serde(default = "default_connected")]
    pub connected: bool,
    /// Ids of the modes this output supports, preferred mode first.
    #[serde(default)]
    pub modes: Vec<u64>,
    /// Id of the CRTC currently driving this output, if any.
    #[serde(default)]
    pub crtc: Option<u64>,
    /// Ids of the CRTCs that can drive this output.
    #[serde(default)]
    pub possible_crtcs: Vec<u64>,
    /// Ids of the outputs this output can share a CRTC with.
    #[serde(default)]
    pub clones: Vec<u64>,
    /// Value of the connector-type property, e.g. `HDMI` or `Panel`, if set.
    #[serde(default)]
    pub connector_type: Option<String>,
    /// Value of the panel-orientation property, e.g. `Left Side Up`, if set.
    #[serde(default)]
    pub panel_orientation: Option<String>,
    /// DisplayPort tiling descriptor `[group_id, flags, max_h_tiles,
    /// max_v_tiles, loc_h_tile, loc_v_tile, tile_w, tile_h]`, if tiled.
    #[serde(default)]
    pub tile: Option<[u32; 8]>,
    /// Whether the output is marked as a presentation display.
    #[serde(default)]
    pub presentation: bool,
    /// Whether the output is underscanning.
    #[serde(default)]
    pub underscanning: bool,
    /// Subpixel layout of the attached monitor.
    #[serde(default)]
    pub subpixel: SubpixelOrder,
    /// Position suggested by the connector hint properties, if any.
    #[serde(default)]
    pub suggested_pos: Option<(i32, i32)>,
}

fn default_connected() -> bool {
    true
}

fn default_rotation() -> u32 {
    // RandR Rotate_0.
    1
}

/// Subpixel layout of a monitor.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SubpixelOrder {
    /// Layout not known.
    #[default]
    Unknown,
    /// No subpixels, e.g. a projector.
    None,
    /// Horizontal RGB stripes.
    HorizontalRgb,
    /// Horizontal BGR stripes.
    HorizontalBgr,
    /// Vertical RGB stripes.
    VerticalRgb,
    /// Vertical BGR stripes.
    VerticalBgr,
}

/// Output transform, which goes counter-clockwise.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Transform {
    /// Untransformed.
    #[default]
    Normal,
    /// Rotated by 90°.
    #[serde(rename = "90")]
    _90,
    /// Rotated by 180°.
    #[serde(rename = "180")]
    _180,
    /// Rotated by 270°.
    #[serde(rename = "270")]
    _270,
    /// Flipped horizontally.
    Flipped,
    /// Rotated by 90° and flipped horizontally.
    Flipped90,
    /// Flipped vertically.
    Flipped180,
    /// Rotated by 270° and flipped horizontally.
    Flipped270,
}

impl Transform {
    /// Whether this transform swaps the width and height of what it applies to.
    pub fn is_rotated(self) -> bool {
        matches!(
            self,
            Self::_90 | Self::_270 | Self::Flipped90 | Self::Flipped270
        )
    }

    /// Whether this transform includes a reflection.
    pub fn is_flipped(self) -> bool {
        matches!(
            self,
            Self::Flipped | Self::Flipped90 | Self::Flipped180 | Self::Flipped270
        )
    }

    fn rotation(self) -> u32 {
        match self {
            Self::Normal | Self::Flipped => 0,
            Self::_90 | Self::Flipped90 => 1,
            Self::_180 | Self::Flipped180 => 2,
            Self::_270 | Self::Flipped270 => 3,
        }
    }

    fn from_parts(rotation: u32, flipped: bool) -> Self {
        match (rotation % 4, flipped) {
            (0, false) => Self::Normal,
            (1, false) => Self::_90,
            (2, false) => Self::_180,
            (3, false) => Self::_270,
            (0, true) => Self::Flipped,
            (1, true) => Self::Flipped90,
            (2, true) => Self::Flipped180,
            _ => Self::Flipped270,
        }
    }

    /// The transform undoing this one. Everything is self-inverse except the
    /// quarter rotations, which swap.
    pub fn invert(self) -> Self {
        match self {
            Self::_90 => Self::_270,
            Self::_270 => Self::_90,
            other => other,
        }
    }

    /// Composes two transforms: the result of applying `other` on top of
    /// `self`.
    pub fn compose(self, other: Self) -> Self {
        let first = if other.is_flipped() {
            // Reflect: toggles the flip and reverses the rotation direction.
            Self::from_parts(4 - self.rotation() % 4, !self.is_flipped())
        } else {
            self
        };
        Self::from_parts(first.rotation() + other.rotation(), first.is_flipped())
    }
}

impl FromStr for Transform {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "90" => Ok(Self::_90),
            "180" => Ok(Self::_180),
            "270" => Ok(Self::_270),
            "flipped" => Ok(Self::Flipped),
            "flipped-90" => Ok(Self::Flipped90),
            "flipped-180" => Ok(Self::Flipped180),
            "flipped-270" => Ok(Self::Flipped270),
            _ => Err(concat!(
                r#"invalid transform, can be "90", "180", "270", "#,
                r#""flipped", "flipped-90", "flipped-180" or "flipped-270""#
            )),
        }
    }
}

/// The derived monitor and logical layout state, in one atomic report.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LayoutReport {
    /// All known monitors, builtin panels first, then by connector name.
    pub monitors: Vec<MonitorReport>,
    /// The placed logical monitors, in creation order.
    pub logical_monitors: Vec<LogicalMonitorReport>,
}

/// One monitor: a physical panel, possibly spanning several connectors.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorReport {
    /// Connector name of the monitor's main output.
    pub connector: String,
    /// Monitor manufacturer, or `unknown`.
    pub vendor: String,
    /// Monitor product name, or `unknown`.
    pub product: String,
    /// Monitor serial, or `unknown`.
    pub serial: String,
    /// Human-readable name, e.g. `Dell 24"` or `Built-in display`.
    pub display_name: String,
    /// Whether this is a built-in panel (eDP, LVDS, DSI).
    pub is_builtin: bool,
    /// Whether the monitor is currently driven by a CRTC.
    pub is_active: bool,
    /// The derived mode table, in derivation order.
    pub modes: Vec<ModeReport>,
}

/// One derived monitor mode.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModeReport {
    /// Stable mode id, `{width}x{height}{i?}@{refresh}`.
    pub id: String,
    /// Width in physical pixels (after panel orientation).
    pub width: i32,
    /// Height in physical pixels (after panel orientation).
    pub height: i32,
    /// Refresh rate in Hz.
    pub refresh_rate: f64,
    /// The scale the engine would pick for this mode.
    pub preferred_scale: f64,
    /// Every scale this mode can be displayed at.
    pub supported_scales: Vec<f64>,
    /// Whether the monitor prefers this mode.
    pub is_preferred: bool,
    /// Whether the monitor is currently in this mode.
    pub is_current: bool,
    /// Whether the mode is interlaced.
    pub is_interlaced: bool,
}

/// One placed region of the logical coordinate space.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogicalMonitorReport {
    /// Logical X position.
    pub x: i32,
    /// Logical Y position.
    pub y: i32,
    /// Width in logical pixels.
    pub width: u32,
    /// Height in logical pixels.
    pub height: u32,
    /// Scale factor.
    pub scale: f64,
    /// Transform.
    pub transform: Transform,
    /// Whether this is the primary logical monitor.
    pub is_primary: bool,
    /// Whether every backing output is a presentation display.
    pub is_presentation: bool,
    /// Connector names of the backing monitors; more than one when mirrored.
    pub monitors: Vec<String>,
}
