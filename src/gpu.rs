//! Hardware entities after decoding: modes, CRTCs, outputs, and the GPU that
//! owns them.
//!
//! All cross-references are typed indices into the owning [`Gpu`]'s vectors,
//! so a full hardware re-read simply replaces the `Gpu` wholesale.

use std::fmt;

use bitflags::bitflags;
use madori_state::{SubpixelOrder, Transform};

use crate::geometry::Rect;

/// Maximum refresh-rate difference for two modes to be considered equal.
pub const MAX_REFRESH_RATE_DIFF: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrtcId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(pub usize);

bitflags! {
    /// Hardware mode flags, in the RandR bit layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModeFlags: u32 {
        const PHSYNC = 1 << 0;
        const NHSYNC = 1 << 1;
        const PVSYNC = 1 << 2;
        const NVSYNC = 1 << 3;
        const INTERLACE = 1 << 4;
        const DOUBLE_SCAN = 1 << 5;
        const CSYNC = 1 << 6;
    }
}

impl ModeFlags {
    /// The flags that participate in monitor mode identity. We don't
    /// distinguish modes by sync polarity, only by interlacing.
    pub const HANDLED: ModeFlags = ModeFlags::INTERLACE;
}

bitflags! {
    /// A set of output transforms, e.g. everything a CRTC can be set to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TransformSet: u8 {
        const NORMAL = 1 << 0;
        const ROTATE_90 = 1 << 1;
        const ROTATE_180 = 1 << 2;
        const ROTATE_270 = 1 << 3;
        const FLIPPED = 1 << 4;
        const FLIPPED_90 = 1 << 5;
        const FLIPPED_180 = 1 << 6;
        const FLIPPED_270 = 1 << 7;
    }
}

impl From<Transform> for TransformSet {
    fn from(transform: Transform) -> Self {
        match transform {
            Transform::Normal => TransformSet::NORMAL,
            Transform::_90 => TransformSet::ROTATE_90,
            Transform::_180 => TransformSet::ROTATE_180,
            Transform::_270 => TransformSet::ROTATE_270,
            Transform::Flipped => TransformSet::FLIPPED,
            Transform::Flipped90 => TransformSet::FLIPPED_90,
            Transform::Flipped180 => TransformSet::FLIPPED_180,
            Transform::Flipped270 => TransformSet::FLIPPED_270,
        }
    }
}

/// One hardware timing mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    /// Display-server id, stable across re-reads of unchanged hardware.
    pub winsys_id: u64,
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub refresh_rate: f64,
    pub flags: ModeFlags,
}

impl Mode {
    /// Mode equality for matching purposes: same size, same interlacing,
    /// refresh rates within [`MAX_REFRESH_RATE_DIFF`].
    pub fn matches(&self, other: &Mode) -> bool {
        self.width == other.width
            && self.height == other.height
            && (self.refresh_rate - other.refresh_rate).abs() < MAX_REFRESH_RATE_DIFF
            && (self.flags & ModeFlags::HANDLED) == (other.flags & ModeFlags::HANDLED)
    }
}

/// One hardware scan-out engine.
#[derive(Debug, Clone)]
pub struct Crtc {
    pub winsys_id: u64,
    /// Scan-out rectangle; panning takes precedence over raw geometry.
    pub rect: Rect,
    pub transform: Transform,
    /// Output scale decoded from the CRTC transform matrix; `None` when the
    /// display server exposes no matrix (no native output scaling).
    pub scale: Option<f64>,
    pub current_mode: Option<ModeId>,
    pub all_transforms: TransformSet,
}

impl Crtc {
    pub fn is_active(&self) -> bool {
        self.current_mode.is_some()
    }
}

/// The eight-integer DisplayPort tiling descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileInfo {
    pub group_id: u32,
    pub flags: u32,
    pub max_h_tiles: u32,
    pub max_v_tiles: u32,
    pub loc_h_tile: u32,
    pub loc_v_tile: u32,
    pub tile_w: u32,
    pub tile_h: u32,
}

impl TileInfo {
    pub fn from_property(values: [u32; 8]) -> Self {
        Self {
            group_id: values[0],
            flags: values[1],
            max_h_tiles: values[2],
            max_v_tiles: values[3],
            loc_h_tile: values[4],
            loc_v_tile: values[5],
            tile_w: values[6],
            tile_h: values[7],
        }
    }

    /// Whether this is the (0, 0) tile of its group.
    pub fn is_origin(&self) -> bool {
        self.loc_h_tile == 0 && self.loc_v_tile == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorType {
    Unknown,
    Vga,
    DviI,
    DviD,
    DviA,
    Composite,
    SVideo,
    Lvds,
    Component,
    NinePinDin,
    DisplayPort,
    HdmiA,
    HdmiB,
    Tv,
    Edp,
    Virtual,
    Dsi,
}

impl ConnectorType {
    /// Decodes the RandR `ConnectorType` property value.
    pub fn from_property(value: &str) -> Self {
        match value {
            "HDMI" => Self::HdmiA,
            "VGA" => Self::Vga,
            // No DRM equivalent, but means an internal panel.
            "Panel" => Self::Lvds,
            "DVI" | "DVI-I" => Self::DviI,
            "DVI-A" => Self::DviA,
            "DVI-D" => Self::DviD,
            "DisplayPort" => Self::DisplayPort,
            "TV" => Self::Tv,
            "TV-Composite" => Self::Composite,
            "TV-SVideo" => Self::SVideo,
            // Another set of mismatches.
            "TV-SCART" | "TV-C4" => Self::Tv,
            _ => Self::Unknown,
        }
    }

    /// Guesses the connector type from the connector name. The FOSS drivers
    /// name their outputs after the connector, so this works as a fallback
    /// when the property is missing.
    pub fn from_connector_name(name: &str) -> Self {
        // SNA uses DP, not DisplayPort. Test for both.
        if name.starts_with("DVI") {
            Self::DviI
        } else if name.starts_with("LVDS") {
            Self::Lvds
        } else if name.starts_with("HDMI") {
            Self::HdmiA
        } else if name.starts_with("VGA") {
            Self::Vga
        } else if name.starts_with("DP") || name.starts_with("DisplayPort") {
            Self::DisplayPort
        } else if name.starts_with("eDP") {
            Self::Edp
        } else if name.starts_with("Virtual") {
            Self::Virtual
        } else if name.starts_with("Composite") || name.starts_with("CTV") {
            Self::Composite
        } else if name.starts_with("S-video") {
            Self::SVideo
        } else if name.starts_with("TV") {
            Self::Tv
        } else if name.starts_with("DSI") {
            Self::Dsi
        } else if name.starts_with("DIN") {
            Self::NinePinDin
        } else {
            Self::Unknown
        }
    }

    pub fn is_hdmi(self) -> bool {
        matches!(self, Self::HdmiA | Self::HdmiB)
    }
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "Unknown",
            Self::Vga => "VGA",
            Self::DviI => "DVII",
            Self::DviD => "DVID",
            Self::DviA => "DVIA",
            Self::Composite => "Composite",
            Self::SVideo => "SVIDEO",
            Self::Lvds => "LVDS",
            Self::Component => "Component",
            Self::NinePinDin => "9PinDIN",
            Self::DisplayPort => "DisplayPort",
            Self::HdmiA => "HDMIA",
            Self::HdmiB => "HDMIB",
            Self::Tv => "TV",
            Self::Edp => "eDP",
            Self::Virtual => "Virtual",
            Self::Dsi => "DSI",
        };
        f.write_str(name)
    }
}

/// One physical connector with a monitor attached.
#[derive(Debug, Clone)]
pub struct Output {
    /// Opaque stable token used to re-associate windows with monitors across
    /// reconfiguration.
    pub winsys_id: u64,
    pub name: String,
    pub vendor: String,
    pub product: String,
    pub serial: String,
    pub width_mm: i32,
    pub height_mm: i32,
    /// Supported modes; the first one is the hardware-preferred mode.
    pub modes: Vec<ModeId>,
    pub preferred_mode: ModeId,
    pub connector_type: ConnectorType,
    /// Fixed orientation of the panel itself, e.g. a portrait-mounted laptop
    /// display. Applied on top of any user transform.
    pub panel_orientation_transform: Transform,
    pub tile_info: Option<TileInfo>,
    pub assigned_crtc: Option<CrtcId>,
    pub possible_crtcs: Vec<CrtcId>,
    pub possible_clones: Vec<OutputId>,
    pub is_primary: bool,
    pub is_presentation: bool,
    pub is_underscanning: bool,
    pub subpixel_order: SubpixelOrder,
    pub suggested_pos: Option<(i32, i32)>,
}

/// Everything one GPU reported: the owning container for modes, CRTCs and
/// outputs.
#[derive(Debug, Clone, Default)]
pub struct Gpu {
    pub modes: Vec<Mode>,
    pub crtcs: Vec<Crtc>,
    pub outputs: Vec<Output>,
}

impl Gpu {
    pub fn mode(&self, id: ModeId) -> &Mode {
        &self.modes[id.0]
    }

    pub fn crtc(&self, id: CrtcId) -> &Crtc {
        &self.crtcs[id.0]
    }

    pub fn output(&self, id: OutputId) -> &Output {
        &self.outputs[id.0]
    }

    pub fn output_ids(&self) -> impl Iterator<Item = OutputId> {
        (0..self.outputs.len()).map(OutputId)
    }

    /// The mode currently driving the output's assigned CRTC, if any.
    pub fn active_crtc_mode(&self, output: &Output) -> Option<ModeId> {
        self.crtc(output.assigned_crtc?).current_mode
    }
}
