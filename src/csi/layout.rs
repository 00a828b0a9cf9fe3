use std::fmt;

use crate::foundation::error::{CarError, CarResult};

macro_rules! raw_layouts {
    ($( $(#[$meta:meta])* $variant:ident = $raw:literal ),+ $(,)?) => {
        /// How a rendition's pixels are laid out and stretched; CoreUI numbering.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum RenditionLayout {
            $( $(#[$meta])* $variant, )+
            /// Any layout value this crate does not interpret.
            Unknown(u16),
        }

        impl RenditionLayout {
            /// Map a raw layout value; never fails.
            pub fn from_raw(raw: u16) -> Self {
                match raw {
                    $( $raw => Self::$variant, )+
                    other => Self::Unknown(other),
                }
            }

            /// Raw layout value.
            pub fn raw(self) -> u16 {
                match self {
                    $( Self::$variant => $raw, )+
                    Self::Unknown(raw) => raw,
                }
            }
        }
    };
}

raw_layouts! {
    /// Single bitmap drawn at its natural size.
    OnePartFixedSize = 10,
    /// Single bitmap tiled.
    OnePartTile = 11,
    /// Single bitmap stretched.
    OnePartScale = 12,
    /// Left/center/right caps, center tiled.
    ThreePartHorizontalTile = 20,
    /// Left/center/right caps, center stretched.
    ThreePartHorizontalScale = 21,
    /// Left/center/right caps, uniform.
    ThreePartHorizontalUniform = 22,
    /// Top/middle/bottom caps, middle tiled.
    ThreePartVerticalTile = 23,
    /// Top/middle/bottom caps, middle stretched.
    ThreePartVerticalScale = 24,
    /// Top/middle/bottom caps, uniform.
    ThreePartVerticalUniform = 25,
    /// Nine-slice, interior tiled.
    NinePartTile = 30,
    /// Nine-slice, interior stretched.
    NinePartScale = 31,
    /// Nine-slice, horizontal uniform and vertical stretch.
    NinePartHorizontalUniformVerticalScale = 32,
    /// Nine-slice, horizontal stretch and vertical uniform.
    NinePartHorizontalScaleVerticalUniform = 33,
    /// Nine-slice drawing only the edges.
    NinePartEdgesOnly = 34,
    /// Six-slice.
    SixPart = 40,
    /// Vector (PDF) payload.
    Vector = 9,
    /// Opaque data payload.
    RawData = 1000,
    /// Packed image atlas.
    PackedImage = 1004,
    /// Multisize image set descriptor.
    MultisizeImageSet = 1008,
    /// Named color.
    Color = 1009,
}

/// Number of slice rectangles a layout admits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceRule {
    /// Zero or one slice.
    AtMostOne,
    /// Exactly this many slices.
    Exactly(u32),
    /// Any number of slices.
    Any,
}

impl SliceRule {
    /// Whether `count` satisfies the rule.
    pub fn accepts(self, count: u32) -> bool {
        match self {
            Self::AtMostOne => count <= 1,
            Self::Exactly(n) => count == n,
            Self::Any => true,
        }
    }
}

impl RenditionLayout {
    /// Slice-count rule for this layout.
    pub fn slice_rule(self) -> SliceRule {
        use RenditionLayout::*;
        match self {
            OnePartFixedSize | OnePartTile | OnePartScale => SliceRule::AtMostOne,
            ThreePartHorizontalTile
            | ThreePartHorizontalScale
            | ThreePartHorizontalUniform
            | ThreePartVerticalTile
            | ThreePartVerticalScale
            | ThreePartVerticalUniform => SliceRule::Exactly(3),
            SixPart => SliceRule::Exactly(6),
            NinePartTile
            | NinePartScale
            | NinePartHorizontalUniformVerticalScale
            | NinePartHorizontalScaleVerticalUniform
            | NinePartEdgesOnly => SliceRule::Exactly(9),
            Vector | RawData | PackedImage | MultisizeImageSet | Color => SliceRule::Exactly(0),
            Unknown(_) => SliceRule::Any,
        }
    }

    /// Data-like layouts carry no bitmap slices.
    pub fn is_data(self) -> bool {
        matches!(
            self,
            Self::Vector | Self::RawData | Self::PackedImage | Self::MultisizeImageSet | Self::Color
        )
    }

    pub(crate) fn check_slice_count(self, count: u32) -> CarResult<()> {
        let rule = self.slice_rule();
        if rule.accepts(count) {
            return Ok(());
        }
        let declared = match rule {
            SliceRule::AtMostOne => 1,
            SliceRule::Exactly(n) => n,
            SliceRule::Any => count,
        };
        Err(CarError::SliceCountMismatch {
            declared,
            found: count,
        })
    }
}

impl fmt::Display for RenditionLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "layout({raw})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Per-layer blend mode; CoreGraphics numbering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum BlendMode {
    /// Source-over.
    #[default]
    Normal = 0,
    /// Multiply.
    Multiply = 1,
    /// Screen.
    Screen = 2,
    /// Overlay.
    Overlay = 3,
    /// Darken.
    Darken = 4,
    /// Lighten.
    Lighten = 5,
    /// Absolute difference.
    Difference = 10,
    /// Clears the destination.
    Clear = 16,
    /// Replaces the destination.
    Copy = 17,
    /// Saturating add.
    PlusLighter = 27,
}

impl BlendMode {
    /// Map a raw CoreGraphics blend value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Normal,
            1 => Self::Multiply,
            2 => Self::Screen,
            3 => Self::Overlay,
            4 => Self::Darken,
            5 => Self::Lighten,
            10 => Self::Difference,
            16 => Self::Clear,
            17 => Self::Copy,
            27 => Self::PlusLighter,
            _ => return None,
        })
    }

    /// Raw CoreGraphics blend value.
    pub fn raw(self) -> u32 {
        self as u32
    }
}

/// Template rendering hint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i64)]
pub enum TemplateRenderingMode {
    /// Let the consumer decide.
    #[default]
    Automatic = 0,
    /// Draw the original colors.
    Original = 1,
    /// Draw as a template mask.
    Template = 2,
}

impl TemplateRenderingMode {
    /// Map a raw mode value.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Self::Automatic),
            1 => Some(Self::Original),
            2 => Some(Self::Template),
            _ => None,
        }
    }

    /// Raw mode value.
    pub fn raw(self) -> i64 {
        self as i64
    }
}

#[cfg(test)]
#[path = "../../tests/unit/csi/layout.rs"]
mod tests;
