use std::fmt;

use crate::csi::{DecodedCsi, RenditionLayout};
use crate::key::{AttributeId, ELEMENT_ICON, ELEMENT_IMAGE_SET, PART_ICON, RenditionKey};

/// What a rendition holds, for grouping and display.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RenditionKind {
    /// Plain bitmap.
    Image,
    /// App icon bitmap.
    Icon,
    /// Member of an image set.
    ImageSet,
    /// Multisize image set descriptor.
    MultisizeImageSet,
    /// Vector PDF payload.
    Pdf,
    /// Named color.
    Color,
    /// SVG payload.
    Svg,
    /// Opaque data.
    RawData,
    /// Nothing recognizable.
    Unknown,
}

impl RenditionKind {
    /// Every kind, in declaration order.
    pub const ALL: [RenditionKind; 9] = [
        Self::Image,
        Self::Icon,
        Self::ImageSet,
        Self::MultisizeImageSet,
        Self::Pdf,
        Self::Color,
        Self::Svg,
        Self::RawData,
        Self::Unknown,
    ];

    /// Classify from the key's element/part and the rendition's layout.
    pub fn classify(key: &RenditionKey, csi: &DecodedCsi) -> Self {
        match csi.layout() {
            RenditionLayout::Color => return Self::Color,
            RenditionLayout::MultisizeImageSet => return Self::MultisizeImageSet,
            RenditionLayout::Vector => return Self::Pdf,
            RenditionLayout::RawData => {
                let svg = csi
                    .metadata()
                    .uti_type
                    .as_deref()
                    .is_some_and(|u| u.contains("svg"));
                return if svg { Self::Svg } else { Self::RawData };
            }
            _ => {}
        }

        let element = key.attribute(AttributeId::Element);
        let part = key.attribute(AttributeId::Part);
        if element == Some(ELEMENT_ICON) && part == Some(PART_ICON) {
            Self::Icon
        } else if element == Some(ELEMENT_IMAGE_SET) {
            Self::ImageSet
        } else if !csi.layers().is_empty() {
            Self::Image
        } else {
            Self::Unknown
        }
    }

    /// Human-readable label, also the sort key for grouped listings.
    pub fn description(self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Icon => "Icon",
            Self::ImageSet => "Image Set",
            Self::MultisizeImageSet => "Multisize Image Set",
            Self::Pdf => "PDF",
            Self::Color => "Color",
            Self::Svg => "SVG",
            Self::RawData => "Raw Data",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether renditions of this kind flatten to a bitmap.
    pub fn is_bitmap(self) -> bool {
        matches!(self, Self::Image | Self::Icon | Self::ImageSet)
    }
}

impl fmt::Display for RenditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
