use std::fmt;

/// Version of the attribute schema understood by this crate.
///
/// Identifiers outside [`AttributeId`] belong to a newer schema (or to corruption) and are rejected
/// by the decoder.
pub const KEY_SCHEMA_VERSION: u16 = 1;

/// Subtype value marking Mac Catalyst renditions (stored with the iPad idiom).
pub const MAC_CATALYST_SUBTYPE: u16 = 32401;

/// Element value used by application icons.
pub const ELEMENT_ICON: u16 = 85;
/// Part value used by application icons.
pub const PART_ICON: u16 = 220;
/// Element value used by image sets.
pub const ELEMENT_IMAGE_SET: u16 = 9;
/// Element value used for named colors.
pub const ELEMENT_COLOR: u16 = 228;

macro_rules! attribute_ids {
    ($($variant:ident = $raw:literal => $name:literal),+ $(,)?) => {
        /// Attribute identifiers of key schema version 1.
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        #[repr(u16)]
        pub enum AttributeId {
            $(
                #[doc = concat!("The `", $name, "` attribute.")]
                $variant = $raw,
            )+
        }

        impl AttributeId {
            /// Every identifier known to the current schema, in canonical order.
            pub const ALL: &'static [AttributeId] = &[$(AttributeId::$variant),+];

            /// Map a raw identifier; `None` for identifiers unknown to this schema.
            pub fn from_raw(raw: u16) -> Option<Self> {
                match raw {
                    $($raw => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Short lowercase name used in listings.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }
    };
}

attribute_ids! {
    Element = 1 => "element",
    Part = 2 => "part",
    Size = 3 => "size",
    Direction = 4 => "direction",
    PlaceHolder = 5 => "placeholder",
    Value = 6 => "value",
    Appearance = 7 => "appearance",
    Dimension1 = 8 => "dimension1",
    Dimension2 = 9 => "dimension2",
    State = 10 => "state",
    Layer = 11 => "layer",
    Scale = 12 => "scale",
    Localization = 13 => "localization",
    PresentationState = 14 => "presentation_state",
    Idiom = 15 => "idiom",
    Subtype = 16 => "subtype",
    Identifier = 17 => "identifier",
    PreviousValue = 18 => "previous_value",
    PreviousState = 19 => "previous_state",
    SizeClassHorizontal = 20 => "size_class_horizontal",
    SizeClassVertical = 21 => "size_class_vertical",
    MemoryClass = 22 => "memory_class",
    GraphicsClass = 23 => "graphics_class",
    DisplayGamut = 24 => "display_gamut",
    DeploymentTarget = 25 => "deployment_target",
    GlyphWeight = 26 => "glyph_weight",
    GlyphSize = 27 => "glyph_size",
}

impl AttributeId {
    /// Raw on-disk identifier.
    pub fn raw(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The platform a rendition targets.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Idiom {
    /// All platforms.
    Universal,
    /// iPhone.
    Phone,
    /// iPad.
    Pad,
    /// Apple TV.
    Tv,
    /// CarPlay.
    Car,
    /// Apple Watch.
    Watch,
    /// App Store marketing artwork.
    Marketing,
    /// iPad idiom with the Mac Catalyst subtype.
    MacCatalyst,
}

impl Idiom {
    /// Map a raw idiom value; the Mac Catalyst classification needs the subtype too, see
    /// [`Idiom::classify`].
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Universal),
            1 => Some(Self::Phone),
            2 => Some(Self::Pad),
            3 => Some(Self::Tv),
            4 => Some(Self::Car),
            5 => Some(Self::Watch),
            6 => Some(Self::Marketing),
            _ => None,
        }
    }

    /// Classify from the raw idiom and subtype attributes.
    pub fn classify(idiom: Option<u16>, subtype: Option<u16>) -> Option<Self> {
        if subtype == Some(MAC_CATALYST_SUBTYPE) {
            return Some(Self::MacCatalyst);
        }
        Self::from_raw(idiom.unwrap_or(0))
    }

    /// Raw idiom attribute value.
    pub fn raw(self) -> u16 {
        match self {
            Self::Universal => 0,
            Self::Phone => 1,
            Self::Pad | Self::MacCatalyst => 2,
            Self::Tv => 3,
            Self::Car => 4,
            Self::Watch => 5,
            Self::Marketing => 6,
        }
    }
}

impl fmt::Display for Idiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Universal => "Universal",
            Self::Phone => "iPhone",
            Self::Pad => "iPad",
            Self::Tv => "TV",
            Self::Car => "CarPlay",
            Self::Watch => "Watch",
            Self::Marketing => "Marketing",
            Self::MacCatalyst => "Mac Catalyst",
        })
    }
}

macro_rules! raw_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident = $raw:literal => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Map a raw attribute value.
            pub fn from_raw(raw: u16) -> Option<Self> {
                match raw {
                    $($raw => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Raw attribute value.
            pub fn raw(self) -> u16 {
                match self {
                    $(Self::$variant => $raw,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $(Self::$variant => $label,)+
                })
            }
        }
    };
}

raw_enum! {
    /// Light/dark and contrast variant.
    Appearance {
        /// Matches any appearance.
        Any = 0 => "Any",
        /// Dark mode.
        Dark = 1 => "Dark",
        /// Increased contrast.
        HighContrast = 2 => "High Contrast",
        /// Dark mode with increased contrast.
        HighContrastDark = 3 => "High Contrast Dark",
        /// Light mode.
        Light = 4 => "Light",
        /// Light mode with increased contrast.
        HighContrastLight = 5 => "High Contrast Light",
    }
}

raw_enum! {
    /// Color gamut of the target display.
    DisplayGamut {
        /// sRGB displays.
        Srgb = 0 => "SRGB",
        /// Wide-gamut Display P3.
        P3 = 1 => "Display P3",
    }
}

raw_enum! {
    /// Horizontal or vertical size class.
    SizeClass {
        /// Matches any size class.
        Any = 0 => "Any",
        /// Compact width/height.
        Compact = 1 => "Compact",
        /// Regular width/height.
        Regular = 2 => "Regular",
    }
}

raw_enum! {
    /// Control state a rendition is drawn for.
    ThemeState {
        /// Normal.
        Normal = 0 => "Normal",
        /// Pointer hovering.
        Rollover = 1 => "Rollover",
        /// Pressed.
        Pressed = 2 => "Pressed",
        /// Inactive window.
        Inactive = 3 => "Inactive",
        /// Disabled.
        Disabled = 4 => "Disabled",
        /// Force-pressed.
        DeeplyPressed = 5 => "Deeply Pressed",
    }
}
