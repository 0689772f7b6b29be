//! Vendor detection and screen-capture command profiles

use std::fmt;
use std::str::FromStr;

use crate::constants::Delays;

/// Instrument vendor tag, derived from the `*IDN?` reply
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Vendor {
    LeCroy,
    Tektronix,
    Keysight,
    Rigol,
    Siglent,
    Unknown,
}

/// Brand substrings for each tag, checked in order
const BRANDS: &[(Vendor, &[&str])] = &[
    (Vendor::LeCroy, &["LECROY", "TELEDYNE"]),
    (Vendor::Tektronix, &["TEKTRONIX", "TEK"]),
    (Vendor::Keysight, &["KEYSIGHT", "AGILENT", "HEWLETT"]),
    (Vendor::Rigol, &["RIGOL"]),
    (Vendor::Siglent, &["SIGLENT"]),
];

impl Vendor {
    /// Pick a tag by case-insensitive substring match on an identification string
    ///
    /// # Examples
    ///
    /// ```
    /// use scopecap_core::Vendor;
    ///
    /// assert_eq!(Vendor::detect("LECROY,WS4034HD,LCRY1234,9.4.0"), Vendor::LeCroy);
    /// assert_eq!(Vendor::detect("Teledyne LeCroy,HDO6104"), Vendor::LeCroy);
    /// assert_eq!(Vendor::detect("Fluke,8846A"), Vendor::Unknown);
    /// ```
    pub fn detect(idn: &str) -> Self {
        let idn = idn.to_ascii_uppercase();

        BRANDS
            .iter()
            .find(|(_, brands)| brands.iter().any(|b| idn.contains(b)))
            .map(|(vendor, _)| *vendor)
            .unwrap_or(Self::Unknown)
    }

    /// Vendor speaking native VICP on port 1861
    pub fn is_native_vicp(self) -> bool {
        matches!(self, Self::LeCroy)
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Capture profile for this vendor (`None` for `Unknown`)
    pub fn profile(self) -> Option<&'static VendorProfile> {
        match self {
            Self::LeCroy => Some(&LECROY),
            Self::Tektronix => Some(&TEKTRONIX),
            Self::Keysight => Some(&KEYSIGHT),
            Self::Rigol => Some(&RIGOL),
            Self::Siglent => Some(&SIGLENT),
            Self::Unknown => None,
        }
    }

    /// Get tag name
    pub fn name(self) -> &'static str {
        match self {
            Self::LeCroy => "LECROY",
            Self::Tektronix => "TEKTRONIX",
            Self::Keysight => "KEYSIGHT",
            Self::Rigol => "RIGOL",
            Self::Siglent => "SIGLENT",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Human-readable brand name
    pub fn display_name(self) -> &'static str {
        match self {
            Self::LeCroy => "LeCroy / Teledyne",
            Self::Tektronix => "Tektronix",
            Self::Keysight => "Keysight / Agilent",
            Self::Rigol => "Rigol",
            Self::Siglent => "Siglent",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Background colour of the captured screenshot
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Background {
    /// Best for printing
    #[default]
    White,
    /// The scope's native look
    Black,
}

impl FromStr for Background {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WHITE" => Ok(Self::White),
            "BLACK" => Ok(Self::Black),
            other => Err(crate::Error::InvalidArgument(format!(
                "unknown background colour '{}'",
                other
            ))),
        }
    }
}

/// How a vendor spells the background colour
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ColorSyntax {
    /// LeCroy `BCKG,WHITE|BLACK`
    Background,
    /// Tektronix `INKSaver ON|OFF` (ink saver on = white)
    InkSaver,
    /// Keysight `INKS|SCR` palette
    Palette,
    /// Rigol/Siglent invert `OFF|ON` (not inverted = white)
    Invert,
}

impl ColorSyntax {
    pub fn argument(self, background: Background) -> &'static str {
        match (self, background) {
            (Self::Background, Background::White) => "WHITE",
            (Self::Background, Background::Black) => "BLACK",
            (Self::InkSaver, Background::White) => "ON",
            (Self::InkSaver, Background::Black) => "OFF",
            (Self::Palette, Background::White) => "INKS",
            (Self::Palette, Background::Black) => "SCR",
            (Self::Invert, Background::White) => "OFF",
            (Self::Invert, Background::Black) => "ON",
        }
    }
}

/// Image encoding the instrument sends
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResponseFormat {
    Bmp,
    Png,
}

impl ResponseFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Bmp => "bmp",
            Self::Png => "png",
        }
    }
}

/// Placeholder substituted with the colour argument
const COLOR: &str = "{color}";

/// Fixed screen-capture command set of one vendor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorProfile {
    pub vendor: Vendor,

    /// Commands sent before the trigger
    configure: &'static [&'static str],

    /// Command that starts the image transfer
    trigger: &'static str,

    /// Resent without arguments when the first reply is nearly empty
    pub fallback_trigger: Option<&'static str>,

    pub color: ColorSyntax,
    pub format: ResponseFormat,
    pub delays: Delays,
}

impl VendorProfile {
    /// Configuration commands with the colour argument filled in
    pub fn configure_commands(&self, background: Background) -> Vec<String> {
        self.configure
            .iter()
            .map(|cmd| self.fill(cmd, background))
            .collect()
    }

    /// Trigger command with the colour argument filled in
    pub fn trigger_command(&self, background: Background) -> String {
        self.fill(self.trigger, background)
    }

    fn fill(&self, template: &str, background: Background) -> String {
        template.replace(COLOR, self.color.argument(background))
    }
}

pub static LECROY: VendorProfile = VendorProfile {
    vendor: Vendor::LeCroy,
    configure: &["HCSU DEV,BMP,FORMAT,PORTRAIT,BCKG,{color},DEST,REMOTE,PORT,NET"],
    trigger: "SCREEN_DUMP",
    fallback_trigger: None,
    color: ColorSyntax::Background,
    format: ResponseFormat::Bmp,
    delays: Delays::from_millis(300, 1500),
};

pub static TEKTRONIX: VendorProfile = VendorProfile {
    vendor: Vendor::Tektronix,
    configure: &[
        "HARDcopy:PORT GPIB",
        "HARDcopy:FORMat BMP",
        "HARDcopy:INKSaver {color}",
    ],
    trigger: "HARDcopy START",
    fallback_trigger: None,
    color: ColorSyntax::InkSaver,
    format: ResponseFormat::Bmp,
    delays: Delays::from_millis(200, 2000),
};

pub static KEYSIGHT: VendorProfile = VendorProfile {
    vendor: Vendor::Keysight,
    configure: &[":DISP:DATA PNG,{color},COL"],
    trigger: ":DISP:DATA? PNG,{color},COL",
    fallback_trigger: None,
    color: ColorSyntax::Palette,
    format: ResponseFormat::Png,
    delays: Delays::from_millis(500, 500),
};

const RIGOL_FAMILY: VendorProfile = VendorProfile {
    vendor: Vendor::Rigol,
    configure: &[],
    trigger: ":DISP:DATA? ON,{color},PNG",
    fallback_trigger: Some(":DISP:DATA?"),
    color: ColorSyntax::Invert,
    format: ResponseFormat::Png,
    delays: Delays::from_millis(0, 500),
};

pub static RIGOL: VendorProfile = RIGOL_FAMILY;

pub static SIGLENT: VendorProfile = VendorProfile {
    vendor: Vendor::Siglent,
    ..RIGOL_FAMILY
};
