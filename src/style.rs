use serde::{Deserialize, Serialize};

/// The fixed set of font families offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontFamily {
    Helvetica,
    Arial,
    HelveticaNeue,
    TimesNewRoman,
    Courier,
    Rockwell,
    MarkerFelt,
    Noteworthy,
    Verdana,
    SnellRoundhand,
    BradleyHand,
    Papyrus,
}

impl FontFamily {
    pub const ALL: [FontFamily; 12] = [
        FontFamily::Helvetica,
        FontFamily::Arial,
        FontFamily::HelveticaNeue,
        FontFamily::TimesNewRoman,
        FontFamily::Courier,
        FontFamily::Rockwell,
        FontFamily::MarkerFelt,
        FontFamily::Noteworthy,
        FontFamily::Verdana,
        FontFamily::SnellRoundhand,
        FontFamily::BradleyHand,
        FontFamily::Papyrus,
    ];

    /// Name used to look the family up in the font database.
    pub fn family_name(&self) -> &'static str {
        match self {
            FontFamily::Helvetica => "Helvetica",
            FontFamily::Arial => "Arial",
            FontFamily::HelveticaNeue => "Helvetica Neue",
            FontFamily::TimesNewRoman => "Times New Roman",
            FontFamily::Courier => "Courier",
            FontFamily::Rockwell => "Rockwell",
            FontFamily::MarkerFelt => "Marker Felt",
            FontFamily::Noteworthy => "Noteworthy",
            FontFamily::Verdana => "Verdana",
            FontFamily::SnellRoundhand => "Snell Roundhand",
            FontFamily::BradleyHand => "Bradley Hand",
            FontFamily::Papyrus => "Papyrus",
        }
    }

    pub fn display_name(&self) -> &'static str {
        self.family_name()
    }
}

/// The fixed set of text colors offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextColor {
    Black,
    Blue,
    Cyan,
    Yellow,
    Red,
    Gray,
    Brown,
    Orange,
}

impl TextColor {
    pub const ALL: [TextColor; 8] = [
        TextColor::Black,
        TextColor::Blue,
        TextColor::Cyan,
        TextColor::Yellow,
        TextColor::Red,
        TextColor::Gray,
        TextColor::Brown,
        TextColor::Orange,
    ];

    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            TextColor::Black => (0x00, 0x00, 0x00),
            TextColor::Blue => (0x00, 0x00, 0xff),
            TextColor::Cyan => (0x00, 0xff, 0xff),
            TextColor::Yellow => (0xff, 0xff, 0x00),
            TextColor::Red => (0xff, 0x00, 0x00),
            TextColor::Gray => (0x80, 0x80, 0x80),
            TextColor::Brown => (0x99, 0x66, 0x33),
            TextColor::Orange => (0xff, 0x80, 0x00),
        }
    }

    /// Hex form used as an SVG fill.
    pub fn hex(&self) -> String {
        let (r, g, b) = self.rgb();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutMode {
    /// Re-render each fragment at its original frame over the source page.
    Overlay,
    /// Stream fragments as fixed-size paragraph lines on fresh pages.
    Reflow,
}

/// Style options supplied wholesale by the caller; the pipeline never
/// fills these in partially.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleSpec {
    pub font: FontFamily,
    pub color: TextColor,
    pub layout: LayoutMode,
}
