use serde::{Deserialize, Serialize};

use crate::card::CardRequest;
use crate::error::{ContextError, ErrorKind};

/// Names longer than this many characters are wrapped onto a second line.
pub const NAME_WRAP_WIDTH: usize = 15;

/// The name as it is drawn on the card, either on one line or wrapped onto two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameLines {
    /// The whole name, or its first half if it has been wrapped.
    pub first: String,
    /// The second half of a wrapped name.
    pub second: Option<String>,
}

impl NameLines {
    pub fn is_wrapped(&self) -> bool {
        self.second.is_some()
    }
}

/// Splits a name which is longer than `wrap_width` characters onto two lines.
///
/// The wrap point is the last space at or before the character position `wrap_width`; both halves
/// are trimmed. When there is no such space the name is cut at exactly `wrap_width` characters and
/// the halves are kept verbatim. Lengths are counted in characters, not bytes.
pub fn wrap_name(name: &str, wrap_width: usize) -> NameLines {
    let characters: Vec<char> = name.chars().collect();
    if characters.len() <= wrap_width {
        return NameLines {
            first: name.to_string(),
            second: None,
        };
    }

    // `characters.len() > wrap_width`, so the position `wrap_width` itself is in bounds
    let (first, second): (String, String) =
        match characters[..=wrap_width].iter().rposition(|character| *character == ' ') {
            Some(space_position) => (
                characters[..space_position]
                    .iter()
                    .collect::<String>()
                    .trim()
                    .to_string(),
                characters[space_position + 1..]
                    .iter()
                    .collect::<String>()
                    .trim()
                    .to_string(),
            ),
            None => (
                characters[..wrap_width].iter().collect(),
                characters[wrap_width..].iter().collect(),
            ),
        };

    NameLines {
        first,
        second: (!second.is_empty()).then_some(second),
    }
}

/// An RGB color which is written in configuration files as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RgbColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor::new(0x00, 0x00, 0x00);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        RgbColor { red, green, blue }
    }

    /// The color components in the `0.0..=1.0` range expected by the `rg` operator.
    pub fn components(&self) -> [f32; 3] {
        [self.red, self.green, self.blue].map(|component| component as f32 / 255.0)
    }
}

impl std::str::FromStr for RgbColor {
    type Err = ContextError;

    fn from_str(hex_color: &str) -> Result<Self, Self::Err> {
        let invalid_color = || {
            ContextError::with_context(format!(
                "The color {:?} is not in the #rrggbb format",
                hex_color
            ))
            .of_kind(ErrorKind::Configuration)
        };

        let digits = hex_color.strip_prefix('#').ok_or_else(invalid_color)?;
        if digits.len() != 6 || !digits.chars().all(|digit| digit.is_ascii_hexdigit()) {
            return Err(invalid_color());
        }
        let component = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| invalid_color())
        };

        Ok(RgbColor::new(component(0..2)?, component(2..4)?, component(4..6)?))
    }
}

impl TryFrom<String> for RgbColor {
    type Error = ContextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RgbColor> for String {
    fn from(color: RgbColor) -> Self {
        color.to_string()
    }
}

impl std::fmt::Display for RgbColor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "#{:02x}{:02x}{:02x}",
            self.red, self.green, self.blue
        )
    }
}

/// Which of the two registered font faces a piece of text is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FontWeight {
    Heavy,
    Regular,
}

/// The position of a text baseline: `x` from the left edge of the page and `top_offset` down
/// from its top edge, both in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    /// The distance from the left edge of the page.
    pub x: f32,
    /// The distance down from the top edge of the page.
    pub top_offset: f32,
}

impl Anchor {
    pub const fn new(x: f32, top_offset: f32) -> Self {
        Anchor { x, top_offset }
    }
}

/// One of the fixed address lines printed at the bottom of the card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressLine {
    /// The text of the line.
    pub text: String,
    /// The baseline of the line, flattened into the line itself in configuration files.
    #[serde(flatten)]
    pub anchor: Anchor,
}

/// A piece of text with everything needed to draw it onto the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    /// The text exactly as it is drawn.
    pub text: String,
    /// The font face the text is drawn with.
    pub weight: FontWeight,
    /// The font size in points.
    pub font_size: f32,
    /// The fill color of the glyphs.
    pub color: RgbColor,
    /// Baseline position in PDF user space (origin at the bottom left).
    pub position: [f32; 2],
}

/// Every position, size and color used when drawing the card. The defaults are tuned to the
/// geometry of the second page of the company template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardLayout {
    /// Names longer than this many characters are wrapped onto a second line.
    pub name_wrap_width: usize,
    /// The font size of the name, drawn in the heavy face.
    pub name_font_size: f32,
    /// The accent color of the name.
    pub name_color: RgbColor,
    /// Where the name goes, or its first half when it is wrapped.
    pub name_first_line: Anchor,
    /// Where the second half of a wrapped name goes.
    pub name_second_line: Anchor,
    /// The font size of the role, drawn in the regular face.
    pub role_font_size: f32,
    /// Where the role goes when the name fits on one line.
    pub role_after_single_line_name: Anchor,
    /// Where the role goes when the name was wrapped, so that the two never overlap.
    pub role_after_wrapped_name: Anchor,
    /// The font size shared by the phone number and the email.
    pub contact_font_size: f32,
    /// Where the phone number goes.
    pub phone: Anchor,
    /// Where the email goes.
    pub email: Anchor,
    /// The font size of the address lines.
    pub address_font_size: f32,
    /// The company address, drawn line by line.
    pub address_lines: Vec<AddressLine>,
    /// The color of everything but the name.
    pub text_color: RgbColor,
}

impl Default for CardLayout {
    fn default() -> Self {
        CardLayout {
            name_wrap_width: NAME_WRAP_WIDTH,
            name_font_size: 14.0,
            name_color: RgbColor::new(0xef, 0x40, 0x28),
            name_first_line: Anchor::new(28.0, 32.0),
            name_second_line: Anchor::new(28.0, 44.0),
            role_font_size: 8.0,
            role_after_single_line_name: Anchor::new(28.0, 44.0),
            role_after_wrapped_name: Anchor::new(28.0, 52.0),
            contact_font_size: 7.0,
            phone: Anchor::new(40.0, 65.0),
            email: Anchor::new(40.0, 80.0),
            address_font_size: 6.0,
            address_lines: vec![
                AddressLine {
                    text: "502- 5th Floor, I-Square Corporate Park,".into(),
                    anchor: Anchor::new(40.0, 100.0),
                },
                AddressLine {
                    text: "Science City Rd, near CIMS Hospital,".into(),
                    anchor: Anchor::new(38.0, 107.0),
                },
                AddressLine {
                    text: "Panchamrut Bunglows II, Sola, Ahmedabad, Gujarat 380060.".into(),
                    anchor: Anchor::new(40.0, 114.0),
                },
            ],
            text_color: RgbColor::BLACK,
        }
    }
}

impl CardLayout {
    /// Lays out the card for the given request on a page whose top edge is at `page_top`.
    /// The texts are returned in drawing order: name, role, phone, email and then the address.
    pub fn arrange(&self, request: &CardRequest, page_top: f32) -> Vec<PlacedText> {
        let at = |anchor: &Anchor| [anchor.x, page_top - anchor.top_offset];
        let name_lines = wrap_name(&request.name, self.name_wrap_width);
        let role_anchor = if name_lines.is_wrapped() {
            &self.role_after_wrapped_name
        } else {
            &self.role_after_single_line_name
        };

        let mut placed_texts = vec![PlacedText {
            text: name_lines.first.clone(),
            weight: FontWeight::Heavy,
            font_size: self.name_font_size,
            color: self.name_color,
            position: at(&self.name_first_line),
        }];
        if let Some(second_line) = name_lines.second {
            placed_texts.push(PlacedText {
                text: second_line,
                weight: FontWeight::Heavy,
                font_size: self.name_font_size,
                color: self.name_color,
                position: at(&self.name_second_line),
            });
        }

        let regular_text = |text: &str, font_size: f32, anchor: &Anchor| PlacedText {
            text: text.to_string(),
            weight: FontWeight::Regular,
            font_size,
            color: self.text_color,
            position: at(anchor),
        };
        placed_texts.push(regular_text(&request.role, self.role_font_size, role_anchor));
        placed_texts.push(regular_text(&request.phone, self.contact_font_size, &self.phone));
        placed_texts.push(regular_text(&request.email, self.contact_font_size, &self.email));
        placed_texts.extend(self.address_lines.iter().map(|address_line| {
            regular_text(
                &address_line.text,
                self.address_font_size,
                &address_line.anchor,
            )
        }));

        placed_texts
    }
}
