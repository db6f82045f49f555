use lopdf::{Object, StringFormat};
use once_cell::sync::OnceCell;
use owned_ttf_parser::{AsFaceRef as _, Face, OwnedFace};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    path::{Path, PathBuf},
    sync::Arc,
};
use unicode_normalization::UnicodeNormalization as _;

use crate::error::{ContextError, ErrorKind};
use crate::layout::FontWeight;

/// The fonts every PDF reader ships with, which can be referenced without embedding any data.
pub const STANDARD_FONTS: [&str; 14] = [
    "Courier",
    "Courier-Bold",
    "Courier-BoldOblique",
    "Courier-Oblique",
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-BoldOblique",
    "Helvetica-Oblique",
    "Times-Roman",
    "Times-Bold",
    "Times-BoldItalic",
    "Times-Italic",
    "Symbol",
    "ZapfDingbats",
];

/// Where a font comes from: either a TTF/OTF file to be embedded into the card, or the name of
/// one of the standard PDF fonts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum FontSource {
    /// The path of a TTF/OTF file.
    TrueType(PathBuf),
    /// One of the `STANDARD_FONTS`.
    Standard(String),
}

/// The two font faces the card is drawn with.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FontSources {
    /// The face of the name.
    pub heavy: FontSource,
    /// The face of every other text.
    pub regular: FontSource,
}

impl Default for FontSources {
    fn default() -> Self {
        FontSources {
            heavy: FontSource::TrueType("gilroy/Gilroy-Heavy.ttf".into()),
            regular: FontSource::TrueType("gilroy/Gilroy-Regular.ttf".into()),
        }
    }
}

/// The (insofar) relevant vertical metrics of a font.
#[derive(Clone, Copy, Debug, Default)]
struct FontMetrics {
    ascent: i16,
    descent: i16,
    units_per_em: u16,
}

/// The (insofar) relevant metrics associated to a single glyph of a font.
#[derive(Clone, Copy, Debug, Default)]
struct GlyphMetrics {
    width: u32,
    height: u32,
}

/// A font face loaded from a TTF font, together with its measure of units per em.
#[derive(Clone, Debug)]
struct TtfFontFace {
    inner: Arc<OwnedFace>,
    units_per_em: u16,
}

impl TtfFontFace {
    /// Constructs a font face from the underlying raw data extracted from the TTF font file.
    fn from_bytes(data: &[u8]) -> Result<Self, ContextError> {
        let face = OwnedFace::from_vec(data.to_vec(), 0).map_err(|error| {
            ContextError::with_error("Failed to parse font", &error).of_kind(ErrorKind::MalformedFont)
        })?;
        let units_per_em = face.as_face_ref().units_per_em();

        Ok(Self {
            inner: Arc::new(face),
            units_per_em,
        })
    }

    fn face(&self) -> &Face<'_> {
        self.inner.as_face_ref()
    }

    fn font_metrics(&self) -> FontMetrics {
        FontMetrics {
            ascent: self.face().ascender(),
            descent: self.face().descender(),
            units_per_em: self.units_per_em,
        }
    }

    fn glyph_id(&self, codepoint: char) -> Option<u16> {
        self.face()
            .glyph_index(codepoint)
            .map(|glyph_id| glyph_id.0)
    }

    /// The PostScript name recorded in the font, if it has a Unicode one.
    fn postscript_name(&self) -> Option<String> {
        self.face()
            .names()
            .into_iter()
            .filter(|name| name.name_id == owned_ttf_parser::name_id::POST_SCRIPT_NAME)
            .find_map(|name| name.to_string())
    }

    /// Retrieve the mapping between the glyph IDs and the characters (codepoints), that specifically
    /// contains exactly the number of unicode glyphs present in the font.
    fn glyph_ids(&self) -> HashMap<u16, char> {
        let font_subtables = self.face().tables().cmap.map(|cmap| {
            cmap.subtables
                .into_iter()
                .filter(|font_subtable| font_subtable.is_unicode())
        });
        let Some(font_subtables) = font_subtables else {
            return HashMap::new();
        };

        let mut gid_to_codepoint_map =
            HashMap::with_capacity(self.face().number_of_glyphs().into());
        for font_subtable in font_subtables {
            font_subtable.codepoints(|codepoint| {
                if let Ok(character) = char::try_from(codepoint) {
                    // Glyph 0 is `.notdef` and never maps back to a character
                    if let Some(glyph_index) = font_subtable
                        .glyph_index(codepoint)
                        .filter(|index| index.0 > 0)
                    {
                        gid_to_codepoint_map
                            .entry(glyph_index.0)
                            .or_insert(character);
                    }
                }
            })
        }

        gid_to_codepoint_map
    }

    fn glyph_metrics(&self, glyph_id: u16) -> Option<GlyphMetrics> {
        let glyph_id = owned_ttf_parser::GlyphId(glyph_id);
        let width = self.face().glyph_hor_advance(glyph_id)? as u32;
        // The height is corrected with the descender, which holds for horizontally-laid fonts
        let height = self
            .face()
            .glyph_bounding_box(glyph_id)
            .map(|bounding_box| {
                i32::from(bounding_box.y_max) - i32::from(bounding_box.y_min)
                    - i32::from(self.face().descender())
            })
            .unwrap_or(1000)
            .max(0) as u32;

        Some(GlyphMetrics { width, height })
    }
}

/// A TTF font which is embedded into the card as a `Type0` font with `Identity-H` encoding.
///
/// Only the glyphs drawn on the card are kept in the embedded font program, with their original
/// glyph IDs. A full program would make every card as large as the font file (hundreds of kB for
/// fonts with a broad coverage), so the whole font is only embedded if subsetting fails.
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    bytes: Arc<Vec<u8>>,
    ttf_face: TtfFontFace,
    base_name: String,
}

impl EmbeddedFont {
    /// Reads and parses the font at the given path.
    pub fn from_path(font_path: &Path) -> Result<Self, ContextError> {
        let font_bytes = std::fs::read(font_path).map_err(|error| {
            ContextError::with_error(format!("Failed to read the font {:?}", font_path), &error)
                .of_kind(ErrorKind::MissingFont)
        })?;
        let fallback_name = font_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "CardFont".into());

        Self::from_bytes(font_bytes, &fallback_name)
    }

    pub fn from_bytes(font_bytes: Vec<u8>, fallback_name: &str) -> Result<Self, ContextError> {
        let ttf_face = TtfFontFace::from_bytes(&font_bytes)?;
        let base_name = sanitize_base_name(
            &ttf_face
                .postscript_name()
                .unwrap_or_else(|| fallback_name.to_string()),
        );

        Ok(EmbeddedFont {
            bytes: Arc::new(font_bytes),
            ttf_face,
            base_name,
        })
    }

    /// Encodes the text as the big-endian glyph IDs expected by the `Identity-H` encoding.
    fn encode_text(&self, text: &str) -> Object {
        let mut glyph_id_bytes = Vec::with_capacity(text.len() * 2);
        for character in text.nfc() {
            match self.ttf_face.glyph_id(character) {
                Some(glyph_id) => glyph_id_bytes.extend_from_slice(&glyph_id.to_be_bytes()),
                None => log::warn!(
                    "Unable to find the character {:?} in the font {:?}",
                    character,
                    self.base_name
                ),
            }
        }

        Object::String(glyph_id_bytes, StringFormat::Hexadecimal)
    }

    /// The IDs of the glyphs needed to draw the text, always including `.notdef`.
    fn used_glyph_ids(&self, drawn_text: &str) -> BTreeSet<u16> {
        std::iter::once(0)
            .chain(
                drawn_text
                    .nfc()
                    .filter_map(|character| self.ttf_face.glyph_id(character)),
            )
            .collect()
    }

    /// The font program reduced to the given glyphs, whose IDs are left unchanged.
    fn subset_program(&self, glyph_ids: &BTreeSet<u16>) -> Vec<u8> {
        let glyph_ids: Vec<u16> = glyph_ids.iter().copied().collect();
        match subsetter::subset(&self.bytes, 0, subsetter::Profile::pdf(&glyph_ids)) {
            Ok(subset_bytes) => subset_bytes,
            Err(error) => {
                log::warn!(
                    "Unable to subset the font {:?}, embedding all of it: {:?}",
                    self.base_name,
                    error
                );
                self.bytes.to_vec()
            }
        }
    }

    /// Inserts the font program, its descriptor and its `ToUnicode` map into the document,
    /// returning the font dictionary to be referenced from the page resources. Only the glyphs
    /// of `drawn_text` are embedded, measured and mapped back to Unicode.
    fn insert_into_document(
        &self,
        inner_document: &mut lopdf::Document,
        drawn_text: &str,
    ) -> lopdf::Dictionary {
        use lopdf::Object::*;
        let face_metrics = self.ttf_face.font_metrics();
        let used_glyph_ids = self.used_glyph_ids(drawn_text);

        let font_program = self.subset_program(&used_glyph_ids);
        log::debug!(
            "Embedding {} glyph(s) of the font {:?} in {} bytes",
            used_glyph_ids.len(),
            self.base_name,
            font_program.len()
        );
        let font_stream = lopdf::Stream::new(
            lopdf::Dictionary::from_iter(vec![("Length1", Integer(font_program.len() as i64))]),
            font_program,
        );

        let mut font_vector: Vec<(::std::string::String, lopdf::Object)> = vec![
            ("Type".into(), Name("Font".into())),
            ("Subtype".into(), Name("Type0".into())),
            ("BaseFont".into(), Name(self.base_name.clone().into_bytes())),
            // `Identity-H` is used for horizontal writing
            ("Encoding".into(), Name("Identity-H".into())),
        ];

        let mut font_descriptor_vector: Vec<(::std::string::String, lopdf::Object)> = vec![
            ("Type".into(), Name("FontDescriptor".into())),
            ("FontName".into(), Name(self.base_name.clone().into_bytes())),
            ("Ascent".into(), Integer(i64::from(face_metrics.ascent))),
            ("Descent".into(), Integer(i64::from(face_metrics.descent))),
            ("CapHeight".into(), Integer(i64::from(face_metrics.ascent))),
            ("ItalicAngle".into(), Integer(0)),
            // Nonsymbolic font using the standard Latin character set
            ("Flags".into(), Integer(32)),
            ("StemV".into(), Integer(80)),
        ];

        let mut maximum_character_height = 0;
        let mut total_width = 0;

        // Glyph ID -> (codepoint, width, height)
        let mut gid_to_glyph_properties_map = BTreeMap::<u32, (u32, u32, u32)>::new();
        gid_to_glyph_properties_map.insert(0, (0, 1000, 1000));

        for (glyph_id, character) in self.ttf_face.glyph_ids() {
            if !used_glyph_ids.contains(&glyph_id) {
                continue;
            }
            if let Some(glyph_metrics) = self.ttf_face.glyph_metrics(glyph_id) {
                maximum_character_height = maximum_character_height.max(glyph_metrics.height);
                total_width += glyph_metrics.width;
                gid_to_glyph_properties_map.insert(
                    glyph_id as u32,
                    (character as u32, glyph_metrics.width, glyph_metrics.height),
                );
            }
        }

        // A `bfchar` block may hold at most 100 entries, all of which must share the high byte
        let mut current_high_byte: u32 = 0;
        let mut all_gid_to_character_blocks = Vec::new();
        let mut current_gid_to_character_block = Vec::new();
        for (glyph_id, (character, _glyph_width, _glyph_height)) in
            gid_to_glyph_properties_map.iter()
        {
            if (*glyph_id >> 8) != current_high_byte || current_gid_to_character_block.len() >= 100
            {
                all_gid_to_character_blocks.push(std::mem::take(&mut current_gid_to_character_block));
                current_high_byte = *glyph_id >> 8;
            }
            current_gid_to_character_block.push((*glyph_id, *character));
        }
        all_gid_to_character_blocks.push(current_gid_to_character_block);

        let cid_to_unicode_map =
            generate_cid_to_unicode_map(&self.base_name, all_gid_to_character_blocks);
        let cid_to_unicode_map_stream = lopdf::Stream::new(
            lopdf::Dictionary::new(),
            cid_to_unicode_map.into_bytes(),
        );
        let cid_to_unicode_map_stream_id = inner_document.add_object(cid_to_unicode_map_stream);

        // Widths are encoded as runs such as `20 [21 99 34]`, meaning that the glyph 20 is 21 units
        // wide, the glyph 21 is 99 units wide and so on (PDF 1.7 reference, page 439)
        let mut width_objects = Vec::<Object>::new();
        let mut current_lesser_glyph_id = 0;
        let mut current_upper_gid = 0;
        let mut current_widths_vector = Vec::<Object>::new();

        // Widths are expressed in thousandths of an em
        let percentage_font_scaling = 1000.0 / (face_metrics.units_per_em as f32);

        for &glyph_id in used_glyph_ids.iter() {
            let Some(GlyphMetrics { width, .. }) = self.ttf_face.glyph_metrics(glyph_id) else {
                log::debug!(
                    "Glyph ID {} of the font {:?} has no width, skipping it",
                    glyph_id,
                    self.base_name
                );
                continue;
            };
            let scaled_width = Integer((width as f32 * percentage_font_scaling) as i64);
            if glyph_id == current_upper_gid {
                current_widths_vector.push(scaled_width);
                current_upper_gid += 1;
            } else {
                width_objects.push(Integer(current_lesser_glyph_id as i64));
                width_objects.push(Array(std::mem::take(&mut current_widths_vector)));

                current_widths_vector.push(scaled_width);
                current_lesser_glyph_id = glyph_id;
                current_upper_gid = glyph_id + 1;
            }
        }
        // The loop lags one run behind
        width_objects.push(Integer(current_lesser_glyph_id as i64));
        width_objects.push(Array(std::mem::take(&mut current_widths_vector)));

        let mut font_descriptors = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Font".into())),
            ("Subtype", Name("CIDFontType2".into())),
            ("BaseFont", Name(self.base_name.clone().into_bytes())),
            (
                "CIDSystemInfo",
                Dictionary(lopdf::Dictionary::from_iter(vec![
                    ("Registry", String("Adobe".into(), StringFormat::Literal)),
                    ("Ordering", String("Identity".into(), StringFormat::Literal)),
                    ("Supplement", Integer(0)),
                ])),
            ),
            ("W", Array(width_objects)),
            ("DW", Integer(1000)),
        ]);

        let font_bounding_box = vec![
            Integer(0),
            Integer(maximum_character_height as i64),
            Integer(total_width as i64),
            Integer(maximum_character_height as i64),
        ];
        font_descriptor_vector.push((
            "FontFile2".into(),
            Reference(inner_document.add_object(font_stream)),
        ));
        // Not required by the format, but Adobe Reader wants it
        font_descriptor_vector.push(("FontBBox".into(), Array(font_bounding_box)));

        let font_descriptor_vector_id =
            inner_document.add_object(lopdf::Dictionary::from_iter(font_descriptor_vector));
        font_descriptors.set("FontDescriptor", Reference(font_descriptor_vector_id));

        font_vector.push((
            "DescendantFonts".into(),
            Array(vec![Dictionary(font_descriptors)]),
        ));
        font_vector.push(("ToUnicode".into(), Reference(cid_to_unicode_map_stream_id)));

        lopdf::Dictionary::from_iter(font_vector)
    }
}

/// One of the standard PDF fonts, written with `WinAnsiEncoding`.
#[derive(Debug, Clone)]
pub struct StandardFont {
    base_name: String,
}

impl StandardFont {
    pub fn new(base_name: &str) -> Result<Self, ContextError> {
        if !STANDARD_FONTS.contains(&base_name) {
            return Err(ContextError::with_context(format!(
                "{:?} is not one of the standard PDF fonts",
                base_name
            ))
            .of_kind(ErrorKind::MissingFont));
        }

        Ok(StandardFont {
            base_name: base_name.to_string(),
        })
    }

    fn encode_text(&self, text: &str) -> Object {
        let text_bytes = text
            .nfc()
            .map(|character| match u8::try_from(u32::from(character)) {
                Ok(byte) => byte,
                Err(_) => {
                    log::warn!(
                        "Unable to encode the character {:?} with the font {:?}",
                        character,
                        self.base_name
                    );
                    b'?'
                }
            })
            .collect();

        Object::String(text_bytes, StringFormat::Literal)
    }

    fn insert_into_document(&self) -> lopdf::Dictionary {
        use lopdf::Object::Name;

        lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Font".into())),
            ("Subtype", Name("Type1".into())),
            ("BaseFont", Name(self.base_name.clone().into_bytes())),
            ("Encoding", Name("WinAnsiEncoding".into())),
        ])
    }
}

/// A font which can be drawn onto a card.
#[derive(Debug, Clone)]
pub enum CardFont {
    Embedded(EmbeddedFont),
    Standard(StandardFont),
}

impl CardFont {
    pub fn load(source: &FontSource) -> Result<Self, ContextError> {
        match source {
            FontSource::TrueType(font_path) => {
                Ok(CardFont::Embedded(EmbeddedFont::from_path(font_path)?))
            }
            FontSource::Standard(base_name) => {
                Ok(CardFont::Standard(StandardFont::new(base_name)?))
            }
        }
    }

    /// The name under which the font is known to PDF readers.
    pub fn base_name(&self) -> &str {
        match self {
            CardFont::Embedded(font) => &font.base_name,
            CardFont::Standard(font) => &font.base_name,
        }
    }

    /// Encodes the text as the operand of a `Tj` operator.
    pub(crate) fn encode_text(&self, text: &str) -> Object {
        match self {
            CardFont::Embedded(font) => font.encode_text(text),
            CardFont::Standard(font) => font.encode_text(text),
        }
    }

    /// Adds the font to the document for drawing `drawn_text`, returning its font dictionary.
    pub(crate) fn insert_into_document(
        &self,
        inner_document: &mut lopdf::Document,
        drawn_text: &str,
    ) -> lopdf::Dictionary {
        match self {
            CardFont::Embedded(font) => font.insert_into_document(inner_document, drawn_text),
            CardFont::Standard(font) => font.insert_into_document(),
        }
    }
}

/// The heavy and regular faces once they have been loaded.
#[derive(Debug)]
pub struct RegisteredFonts {
    /// The loaded face of the name.
    pub heavy: CardFont,
    /// The loaded face of every other text.
    pub regular: CardFont,
}

impl RegisteredFonts {
    pub fn load(sources: &FontSources) -> Result<Self, ContextError> {
        Ok(RegisteredFonts {
            heavy: CardFont::load(&sources.heavy)?,
            regular: CardFont::load(&sources.regular)?,
        })
    }

    pub fn for_weight(&self, weight: FontWeight) -> &CardFont {
        match weight {
            FontWeight::Heavy => &self.heavy,
            FontWeight::Regular => &self.regular,
        }
    }
}

/// Loads the card fonts the first time they are needed and hands out the same faces afterwards,
/// so that concurrent requests never parse the font files more than once.
#[derive(Debug)]
pub struct FontRegistry {
    sources: FontSources,
    fonts: OnceCell<RegisteredFonts>,
}

impl FontRegistry {
    pub fn new(sources: FontSources) -> Self {
        FontRegistry {
            sources,
            fonts: OnceCell::new(),
        }
    }

    /// Returns the registered fonts, loading them if this is the first call. A failed load leaves
    /// the registry empty so that the next call retries it.
    pub fn register(&self) -> Result<&RegisteredFonts, ContextError> {
        self.fonts.get_or_try_init(|| {
            let fonts = RegisteredFonts::load(&self.sources)?;
            log::info!(
                "Registered the fonts {:?} (heavy) and {:?} (regular)",
                fonts.heavy.base_name(),
                fonts.regular.base_name()
            );
            Ok(fonts)
        })
    }

    pub fn is_registered(&self) -> bool {
        self.fonts.get().is_some()
    }
}

/// Keeps the characters that are safe in a PDF name, since the font names end up as `/BaseFont`.
fn sanitize_base_name(name: &str) -> String {
    let base_name: String = name
        .chars()
        .filter(|character| character.is_ascii_alphanumeric() || *character == '-')
        .collect();
    if base_name.is_empty() {
        "CardFont".into()
    } else {
        base_name
    }
}

type GlyphId = u32;
type UnicodeCodePoint = u32;
type CmapBlock = Vec<(GlyphId, UnicodeCodePoint)>;

/// Generates the `ToUnicode` character map of a font from its glyph blocks.
fn generate_cid_to_unicode_map(face_name: &str, all_cmap_blocks: Vec<CmapBlock>) -> String {
    let mut cid_to_unicode_map =
        format!(include_str!("../assets/gid_to_unicode_beg.txt"), face_name);

    for cmap_block in all_cmap_blocks.into_iter().filter(|block| !block.is_empty()) {
        cid_to_unicode_map.push_str(format!("{} beginbfchar\r\n", cmap_block.len()).as_str());
        for (glyph_id, unicode) in cmap_block {
            let utf16_hex: String = char::from_u32(unicode)
                .map(|character| {
                    character
                        .encode_utf16(&mut [0; 2])
                        .iter()
                        .map(|unit| format!("{unit:04x}"))
                        .collect()
                })
                .unwrap_or_else(|| "fffd".into());
            cid_to_unicode_map.push_str(format!("<{glyph_id:04x}> <{utf16_hex}>\n").as_str());
        }
        cid_to_unicode_map.push_str("endbfchar\r\n");
    }

    cid_to_unicode_map.push_str(include_str!("../assets/gid_to_unicode_end.txt"));

    cid_to_unicode_map
}
