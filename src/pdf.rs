use lopdf::content::Operation;
use lopdf::{Dictionary, Object, ObjectId, Stream};
use std::{collections::BTreeSet, io::BufWriter, mem, path::Path};

use crate::error::{ContextError, ErrorKind};
use crate::fonts::CardFont;

/// How far up the page tree an inheritable attribute such as `MediaBox` or `Resources` is
/// looked for before giving up.
const MAXIMUM_PAGE_TREE_DEPTH: usize = 32;

/// The visible area of a page in PDF user space, i.e. its normalized `MediaBox`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    /// The x coordinate of the left edge.
    pub left: f32,
    /// The y coordinate of the bottom edge.
    pub bottom: f32,
    /// The x coordinate of the right edge.
    pub right: f32,
    /// The y coordinate of the top edge, from which the card texts are placed.
    pub top: f32,
}

impl PageBox {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

/// A font which has been added to an overlay, to be passed to `OverlayLayer::write_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontHandle(usize);

/// A font of an overlay together with the resource name it is referenced by and all the text
/// drawn with it, which decides the glyphs that end up embedded.
#[derive(Debug)]
struct OverlayFont<'a> {
    resource_name: String,
    font: &'a CardFont,
    drawn_text: String,
}

/// A transparent layer of text which is drawn on top of an existing page. It is built separately
/// from the document and then merged onto the page with `TemplateDocument::merge_overlay`.
#[derive(Debug)]
pub struct OverlayLayer<'a> {
    /// Resource names which are already taken on the target page.
    reserved_font_names: BTreeSet<String>,
    fonts: Vec<OverlayFont<'a>>,
    operations: Vec<Operation>,
}

impl<'a> OverlayLayer<'a> {
    pub fn new<I, S>(reserved_font_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OverlayLayer {
            reserved_font_names: reserved_font_names.into_iter().map(Into::into).collect(),
            fonts: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Adds a font to the layer under a resource name which does not clash with the fonts that the
    /// page already uses, returning the handle with which text can be written in it.
    pub fn add_font(&mut self, font: &'a CardFont) -> FontHandle {
        let resource_name = (0..)
            .map(|index| format!("CardF{}", index))
            .find(|candidate| {
                !self.reserved_font_names.contains(candidate)
                    && !self
                        .fonts
                        .iter()
                        .any(|overlay_font| &overlay_font.resource_name == candidate)
            })
            .unwrap_or_default();
        self.fonts.push(OverlayFont {
            resource_name,
            font,
            drawn_text: String::new(),
        });

        FontHandle(self.fonts.len() - 1)
    }

    /// The resource name under which the font of the given handle is referenced.
    pub fn font_name(&self, font: FontHandle) -> Option<&str> {
        self.fonts
            .get(font.0)
            .map(|overlay_font| overlay_font.resource_name.as_str())
    }

    /// Writes the text in the given font, size and RGB color with its baseline starting at
    /// `position`, which is expressed in points.
    pub fn write_text(
        &mut self,
        font: FontHandle,
        font_size: f32,
        color: [f32; 3],
        text: &str,
        position: [f32; 2],
    ) -> Result<(), ContextError> {
        let overlay_font = self.fonts.get_mut(font.0).ok_or_else(|| {
            ContextError::with_context(format!("Failed to find the font {} in the overlay", font.0))
        })?;
        overlay_font.drawn_text.push_str(text);

        let [x, y] = position;
        let [red, green, blue] = color;
        self.operations.extend(vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(overlay_font.resource_name.clone().into_bytes()),
                    font_size.into(),
                ],
            ),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("rg", vec![red.into(), green.into(), blue.into()]),
            Operation::new("Tj", vec![overlay_font.font.encode_text(text)]),
            Operation::new("ET", vec![]),
        ]);

        Ok(())
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Encodes the layer into a content stream. The stream first restores the graphics state
    /// saved before the page content, so that the overlay is not affected by whatever
    /// transformation the template leaves behind.
    fn into_stream(self) -> Result<Stream, ContextError> {
        let mut operations = Vec::with_capacity(self.operations.len() + 3);
        operations.push(Operation::new("Q", vec![]));
        operations.push(Operation::new("q", vec![]));
        operations.extend(self.operations);
        operations.push(Operation::new("Q", vec![]));

        let stream_content = lopdf::content::Content { operations }
            .encode()
            .map_err(|error| ContextError::with_error("Failed to encode the overlay content", &error))?;

        Ok(Stream::new(Dictionary::new(), stream_content))
    }
}

/// A PDF template loaded in memory, onto whose pages overlays can be merged.
///
/// Pages which do not receive an overlay are never touched: the overlay target gets its own
/// copies of the resources and content array it modifies, so that objects shared with the other
/// pages stay byte-for-byte identical.
pub struct TemplateDocument {
    /// The underlying PDF document.
    pub inner_document: lopdf::Document,
    /// The page objects in page order.
    page_ids: Vec<ObjectId>,
}

impl TemplateDocument {
    /// Reads and parses the template at the given path.
    pub fn from_path(template_path: &Path) -> Result<Self, ContextError> {
        let template_bytes = std::fs::read(template_path).map_err(|error| {
            ContextError::with_error(
                format!("Failed to read the template {:?}", template_path),
                &error,
            )
            .of_kind(ErrorKind::MissingTemplate)
        })?;

        Self::from_bytes(&template_bytes)
    }

    pub fn from_bytes(template_bytes: &[u8]) -> Result<Self, ContextError> {
        let inner_document = lopdf::Document::load_mem(template_bytes).map_err(|error| {
            ContextError::with_error("Failed to parse the template", &error)
                .of_kind(ErrorKind::MalformedTemplate)
        })?;
        let page_ids = inner_document.get_pages().into_values().collect();

        Ok(TemplateDocument {
            inner_document,
            page_ids,
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Fails unless the template has at least the given number of pages.
    pub fn require_pages(&self, minimum_page_count: usize) -> Result<(), ContextError> {
        if self.page_count() < minimum_page_count {
            return Err(ContextError::with_context(format!(
                "The template has {} page(s), but at least {} are required",
                self.page_count(),
                minimum_page_count
            ))
            .of_kind(ErrorKind::MalformedTemplate));
        }

        Ok(())
    }

    /// The dimensions of the page at the given (zero-based) index.
    pub fn page_box(&self, page_index: usize) -> Result<PageBox, ContextError> {
        let page_id = self.page_id(page_index)?;
        let media_box = self
            .inherited_attribute(page_id, b"MediaBox")?
            .ok_or_else(|| {
                ContextError::with_context(format!("The page {} has no media box", page_index))
                    .of_kind(ErrorKind::MalformedTemplate)
            })?;
        let media_box = match media_box {
            Object::Reference(media_box_id) => self.get_object(media_box_id)?.clone(),
            media_box => media_box,
        };

        let coordinates = match &media_box {
            Object::Array(coordinates) if coordinates.len() == 4 => coordinates
                .iter()
                .map(|coordinate| match coordinate {
                    Object::Integer(value) => Some(*value as f32),
                    Object::Real(value) => Some(*value),
                    _ => None,
                })
                .collect::<Option<Vec<f32>>>(),
            _ => None,
        }
        .ok_or_else(|| {
            ContextError::with_context(format!(
                "The media box {:?} of the page {} is invalid",
                media_box, page_index
            ))
            .of_kind(ErrorKind::MalformedTemplate)
        })?;

        Ok(PageBox {
            left: coordinates[0].min(coordinates[2]),
            bottom: coordinates[1].min(coordinates[3]),
            right: coordinates[0].max(coordinates[2]),
            top: coordinates[1].max(coordinates[3]),
        })
    }

    /// Creates an empty overlay for the page at the given index, aware of the font names the page
    /// already uses.
    pub fn new_overlay<'a>(&self, page_index: usize) -> Result<OverlayLayer<'a>, ContextError> {
        let page_id = self.page_id(page_index)?;
        let resources = self.page_resources(page_id)?;
        let font_names: Vec<String> = self
            .font_resources(&resources)?
            .iter()
            .map(|(name, _)| String::from_utf8_lossy(name).into_owned())
            .collect();

        Ok(OverlayLayer::new(font_names))
    }

    /// Draws the overlay on top of the page at the given index: the fonts of the overlay are
    /// embedded and added to the page resources, the existing content is wrapped into a saved
    /// graphics state and the overlay content is appended after it.
    pub fn merge_overlay(
        &mut self,
        page_index: usize,
        overlay: OverlayLayer<'_>,
    ) -> Result<(), ContextError> {
        let page_id = self.page_id(page_index)?;

        let mut resources = self.page_resources(page_id)?;
        let mut font_resources = self.font_resources(&resources)?;
        for overlay_font in overlay.fonts.iter() {
            let font_dictionary = overlay_font
                .font
                .insert_into_document(&mut self.inner_document, &overlay_font.drawn_text);
            let font_id = self.inner_document.add_object(font_dictionary);
            font_resources.set(
                overlay_font.resource_name.clone().into_bytes(),
                Object::Reference(font_id),
            );
        }
        resources.set("Font", Object::Dictionary(font_resources));

        let mut contents = self.page_contents(page_id)?;
        let save_state_id = self
            .inner_document
            .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let overlay_id = self.inner_document.add_object(overlay.into_stream()?);
        contents.insert(0, Object::Reference(save_state_id));
        contents.push(Object::Reference(overlay_id));

        let page = self
            .inner_document
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|error| {
                ContextError::with_error(format!("Failed to find the page {}", page_index), &error)
            })?;
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Array(contents));

        Ok(())
    }

    /// Save the document to bytes in order for it to be written to a file or further processed.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, ContextError> {
        let mut pdf_document_bytes = Vec::new();
        let mut writer = BufWriter::new(&mut pdf_document_bytes);
        self.inner_document.save_to(&mut writer).map_err(|error| {
            ContextError::with_error("Error while saving the PDF document to bytes", &error)
        })?;
        mem::drop(writer);

        Ok(pdf_document_bytes)
    }

    /// Save the document to a file at the given path, replacing it if it exists.
    pub fn save(&mut self, output_path: &Path) -> Result<(), ContextError> {
        let output_file = std::fs::File::create(output_path).map_err(|error| {
            ContextError::with_error(format!("Failed to create the file {:?}", output_path), &error)
                .of_kind(ErrorKind::Io)
        })?;
        self.inner_document
            .save_to(&mut BufWriter::new(output_file))
            .map_err(|error| {
                ContextError::with_error(format!("Failed to save the PDF to {:?}", output_path), &error)
                    .of_kind(ErrorKind::Io)
            })?;

        Ok(())
    }

    fn page_id(&self, page_index: usize) -> Result<ObjectId, ContextError> {
        self.page_ids.get(page_index).copied().ok_or_else(|| {
            ContextError::with_context(format!(
                "Failed to find the page with index {} in a template of {} page(s)",
                page_index,
                self.page_count()
            ))
            .of_kind(ErrorKind::MalformedTemplate)
        })
    }

    fn get_object(&self, object_id: ObjectId) -> Result<&Object, ContextError> {
        self.inner_document.get_object(object_id).map_err(|error| {
            ContextError::with_error(format!("Failed to find the object {:?}", object_id), &error)
                .of_kind(ErrorKind::MalformedTemplate)
        })
    }

    /// Looks the attribute up on the page and then on its ancestors in the page tree.
    fn inherited_attribute(
        &self,
        page_id: ObjectId,
        key: &[u8],
    ) -> Result<Option<Object>, ContextError> {
        let mut node_id = page_id;
        for _ in 0..MAXIMUM_PAGE_TREE_DEPTH {
            let node = self.get_object(node_id)?.as_dict().map_err(|error| {
                ContextError::with_error("A page tree node is not a dictionary", &error)
                    .of_kind(ErrorKind::MalformedTemplate)
            })?;
            if let Ok(attribute) = node.get(key) {
                return Ok(Some(attribute.clone()));
            }
            match node.get(b"Parent").and_then(Object::as_reference) {
                Ok(parent_id) => node_id = parent_id,
                Err(_) => return Ok(None),
            }
        }

        Ok(None)
    }

    /// A private copy of the resources of the page, resolving inheritance and indirection.
    fn page_resources(&self, page_id: ObjectId) -> Result<Dictionary, ContextError> {
        match self.inherited_attribute(page_id, b"Resources")? {
            Some(Object::Dictionary(resources)) => Ok(resources),
            Some(Object::Reference(resources_id)) => self.resolve_dictionary(resources_id),
            _ => Ok(Dictionary::new()),
        }
    }

    /// A private copy of the `Font` subdictionary of the given resources.
    fn font_resources(&self, resources: &Dictionary) -> Result<Dictionary, ContextError> {
        match resources.get(b"Font") {
            Ok(Object::Dictionary(font_resources)) => Ok(font_resources.clone()),
            Ok(Object::Reference(font_resources_id)) => self.resolve_dictionary(*font_resources_id),
            _ => Ok(Dictionary::new()),
        }
    }

    fn resolve_dictionary(&self, dictionary_id: ObjectId) -> Result<Dictionary, ContextError> {
        self.get_object(dictionary_id)?
            .as_dict()
            .cloned()
            .map_err(|error| {
                ContextError::with_error(
                    format!("The object {:?} is not a dictionary", dictionary_id),
                    &error,
                )
                .of_kind(ErrorKind::MalformedTemplate)
            })
    }

    /// The references to the content streams of the page, in drawing order.
    fn page_contents(&self, page_id: ObjectId) -> Result<Vec<Object>, ContextError> {
        let page = self.get_object(page_id)?.as_dict().map_err(|error| {
            ContextError::with_error("The page is not a dictionary", &error)
                .of_kind(ErrorKind::MalformedTemplate)
        })?;

        Ok(match page.get(b"Contents") {
            Ok(Object::Reference(contents_id)) => match self.get_object(*contents_id)? {
                Object::Array(contents) => contents.clone(),
                _ => vec![Object::Reference(*contents_id)],
            },
            Ok(Object::Array(contents)) => contents.clone(),
            _ => Vec::new(),
        })
    }
}
