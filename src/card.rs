use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::configuration::CardConfiguration;
use crate::error::ContextError;
use crate::fonts::{FontRegistry, FontSources, RegisteredFonts};
use crate::layout::{CardLayout, FontWeight};
use crate::pdf::TemplateDocument;

/// The (zero-based) index of the template page the card details are drawn onto.
pub const OVERLAY_PAGE_INDEX: usize = 1;

/// The details of the person a card is generated for, exactly as they were submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRequest {
    /// The full name, wrapped onto two lines when it is too long.
    pub name: String,
    /// The role or title of the person.
    pub role: String,
    /// The email address.
    pub email: String,
    /// The contact number, printed as it was typed.
    pub phone: String,
}

/// Draws the card details onto the second page of the template and returns the resulting PDF.
/// Every other page of the template is carried over untouched and in its original order.
pub fn generate(
    request: &CardRequest,
    template_path: &Path,
    layout: &CardLayout,
    fonts: &RegisteredFonts,
) -> Result<Vec<u8>, ContextError> {
    render_card(request, template_path, layout, fonts)?.save_to_bytes()
}

fn render_card(
    request: &CardRequest,
    template_path: &Path,
    layout: &CardLayout,
    fonts: &RegisteredFonts,
) -> Result<TemplateDocument, ContextError> {
    let mut template = TemplateDocument::from_path(template_path)?;
    template.require_pages(OVERLAY_PAGE_INDEX + 1)?;
    let page_box = template.page_box(OVERLAY_PAGE_INDEX)?;
    log::debug!(
        "Drawing the card for {:?} onto a {}x{} page",
        request.name,
        page_box.width(),
        page_box.height()
    );

    let mut overlay = template.new_overlay(OVERLAY_PAGE_INDEX)?;
    let heavy_font = overlay.add_font(fonts.for_weight(FontWeight::Heavy));
    let regular_font = overlay.add_font(fonts.for_weight(FontWeight::Regular));
    for placed_text in layout.arrange(request, page_box.top) {
        let font = match placed_text.weight {
            FontWeight::Heavy => heavy_font,
            FontWeight::Regular => regular_font,
        };
        overlay.write_text(
            font,
            placed_text.font_size,
            placed_text.color.components(),
            &placed_text.text,
            placed_text.position,
        )?;
    }
    template.merge_overlay(OVERLAY_PAGE_INDEX, overlay)?;

    Ok(template)
}

/// Generates cards from a fixed template, layout and pair of fonts. The fonts are registered the
/// first time a card is generated (or when `verify` is called) and reused afterwards.
#[derive(Debug)]
pub struct CardGenerator {
    template_path: PathBuf,
    layout: CardLayout,
    fonts: FontRegistry,
}

impl CardGenerator {
    pub fn new(template_path: PathBuf, layout: CardLayout, font_sources: FontSources) -> Self {
        CardGenerator {
            template_path,
            layout,
            fonts: FontRegistry::new(font_sources),
        }
    }

    pub fn from_configuration(configuration: &CardConfiguration) -> Self {
        Self::new(
            configuration.template_path.clone(),
            configuration.layout.clone(),
            configuration.fonts.clone(),
        )
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Registers the fonts and checks that the template can be drawn onto, so that a missing
    /// asset is reported before the first card is requested.
    pub fn verify(&self) -> Result<(), ContextError> {
        self.fonts.register()?;
        let template = TemplateDocument::from_path(&self.template_path)?;
        template.require_pages(OVERLAY_PAGE_INDEX + 1)?;
        template.page_box(OVERLAY_PAGE_INDEX)?;

        Ok(())
    }

    pub fn generate(&self, request: &CardRequest) -> Result<Vec<u8>, ContextError> {
        generate(
            request,
            &self.template_path,
            &self.layout,
            self.fonts.register()?,
        )
    }

    /// Generates the card straight into a file at the given path.
    pub fn generate_to_path(
        &self,
        request: &CardRequest,
        output_path: &Path,
    ) -> Result<(), ContextError> {
        render_card(
            request,
            &self.template_path,
            &self.layout,
            self.fonts.register()?,
        )?
        .save(output_path)
    }
}
