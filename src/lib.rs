//! cardr generates visiting cards by drawing a person's details onto a pre-designed PDF template.
//! The template carries the artwork of the card, while the name, role, phone number, email and the
//! company address are written onto its second page, leaving every other page untouched.
//!
//! The entry point for library users is the `CardGenerator` in the `card` module, which ties a
//! template, a `CardLayout` and a pair of fonts together. The `server` module exposes it behind a
//! web form, logging every submission into the CSV file handled by `submission_log`.

/// The module where the `CardRequest` and the `CardGenerator` are presented.
///
/// # Introduction
///
/// A card is produced in a few steps: the template is loaded and the dimensions of its second page
/// are read, the details of the request are laid out according to the `CardLayout` (wrapping long
/// names onto two lines), the text is written onto a transparent overlay and the overlay is then
/// merged on top of the second page. The result can either be kept in memory (`generate`) or
/// written to a file (`generate_to_path`).
pub mod card;

/// This module contains the `CardConfiguration`, read from a camelCase JSON file, which describes
/// where the template, the fonts and the submissions log live together with the complete layout of
/// the card.
pub mod configuration;

/// This module contains the `ContextError` type which is the error type used throughout this library.
///
/// Errors carry a context message, possibly the message of the error that caused them, and an
/// `ErrorKind` which lets callers tell, for example, a missing template apart from a malformed one.
pub mod error;

/// The module where the fonts of the card are loaded and registered.
///
/// Fonts can either be TTF/OTF files, which are embedded in full into every card as `Type0` fonts,
/// or one of the standard PDF fonts. The `FontRegistry` loads them once and hands out the same
/// faces to every request afterwards.
pub mod fonts;

/// The module where the positions of the texts on the card are computed, including the wrapping of
/// long names onto a second line.
pub mod layout;

/// The module where the `TemplateDocument` interface for working with the PDF template is presented.
///
/// # Introduction
///
/// The template is loaded into a `lopdf::Document` and is only ever modified on the page that
/// receives an `OverlayLayer`: fonts are added to a private copy of that page's resources and the
/// overlay content stream is appended after the existing content, which is wrapped in a saved
/// graphics state so that the template cannot displace the overlay.
pub mod pdf;

/// The web service: the form page, the card download endpoint and the temporary files it uses.
pub mod server;

/// The append-only CSV log of the submitted card requests.
pub mod submission_log;
