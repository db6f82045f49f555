#![allow(dead_code)]

use cardr::{
    card::{CardGenerator, CardRequest},
    fonts::{FontSource, FontSources},
    layout::CardLayout,
};
use lopdf::{content::Content, Dictionary, Object, ObjectId, Stream};
use std::path::{Path, PathBuf};

pub const PAGE_WIDTH: i64 = 252;
pub const PAGE_HEIGHT: i64 = 144;

/// Builds a template with the given number of pages, each one showing "Page N" in Helvetica.
pub fn template_bytes(page_count: usize) -> Vec<u8> {
    let mut document = lopdf::Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources_id = document.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
    )]));

    let page_ids: Vec<ObjectId> = (1..=page_count)
        .map(|page_number| {
            let content_id = document.add_object(Stream::new(
                Dictionary::new(),
                format!("BT /F1 12 Tf 10 10 Td (Page {}) Tj ET", page_number).into_bytes(),
            ));
            document.add_object(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
            ]))
        })
        .collect();

    document.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            (
                "Kids",
                Object::Array(page_ids.into_iter().map(Object::Reference).collect()),
            ),
            ("Count", Object::Integer(page_count as i64)),
            (
                "MediaBox",
                Object::Array(vec![
                    0.into(),
                    0.into(),
                    PAGE_WIDTH.into(),
                    PAGE_HEIGHT.into(),
                ]),
            ),
            ("Resources", Object::Reference(resources_id)),
        ])),
    );
    let catalog_id = document.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    document.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    document.save_to(&mut bytes).unwrap();
    bytes
}

/// Writes a template with the given number of pages into the directory.
pub fn write_template(directory: &Path, page_count: usize) -> PathBuf {
    let template_path = directory.join("template.pdf");
    std::fs::write(&template_path, template_bytes(page_count)).unwrap();
    template_path
}

/// The standard fonts keep the tests independent of any TTF file.
pub fn standard_fonts() -> FontSources {
    FontSources {
        heavy: FontSource::Standard("Helvetica-Bold".into()),
        regular: FontSource::Standard("Helvetica".into()),
    }
}

pub fn generator(template_path: PathBuf) -> CardGenerator {
    CardGenerator::new(template_path, CardLayout::default(), standard_fonts())
}

pub fn request(name: &str) -> CardRequest {
    CardRequest {
        name: name.into(),
        role: "Business Development Manager".into(),
        email: "harshil@example.com".into(),
        phone: "+91 98765 43210".into(),
    }
}

pub fn load(pdf_bytes: &[u8]) -> lopdf::Document {
    lopdf::Document::load_mem(pdf_bytes).unwrap()
}

/// The page object ids in page order.
pub fn page_ids(document: &lopdf::Document) -> Vec<ObjectId> {
    document.get_pages().into_values().collect()
}

/// The raw bytes of every content stream of the page, in drawing order.
pub fn content_streams(document: &lopdf::Document, page_index: usize) -> Vec<Vec<u8>> {
    let page_id = page_ids(document)[page_index];
    document
        .get_page_contents(page_id)
        .into_iter()
        .map(|stream_id| {
            let stream = document
                .get_object(stream_id)
                .and_then(Object::as_stream)
                .unwrap();
            stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone())
        })
        .collect()
}

/// The decoded operations of every content stream of the page. Each stream is decoded on its own
/// since a stream boundary is also a token boundary.
pub fn page_content(document: &lopdf::Document, page_index: usize) -> Content {
    let operations = content_streams(document, page_index)
        .iter()
        .flat_map(|stream_content| Content::decode(stream_content).unwrap().operations)
        .collect();
    Content { operations }
}

/// The strings shown with `Tj` on the page, in drawing order.
pub fn shown_strings(document: &lopdf::Document, page_index: usize) -> Vec<String> {
    page_content(document, page_index)
        .operations
        .iter()
        .filter(|operation| operation.operator == "Tj")
        .filter_map(|operation| match operation.operands.first() {
            Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        })
        .collect()
}

/// The text positions set with `Td` on the page, in drawing order.
pub fn text_positions(document: &lopdf::Document, page_index: usize) -> Vec<[f32; 2]> {
    page_content(document, page_index)
        .operations
        .iter()
        .filter(|operation| operation.operator == "Td")
        .map(|operation| {
            let coordinates: Vec<f32> = operation.operands.iter().map(number).collect();
            [coordinates[0], coordinates[1]]
        })
        .collect()
}

fn number(object: &Object) -> f32 {
    match object {
        Object::Integer(integer) => *integer as f32,
        Object::Real(real) => *real as f32,
        object => panic!("Expected a number, found {:?}", object),
    }
}
