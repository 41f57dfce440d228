use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

use crate::constants::PDF_MIME;
use crate::domain::ValidatedPayload;
use crate::error::PipelineError;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const WRAP_COLUMNS: usize = 90;

const REFERENCE_NOTE: &str = "This document is a reference to a web page. \
Open the source link above to access the original content.";

/// Renders a one-page placeholder PDF (title, source link, capture time)
/// for a URL that could not be mirrored. No I/O.
#[derive(Debug, Clone, Default)]
pub struct SyntheticDocumentGenerator;

impl SyntheticDocumentGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(
        &self,
        title: &str,
        source_url: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<ValidatedPayload, PipelineError> {
        let bytes = render_placeholder(title, source_url, captured_at)
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;
        Ok(ValidatedPayload::new(bytes, PDF_MIME))
    }
}

fn render_placeholder(
    title: &str,
    source_url: &str,
    captured_at: DateTime<Utc>,
) -> lopdf::Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut lines: Vec<(i64, String)> = Vec::new();
    lines.extend(wrap(title, 60).into_iter().map(|l| (18, l)));
    lines.extend(wrap(&format!("Source: {}", source_url), WRAP_COLUMNS).into_iter().map(|l| (11, l)));
    lines.push((11, format!("Captured: {}", captured_at.format("%Y-%m-%d %H:%M:%S UTC"))));
    lines.extend(wrap(REFERENCE_NOTE, WRAP_COLUMNS).into_iter().map(|l| (10, l)));

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Td", vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()]),
    ];
    for (size, text) in lines {
        operations.push(Operation::new("Tf", vec!["F1".into(), size.into()]));
        operations.push(Operation::new("Td", vec![0.into(), (-(size + 6)).into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(win_ansi(&text))]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

/// Hard-wraps on whitespace, splitting words longer than a line (URLs).
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > columns {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(columns);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > columns {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Latin-1 maps onto WinAnsi for the printable range; the rest becomes '?'.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}
