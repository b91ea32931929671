//! Local PDF export of the case text.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use std::io::BufWriter;

use super::DocumentRenderer;
use crate::config::DocumentConfig;
use crate::error::RenderError;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const TITLE_SIZE: f32 = 14.0;

/// A4 PDF renderer using the built-in Helvetica faces
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    body_font_size: f32,
    wrap_width: usize,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::from_config(&DocumentConfig::default())
    }
}

impl PdfRenderer {
    pub fn from_config(config: &DocumentConfig) -> Self {
        Self {
            body_font_size: config.body_font_size,
            wrap_width: config.wrap_width,
        }
    }

    fn line_height(&self) -> f32 {
        // 1pt = 0.3528mm, plus leading
        self.body_font_size * 0.3528 * 1.4
    }
}

/// Replace typographic characters that generated text commonly contains
/// with their plain equivalents.
pub fn normalize_typography(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{2032}' => normalized.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201F}' | '\u{2033}' => normalized.push('"'),
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => {
                normalized.push('-');
            }
            '\u{2022}' | '\u{25CF}' | '\u{25E6}' => normalized.push('-'),
            '\u{2026}' => normalized.push_str("..."),
            '\u{2265}' => normalized.push_str(">="),
            '\u{2264}' => normalized.push_str("<="),
            '\u{2260}' => normalized.push_str("!="),
            '\u{2248}' => normalized.push('~'),
            '\u{2192}' | '\u{27F6}' => normalized.push_str("->"),
            '\u{2190}' | '\u{27F5}' => normalized.push_str("<-"),
            '\u{2191}' => normalized.push_str("up"),
            '\u{2193}' => normalized.push_str("down"),
            '\u{2713}' | '\u{2714}' | '\u{2717}' | '\u{2718}' => normalized.push('-'),
            '\u{00A0}' | '\u{2009}' | '\u{202F}' => normalized.push(' '),
            '\r' => {}
            other => normalized.push(other),
        }
    }
    normalized
}

/// Characters WinAnsiEncoding places in 0x80..=0x9F
const WIN_ANSI_EXTRAS: [char; 27] = [
    '\u{20AC}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{017D}', '\u{2018}',
    '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}', '\u{02DC}',
    '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{017E}', '\u{0178}',
];

/// First character the built-in fonts cannot encode, if any
fn first_unencodable(text: &str) -> Option<char> {
    text.chars().find(|c| !is_win_ansi(*c))
}

fn is_win_ansi(c: char) -> bool {
    let code = u32::from(c);
    c == '\n'
        || c == '\t'
        || (0x20..=0x7E).contains(&code)
        || (0xA0..=0xFF).contains(&code)
        || WIN_ANSI_EXTRAS.contains(&c)
}

struct PageCursor {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
}

impl PageCursor {
    fn advance(&mut self, height: f32) {
        self.y -= height;
        if self.y < MARGIN {
            self.pages += 1;
            let (page, layer) = self.doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Page {}", self.pages),
            );
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn write(&mut self, text: &str, size: f32, font: &IndirectFontRef, line_height: f32) {
        self.layer.use_text(text, size, Mm(MARGIN), Mm(self.y), font);
        self.advance(line_height);
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, title: &str, text: &str) -> Result<Vec<u8>, RenderError> {
        let title = normalize_typography(title);
        let body = normalize_typography(text);
        if let Some(c) = first_unencodable(&title).or_else(|| first_unencodable(&body)) {
            return Err(RenderError::Encoding(c));
        }

        let (doc, page, layer) =
            PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Page 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| RenderError::Layout(format!("font error: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| RenderError::Layout(format!("font error: {e}")))?;

        let layer = doc.get_page(page).get_layer(layer);
        let mut cursor = PageCursor {
            doc,
            layer,
            y: PAGE_HEIGHT - MARGIN,
            pages: 1,
        };
        let line_height = self.line_height();

        for line in textwrap::wrap(&title, self.wrap_width * 3 / 4) {
            cursor.write(&line, TITLE_SIZE, &bold, TITLE_SIZE * 0.3528 * 1.4);
        }
        cursor.advance(line_height);

        for paragraph in body.lines() {
            let paragraph = paragraph.replace('\t', "    ");
            if paragraph.trim().is_empty() {
                cursor.advance(line_height);
                continue;
            }
            for line in textwrap::wrap(&paragraph, self.wrap_width) {
                cursor.write(&line, self.body_font_size, &font, line_height);
            }
        }

        let mut buf = BufWriter::new(Vec::new());
        cursor
            .doc
            .save(&mut buf)
            .map_err(|e| RenderError::Layout(format!("PDF save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| RenderError::Layout(format!("PDF buffer error: {e}")))
    }
}
