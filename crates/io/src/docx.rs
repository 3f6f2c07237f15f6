// WordprocessingML body model
//
// The body of word/document.xml is split into its top-level blocks (w:p,
// w:tbl, w:sectPr, ...) kept as raw XML. Untouched blocks are written back
// verbatim; edited paragraphs only have their w:t contents replaced.

use quick_xml::escape::escape;
use quick_xml::events::{BytesRef, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{write_err, xml_err, ExportError};

pub const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Table,
    SectionProperties,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub xml: String,
}

impl Block {
    fn from_xml(xml: &str) -> Self {
        let name = xml
            .trim_start_matches('<')
            .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .next()
            .unwrap_or_default();
        let kind = match name {
            "w:p" => BlockKind::Paragraph,
            "w:tbl" => BlockKind::Table,
            "w:sectPr" => BlockKind::SectionProperties,
            _ => BlockKind::Other,
        };
        Self {
            kind,
            xml: xml.to_string(),
        }
    }

    /// Paragraph style id (`w:pStyle/@w:val`) of a paragraph block.
    pub fn style(&self) -> Option<String> {
        if self.kind != BlockKind::Paragraph {
            return None;
        }
        let mut reader = Reader::from_str(&self.xml);
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.name().as_ref() == b"w:pStyle" => {
                    return e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() == b"w:val")
                        .map(|a| String::from_utf8_lossy(&a.value).to_string());
                }
                // runs come after the paragraph properties
                Ok(Event::Start(ref e)) if e.name().as_ref() == b"w:r" => return None,
                Ok(Event::Eof) | Err(_) => return None,
                _ => {}
            }
        }
    }

    /// All text of the block, paragraphs joined with newlines.
    pub fn text(&self) -> String {
        match paragraph_segments(&self.xml) {
            Ok(paragraphs) => paragraphs
                .iter()
                .map(|segments| segments.concat())
                .collect::<Vec<_>>()
                .join("\n"),
            Err(_) => String::new(),
        }
    }
}

/// word/document.xml split around its body blocks.
#[derive(Debug, Clone)]
pub struct DocumentXml {
    prefix: String,
    pub blocks: Vec<Block>,
    suffix: String,
}

impl DocumentXml {
    pub fn parse(xml: &str) -> Result<Self, ExportError> {
        let mut reader = Reader::from_str(xml);
        let mut depth = 0usize;
        let mut body_depth: Option<usize> = None;
        let mut body_open = 0usize;
        let mut block_start = 0usize;
        let mut blocks = Vec::new();

        loop {
            let before = reader.buffer_position() as usize;
            let event = reader.read_event().map_err(|e| xml_err(DOCUMENT_PART, e))?;
            let after = reader.buffer_position() as usize;
            match event {
                Event::Start(ref e) => {
                    depth += 1;
                    match body_depth {
                        None if e.name().as_ref() == b"w:body" => {
                            body_depth = Some(depth);
                            body_open = after;
                        }
                        Some(b) if depth == b + 1 => block_start = before,
                        _ => {}
                    }
                }
                Event::Empty(ref e) => match body_depth {
                    Some(b) if depth == b => blocks.push(Block::from_xml(&xml[before..after])),
                    None if e.name().as_ref() == b"w:body" => {
                        return Err(ExportError::mismatch("document body is empty"));
                    }
                    _ => {}
                },
                Event::End(_) => {
                    match body_depth {
                        Some(b) if depth == b => {
                            return Ok(Self {
                                prefix: xml[..body_open].to_string(),
                                blocks,
                                suffix: xml[before..].to_string(),
                            });
                        }
                        Some(b) if depth == b + 1 => {
                            blocks.push(Block::from_xml(&xml[block_start..after]));
                        }
                        _ => {}
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Err(ExportError::mismatch("document has no w:body"))
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(self.prefix.len() + self.suffix.len() + self.blocks.len() * 256);
        out.push_str(&self.prefix);
        for block in &self.blocks {
            out.push_str(&block.xml);
        }
        out.push_str(&self.suffix);
        out
    }

    /// Append blocks at the end of the body, ahead of the trailing section
    /// properties.
    pub fn append(&mut self, new_blocks: Vec<Block>) {
        let at = match self.blocks.last() {
            Some(b) if b.kind == BlockKind::SectionProperties => self.blocks.len() - 1,
            _ => self.blocks.len(),
        };
        self.blocks.splice(at..at, new_blocks);
    }
}

fn resolve_ref(r: &BytesRef<'_>) -> String {
    if let Ok(Some(ch)) = r.resolve_char_ref() {
        return ch.to_string();
    }
    let name = String::from_utf8_lossy(r.as_ref()).to_string();
    match quick_xml::escape::resolve_predefined_entity(&name) {
        Some(s) => s.to_string(),
        None => format!("&{name};"),
    }
}

/// w:t contents of every paragraph in `xml`, by paragraph order.
pub fn paragraph_segments(xml: &str) -> Result<Vec<Vec<String>>, ExportError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<Vec<String>> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event().map_err(|e| xml_err(DOCUMENT_PART, e))? {
            Event::Start(ref e) => match e.name().as_ref() {
                b"w:p" => {
                    open.push(paragraphs.len());
                    paragraphs.push(Vec::new());
                }
                b"w:t" if !open.is_empty() => current = Some(String::new()),
                _ => {}
            },
            Event::Empty(ref e) if e.name().as_ref() == b"w:p" => paragraphs.push(Vec::new()),
            Event::Text(ref e) => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(ref r) => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&resolve_ref(r));
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"w:p" => {
                    open.pop();
                }
                b"w:t" => {
                    if let (Some(text), Some(&p)) = (current.take(), open.last()) {
                        paragraphs[p].push(text);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}

/// Rewrite w:t contents with `segments` (same shape as
/// [`paragraph_segments`] returned). Everything else passes through.
pub fn rewrite_segments(xml: &str, segments: &[Vec<String>]) -> Result<String, ExportError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut next_paragraph = 0usize;
    // (paragraph ordinal, next w:t index)
    let mut open: Vec<(usize, usize)> = Vec::new();
    let mut skipping = false;

    loop {
        let event = reader.read_event().map_err(|e| xml_err(DOCUMENT_PART, e))?;
        if skipping {
            match event {
                Event::End(ref e) if e.name().as_ref() == b"w:t" => {
                    skipping = false;
                    writer.write_event(event.borrow()).map_err(write_err)?;
                }
                Event::Eof => return Err(ExportError::mismatch("document ends inside w:t")),
                _ => {}
            }
            continue;
        }
        match event {
            Event::Start(ref e) if e.name().as_ref() == b"w:p" => {
                open.push((next_paragraph, 0));
                next_paragraph += 1;
                writer.write_event(event.borrow()).map_err(write_err)?;
            }
            Event::Empty(ref e) if e.name().as_ref() == b"w:p" => {
                next_paragraph += 1;
                writer.write_event(event.borrow()).map_err(write_err)?;
            }
            Event::End(ref e) if e.name().as_ref() == b"w:p" => {
                open.pop();
                writer.write_event(event.borrow()).map_err(write_err)?;
            }
            Event::Start(ref e) if e.name().as_ref() == b"w:t" && !open.is_empty() => {
                let Some((p, t)) = open.last_mut() else { continue };
                let text = segments
                    .get(*p)
                    .and_then(|s| s.get(*t))
                    .map(String::as_str)
                    .unwrap_or_default();
                *t += 1;
                let mut start = BytesStart::new("w:t");
                start.push_attribute(("xml:space", "preserve"));
                writer.write_event(Event::Start(start)).map_err(write_err)?;
                if !text.is_empty() {
                    writer.write_event(Event::Text(BytesText::new(text))).map_err(write_err)?;
                }
                skipping = true;
            }
            Event::Eof => break,
            other => writer.write_event(other).map_err(write_err)?,
        }
    }
    String::from_utf8(writer.into_inner()).map_err(write_err)
}

// ---------------------------------------------------------------------------
// New content
// ---------------------------------------------------------------------------

fn run(text: &str) -> String {
    format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, escape(text))
}

pub fn styled_paragraph(style: &str, text: &str) -> Block {
    Block {
        kind: BlockKind::Paragraph,
        xml: format!(
            r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr>{}</w:p>"#,
            escape(style),
            run(text)
        ),
    }
}

/// Simple grid table, first row as header (bold).
pub fn table(style: Option<&str>, header: &[&str], rows: &[Vec<String>]) -> Block {
    let mut xml = String::from("<w:tbl><w:tblPr>");
    if let Some(style) = style {
        xml.push_str(&format!(r#"<w:tblStyle w:val="{}"/>"#, escape(style)));
    }
    xml.push_str(r#"<w:tblW w:w="0" w:type="auto"/></w:tblPr><w:tblGrid>"#);
    for _ in header {
        xml.push_str(r#"<w:gridCol w:w="2400"/>"#);
    }
    xml.push_str("</w:tblGrid><w:tr>");
    for cell in header {
        xml.push_str(&format!(
            r#"<w:tc><w:p><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p></w:tc>"#,
            escape(*cell)
        ));
    }
    xml.push_str("</w:tr>");
    for row in rows {
        xml.push_str("<w:tr>");
        for cell in row {
            xml.push_str(&format!("<w:tc><w:p>{}</w:p></w:tc>", run(cell)));
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    Block {
        kind: BlockKind::Table,
        xml,
    }
}
