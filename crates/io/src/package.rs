// OOXML package access (xlsx / docx are ZIP archives of XML parts)
//
// Templates are read from memory and never modified. Rewriting copies every
// untouched entry raw, so its compressed bytes are carried over unchanged.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{write_err, ExportError};

pub struct Package<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Package<'a> {
    pub fn open(bytes: &'a [u8]) -> Result<Self, ExportError> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExportError::mismatch(format!("not an OOXML package: {e}")))?;
        Ok(Self { archive })
    }

    /// Read a part as UTF-8, `None` when absent.
    pub fn read_part(&mut self, name: &str) -> Result<Option<String>, ExportError> {
        let mut file = match self.archive.by_name(name) {
            Ok(f) => f,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(ExportError::mismatch(format!("{name}: {e}"))),
        };
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| ExportError::mismatch(format!("{name}: {e}")))?;
        Ok(Some(content))
    }

    pub fn require_part(&mut self, name: &str) -> Result<String, ExportError> {
        self.read_part(name)?
            .ok_or_else(|| ExportError::mismatch(format!("package has no '{name}' part")))
    }

    /// Produce a new archive with `replacements` swapped in. Every replaced
    /// part must already exist; entry order, timestamps and compression are
    /// kept so identical input yields identical bytes.
    pub fn rewrite(mut self, replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, ExportError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut replaced = 0;

        for i in 0..self.archive.len() {
            let (name, modified, method) = {
                let file = self.archive.by_index_raw(i).map_err(write_err)?;
                (
                    file.name().to_string(),
                    file.last_modified().unwrap_or_default(),
                    file.compression(),
                )
            };

            match replacements.get(&name) {
                Some(content) => {
                    let options = SimpleFileOptions::default()
                        .compression_method(method)
                        .last_modified_time(modified);
                    writer.start_file(name.as_str(), options).map_err(write_err)?;
                    writer.write_all(content).map_err(write_err)?;
                    replaced += 1;
                    log::debug!("rewrote part {name} ({} bytes)", content.len());
                }
                None => {
                    let file = self.archive.by_index_raw(i).map_err(write_err)?;
                    writer.raw_copy_file(file).map_err(write_err)?;
                }
            }
        }

        if replaced != replacements.len() {
            return Err(ExportError::mismatch("replacement targets a part the template does not have"));
        }

        let cursor = writer.finish().map_err(write_err)?;
        Ok(cursor.into_inner())
    }
}

/// Resolve a worksheet part path by sheet name, from workbook.xml and its
/// relationships.
pub fn resolve_sheet_path(workbook_xml: &str, rels_xml: &str, sheet_name: &str) -> Option<String> {
    let mut rid = None;
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut id = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => {
                            name = attr
                                .decode_and_unescape_value(reader.decoder())
                                .ok()
                                .map(|v| v.into_owned())
                        }
                        b"r:id" => id = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        _ => {}
                    }
                }
                if name.as_deref() == Some(sheet_name) {
                    rid = id;
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
    let rid = rid?;

    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"Target" => target = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        _ => {}
                    }
                }
                if id.as_deref() == Some(rid.as_str()) {
                    let target = target?;
                    // Targets are relative to xl/ unless absolute
                    return Some(match target.strip_prefix('/') {
                        Some(abs) => abs.to_string(),
                        None => format!("xl/{target}"),
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
    None
}
