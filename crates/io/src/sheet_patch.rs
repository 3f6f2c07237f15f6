//! Literal-value patching of a worksheet part.
//!
//! Streams the sheet XML through quick-xml and rewrites only the target
//! cells. Everything else is written back event by event from the source
//! bytes. Target cells keep their other attributes (style in particular);
//! targets missing from the sheet are inserted in row/column order.

use std::collections::BTreeMap;

use formulia_config::cell::column_letters;
use formulia_config::CellRef;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{write_err, xml_err, ExportError};

/// Rows -> columns -> value.
type Pending = BTreeMap<u32, BTreeMap<u32, f64>>;

pub fn patch_cells(sheet_xml: &str, writes: &BTreeMap<CellRef, f64>) -> Result<String, ExportError> {
    let mut pending: Pending = BTreeMap::new();
    for (cell, value) in writes {
        pending.entry(cell.row).or_default().insert(cell.col, *value);
    }

    let mut reader = Reader::from_str(sheet_xml);
    let mut writer = Writer::new(Vec::with_capacity(sheet_xml.len() + 256));

    let mut in_sheet_data = false;
    let mut row_cells: BTreeMap<u32, f64> = BTreeMap::new();
    let mut row_num = 0u32;
    // Set while skipping the body of a replaced <c>
    let mut replacing: Option<(BytesStart<'static>, f64)> = None;
    let mut seen_sheet_data = false;

    loop {
        let event = reader.read_event().map_err(|e| xml_err("worksheet", e))?;

        if replacing.is_some() {
            match &event {
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"f" => {
                    let addr = replacing
                        .as_ref()
                        .and_then(|(start, _)| attr(start, b"r"))
                        .unwrap_or_default();
                    return Err(ExportError::mismatch(format!(
                        "cell {addr} holds a formula; only literal cells can be bound"
                    )));
                }
                Event::End(e) if e.name().as_ref() == b"c" => {
                    if let Some((start, value)) = replacing.take() {
                        write_value_cell(&mut writer, start, value)?;
                    }
                }
                Event::Eof => return Err(ExportError::mismatch("worksheet ends inside a cell")),
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(ref e) if e.name().as_ref() == b"sheetData" => {
                in_sheet_data = true;
                seen_sheet_data = true;
                writer.write_event(event.borrow()).map_err(write_err)?;
            }
            Event::Empty(ref e) if e.name().as_ref() == b"sheetData" => {
                seen_sheet_data = true;
                writer
                    .write_event(Event::Start(e.borrow()))
                    .map_err(write_err)?;
                let rows: Vec<u32> = pending.keys().copied().collect();
                for row in rows {
                    let cells = pending.remove(&row).unwrap_or_default();
                    write_new_row(&mut writer, row, &cells)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new("sheetData")))
                    .map_err(write_err)?;
            }
            Event::End(ref e) if e.name().as_ref() == b"sheetData" => {
                let rows: Vec<u32> = pending.keys().copied().collect();
                for row in rows {
                    let cells = pending.remove(&row).unwrap_or_default();
                    write_new_row(&mut writer, row, &cells)?;
                }
                in_sheet_data = false;
                writer.write_event(event.borrow()).map_err(write_err)?;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if in_sheet_data && e.name().as_ref() == b"row" =>
            {
                let num = row_number(e)?;
                flush_rows_before(&mut writer, &mut pending, num)?;
                let cells = pending.remove(&num).unwrap_or_default();
                let is_empty = matches!(event, Event::Empty(_));

                if is_empty {
                    if cells.is_empty() {
                        writer.write_event(event.borrow()).map_err(write_err)?;
                    } else {
                        writer.write_event(Event::Start(e.borrow())).map_err(write_err)?;
                        for (col, value) in &cells {
                            write_new_cell(&mut writer, CellRef::new(num, *col), *value)?;
                        }
                        writer.write_event(Event::End(BytesEnd::new("row"))).map_err(write_err)?;
                    }
                } else {
                    row_num = num;
                    row_cells = cells;
                    writer.write_event(event.borrow()).map_err(write_err)?;
                }
            }
            Event::End(ref e) if in_sheet_data && e.name().as_ref() == b"row" => {
                for (col, value) in std::mem::take(&mut row_cells) {
                    write_new_cell(&mut writer, CellRef::new(row_num, col), value)?;
                }
                writer.write_event(event.borrow()).map_err(write_err)?;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if in_sheet_data && e.name().as_ref() == b"c" =>
            {
                if row_cells.is_empty() {
                    writer.write_event(event.borrow()).map_err(write_err)?;
                    continue;
                }
                let addr = attr(e, b"r").ok_or_else(|| {
                    ExportError::mismatch(format!("row {row_num} has a cell without an address"))
                })?;
                let cell = CellRef::parse(&addr)
                    .ok_or_else(|| ExportError::mismatch(format!("bad cell address '{addr}'")))?;

                let before: Vec<u32> = row_cells.range(..cell.col).map(|(c, _)| *c).collect();
                for col in before {
                    if let Some(value) = row_cells.remove(&col) {
                        write_new_cell(&mut writer, CellRef::new(row_num, col), value)?;
                    }
                }

                match row_cells.remove(&cell.col) {
                    Some(value) if matches!(event, Event::Empty(_)) => {
                        write_value_cell(&mut writer, e.borrow(), value)?;
                    }
                    Some(value) => {
                        replacing = Some((e.clone().into_owned(), value));
                    }
                    None => writer.write_event(event.borrow()).map_err(write_err)?,
                }
            }
            Event::Eof => break,
            other => writer.write_event(other).map_err(write_err)?,
        }
    }

    if !seen_sheet_data {
        return Err(ExportError::mismatch("worksheet has no sheetData"));
    }

    String::from_utf8(writer.into_inner()).map_err(write_err)
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn row_number(e: &BytesStart<'_>) -> Result<u32, ExportError> {
    attr(e, b"r")
        .and_then(|r| r.parse().ok())
        .ok_or_else(|| ExportError::mismatch("worksheet row without a numeric 'r' attribute"))
}

fn flush_rows_before(
    writer: &mut Writer<Vec<u8>>,
    pending: &mut Pending,
    row: u32,
) -> Result<(), ExportError> {
    let earlier: Vec<u32> = pending.range(..row).map(|(r, _)| *r).collect();
    for r in earlier {
        let cells = pending.remove(&r).unwrap_or_default();
        write_new_row(writer, r, &cells)?;
    }
    Ok(())
}

fn write_new_row(writer: &mut Writer<Vec<u8>>, row: u32, cells: &BTreeMap<u32, f64>) -> Result<(), ExportError> {
    let r = row.to_string();
    let mut start = BytesStart::new("row");
    start.push_attribute(("r", r.as_str()));
    writer.write_event(Event::Start(start)).map_err(write_err)?;
    for (col, value) in cells {
        write_new_cell(writer, CellRef::new(row, *col), *value)?;
    }
    writer.write_event(Event::End(BytesEnd::new("row"))).map_err(write_err)
}

fn write_new_cell(writer: &mut Writer<Vec<u8>>, cell: CellRef, value: f64) -> Result<(), ExportError> {
    let addr = format!("{}{}", column_letters(cell.col), cell.row);
    let mut start = BytesStart::new("c");
    start.push_attribute(("r", addr.as_str()));
    write_value_cell(writer, start, value)
}

/// Write `<c ...><v>value</v></c>`, dropping the type attribute so the cell
/// reads as a number.
fn write_value_cell(writer: &mut Writer<Vec<u8>>, original: BytesStart<'_>, value: f64) -> Result<(), ExportError> {
    let mut start = BytesStart::new("c");
    for a in original.attributes().flatten() {
        if matches!(a.key.as_ref(), b"t" | b"cm" | b"vm") {
            continue;
        }
        start.push_attribute(a);
    }
    let text = format_number(value);
    writer.write_event(Event::Start(start)).map_err(write_err)?;
    writer.write_event(Event::Start(BytesStart::new("v"))).map_err(write_err)?;
    writer.write_event(Event::Text(BytesText::new(&text))).map_err(write_err)?;
    writer.write_event(Event::End(BytesEnd::new("v"))).map_err(write_err)?;
    writer.write_event(Event::End(BytesEnd::new("c"))).map_err(write_err)
}

/// Shortest round-trip form; integral values without a decimal point.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    format!("{value}")
}
