//! Builders for real `.xlsx` and `.xls` workbooks used by the integration tests.
#![allow(dead_code)]

use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// One cell of a fixture sheet
#[derive(Copy, Clone, Debug)]
pub enum Value<'a> {
    Blank,
    Text(&'a str),
    Number(f64),
    /// A serial number under the built-in short date format (id 14)
    Date(f64),
    Bool(bool),
    /// An error cell, such as `#N/A`
    Error,
}

pub use Value::*;

/// Serial number of 2025-01-01 in the 1900 date system
pub const JAN_1_2025: f64 = 45658.0;

pub fn header() -> Vec<Value<'static>> {
    vec![Text("Name"), Text("Amount"), Text("Date")]
}

/// A report sheet: the standard header followed by `rows`
pub fn report(rows: Vec<Vec<Value<'static>>>) -> Vec<Vec<Value<'static>>> {
    let mut sheet = vec![header()];
    sheet.extend(rows);
    sheet
}

/// A report sheet whose `Amount` column is text in every one of `count` rows
pub fn bad_amounts(count: usize) -> Vec<Vec<Value<'static>>> {
    report((0..count).map(|_| vec![Text("Bob"), Text("abc"), Text("2025-01-01")]).collect())
}

fn column_name(col: usize) -> String {
    let mut name = Vec::new();
    let mut number = col + 1;
    while number > 0 {
        let remainder = (number - 1) % 26;
        name.push(b'A' + remainder as u8);
        number = (number - 1) / 26;
    }
    name.reverse();
    String::from_utf8(name).expect("ascii column name")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs>
</styleSheet>"#;

fn sheet_data(rows: &[Vec<Value>]) -> String {
    let mut xml = String::new();
    for (row, values) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
        for (col, value) in values.iter().enumerate() {
            let reference = format!("{}{}", column_name(col), row + 1);
            let cell = match value {
                Blank => continue,
                Text(text) => format!(r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#, escape(text)),
                Number(number) => format!(r#"<c r="{reference}"><v>{number}</v></c>"#),
                Date(serial) => format!(r#"<c r="{reference}" s="1"><v>{serial}</v></c>"#),
                Bool(flag) => format!(r#"<c r="{reference}" t="b"><v>{}</v></c>"#, u8::from(*flag)),
                Error => format!(r#"<c r="{reference}" t="e"><v>#N/A</v></c>"#),
            };
            xml.push_str(&cell);
        }
        xml.push_str("</row>");
    }
    xml
}

/// Builds an `.xlsx` workbook with a single sheet holding `rows`
pub fn xlsx(rows: &[Vec<Value>]) -> Vec<u8> {
    xlsx_with_sheet_data(&sheet_data(rows))
}

/// Builds an `.xlsx` workbook whose single sheet has `sheet_data` as the raw content of `<sheetData>`
pub fn xlsx_with_sheet_data(sheet_data: &str) -> Vec<u8> {
    let sheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_data}</sheetData></worksheet>"#
    );
    let parts = [
        ("xl/workbook.xml", WORKBOOK_XML),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/styles.xml", STYLES_XML),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ];
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (path, content) in parts {
        writer.start_file(path, SimpleFileOptions::default()).expect("start zip entry");
        writer.write_all(content.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

// BIFF8 record identifiers
const BOF: u16 = 0x0809;
const EOF: u16 = 0x000A;
const FILE_PASS: u16 = 0x002F;
const BOUND_SHEET8: u16 = 0x0085;
const XF: u16 = 0x00E0;
const SST: u16 = 0x00FC;
const LABEL_SST: u16 = 0x00FD;
const NUMBER: u16 = 0x0203;
const LABEL: u16 = 0x0204;
const BOOL_ERR: u16 = 0x0205;

fn record(kind: u16, data: &[u8]) -> Vec<u8> {
    let mut bytes = kind.to_le_bytes().to_vec();
    bytes.extend((data.len() as u16).to_le_bytes());
    bytes.extend(data);
    bytes
}

fn bof(substream: u16) -> Vec<u8> {
    let mut data = 0x0600u16.to_le_bytes().to_vec();
    data.extend(substream.to_le_bytes());
    data.resize(16, 0);
    record(BOF, &data)
}

fn xf(format_id: u16) -> Vec<u8> {
    let mut data = 0u16.to_le_bytes().to_vec();
    data.extend(format_id.to_le_bytes());
    data.resize(20, 0);
    record(XF, &data)
}

/// A compressed (one byte per character) unicode string with a 16-bit length
fn unicode_string(text: &str) -> Vec<u8> {
    let mut data = (text.len() as u16).to_le_bytes().to_vec();
    data.push(0);
    data.extend(text.as_bytes());
    data
}

fn cell_header(row: usize, col: usize, xf: u16) -> Vec<u8> {
    let mut data = (row as u16).to_le_bytes().to_vec();
    data.extend((col as u16).to_le_bytes());
    data.extend(xf.to_le_bytes());
    data
}

/// Builds the BIFF8 `Workbook` stream. Header texts go through the shared string table,
/// other texts are inline labels.
fn workbook_stream(rows: &[Vec<Value>], password_protected: bool) -> Vec<u8> {
    let header_texts: Vec<&str> = rows
        .first()
        .map(|values| values.iter().filter_map(|value| match value {
            Text(text) => Some(*text),
            _ => None,
        }).collect())
        .unwrap_or_default();

    let mut globals = bof(0x0005);
    if password_protected {
        globals.extend(record(FILE_PASS, &[0, 0, 1, 0, 1, 0]));
    }
    globals.extend(xf(0));
    globals.extend(xf(14));
    let mut sst = (header_texts.len() as u32).to_le_bytes().to_vec();
    sst.extend((header_texts.len() as u32).to_le_bytes());
    for text in &header_texts {
        sst.extend(unicode_string(text));
    }
    globals.extend(record(SST, &sst));

    let sheet_name = "Sheet1";
    let bound_sheet_size = 4 + 4 + 1 + 1 + 1 + 1 + sheet_name.len();
    let pointer = globals.len() + bound_sheet_size + 4;
    let mut bound_sheet = (pointer as u32).to_le_bytes().to_vec();
    bound_sheet.extend([0, 0, sheet_name.len() as u8, 0]);
    bound_sheet.extend(sheet_name.as_bytes());
    globals.extend(record(BOUND_SHEET8, &bound_sheet));
    globals.extend(record(EOF, &[]));
    assert_eq!(globals.len(), pointer);

    let mut sheet = bof(0x0010);
    let mut shared_index = 0u32;
    for (row, values) in rows.iter().enumerate() {
        for (col, value) in values.iter().enumerate() {
            let cell = match value {
                Blank => continue,
                Text(_) if row == 0 => {
                    let mut data = cell_header(row, col, 0);
                    data.extend(shared_index.to_le_bytes());
                    shared_index += 1;
                    record(LABEL_SST, &data)
                }
                Text(text) => {
                    let mut data = cell_header(row, col, 0);
                    data.extend(unicode_string(text));
                    record(LABEL, &data)
                }
                Number(number) => {
                    let mut data = cell_header(row, col, 0);
                    data.extend(number.to_le_bytes());
                    record(NUMBER, &data)
                }
                Date(serial) => {
                    let mut data = cell_header(row, col, 1);
                    data.extend(serial.to_le_bytes());
                    record(NUMBER, &data)
                }
                Bool(flag) => {
                    let mut data = cell_header(row, col, 0);
                    data.extend([u8::from(*flag), 0]);
                    record(BOOL_ERR, &data)
                }
                Error => {
                    let mut data = cell_header(row, col, 0);
                    data.extend([0x2A, 1]);
                    record(BOOL_ERR, &data)
                }
            };
            sheet.extend(cell);
        }
    }
    sheet.extend(record(EOF, &[]));

    globals.extend(sheet);
    globals
}

const SECTOR_SIZE: usize = 512;
const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
const FREE_SECTOR: u32 = 0xFFFF_FFFF;
const FAT_SECTOR: u32 = 0xFFFF_FFFD;
const NO_STREAM: u32 = 0xFFFF_FFFF;

fn directory_entry(name: &str, kind: u8, start: u32, size: u64) -> Vec<u8> {
    let mut entry = vec![0u8; 128];
    let units: Vec<u16> = name.encode_utf16().collect();
    for (index, unit) in units.iter().enumerate() {
        entry[index * 2..index * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    entry[64..66].copy_from_slice(&(((units.len() + 1) * 2) as u16).to_le_bytes());
    entry[66] = kind;
    entry[67] = 1;
    entry[68..72].copy_from_slice(&NO_STREAM.to_le_bytes());
    entry[72..76].copy_from_slice(&NO_STREAM.to_le_bytes());
    entry[76..80].copy_from_slice(&NO_STREAM.to_le_bytes());
    entry[116..120].copy_from_slice(&start.to_le_bytes());
    entry[120..128].copy_from_slice(&size.to_le_bytes());
    entry
}

/// Writes a version 3 compound file: sector 0 holds the allocation table, sector 1 the
/// directory, and each stream follows in regular sectors. Streams are padded to the
/// 4096-byte mini stream cutoff so no mini stream is needed.
pub fn compound_file(streams: &[(&str, Vec<u8>)]) -> Vec<u8> {
    assert!(streams.len() <= 3, "one directory sector holds three streams");
    let mut fat: Vec<u32> = vec![FAT_SECTOR, END_OF_CHAIN];
    let mut directory = directory_entry("Root Entry", 5, END_OF_CHAIN, 0);
    let mut body = Vec::new();
    for (name, content) in streams {
        let mut content = content.to_owned();
        content.resize(content.len().max(4096).div_ceil(SECTOR_SIZE) * SECTOR_SIZE, 0);
        let start = fat.len() as u32;
        let count = content.len() / SECTOR_SIZE;
        for index in 0..count {
            let next = if index + 1 == count { END_OF_CHAIN } else { start + index as u32 + 1 };
            fat.push(next);
        }
        directory.extend(directory_entry(name, 2, start, content.len() as u64));
        body.extend(content);
    }
    assert!(fat.len() <= SECTOR_SIZE / 4, "one allocation table sector");
    fat.resize(SECTOR_SIZE / 4, FREE_SECTOR);
    directory.resize(SECTOR_SIZE, 0);

    let mut header = vec![0u8; SECTOR_SIZE];
    header[0..8].copy_from_slice(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
    header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&3u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());
    header[44..48].copy_from_slice(&1u32.to_le_bytes());
    header[48..52].copy_from_slice(&1u32.to_le_bytes());
    header[56..60].copy_from_slice(&4096u32.to_le_bytes());
    header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[76..80].copy_from_slice(&0u32.to_le_bytes());
    for offset in (80..SECTOR_SIZE).step_by(4) {
        header[offset..offset + 4].copy_from_slice(&FREE_SECTOR.to_le_bytes());
    }

    let mut bytes = header;
    bytes.extend(fat.iter().flat_map(|entry| entry.to_le_bytes()));
    bytes.extend(directory);
    bytes.extend(body);
    bytes
}

/// Builds an `.xls` workbook with a single sheet holding `rows`
pub fn xls(rows: &[Vec<Value>]) -> Vec<u8> {
    compound_file(&[("Workbook", workbook_stream(rows, false))])
}

/// Builds an `.xls` workbook whose globals carry a FILEPASS record
pub fn xls_password_protected(rows: &[Vec<Value>]) -> Vec<u8> {
    compound_file(&[("Workbook", workbook_stream(rows, true))])
}
