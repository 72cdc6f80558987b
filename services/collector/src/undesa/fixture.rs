//! Workbook and zip builders for tests (`test-util` feature).

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::reshape::Cell;

fn column_name(mut idx: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn sheet_xml(rows: &[Vec<Cell>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, cell) in row.iter().enumerate() {
            let at = format!("{}{}", column_name(c), r + 1);
            match cell {
                Cell::Empty => {}
                Cell::Number(v) => xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, at, v)),
                Cell::Text(s) => xml.push_str(&format!(
                    r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    at,
                    escape(s)
                )),
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

pub fn xlsx(sheets: &[(&str, Vec<Vec<Cell>>)]) -> Vec<u8> {
    let mut types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (i, (name, _)) in sheets.iter().enumerate() {
        let n = i + 1;
        types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            n
        ));
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape(name),
            n,
            n
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            n, n
        ));
    }
    types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");
    rels.push_str("</Relationships>");

    let root_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

    let mut entries = vec![
        ("[Content_Types].xml".to_string(), types),
        ("_rels/.rels".to_string(), root_rels.to_string()),
        ("xl/workbook.xml".to_string(), workbook),
        ("xl/_rels/workbook.xml.rels".to_string(), rels),
    ];
    for (i, (_, rows)) in sheets.iter().enumerate() {
        entries.push((format!("xl/worksheets/sheet{}.xml", i + 1), sheet_xml(rows)));
    }
    let entries: Vec<(&str, &str)> = entries.iter().map(|(n, b)| (n.as_str(), b.as_str())).collect();
    zip_of(&entries)
}

/// Zip archive holding `entries` as (name, contents).
pub fn zip_of<B: AsRef<[u8]>>(entries: &[(&str, B)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(body.as_ref()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn text(s: &str) -> Cell {
    Cell::Text(s.to_string())
}

/// A "Table 1" sheet in the UN DESA layout: title rows, then the header
/// on row 11, World rows in both directions for France and Portugal.
pub fn un_matrix() -> Vec<Vec<Cell>> {
    let mut rows = vec![vec![text("International Migrant Stock 2020")]];
    rows.extend(vec![Vec::new(); 9]);
    rows.push(vec![
        text("Index"),
        text("Region, development group, country or area of destination"),
        text("Notes of destination"),
        text("Location code of destination"),
        text("Type of data of destination"),
        text("Region, development group, country or area of origin"),
        text("Location code of origin"),
        Cell::Number(1990.0),
        Cell::Number(2020.0),
    ]);
    let line = |dest: (&str, f64), origin: (&str, f64), v1990: Cell, v2020: Cell| {
        vec![
            Cell::Number(1.0),
            text(dest.0),
            Cell::Empty,
            Cell::Number(dest.1),
            text("B"),
            text(origin.0),
            Cell::Number(origin.1),
            v1990,
            v2020,
        ]
    };
    rows.push(line(("WORLD", 900.0), ("WORLD", 900.0), Cell::Number(152986157.0), Cell::Number(280598105.0)));
    rows.push(line(("France", 250.0), ("WORLD", 900.0), Cell::Number(5897267.0), Cell::Number(8524876.0)));
    rows.push(line(("Portugal", 620.0), ("WORLD", 900.0), Cell::Number(435767.0), Cell::Number(1001819.0)));
    rows.push(line(("Central Asia", 5500.0), ("WORLD", 900.0), Cell::Number(6.0), text("..")));
    rows.push(line(("WORLD", 900.0), ("France", 250.0), Cell::Number(1843221.0), Cell::Number(2289126.0)));
    rows.push(line(("WORLD", 900.0), ("Portugal", 620.0), Cell::Number(1856355.0), Cell::Number(2083190.0)));
    rows.push(line(("France", 250.0), ("Portugal", 620.0), Cell::Number(601690.0), Cell::Number(634779.0)));
    rows
}

pub fn un_workbook() -> Vec<u8> {
    xlsx(&[
        ("Contents", vec![vec![text("Table of contents")]]),
        ("Table 1", un_matrix()),
    ])
}
