// .xlsx / .ods の読み込み、.xlsx と CSV の書き出し
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::sanitize::sheet_title;
use crate::workbook::{Error, Table, Workbook};
use calamine::{Data, Reader, open_workbook_auto};
use std::collections::HashSet;
use std::path::Path;

/// セルを文字列にする。空とNaNは空文字、整数値の浮動小数点数は小数点なし
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::Float(x) if x.is_nan() => String::new(),
        Data::Float(x) if x.fract() == 0.0 && x.abs() < 1e15 => format!("{}", *x as i64),
        Data::String(s) if s.eq_ignore_ascii_case("nan") => String::new(),
        other => other.to_string(),
    }
}

/// ブックを読む
pub fn read_workbook(path: &Path) -> Result<Workbook, Error> {
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    let mut sheets = open_workbook_auto(path)?;
    let mut book = Workbook::new();
    for name in sheets.sheet_names() {
        let range = sheets.worksheet_range(&name)?;
        let mut rows = range.rows();
        let mut table = match rows.next() {
            Some(header) => Table::new(&header.iter().map(cell_text).collect::<Vec<_>>()),
            None => Table::default(),
        };
        for row in rows {
            let cells = row.iter().map(cell_text).collect::<Vec<_>>();
            // 空行は読み飛ばす
            if cells.iter().all(|s| s.is_empty()) {
                continue;
            }
            table.push_row(cells);
        }
        tracing::debug!("sheet \"{}\" {} rows", name, table.rows.len());
        book.push(&name, table);
    }
    Ok(book)
}

/// 数値として書けるセル。読み戻して同じ文字列になるときだけ
fn numeric_cell(s: &str) -> Option<f64> {
    s.parse::<f64>()
        .ok()
        .filter(|x| x.is_finite() && cell_text(&Data::Float(*x)) == s)
}

/// ブックを .xlsx で書く。シート名が重複したシートは書かない
pub fn write_workbook(path: &Path, book: &Workbook) -> Result<(), Error> {
    let is_xlsx = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
    if !is_xlsx {
        return Err(Error::UnsupportedFormat(path.to_path_buf()));
    }
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let mut written = HashSet::<String>::new();
    for (name, table) in book.sheets() {
        let title = sheet_title(name);
        if title.is_empty() || !written.insert(title.to_lowercase()) {
            tracing::warn!("sheet \"{}\" skipped", name);
            continue;
        }
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&title)?;
        for (col, header) in table.headers.iter().enumerate() {
            worksheet.write_string(0, col as u16, header)?;
        }
        for (row, cells) in table.rows.iter().enumerate() {
            let row = row as u32 + 1;
            for (col, cell) in cells.iter().enumerate() {
                match numeric_cell(cell) {
                    Some(x) => worksheet.write_number(row, col as u16, x)?,
                    None if cell.is_empty() => continue,
                    None => worksheet.write_string(row, col as u16, cell)?,
                };
            }
        }
    }
    workbook.save(path)?;
    Ok(())
}

/// 表を CSV で書く
pub fn write_csv(path: &Path, table: &Table) -> Result<(), Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[test]
fn test1() {
    assert_eq!(cell_text(&Data::Float(1234.0)), "1234");
    assert_eq!(cell_text(&Data::Float(21.5)), "21.5");
    assert_eq!(cell_text(&Data::Float(f64::NAN)), "");
    assert_eq!(cell_text(&Data::Int(7)), "7");
    assert_eq!(cell_text(&Data::String("NaN".to_string())), "");
    assert_eq!(cell_text(&Data::Empty), "");

    assert_eq!(numeric_cell("1001"), Some(1001.0));
    assert_eq!(numeric_cell("-2.5"), Some(-2.5));
    assert_eq!(numeric_cell("0"), Some(0.0));
    assert_eq!(numeric_cell("0.5"), Some(0.5));
    assert_eq!(numeric_cell("007"), None);
    assert_eq!(numeric_cell("inf"), None);
    assert_eq!(numeric_cell("AHU_1"), None);
    assert_eq!(numeric_cell(""), None);
    // 読み戻すと別の文字列になるものは文字列のまま
    assert_eq!(numeric_cell("21.50"), None);
    assert_eq!(numeric_cell("1E5"), None);
    assert_eq!(numeric_cell("12345678901234567890"), None);
    assert_eq!(numeric_cell("-0"), None);
    assert_eq!(numeric_cell(" 12"), None);
}

#[test]
fn test2() {
    use crate::workbook::{PointRecord, points_table};
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.xlsx");

    let mut point = PointRecord::new("AHU 1", "SAT", "analogInput:1");
    point.value = "21.5".to_string();
    point.cloud_device_id = "AHU-1".to_string();
    let mut book = Workbook::new();
    let mut devices = Table::new(&["number", "sanitized_device_name", "device_id"]);
    devices.push_row(vec!["0".into(), "AHU_1".into(), "1001".into()]);
    book.push("devices", devices);
    book.push("AHU_1", points_table(&[point]));
    // 重複するシート名は書かれない
    book.push("AHU_1", Table::new(&["x"]));
    write_workbook(&path, &book).unwrap();

    let loaded = read_workbook(&path).unwrap();
    assert_eq!(
        loaded.sheet_names().collect::<Vec<_>>(),
        vec!["devices", "AHU_1"]
    );
    let devices = loaded.sheet("devices").unwrap();
    assert_eq!(devices.rows().next().unwrap().get("device_id"), "1001");
    let points = loaded.sheet("AHU_1").unwrap();
    let row = points.rows().next().unwrap();
    assert_eq!(row.get("value"), "21.5");
    assert_eq!(row.get("object"), "analogInput:1");
    assert_eq!(row.get("cloud_device_id"), "AHU-1");
    assert_eq!(row.get("cloud_point_name"), "");
}

#[test]
fn test3() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        read_workbook(&dir.path().join("missing.xlsx")),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        write_workbook(&dir.path().join("out.ods"), &Workbook::new()),
        Err(Error::UnsupportedFormat(_))
    ));

    let path = dir.path().join("AHU_1.csv");
    let mut table = Table::new(&["point_name", "description"]);
    table.push_row(vec!["SAT".into(), "supply, air".into()]);
    write_csv(&path, &table).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "point_name,description\nSAT,\"supply, air\"\n");
}

#[test]
fn test4() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("values.xlsx");

    let cells = ["21.50", "1E5", "12345678901234567890", "007", "21.5", "1001", "-2.5"];
    let mut table = Table::new(&["value"]);
    for cell in cells {
        table.push_row(vec![cell.to_string()]);
    }
    let mut book = Workbook::new();
    book.push("AHU_1", table);
    write_workbook(&path, &book).unwrap();

    let loaded = read_workbook(&path).unwrap();
    let values = loaded
        .sheet("AHU_1")
        .unwrap()
        .rows()
        .map(|row| row.get("value").to_string())
        .collect::<Vec<_>>();
    assert_eq!(values, cells);
}
