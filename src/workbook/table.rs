// 表とブック
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use tabled::builder::Builder;
use tabled::settings::Style;

/// 見出し行と文字列セルの表
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        Table {
            headers: headers.iter().map(|s| s.as_ref().to_string()).collect(),
            rows: vec![],
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// 見出しの数に揃えて行を追加する
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len().max(row.len()), String::new());
        self.rows.push(row);
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row {
            table: self,
            cells,
        })
    }

    /// セルを書き換える。列がなければ追加する
    pub fn set(&mut self, row: usize, name: &str, value: &str) {
        let column = match self.column(name) {
            Some(n) => n,
            None => {
                self.headers.push(name.to_string());
                self.headers.len() - 1
            }
        };
        if let Some(cells) = self.rows.get_mut(row) {
            if cells.len() <= column {
                cells.resize(column + 1, String::new());
            }
            cells[column] = value.to_string();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// psql 形式で整形する
    pub fn to_psql(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.headers.iter().cloned());
        for row in &self.rows {
            builder.push_record(row.iter().cloned());
        }
        let mut table = builder.build();
        table.with(Style::psql());
        table.to_string()
    }
}

/// 表の1行
#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    table: &'a Table,
    cells: &'a [String],
}

impl<'a> Row<'a> {
    /// 列の値(前後の空白は除く)。列やセルがなければ空文字
    pub fn get(&self, name: &str) -> &'a str {
        self.table
            .column(name)
            .and_then(|n| self.cells.get(n))
            .map(|s| s.trim())
            .unwrap_or_default()
    }

    pub fn cells(&self) -> &'a [String] {
        self.cells
    }
}

/// シート名順序付きのブック
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Workbook {
    sheets: Vec<(String, Table)>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, table: Table) {
        self.sheets.push((name.to_string(), table));
    }

    pub fn sheet(&self, name: &str) -> Option<&Table> {
        self.sheets.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.sheets
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|(n, _)| n.as_str())
    }

    pub fn sheets(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.sheets.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn sheets_mut(&mut self) -> impl Iterator<Item = (&str, &mut Table)> {
        self.sheets.iter_mut().map(|(n, t)| (n.as_str(), t))
    }
}

#[test]
fn test1() {
    let mut table = Table::new(&["point_name", "value"]);
    table.push_row(vec!["SAT".to_string()]);
    table.push_row(vec!["RAT".to_string(), " 21.5 ".to_string()]);
    let rows = table.rows().collect::<Vec<_>>();
    assert_eq!(rows[0].get("value"), "");
    assert_eq!(rows[1].get("value"), "21.5");
    assert_eq!(rows[1].get("no_such_column"), "");

    table.set(0, "cloud_value", "20");
    assert_eq!(table.headers.len(), 3);
    assert_eq!(table.rows().next().unwrap().get("cloud_value"), "20");
    assert_eq!(table.rows().nth(1).unwrap().get("cloud_value"), "");
}

#[test]
fn test2() {
    let mut table = Table::new(&["a", "b"]);
    table.push_row(vec!["1".to_string(), "x".to_string()]);
    let s = table.to_psql();
    assert!(s.contains(" a "));
    assert!(s.contains(" x "));
    assert!(s.contains("+"));

    let mut book = Workbook::new();
    book.push("devices", table.clone());
    book.push("AHU_1", Table::new(&["point_name"]));
    assert_eq!(book.sheet_names().collect::<Vec<_>>(), vec!["devices", "AHU_1"]);
    assert_eq!(book.sheet("devices"), Some(&table));
    assert!(book.sheet("BAC0").is_none());
}
