// スプレッドシートの読み書き
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
pub mod io;
pub mod records;
pub mod table;

pub use io::*;
pub use records::*;
pub use table::*;

use std::path::PathBuf;
use thiserror::Error;

/// 機器一覧シートの名前
pub const DEVICES_SHEET: &str = "devices";

#[derive(Debug, Error)]
pub enum Error {
    #[error(r#"file not found "{}""#, .0.display())]
    NotFound(PathBuf),

    #[error(r#"sheet not found "{0}""#)]
    SheetNotFound(String),

    #[error(r#"unsupported file format "{}""#, .0.display())]
    UnsupportedFormat(PathBuf),

    #[error(r#"i/o "{0}""#)]
    Io(#[from] std::io::Error),

    #[error(r#"spreadsheet read "{0}""#)]
    Read(#[from] calamine::Error),

    #[error(r#"spreadsheet write "{0}""#)]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error(r#"csv "{0}""#)]
    Csv(#[from] csv::Error),
}
