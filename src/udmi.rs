// クラウドに届いた値と点リストを突き合わせる
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
pub mod expected;
pub mod message;
pub mod subscriber;

pub use expected::*;
pub use message::*;
pub use subscriber::*;

use crate::workbook;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Workbook(#[from] workbook::Error),

    #[error(r#"i/o "{0}""#)]
    Io(#[from] io::Error),

    #[error(r#"json "{0}""#)]
    Json(#[from] serde_json::Error),

    #[error(r#"unexpected topic "{0}""#)]
    Topic(String),

    #[error(r#"mqtt client "{0}""#)]
    Client(#[from] rumqttc::ClientError),
}
