// 点リストから Mango の設定ファイルを作る
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
pub mod converter;
pub mod keypair;
pub mod settings;
pub mod templates;

pub use converter::*;
pub use keypair::*;
pub use settings::*;

use crate::workbook;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Workbook(#[from] workbook::Error),

    #[error(r#"i/o "{0}""#)]
    Io(#[from] io::Error),

    #[error(r#"json "{0}""#)]
    Json(#[from] serde_json::Error),

    #[error(r#"rsa "{0}""#)]
    Rsa(#[from] rsa::Error),

    #[error(r#"private key encode "{0}""#)]
    PrivateKeyEncode(#[from] rsa::pkcs8::Error),

    #[error(r#"public key encode "{0}""#)]
    PublicKeyEncode(#[from] rsa::pkcs8::spki::Error),

    #[error(r#"settings "{0}""#)]
    SettingsRead(#[from] toml::de::Error),

    #[error(r#"settings "{0}""#)]
    SettingsWrite(#[from] toml::ser::Error),

    #[error(r#"unsupported udmi version "{0}""#)]
    UnsupportedVersion(String),
}
