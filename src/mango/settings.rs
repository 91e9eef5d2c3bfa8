// 変換の設定
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::mango::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// UDMI ドライバのバージョン
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub enum UdmiVersion {
    #[default]
    #[serde(rename = "5.4.*")]
    V5_4,
    #[serde(rename = "5.3.*")]
    V5_3,
}

impl FromStr for UdmiVersion {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "5.4.*" | "5.4" => Ok(Self::V5_4),
            "5.3.*" | "5.3" => Ok(Self::V5_3),
            other => Err(ConvertError::UnsupportedVersion(other.to_string())),
        }
    }
}

impl fmt::Display for UdmiVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::V5_4 => write!(f, "5.4.*"),
            Self::V5_3 => write!(f, "5.3.*"),
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterSettings {
    /// Mango の BACnet ローカルデバイス番号
    pub localdevice: u32,
    /// Mango の BACnet ローカルデバイスのブロードキャストアドレス
    pub broadcast: String,
    /// ミリ秒
    pub timeout: u32,
    pub retries: u32,
    /// ミリ秒
    pub segtimeout: u32,
    /// 機器ごとにデーターソースを分ける
    pub unique: bool,
    pub ds_enabled: bool,
    pub publisher: String,
    pub project: String,
    pub region: String,
    pub registry: String,
    pub site: String,
    pub hostname: String,
    pub udmi_version: UdmiVersion,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        ConverterSettings {
            localdevice: 98777,
            broadcast: "255.255.255.255".to_string(),
            timeout: 30000,
            retries: 0,
            segtimeout: 10000,
            unique: true,
            ds_enabled: true,
            publisher: "CGWV-1".to_string(),
            project: "bos-platform-prod".to_string(),
            region: "us-central1".to_string(),
            registry: "ZZ-ABC-DEF".to_string(),
            site: "ZZ-ABC-DEF".to_string(),
            hostname: "mqtt.bos.goog".to_string(),
            udmi_version: UdmiVersion::default(),
        }
    }
}

impl ConverterSettings {
    /// TOMLファイルから読む。書いていない項目は既定値
    pub fn load(path: &Path) -> Result<Self, ConvertError> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// 既定値を書いた設定ファイルのひな形
    pub fn template() -> Result<String, ConvertError> {
        let body = toml::to_string_pretty(&Self::default())?;
        Ok(format!(
            "# sheet2mangojson settings\n\
             # command line options take precedence over this file\n\
             # udmi_version is \"5.4.*\" or \"5.3.*\"\n\n{body}"
        ))
    }

    pub fn publisher_xid(&self) -> String {
        format!("PUB_UDMI_BACNET_{}", self.publisher)
    }

    /// 5.4 のみ
    pub fn udmi_config_xid(&self) -> Option<String> {
        match self.udmi_version {
            UdmiVersion::V5_4 => Some(udmi_config_xid(&self.registry, &self.project)),
            UdmiVersion::V5_3 => None,
        }
    }
}

/// UDMI-CONFIG-<project>-<registry> を大文字にして '_' と '.' を '-' にする
pub fn udmi_config_xid(registry: &str, project: &str) -> String {
    format!("UDMI-CONFIG-{project}-{registry}")
        .to_uppercase()
        .replace(['_', '.'], "-")
}

#[test]
fn test1() {
    assert_eq!(
        udmi_config_xid("ZZ-ABC-DEF", "bos-platform-prod"),
        "UDMI-CONFIG-BOS-PLATFORM-PROD-ZZ-ABC-DEF"
    );
    assert_eq!(
        udmi_config_xid("zz_abc.def", "my.project"),
        "UDMI-CONFIG-MY-PROJECT-ZZ-ABC-DEF"
    );
    assert_eq!("5.3.*".parse::<UdmiVersion>().unwrap(), UdmiVersion::V5_3);
    assert_eq!("5.4".parse::<UdmiVersion>().unwrap(), UdmiVersion::V5_4);
    assert!("6.0.*".parse::<UdmiVersion>().is_err());
    assert_eq!(UdmiVersion::V5_3.to_string(), "5.3.*");
}

#[test]
fn test2() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, ConverterSettings::template().unwrap()).unwrap();
    assert_eq!(
        ConverterSettings::load(&path).unwrap(),
        ConverterSettings::default()
    );

    std::fs::write(&path, "publisher = \"GW-9\"\nudmi_version = \"5.3.*\"\n").unwrap();
    let settings = ConverterSettings::load(&path).unwrap();
    assert_eq!(settings.publisher, "GW-9");
    assert_eq!(settings.publisher_xid(), "PUB_UDMI_BACNET_GW-9");
    assert_eq!(settings.udmi_version, UdmiVersion::V5_3);
    assert_eq!(settings.udmi_config_xid(), None);
    assert_eq!(settings.localdevice, 98777);
}
