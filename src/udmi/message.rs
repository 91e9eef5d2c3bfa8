// UDMI メッセージ
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::udmi::Error;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

pub const POINTSET: &str = "pointset";

/// メッセージの属性
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    pub device_id: String,
    pub gateway_id: String,
    pub sub_folder: String,
    /// テレメトリーは空文字
    pub sub_type: String,
}

impl Envelope {
    /// "/devices/<deviceId>/<events|state>[/<subFolder>]"
    pub fn from_topic(topic: &str, gateway_id: Option<&str>) -> Result<Self, Error> {
        let mut parts = topic.trim_start_matches('/').split('/');
        let (Some("devices"), Some(device_id), Some(kind)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::Topic(topic.to_string()));
        };
        if device_id.is_empty() {
            return Err(Error::Topic(topic.to_string()));
        }
        let sub_type = match kind {
            "events" => "",
            other => other,
        };
        let sub_folder = parts.collect::<Vec<_>>().join("/");
        Ok(Envelope {
            device_id: device_id.to_string(),
            gateway_id: gateway_id.unwrap_or_default().to_string(),
            sub_folder,
            sub_type: sub_type.to_string(),
        })
    }

    /// 突き合わせの対象になるのはテレメトリーの pointset だけ
    pub fn is_pointset_event(&self) -> bool {
        self.sub_folder == POINTSET && self.sub_type.is_empty()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "device={} gateway={} subFolder={} subType={}",
            self.device_id, self.gateway_id, self.sub_folder, self.sub_type
        )
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PointValue {
    #[serde(default)]
    pub present_value: serde_json::Value,
}

impl PointValue {
    /// 文字列にした現在値
    pub fn text(&self) -> String {
        match &self.present_value {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        }
    }
}

/// pointset イベントの本文
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PointsetEvent {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub points: BTreeMap<String, PointValue>,
}

impl PointsetEvent {
    pub fn from_slice(body: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(body)?)
    }

    /// RFC 3339 でなければ None
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

#[test]
fn test1() {
    let envelope = Envelope::from_topic("/devices/AHU-1/events/pointset", Some("GW-1")).unwrap();
    assert_eq!(envelope.device_id, "AHU-1");
    assert_eq!(envelope.gateway_id, "GW-1");
    assert_eq!(envelope.sub_folder, "pointset");
    assert_eq!(envelope.sub_type, "");
    assert!(envelope.is_pointset_event());

    let envelope = Envelope::from_topic("devices/AHU-1/state", None).unwrap();
    assert_eq!(envelope.sub_type, "state");
    assert_eq!(envelope.sub_folder, "");
    assert!(!envelope.is_pointset_event());

    let envelope = Envelope::from_topic("/devices/AHU-1/events/system", None).unwrap();
    assert!(!envelope.is_pointset_event());

    assert!(Envelope::from_topic("/registries/AHU-1/events", None).is_err());
    assert!(Envelope::from_topic("/devices//events", None).is_err());
    assert!(Envelope::from_topic("/devices/AHU-1", None).is_err());
}

#[test]
fn test2() {
    use chrono::TimeZone;

    let body = br#"{
        "version": "1.5.1",
        "timestamp": "2025-01-01T00:00:00Z",
        "points": {
            "supply_air_temperature_sensor": { "present_value": 21.5 },
            "supply_fan_run_status": { "present_value": "active" },
            "missing_value": {}
        }
    }"#;
    let event = PointsetEvent::from_slice(body).unwrap();
    assert_eq!(event.timestamp, "2025-01-01T00:00:00Z");
    assert_eq!(
        event.timestamp(),
        Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(event.version.as_deref(), Some("1.5.1"));
    assert_eq!(event.points.len(), 3);
    assert_eq!(event.points["supply_air_temperature_sensor"].text(), "21.5");
    assert_eq!(event.points["supply_fan_run_status"].text(), "active");
    assert_eq!(event.points["missing_value"].text(), "");

    let event = PointsetEvent::from_slice(br#"{ "points": {} }"#).unwrap();
    assert_eq!(event.timestamp(), None);

    assert!(PointsetEvent::from_slice(b"not json").is_err());
}
