// 点リストの期待値とクラウド値の照合
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::udmi::{Envelope, Error, PointsetEvent};
use crate::workbook::{DEVICES_SHEET, Table, Workbook, point_column, read_workbook};
use std::fmt;
use std::path::Path;

/// 数値の比較で等しいとみなす差
pub const NUMERIC_TOLERANCE: f64 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationStatus {
    Matched,
    Mismatched,
    /// 点リストに値がない
    Unknown,
    /// 点リストにない点
    NotFound,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Mismatched => "mismatched",
            Self::Unknown => "unknown",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1点の照合結果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckResult {
    /// 見つからなかった点は None
    pub sheet: Option<String>,
    pub device_id: String,
    pub cloud_point_name: String,
    pub expected: String,
    pub cloud_value: String,
    pub status: ValidationStatus,
}

impl CheckResult {
    pub const HEADERS: [&'static str; 6] = [
        "sheet",
        "device_id",
        "cloud_point_name",
        "value",
        "cloud_value",
        "validation_status",
    ];

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.sheet.clone().unwrap_or_default(),
            self.device_id.clone(),
            self.cloud_point_name.clone(),
            self.expected.clone(),
            self.cloud_value.clone(),
            self.status.to_string(),
        ]
    }
}

pub fn results_table(results: &[CheckResult]) -> Table {
    let mut table = Table::new(&CheckResult::HEADERS);
    for result in results {
        table.push_row(result.to_row());
    }
    table
}

/// 真偽値の別名
fn binary_state(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "active" | "true" | "on" => Some(true),
        "inactive" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// 点リストの値とクラウドの値を比べる
pub fn compare_values(expected: &str, cloud_value: &str) -> ValidationStatus {
    let expected = expected.trim();
    let cloud_value = cloud_value.trim();
    if expected.is_empty() {
        return ValidationStatus::Unknown;
    }
    let equal = match (expected.parse::<f64>(), cloud_value.parse::<f64>()) {
        (Ok(a), Ok(b)) => (a - b).abs() <= NUMERIC_TOLERANCE,
        _ => match (binary_state(expected), binary_state(cloud_value)) {
            (Some(a), Some(b)) => a == b,
            _ => expected.eq_ignore_ascii_case(cloud_value),
        },
    };
    if equal {
        ValidationStatus::Matched
    } else {
        ValidationStatus::Mismatched
    }
}

/// 機器ごとの点リスト(シート名順)
#[derive(Clone, Debug, Default)]
pub struct ExpectedPoints {
    book: Workbook,
}

impl ExpectedPoints {
    /// 全てのセルと見出しの前後の空白を取り除いて持つ
    pub fn new(mut book: Workbook) -> Self {
        for (_, table) in book.sheets_mut() {
            table.headers.iter_mut().for_each(trim_in_place);
            table.rows.iter_mut().flatten().for_each(trim_in_place);
        }
        ExpectedPoints { book }
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        Ok(Self::new(read_workbook(path)?))
    }

    /// 点リストのシート。機器一覧と cloud_point_name 列のないシートは除く
    pub fn point_sheets(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.book
            .sheets()
            .filter(|(name, table)| is_point_sheet(name, table))
    }

    /// 受け取ったメッセージを照合する。pointset イベント以外は空
    pub fn check_message(
        &mut self,
        envelope: &Envelope,
        body: &[u8],
    ) -> Result<Vec<CheckResult>, Error> {
        if !envelope.is_pointset_event() {
            tracing::trace!("skip {envelope}");
            return Ok(vec![]);
        }
        let event = PointsetEvent::from_slice(body)?;
        match event.timestamp() {
            Some(t) => {
                let delay = chrono::Utc::now().signed_duration_since(t);
                tracing::debug!("{envelope} timestamp={t} delay={}s", delay.num_seconds());
            }
            None => tracing::debug!("{envelope} timestamp=\"{}\"", event.timestamp),
        }
        Ok(self.check(envelope, &event))
    }

    /// 報告された点ごとに、全ての機器の点リストから cloud_point_name で探して
    /// cloud_value と validation_status を書き込む
    pub fn check(&mut self, envelope: &Envelope, event: &PointsetEvent) -> Vec<CheckResult> {
        let mut results = vec![];
        for (point_name, point_value) in event.points.iter() {
            let cloud_value = point_value.text();
            let mut found = false;
            for (sheet, table) in self.book.sheets_mut() {
                if !is_point_sheet(sheet, table) {
                    continue;
                }
                let matches = table
                    .rows()
                    .enumerate()
                    .filter(|(_, row)| {
                        let cloud_device_id = row.get(point_column::CLOUD_DEVICE_ID);
                        row.get(point_column::CLOUD_POINT_NAME) == point_name.as_str()
                            && (cloud_device_id.is_empty()
                                || cloud_device_id == envelope.device_id)
                    })
                    .map(|(n, row)| (n, row.get(point_column::VALUE).to_string()))
                    .collect::<Vec<_>>();
                for (n, expected) in matches {
                    found = true;
                    let status = compare_values(&expected, &cloud_value);
                    table.set(n, point_column::CLOUD_VALUE, &cloud_value);
                    table.set(n, point_column::VALIDATION_STATUS, status.as_str());
                    tracing::info!(
                        "{} {point_name} sheet={sheet} value={expected} cloud_value={cloud_value} {status}",
                        envelope.device_id
                    );
                    results.push(CheckResult {
                        sheet: Some(sheet.to_string()),
                        device_id: envelope.device_id.clone(),
                        cloud_point_name: point_name.clone(),
                        expected,
                        cloud_value: cloud_value.clone(),
                        status,
                    });
                }
            }
            if !found {
                tracing::warn!(
                    "{} {point_name} cloud_value={cloud_value} {}",
                    envelope.device_id,
                    ValidationStatus::NotFound
                );
                results.push(CheckResult {
                    sheet: None,
                    device_id: envelope.device_id.clone(),
                    cloud_point_name: point_name.clone(),
                    expected: String::new(),
                    cloud_value,
                    status: ValidationStatus::NotFound,
                });
            }
        }
        results
    }

    pub fn workbook(&self) -> &Workbook {
        &self.book
    }

    pub fn into_workbook(self) -> Workbook {
        self.book
    }
}

fn trim_in_place(s: &mut String) {
    let trimmed = s.trim();
    if trimmed.len() != s.len() {
        *s = trimmed.to_string();
    }
}

fn is_point_sheet(name: &str, table: &Table) -> bool {
    name != DEVICES_SHEET && table.column(point_column::CLOUD_POINT_NAME).is_some()
}

#[cfg(test)]
fn sample_points() -> ExpectedPoints {
    use crate::workbook::PointRecord;
    use crate::workbook::scan_workbook;

    let mut sat = PointRecord::new("AHU 1", "SAT", "analogInput:1");
    sat.value = "21.5".to_string();
    sat.cloud_device_id = "AHU-1".to_string();
    sat.cloud_point_name = " supply_air_temperature_sensor ".to_string();
    let mut fan = PointRecord::new("AHU 1", "SF-S", "binaryInput:2");
    fan.value = "active".to_string();
    fan.cloud_device_id = "AHU-1".to_string();
    fan.cloud_point_name = "supply_fan_run_status".to_string();
    let mut mode = PointRecord::new("AHU 1", "MODE", "multiStateValue:3");
    mode.cloud_device_id = "AHU-1".to_string();
    mode.cloud_point_name = "operating_mode".to_string();
    let mut other = PointRecord::new("FCU 2", "SAT", "analogInput:1");
    other.value = "18".to_string();
    other.cloud_device_id = "FCU-2".to_string();
    other.cloud_point_name = "supply_air_temperature_sensor".to_string();

    ExpectedPoints::new(scan_workbook(
        &[],
        &[
            ("AHU_1".to_string(), vec![sat, fan, mode]),
            ("FCU_2".to_string(), vec![other]),
        ],
    ))
}

#[test]
fn test1() {
    assert_eq!(compare_values("21.5", "21.504"), ValidationStatus::Matched);
    assert_eq!(compare_values("21.5", "22"), ValidationStatus::Mismatched);
    assert_eq!(compare_values("Active", "active"), ValidationStatus::Matched);
    assert_eq!(compare_values("active", "true"), ValidationStatus::Matched);
    assert_eq!(compare_values("inactive", "true"), ValidationStatus::Mismatched);
    assert_eq!(compare_values("Auto", "AUTO"), ValidationStatus::Matched);
    assert_eq!(compare_values("", "1"), ValidationStatus::Unknown);
    assert_eq!(ValidationStatus::NotFound.to_string(), "not_found");
}

#[test]
fn test2() {
    let mut points = sample_points();
    assert_eq!(
        points.point_sheets().map(|(n, _)| n).collect::<Vec<_>>(),
        vec!["AHU_1", "FCU_2"]
    );

    let envelope = Envelope::from_topic("/devices/AHU-1/events/pointset", None).unwrap();
    let body = br#"{
        "timestamp": "2025-01-01T00:00:00Z",
        "points": {
            "supply_air_temperature_sensor": { "present_value": 21.5 },
            "supply_fan_run_status": { "present_value": "inactive" },
            "operating_mode": { "present_value": "auto" },
            "return_air_temperature_sensor": { "present_value": 23 }
        }
    }"#;
    let results = points.check_message(&envelope, body).unwrap();
    let statuses = results
        .iter()
        .map(|r| (r.cloud_point_name.as_str(), r.status))
        .collect::<Vec<_>>();
    assert_eq!(
        statuses,
        vec![
            ("operating_mode", ValidationStatus::Unknown),
            ("return_air_temperature_sensor", ValidationStatus::NotFound),
            ("supply_air_temperature_sensor", ValidationStatus::Matched),
            ("supply_fan_run_status", ValidationStatus::Mismatched),
        ]
    );
    assert_eq!(results[2].sheet.as_deref(), Some("AHU_1"));

    let book = points.into_workbook();
    let sheet = book.sheet("AHU_1").unwrap();
    let rows = sheet.rows().collect::<Vec<_>>();
    assert_eq!(rows[0].get("cloud_value"), "21.5");
    assert_eq!(rows[0].get("validation_status"), "matched");
    assert_eq!(rows[1].get("cloud_value"), "inactive");
    assert_eq!(rows[1].get("validation_status"), "mismatched");
    assert_eq!(rows[2].get("validation_status"), "unknown");
    // 別の機器の同名の点は書き換えない
    let sheet = book.sheet("FCU_2").unwrap();
    assert_eq!(sheet.rows().next().unwrap().get("cloud_value"), "");
}

#[test]
fn test3() {
    let mut points = sample_points();
    let body = br#"{ "timestamp": "2025-01-01T00:00:00Z", "points": { "supply_fan_run_status": { "present_value": "active" } } }"#;

    let state = Envelope::from_topic("/devices/AHU-1/state", None).unwrap();
    assert!(points.check_message(&state, body).unwrap().is_empty());

    let envelope = Envelope::from_topic("/devices/AHU-1/events/pointset", None).unwrap();
    assert!(points.check_message(&envelope, b"{").is_err());

    let results = points.check_message(&envelope, body).unwrap();
    let table = results_table(&results);
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows().next().unwrap().get("validation_status"), "matched");
}
