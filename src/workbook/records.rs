// 機器一覧と点リストの行
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::sanitize::sanitize_device_name;
use crate::workbook::{DEVICES_SHEET, Table, Workbook};

/// 機器一覧の列
pub mod device_column {
    pub const NUMBER: &str = "number";
    pub const DEVICE_NAME: &str = "device_name";
    pub const SANITIZED_DEVICE_NAME: &str = "sanitized_device_name";
    pub const DEVICE_VENDOR: &str = "device_vendor";
    pub const DEVICE_MODEL: &str = "device_model";
    pub const DEVICE_FIRMWARE: &str = "device_firmware";
    pub const DESCRIPTION: &str = "description";
    pub const LOCATION: &str = "location";
    pub const DEVICE_APPLICATION_VERSION: &str = "device_application_version";
    pub const DEVICE_SERIAL_NUMBER: &str = "device_serial_number";
    pub const IP_ADDRESS: &str = "ip_address";
    pub const DEVICE_ID: &str = "device_id";
}

/// 点リストの列
pub mod point_column {
    pub const POINT_NAME: &str = "point_name";
    pub const DEVICE_NAME: &str = "device_name";
    pub const SANITIZED_DEVICE_NAME: &str = "sanitized_device_name";
    pub const VALUE: &str = "value";
    pub const UNITS_OR_STATES: &str = "units_or_states";
    pub const DESCRIPTION: &str = "description";
    pub const OBJECT: &str = "object";
    pub const CLOUD_DEVICE_ID: &str = "cloud_device_id";
    pub const CLOUD_POINT_NAME: &str = "cloud_point_name";
    pub const CLOUD_VALUE: &str = "cloud_value";
    pub const VALIDATION_STATUS: &str = "validation_status";
}

/// 機器一覧の1行
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_name: String,
    pub sanitized_device_name: String,
    pub device_vendor: String,
    pub device_model: String,
    pub device_firmware: String,
    pub description: String,
    pub location: String,
    pub device_application_version: String,
    pub device_serial_number: String,
    pub ip_address: String,
    pub device_id: u32,
}

impl DeviceRecord {
    pub const HEADERS: [&'static str; 12] = [
        device_column::NUMBER,
        device_column::DEVICE_NAME,
        device_column::SANITIZED_DEVICE_NAME,
        device_column::DEVICE_VENDOR,
        device_column::DEVICE_MODEL,
        device_column::DEVICE_FIRMWARE,
        device_column::DESCRIPTION,
        device_column::LOCATION,
        device_column::DEVICE_APPLICATION_VERSION,
        device_column::DEVICE_SERIAL_NUMBER,
        device_column::IP_ADDRESS,
        device_column::DEVICE_ID,
    ];

    pub fn to_row(&self, number: usize) -> Vec<String> {
        vec![
            number.to_string(),
            self.device_name.clone(),
            self.sanitized_device_name.clone(),
            self.device_vendor.clone(),
            self.device_model.clone(),
            self.device_firmware.clone(),
            self.description.clone(),
            self.location.clone(),
            self.device_application_version.clone(),
            self.device_serial_number.clone(),
            self.ip_address.clone(),
            self.device_id.to_string(),
        ]
    }

    /// 1台分の縦持ち表 (property, value)
    pub fn to_property_table(&self) -> Table {
        let mut table = Table::new(&["property", "value"]);
        for (k, v) in Self::HEADERS.iter().zip(self.to_row(0)).skip(1) {
            table.push_row(vec![k.to_string(), v]);
        }
        table
    }
}

/// 点リストの1行
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PointRecord {
    pub point_name: String,
    pub device_name: String,
    pub sanitized_device_name: String,
    pub value: String,
    pub units_or_states: String,
    pub description: String,
    /// "<type>:<instance>"
    pub object: String,
    pub cloud_device_id: String,
    pub cloud_point_name: String,
    pub cloud_value: String,
    pub validation_status: String,
}

impl PointRecord {
    pub const HEADERS: [&'static str; 11] = [
        point_column::POINT_NAME,
        point_column::DEVICE_NAME,
        point_column::SANITIZED_DEVICE_NAME,
        point_column::VALUE,
        point_column::UNITS_OR_STATES,
        point_column::DESCRIPTION,
        point_column::OBJECT,
        point_column::CLOUD_DEVICE_ID,
        point_column::CLOUD_POINT_NAME,
        point_column::CLOUD_VALUE,
        point_column::VALIDATION_STATUS,
    ];

    pub fn new(device_name: &str, point_name: &str, object: &str) -> Self {
        PointRecord {
            point_name: point_name.to_string(),
            device_name: device_name.to_string(),
            sanitized_device_name: sanitize_device_name(device_name),
            object: object.to_string(),
            ..Default::default()
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.point_name.clone(),
            self.device_name.clone(),
            self.sanitized_device_name.clone(),
            self.value.clone(),
            self.units_or_states.clone(),
            self.description.clone(),
            self.object.clone(),
            self.cloud_device_id.clone(),
            self.cloud_point_name.clone(),
            self.cloud_value.clone(),
            self.validation_status.clone(),
        ]
    }
}

pub fn devices_table(devices: &[DeviceRecord]) -> Table {
    let mut table = Table::new(&DeviceRecord::HEADERS);
    for (number, device) in devices.iter().enumerate() {
        table.push_row(device.to_row(number));
    }
    table
}

pub fn points_table(points: &[PointRecord]) -> Table {
    let mut table = Table::new(&PointRecord::HEADERS);
    for point in points {
        table.push_row(point.to_row());
    }
    table
}

/// 機器一覧シートと機器ごとの点リストシートからなるブック
pub fn scan_workbook(devices: &[DeviceRecord], points: &[(String, Vec<PointRecord>)]) -> Workbook {
    let mut book = Workbook::new();
    book.push(DEVICES_SHEET, devices_table(devices));
    for (sheet, records) in points {
        book.push(sheet, points_table(records));
    }
    book
}

#[test]
fn test1() {
    let device = DeviceRecord {
        device_name: "AHU 1".to_string(),
        sanitized_device_name: "AHU_1".to_string(),
        ip_address: "192.168.1.20".to_string(),
        device_id: 1001,
        ..Default::default()
    };
    let table = devices_table(&[device.clone()]);
    let row = table.rows().next().unwrap();
    assert_eq!(row.get("number"), "0");
    assert_eq!(row.get("sanitized_device_name"), "AHU_1");
    assert_eq!(row.get("device_id"), "1001");

    let props = device.to_property_table();
    assert_eq!(props.rows.len(), 11);
    assert_eq!(props.rows[0], vec!["device_name", "AHU 1"]);
}

#[test]
fn test2() {
    let point = PointRecord::new("AHU 1", "SAT", "analogInput:1");
    assert_eq!(point.sanitized_device_name, "AHU_1");
    let book = scan_workbook(&[], &[("AHU_1".to_string(), vec![point])]);
    assert_eq!(
        book.sheet_names().collect::<Vec<_>>(),
        vec!["devices", "AHU_1"]
    );
    let sheet = book.sheet("AHU_1").unwrap();
    assert_eq!(sheet.headers.len(), 11);
    assert_eq!(sheet.rows().next().unwrap().get("object"), "analogInput:1");
    assert_eq!(sheet.rows().next().unwrap().get("cloud_device_id"), "");
}
