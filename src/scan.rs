// BACnet スキャン
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::bacnet::{
    self, BacnetNetwork, DEFAULT_PORT, DeviceAddress, IAm, ObjectIdentifier, ObjectType, Value,
    WhoIs, engineering_units, property,
};
use crate::sanitize::{device_sheet_name, unique_sheet_name};
use crate::workbook::DEVICES_SHEET;
use crate::workbook::{DeviceRecord, PointRecord};
use std::collections::{BTreeMap, BTreeSet};

/// 範囲指定がないときのデバイスインスタンス番号の範囲
pub const DEFAULT_DEVICE_RANGE: (u32, u32) = (0, 4194302);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// 全ネットワークに Who-Is を送る
    pub global: bool,
    /// 対象ネットワーク番号
    pub networks: Vec<u16>,
    /// この機器だけ
    pub device_id: Option<u32>,
    /// (start, finish)
    pub range: Option<(u32, u32)>,
    /// 点リストを読まない
    pub devices_only: bool,
}

impl ScanOptions {
    pub fn limits(&self) -> Option<(u32, u32)> {
        self.device_id.map(|id| (id, id)).or(self.range)
    }

    pub fn who_is_requests(&self) -> Vec<WhoIs> {
        let (low_limit, high_limit) = match self.limits() {
            Some((low, high)) => (Some(low), Some(high)),
            None => (None, None),
        };
        let request = WhoIs {
            low_limit,
            high_limit,
            global: self.global,
            network: None,
        };
        if self.networks.is_empty() {
            vec![request]
        } else {
            self.networks
                .iter()
                .map(|net| WhoIs {
                    network: Some(*net),
                    ..request.clone()
                })
                .collect()
        }
    }
}

/// "start,finish" を読む
pub fn parse_range(s: &str) -> Result<(u32, u32), String> {
    let (start, finish) = s
        .split_once(',')
        .ok_or_else(|| format!("\"{s}\" is not in the format start,finish"))?;
    let start = start
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("{start}: {e}"))?;
    let finish = finish
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("{finish}: {e}"))?;
    if start > finish {
        return Err(format!("{start} is greater than {finish}"));
    }
    Ok((start, finish))
}

/// "1,2,3" を読む
pub fn parse_networks(s: &str) -> Result<Vec<u16>, String> {
    if s.trim().is_empty() {
        return Ok(vec![]);
    }
    s.split(',')
        .map(|n| {
            n.trim()
                .parse::<u16>()
                .map_err(|_| format!("Invalid integer format: '{}'", n.trim()))
        })
        .collect()
}

/// 点リストに書くアドレス表記
pub fn address_text(address: &DeviceAddress) -> String {
    match &address.route {
        Some((net, mac)) => format!(
            "{}:0x{}",
            net,
            mac.iter().map(|b| format!("{:02x}", b)).collect::<String>()
        ),
        None if address.address.port() == DEFAULT_PORT => address.address.ip().to_string(),
        None => address.address.to_string(),
    }
}

/// スキャン結果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub devices: Vec<DeviceRecord>,
    /// (シート名, 点リスト)
    pub points: Vec<(String, Vec<PointRecord>)>,
}

pub struct Scanner<N> {
    network: N,
}

impl<N: BacnetNetwork> Scanner<N> {
    pub fn new(network: N) -> Self {
        Scanner { network }
    }

    /// 機器を探す
    pub fn discover(&mut self, options: &ScanOptions) -> Result<Vec<IAm>, bacnet::Error> {
        let mut found = BTreeMap::<u32, IAm>::new();
        for request in options.who_is_requests() {
            tracing::info!(
                "Who-Is global={} network={:?} limits={:?}",
                request.global,
                request.network,
                options.limits()
            );
            for iam in self.network.who_is(&request)? {
                found.entry(iam.device_id).or_insert(iam);
            }
        }
        tracing::info!("{} devices found", found.len());
        Ok(found.into_values().collect())
    }

    fn read(&mut self, address: &DeviceAddress, object: &ObjectIdentifier, prop: u32) -> Option<Value> {
        match self.network.read_property(address, object, prop, None) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!("{} {} property {}: {}", address, object, prop, e);
                None
            }
        }
    }

    /// 読めなければ空文字
    fn read_text(&mut self, address: &DeviceAddress, object: &ObjectIdentifier, prop: u32) -> String {
        self.read(address, object, prop)
            .map(|v| v.text())
            .unwrap_or_default()
    }

    /// 機器情報を読む
    pub fn device_info(&mut self, iam: &IAm) -> DeviceRecord {
        let address = &iam.address;
        let device = ObjectIdentifier::device(iam.device_id);
        let device_name = self.read_text(address, &device, property::OBJECT_NAME);
        let record = DeviceRecord {
            sanitized_device_name: device_sheet_name(&device_name, iam.device_id),
            device_name,
            device_vendor: self.read_text(address, &device, property::VENDOR_NAME),
            device_model: self.read_text(address, &device, property::MODEL_NAME),
            device_firmware: self.read_text(address, &device, property::FIRMWARE_REVISION),
            description: self.read_text(address, &device, property::DESCRIPTION),
            location: self.read_text(address, &device, property::LOCATION),
            device_application_version: self.read_text(
                address,
                &device,
                property::APPLICATION_SOFTWARE_VERSION,
            ),
            device_serial_number: self.read_text(address, &device, property::SERIAL_NUMBER),
            ip_address: address_text(address),
            device_id: iam.device_id,
        };
        tracing::debug!("{:?}", record);
        record
    }

    /// object-list を読む。まとめて読めなければ1個ずつ読む
    fn object_list(&mut self, iam: &IAm) -> Vec<ObjectIdentifier> {
        let address = &iam.address;
        let device = ObjectIdentifier::device(iam.device_id);
        let to_objects = |v: Value| {
            v.into_list()
                .into_iter()
                .filter_map(|v| match v {
                    Value::ObjectIdentifier(oid) => Some(oid),
                    _ => None,
                })
                .collect::<Vec<_>>()
        };
        match self
            .network
            .read_property(address, &device, property::OBJECT_LIST, None)
        {
            Ok(v) => return to_objects(v),
            Err(e) => tracing::debug!("{} object-list: {}, read one by one", device, e),
        }
        let count = match self
            .network
            .read_property(address, &device, property::OBJECT_LIST, Some(0))
            .map(|v| v.as_unsigned())
        {
            Ok(Some(n)) => n as u32,
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!("{} object-list length: {}", device, e);
                0
            }
        };
        let mut objects = vec![];
        for index in 1..=count {
            match self
                .network
                .read_property(address, &device, property::OBJECT_LIST, Some(index))
            {
                Ok(v) => objects.extend(to_objects(v)),
                Err(e) => tracing::debug!("{} object-list[{}]: {}", device, index, e),
            }
        }
        objects
    }

    /// 単位または状態の表記
    fn units_or_states(&mut self, address: &DeviceAddress, object: &ObjectIdentifier) -> String {
        let t = object.object_type;
        if t.is_analog() {
            match self.read(address, object, property::UNITS) {
                Some(Value::Enumerated(code)) => engineering_units(code),
                Some(v) => v.text(),
                None => String::new(),
            }
        } else if t.is_binary() {
            let inactive = self.read_text(address, object, property::INACTIVE_TEXT);
            let active = self.read_text(address, object, property::ACTIVE_TEXT);
            if inactive.is_empty() && active.is_empty() {
                String::new()
            } else {
                format!("{inactive}, {active}")
            }
        } else if t.is_multistate() {
            self.read(address, object, property::STATE_TEXT)
                .map(|v| {
                    v.into_list()
                        .iter()
                        .map(|s| s.text())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default()
        } else {
            String::new()
        }
    }

    fn present_value(&mut self, address: &DeviceAddress, object: &ObjectIdentifier) -> String {
        let t = object.object_type;
        match self.read(address, object, property::PRESENT_VALUE) {
            Some(Value::Enumerated(n)) if t.is_binary() => match n {
                0 => "inactive".to_string(),
                _ => "active".to_string(),
            },
            Some(v) => v.text(),
            None => String::new(),
        }
    }

    /// 点リストを読む
    pub fn device_points(&mut self, iam: &IAm, device: &DeviceRecord) -> Vec<PointRecord> {
        let address = iam.address.clone();
        let mut points = vec![];
        for object in self.object_list(iam) {
            if !ObjectType::POINTS.contains(&object.object_type) {
                continue;
            }
            let mut point = PointRecord::new(
                &device.device_name,
                &self.read_text(&address, &object, property::OBJECT_NAME),
                &object.to_string(),
            );
            point.sanitized_device_name = device.sanitized_device_name.clone();
            point.value = self.present_value(&address, &object);
            point.units_or_states = self.units_or_states(&address, &object);
            point.description = self.read_text(&address, &object, property::DESCRIPTION);
            tracing::trace!("{:?}", point);
            points.push(point);
        }
        tracing::info!("device {} {} points", iam.device_id, points.len());
        points
    }

    /// 機器を探して情報と点リストを読む。1台の失敗で全体を止めない
    pub fn scan(&mut self, options: &ScanOptions) -> Result<ScanResult, bacnet::Error> {
        let mut result = ScanResult::default();
        let mut sheet_names = BTreeSet::from([DEVICES_SHEET.to_string()]);
        for iam in self.discover(options)? {
            tracing::info!("device {} at {}", iam.device_id, iam.address);
            let mut device = self.device_info(&iam);
            // 機器一覧の sanitized_device_name がそのままシート名になる
            // シート名は大文字小文字を区別しない
            if sheet_names.contains(&device.sanitized_device_name.to_lowercase()) {
                let sheet = unique_sheet_name(&device.sanitized_device_name, iam.device_id);
                tracing::warn!(
                    "sheet name \"{}\" is already used, device {} is written as \"{}\"",
                    device.sanitized_device_name,
                    iam.device_id,
                    sheet
                );
                device.sanitized_device_name = sheet;
            }
            sheet_names.insert(device.sanitized_device_name.to_lowercase());
            if !options.devices_only {
                let points = self.device_points(&iam, &device);
                result.points.push((device.sanitized_device_name.clone(), points));
            }
            result.devices.push(device);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod fake {
    use crate::bacnet::{
        BacnetNetwork, DeviceAddress, Error, IAm, ObjectIdentifier, Value, WhoIs,
    };
    use std::collections::HashMap;

    /// メモリ上のBACnetネットワーク
    #[derive(Default)]
    pub struct FakeNetwork {
        pub devices: Vec<IAm>,
        pub properties: HashMap<(u32, ObjectIdentifier, u32, Option<u32>), Value>,
        pub requests: Vec<WhoIs>,
    }

    impl FakeNetwork {
        pub fn add_device(&mut self, device_id: u32, address: &str) {
            self.devices.push(IAm {
                device_id,
                address: DeviceAddress {
                    address: address.parse().unwrap(),
                    route: None,
                },
            });
        }

        pub fn set(
            &mut self,
            device_id: u32,
            object: ObjectIdentifier,
            property: u32,
            index: Option<u32>,
            value: Value,
        ) {
            self.properties
                .insert((device_id, object, property, index), value);
        }
    }

    impl BacnetNetwork for FakeNetwork {
        fn who_is(&mut self, request: &WhoIs) -> Result<Vec<IAm>, Error> {
            self.requests.push(request.clone());
            Ok(self
                .devices
                .iter()
                .filter(|d| request.in_range(d.device_id))
                .cloned()
                .collect())
        }

        fn read_property(
            &mut self,
            device: &DeviceAddress,
            object: &ObjectIdentifier,
            property: u32,
            index: Option<u32>,
        ) -> Result<Value, Error> {
            let device_id = self
                .devices
                .iter()
                .find(|d| d.address == *device)
                .map(|d| d.device_id)
                .ok_or(Error::Timeout)?;
            self.properties
                .get(&(device_id, *object, property, index))
                .cloned()
                .ok_or(Error::Timeout)
        }
    }
}

#[cfg(test)]
fn text(s: &str) -> Value {
    Value::CharacterString(s.to_string())
}

#[test]
fn test1() {
    assert_eq!(parse_range("1234,5678"), Ok((1234, 5678)));
    assert_eq!(parse_range(" 1 , 2 "), Ok((1, 2)));
    assert!(parse_range("5678,1234").is_err());
    assert!(parse_range("1234").is_err());
    assert_eq!(parse_networks("1, 2,3"), Ok(vec![1, 2, 3]));
    assert_eq!(parse_networks(""), Ok(vec![]));
    assert!(parse_networks("1,x").is_err());

    let options = ScanOptions {
        global: true,
        networks: vec![10, 20],
        device_id: Some(7),
        range: Some((1, 100)),
        devices_only: false,
    };
    let requests = options.who_is_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].network, Some(20));
    // 機器番号指定が範囲指定より優先
    assert_eq!(requests[0].low_limit, Some(7));
    assert_eq!(requests[0].high_limit, Some(7));
    assert_eq!(ScanOptions::default().who_is_requests(), vec![WhoIs::default()]);
}

#[test]
fn test2() {
    let routed = DeviceAddress {
        address: "192.168.1.1:47808".parse().unwrap(),
        route: Some((5, vec![0x07])),
    };
    assert_eq!(address_text(&routed), "5:0x07");
    let direct = DeviceAddress {
        address: "192.168.1.20:47808".parse().unwrap(),
        route: None,
    };
    assert_eq!(address_text(&direct), "192.168.1.20");
    let other_port = DeviceAddress {
        address: "192.168.1.20:47809".parse().unwrap(),
        route: None,
    };
    assert_eq!(address_text(&other_port), "192.168.1.20:47809");
}

#[test]
fn test3() {
    let mut net = fake::FakeNetwork::default();
    net.add_device(1001, "192.168.1.20:47808");
    let device = ObjectIdentifier::device(1001);
    net.set(1001, device, property::OBJECT_NAME, None, text("AHU 1/North"));
    net.set(1001, device, property::VENDOR_NAME, None, text("Acme"));
    net.set(1001, device, property::SERIAL_NUMBER, None, text("SN-1"));

    let mut scanner = Scanner::new(net);
    let found = scanner.discover(&ScanOptions::default()).unwrap();
    assert_eq!(found.len(), 1);
    let record = scanner.device_info(&found[0]);
    assert_eq!(record.device_name, "AHU 1/North");
    assert_eq!(record.sanitized_device_name, "AHU_1_North");
    assert_eq!(record.device_vendor, "Acme");
    assert_eq!(record.device_serial_number, "SN-1");
    // 読めなかったプロパティは空文字
    assert_eq!(record.device_model, "");
    assert_eq!(record.location, "");
    assert_eq!(record.ip_address, "192.168.1.20");
    assert_eq!(record.device_id, 1001);
}

#[test]
fn test4() {
    let mut net = fake::FakeNetwork::default();
    net.add_device(1001, "192.168.1.20:47808");
    let device = ObjectIdentifier::device(1001);
    let ai = ObjectIdentifier::new(ObjectType::AnalogInput, 1);
    let bv = ObjectIdentifier::new(ObjectType::BinaryValue, 2);
    let msv = ObjectIdentifier::new(ObjectType::MultiStateValue, 3);
    // object-list はまとめて読めない
    net.set(1001, device, property::OBJECT_LIST, Some(0), Value::Unsigned(4));
    net.set(1001, device, property::OBJECT_LIST, Some(1), Value::ObjectIdentifier(device));
    net.set(1001, device, property::OBJECT_LIST, Some(2), Value::ObjectIdentifier(ai));
    net.set(1001, device, property::OBJECT_LIST, Some(3), Value::ObjectIdentifier(bv));
    net.set(1001, device, property::OBJECT_LIST, Some(4), Value::ObjectIdentifier(msv));
    net.set(1001, device, property::OBJECT_NAME, None, text("AHU-1"));
    net.set(1001, ai, property::OBJECT_NAME, None, text("SAT"));
    net.set(1001, ai, property::PRESENT_VALUE, None, Value::Real(21.5));
    net.set(1001, ai, property::UNITS, None, Value::Enumerated(62));
    net.set(1001, ai, property::DESCRIPTION, None, text("Supply air temp"));
    net.set(1001, bv, property::OBJECT_NAME, None, text("FAN-CMD"));
    net.set(1001, bv, property::PRESENT_VALUE, None, Value::Enumerated(1));
    net.set(1001, bv, property::INACTIVE_TEXT, None, text("Off"));
    net.set(1001, bv, property::ACTIVE_TEXT, None, text("On"));
    net.set(1001, msv, property::OBJECT_NAME, None, text("MODE"));
    net.set(1001, msv, property::PRESENT_VALUE, None, Value::Unsigned(2));
    net.set(
        1001,
        msv,
        property::STATE_TEXT,
        None,
        Value::List(vec![text("Auto"), text("Heat"), text("Cool")]),
    );

    let mut scanner = Scanner::new(net);
    let result = scanner.scan(&ScanOptions::default()).unwrap();
    assert_eq!(result.devices.len(), 1);
    assert_eq!(result.points.len(), 1);
    let (sheet, points) = &result.points[0];
    assert_eq!(sheet, "AHU-1");
    assert_eq!(points.len(), 3);

    assert_eq!(points[0].point_name, "SAT");
    assert_eq!(points[0].object, "analogInput:1");
    assert_eq!(points[0].value, "21.5");
    assert_eq!(points[0].units_or_states, "degreesCelsius");
    assert_eq!(points[0].description, "Supply air temp");
    assert_eq!(points[0].device_name, "AHU-1");
    assert_eq!(points[0].cloud_device_id, "");

    assert_eq!(points[1].object, "binaryValue:2");
    assert_eq!(points[1].value, "active");
    assert_eq!(points[1].units_or_states, "Off, On");
    assert_eq!(points[1].description, "");

    assert_eq!(points[2].value, "2");
    assert_eq!(points[2].units_or_states, "Auto, Heat, Cool");
}

#[test]
fn test5() {
    let mut net = fake::FakeNetwork::default();
    net.add_device(5, "192.168.1.5:47808");
    net.add_device(50, "192.168.1.50:47808");
    net.add_device(500, "192.168.1.51:47808");
    let device = ObjectIdentifier::device(50);
    let ai = ObjectIdentifier::new(ObjectType::AnalogInput, 1);
    net.set(50, device, property::OBJECT_LIST, None, Value::List(vec![
        Value::ObjectIdentifier(device),
        Value::ObjectIdentifier(ai),
    ]));

    let mut scanner = Scanner::new(net);
    let options = ScanOptions {
        range: Some((10, 100)),
        ..Default::default()
    };
    let result = scanner.scan(&options).unwrap();
    assert_eq!(result.devices.len(), 1);
    assert_eq!(result.devices[0].device_id, 50);
    // 機器名が読めなければ機器番号をシート名にする
    assert_eq!(result.points[0].0, "50");
    assert_eq!(result.devices[0].sanitized_device_name, "50");
    assert_eq!(result.points[0].1[0].sanitized_device_name, "50");
    assert_eq!(result.points[0].1.len(), 1);
    assert_eq!(result.points[0].1[0].point_name, "");

    let options = ScanOptions {
        devices_only: true,
        ..Default::default()
    };
    let result = scanner.scan(&options).unwrap();
    assert_eq!(result.devices.len(), 3);
    assert!(result.points.is_empty());
}

#[test]
fn test6() {
    use crate::mango::{ConverterSettings, converter, templates::dummy_keypair};
    use crate::workbook::{point_column as P, read_workbook, scan_workbook, write_workbook};

    // シート名が切り詰め、置き換え、重複回避、機器番号で決まる機器
    let names = [
        (1001, "Building 12 Air Handling Unit North Wing 3"),
        (1002, "Building 12 Air Handling Unit North Wing 4"),
        (1003, "AHU*1"),
        (1004, ""),
    ];
    let mut net = fake::FakeNetwork::default();
    for (n, (device_id, name)) in names.iter().enumerate() {
        net.add_device(*device_id, &format!("192.168.1.{}:47808", n + 10));
        let device = ObjectIdentifier::device(*device_id);
        let ai = ObjectIdentifier::new(ObjectType::AnalogInput, 1);
        net.set(*device_id, device, property::OBJECT_LIST, None, Value::List(vec![
            Value::ObjectIdentifier(device),
            Value::ObjectIdentifier(ai),
        ]));
        if !name.is_empty() {
            net.set(*device_id, device, property::OBJECT_NAME, None, text(name));
        }
        net.set(*device_id, ai, property::OBJECT_NAME, None, text("SAT"));
    }
    let mut scanner = Scanner::new(net);
    let result = scanner.scan(&ScanOptions::default()).unwrap();
    let sheets = result
        .devices
        .iter()
        .map(|d| d.sanitized_device_name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        sheets,
        vec![
            "Building_12_Air_Handling_Unit_N",
            "Building_12_Air_Handling_U_1002",
            "AHU_1",
            "1004",
        ]
    );
    for (device, (sheet, _)) in result.devices.iter().zip(&result.points) {
        assert_eq!(&device.sanitized_device_name, sheet);
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bacnet-scan.xlsx");
    write_workbook(&path, &scan_workbook(&result.devices, &result.points)).unwrap();

    // 点リストに送り先を書き込んでから変換する
    let mut book = read_workbook(&path).unwrap();
    for (sheet, table) in book.sheets_mut() {
        if sheet == DEVICES_SHEET {
            continue;
        }
        let cloud_device_id = format!("DEV-{sheet}");
        for row in 0..table.rows.len() {
            table.set(row, P::CLOUD_DEVICE_ID, &cloud_device_id);
            table.set(row, P::CLOUD_POINT_NAME, "supply_air_temperature_sensor");
        }
    }
    let mut bacnet = Vec::<u8>::new();
    let mut udmi = Vec::<u8>::new();
    let summary = converter::convert(
        &book,
        &ConverterSettings::default(),
        &dummy_keypair(),
        &mut bacnet,
        &mut udmi,
    )
    .unwrap();
    assert_eq!(summary.points_exported, 4);
    assert_eq!(summary.skipped, 0);
}
