// 点リストのブックを Mango の BACnet 設定と UDMI パブリッシャー設定に変換する
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::bacnet::ObjectType;
use crate::mango::templates::{
    DataPoint, DataSource, ExportPoint, LocalDevice, Publisher, PublishedPoint, SystemSettings,
};
use crate::mango::{ConvertError, ConverterSettings, KeyPair};
use crate::workbook::{
    self, DEVICES_SHEET, Workbook, device_column as D, point_column as P, read_workbook,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// スキャナー自身の機器名
pub const SCANNER_DEVICE_NAME: &str = "BAC0";

/// 不明なオブジェクトタイプ
pub const FALLBACK_OBJECT_TYPE: &str = "ANALOG_VALUE";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub points_exported: usize,
    pub proxy_devices: Vec<String>,
    pub data_sources: Vec<String>,
    /// 書き出さなかった行
    pub skipped: usize,
}

/// (BACnet設定, UDMIパブリッシャー設定) のファイル名
pub fn output_paths(prefix: &str) -> (PathBuf, PathBuf) {
    (
        PathBuf::from(format!("{prefix}_bacnet_config.json")),
        PathBuf::from(format!("{prefix}_udmi_publisher.json")),
    )
}

/// "<type>:<instance>" を (Mangoのオブジェクトタイプ名, インスタンス番号) にする
pub fn parse_object(object: &str) -> Option<(&'static str, u32)> {
    let (object_type, instance) = object.split_once(':')?;
    let instance = instance.trim().parse::<u32>().ok()?;
    let object_type = object_type
        .trim()
        .parse::<ObjectType>()
        .ok()
        .and_then(|t| t.mango_name())
        .unwrap_or(FALLBACK_OBJECT_TYPE);
    Some((object_type, instance))
}

/// 点リストのシート(機器一覧と BAC0 以外)をシート名順に
fn point_sheets(book: &Workbook) -> Vec<String> {
    let names = book
        .sheet_names()
        .filter(|name| *name != DEVICES_SHEET && *name != SCANNER_DEVICE_NAME)
        .map(|name| name.to_string())
        .collect::<BTreeSet<_>>();
    names.into_iter().collect()
}

/// 書き出す点を順に渡す。1回目と2回目で同じ判定をする
fn for_each_point<F>(
    book: &Workbook,
    settings: &ConverterSettings,
    report: bool,
    mut f: F,
) -> Result<usize, ConvertError>
where
    F: FnMut(ExportPoint) -> Result<(), ConvertError>,
{
    let devices = book
        .sheet(DEVICES_SHEET)
        .ok_or_else(|| workbook::Error::SheetNotFound(DEVICES_SHEET.to_string()))?;
    let mut skipped = 0usize;
    for device in devices.rows() {
        let sheet = device.get(D::SANITIZED_DEVICE_NAME);
        if sheet == SCANNER_DEVICE_NAME {
            continue;
        }
        // 点リストが見つからない機器は1行として数える
        let Some(points) = book.sheet(sheet).filter(|_| !sheet.is_empty()) else {
            if report {
                tracing::warn!(
                    "Skipping device {} (ID: {}), no point sheet \"{}\"",
                    device.get(D::DEVICE_NAME),
                    device.get(D::DEVICE_ID),
                    sheet
                );
            }
            skipped += 1;
            continue;
        };
        let Ok(device_id) = device.get(D::DEVICE_ID).parse::<u32>() else {
            if report {
                tracing::warn!(
                    "Skipping device {} with device_id \"{}\"",
                    sheet,
                    device.get(D::DEVICE_ID)
                );
            }
            skipped += points.rows.len();
            continue;
        };
        let data_source_xid = if settings.unique {
            format!("DS_BACNET_{sheet}")
        } else {
            "DS_BACNET".to_string()
        };
        if report {
            tracing::debug!("Processing device: {} (ID: {})", sheet, device_id);
        }
        for point in points.rows() {
            let cloud_device_id = point.get(P::CLOUD_DEVICE_ID);
            let cloud_point_name = point.get(P::CLOUD_POINT_NAME);
            if cloud_device_id.is_empty() || cloud_point_name.is_empty() {
                continue;
            }
            let Some((object_type, instance)) = parse_object(point.get(P::OBJECT)) else {
                if report {
                    tracing::warn!(
                        "Skipping malformed object \"{}\" for point {}",
                        point.get(P::OBJECT),
                        cloud_point_name
                    );
                }
                skipped += 1;
                continue;
            };
            f(ExportPoint {
                device_id,
                object_type,
                instance,
                cloud_device_id: cloud_device_id.to_string(),
                cloud_point_name: cloud_point_name.to_string(),
                point_name: point.get(P::POINT_NAME).to_string(),
                device_name: point.get(P::DEVICE_NAME).to_string(),
                description: point.get(P::DESCRIPTION).to_string(),
                data_source_xid: data_source_xid.clone(),
            })?;
        }
    }
    Ok(skipped)
}

/// 2スペースインデントで書いて、続けて区切りを書く
fn write_json<W: Write + ?Sized, T: Serialize>(
    out: &mut W,
    value: &T,
    separator: &str,
) -> Result<(), ConvertError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    out.write_all(separator.as_bytes())?;
    Ok(())
}

/// ブックを変換して2つの JSON を同時に書く
pub fn convert(
    book: &Workbook,
    settings: &ConverterSettings,
    keypair: &KeyPair,
    bacnet_out: &mut dyn Write,
    udmi_out: &mut dyn Write,
) -> Result<ConversionSummary, ConvertError> {
    // 1回目: 点の数と代理機器
    let mut total = 0usize;
    let mut proxy_devices = BTreeSet::<String>::new();
    let skipped = for_each_point(book, settings, true, |point| {
        total += 1;
        proxy_devices.insert(point.cloud_device_id);
        Ok(())
    })?;
    let proxy_devices = proxy_devices.into_iter().collect::<Vec<_>>();
    tracing::info!("Total points to export: {}", total);
    tracing::info!("Proxy devices: {:?}", proxy_devices);

    let data_sources = if settings.unique {
        point_sheets(book)
            .iter()
            .map(|sheet| DataSource::new(Some(sheet.as_str()), settings.ds_enabled))
            .collect::<Vec<_>>()
    } else {
        vec![DataSource::new(None, settings.ds_enabled)]
    };

    bacnet_out.write_all(b"{\n\"BACnetLocalDevices\": ")?;
    write_json(bacnet_out, &[LocalDevice::new(settings)], ",\n\"dataSources\": ")?;
    write_json(bacnet_out, &data_sources, ",\n\"dataPoints\": [\n")?;

    let publisher_xid = settings.publisher_xid();
    udmi_out.write_all(b"{\n\"systemSettings\": ")?;
    write_json(udmi_out, &SystemSettings::new(settings)?, ",\n\"publishers\": ")?;
    write_json(
        udmi_out,
        &[Publisher::new(settings, &proxy_devices, keypair)],
        ",\n\"publishedPoints\": [\n",
    )?;

    // 2回目: 1点ずつ両方に書く。最後の点の後ろにはカンマを書かない
    let mut count = 0usize;
    for_each_point(book, settings, false, |point| {
        count += 1;
        let separator = if count < total { ",\n" } else { "\n" };
        write_json(bacnet_out, &DataPoint::new(&point), separator)?;
        write_json(udmi_out, &PublishedPoint::new(&point, &publisher_xid), separator)?;
        tracing::debug!("  -> Point: {} (XID: {})", point.cloud_point_name, point.xid());
        Ok(())
    })?;

    bacnet_out.write_all(b"]\n}\n")?;
    udmi_out.write_all(b"]\n}\n")?;
    bacnet_out.flush()?;
    udmi_out.flush()?;

    Ok(ConversionSummary {
        points_exported: count,
        proxy_devices,
        data_sources: data_sources.into_iter().map(|ds| ds.xid).collect(),
        skipped,
    })
}

/// ファイルを読んで変換結果をファイルに書く
pub fn convert_file(
    input: &Path,
    prefix: &str,
    settings: &ConverterSettings,
) -> Result<ConversionSummary, ConvertError> {
    let book = read_workbook(input)?;
    // 出力ファイルを作る前に確かめる
    let devices = book
        .sheet(DEVICES_SHEET)
        .ok_or_else(|| workbook::Error::SheetNotFound(DEVICES_SHEET.to_string()))?;
    tracing::debug!("Data from sheet 'devices':\n{}", devices.to_psql());
    let keypair = KeyPair::generate()?;
    let (bacnet_path, udmi_path) = output_paths(prefix);
    let mut bacnet_out = BufWriter::new(File::create(&bacnet_path)?);
    let mut udmi_out = BufWriter::new(File::create(&udmi_path)?);
    let summary = convert(&book, settings, &keypair, &mut bacnet_out, &mut udmi_out)?;
    tracing::info!("Created {}", bacnet_path.display());
    tracing::info!("Created {}", udmi_path.display());
    Ok(summary)
}

#[cfg(test)]
fn sample_book() -> Workbook {
    use crate::workbook::{PointRecord, Table, points_table};

    let mut devices = Table::new(&[D::NUMBER, D::DEVICE_NAME, D::SANITIZED_DEVICE_NAME, D::DEVICE_ID]);
    devices.push_row(vec!["0".into(), "AHU 1".into(), "AHU_1".into(), "1001".into()]);
    devices.push_row(vec!["1".into(), "VAV 2".into(), "VAV_2".into(), "1002".into()]);
    devices.push_row(vec!["2".into(), "BAC0".into(), "BAC0".into(), "98777".into()]);
    devices.push_row(vec!["3".into(), "Ghost".into(), "Ghost".into(), "1003".into()]);

    let point = |name: &str, object: &str, cloud_device: &str, cloud_point: &str| {
        let mut p = PointRecord::new("AHU 1", name, object);
        p.cloud_device_id = cloud_device.to_string();
        p.cloud_point_name = cloud_point.to_string();
        p
    };
    let ahu = vec![
        point("SAT", "analogInput:1", "AHU-1", "supply_air_temperature_sensor"),
        point("FAN", "binaryOutput:2", "AHU-1", "supply_fan_run_command"),
        // 書き出さない
        point("RAT", "analogInput:3", "", "return_air_temperature_sensor"),
        point("BAD", "analogInput", "AHU-1", "broken_point"),
        point("TRD", "trendLog:4", "AHU-1", "trend_point"),
    ];
    let mut vav = vec![point("ZT", "analogValue:7", "VAV-2", "zone_air_temperature_sensor")];
    vav[0].description = "zone \"north\"".to_string();

    let mut book = Workbook::new();
    book.push(DEVICES_SHEET, devices);
    book.push("VAV_2", points_table(&vav));
    book.push("AHU_1", points_table(&ahu));
    book.push("BAC0", points_table(&[point("X", "analogValue:1", "BAC0", "x")]));
    book
}

#[cfg(test)]
use crate::mango::templates::dummy_keypair;

#[test]
fn test1() {
    assert_eq!(parse_object("analogInput:12"), Some(("ANALOG_INPUT", 12)));
    assert_eq!(parse_object("multiStateValue:3"), Some(("MULTISTATE_VALUE", 3)));
    assert_eq!(parse_object("trendLog:4"), Some(("ANALOG_VALUE", 4)));
    assert_eq!(parse_object("analogInput"), None);
    assert_eq!(parse_object("analogInput:x"), None);
    assert_eq!(
        output_paths("site_round-1"),
        (
            PathBuf::from("site_round-1_bacnet_config.json"),
            PathBuf::from("site_round-1_udmi_publisher.json")
        )
    );
}

#[test]
fn test2() {
    let book = sample_book();
    let settings = ConverterSettings::default();
    let mut bacnet = Vec::<u8>::new();
    let mut udmi = Vec::<u8>::new();
    let summary = convert(&book, &settings, &dummy_keypair(), &mut bacnet, &mut udmi).unwrap();

    assert_eq!(summary.points_exported, 4);
    assert_eq!(summary.proxy_devices, vec!["AHU-1", "VAV-2"]);
    assert_eq!(summary.data_sources, vec!["DS_BACNET_AHU_1", "DS_BACNET_VAV_2"]);
    // 壊れた object の行と、点リストのない Ghost
    assert_eq!(summary.skipped, 2);

    let bacnet: serde_json::Value = serde_json::from_slice(&bacnet).unwrap();
    let udmi: serde_json::Value = serde_json::from_slice(&udmi).unwrap();

    let points = bacnet["dataPoints"].as_array().unwrap();
    let published = udmi["publishedPoints"].as_array().unwrap();
    assert_eq!(points.len(), published.len());
    assert_eq!(points.len(), 4);
    for (dp, pp) in points.iter().zip(published) {
        assert_eq!(dp["xid"], pp["dataPointXid"]);
        assert_eq!(dp["name"], pp["name"]);
        assert_eq!(dp["deviceName"], pp["deviceName"]);
    }
    let xids = points.iter().map(|p| p["xid"].as_str().unwrap()).collect::<Vec<_>>();
    assert_eq!(
        xids,
        vec![
            "DP_1001_ANALOG_INPUT_1",
            "DP_1001_BINARY_OUTPUT_2",
            "DP_1001_ANALOG_VALUE_4",
            "DP_1002_ANALOG_VALUE_7",
        ]
    );
    assert_eq!(points[0]["dataSourceXid"], "DS_BACNET_AHU_1");
    assert_eq!(points[3]["tags"]["BACnetObjectDescription"], "zone \"north\"");
    assert_eq!(bacnet["BACnetLocalDevices"][0]["deviceId"], 98777);
    assert_eq!(bacnet["dataSources"].as_array().unwrap().len(), 2);

    let publisher = &udmi["publishers"][0];
    assert_eq!(publisher["xid"], "PUB_UDMI_BACNET_CGWV-1");
    assert_eq!(publisher["proxyDevices"][0]["name"], "AHU-1");
    assert_eq!(publisher["proxyDevices"][1]["name"], "VAV-2");
    assert_eq!(published[0]["publisherXid"], "PUB_UDMI_BACNET_CGWV-1");
    assert!(udmi["systemSettings"]["udmi.config"].is_string());
}

#[test]
fn test3() {
    let book = sample_book();
    let settings = ConverterSettings {
        unique: false,
        ds_enabled: false,
        ..Default::default()
    };
    let mut bacnet = Vec::<u8>::new();
    let mut udmi = Vec::<u8>::new();
    let summary = convert(&book, &settings, &dummy_keypair(), &mut bacnet, &mut udmi).unwrap();
    assert_eq!(summary.data_sources, vec!["DS_BACNET"]);

    let bacnet: serde_json::Value = serde_json::from_slice(&bacnet).unwrap();
    assert_eq!(bacnet["dataSources"][0]["enabled"], false);
    for point in bacnet["dataPoints"].as_array().unwrap() {
        assert_eq!(point["dataSourceXid"], "DS_BACNET");
    }
}

#[test]
fn test4() {
    // 書き出す点がなくても JSON として正しい
    let mut book = Workbook::new();
    book.push(DEVICES_SHEET, workbook::devices_table(&[]));
    let mut bacnet = Vec::<u8>::new();
    let mut udmi = Vec::<u8>::new();
    let summary = convert(
        &book,
        &ConverterSettings::default(),
        &dummy_keypair(),
        &mut bacnet,
        &mut udmi,
    )
    .unwrap();
    assert_eq!(summary.points_exported, 0);
    let bacnet: serde_json::Value = serde_json::from_slice(&bacnet).unwrap();
    let udmi: serde_json::Value = serde_json::from_slice(&udmi).unwrap();
    assert!(bacnet["dataPoints"].as_array().unwrap().is_empty());
    assert!(bacnet["dataSources"].as_array().unwrap().is_empty());
    assert!(udmi["publishers"][0]["proxyDevices"].as_array().unwrap().is_empty());

    // 機器一覧がないのは致命的
    let mut sink = Vec::<u8>::new();
    let mut sink2 = Vec::<u8>::new();
    let result = convert(
        &Workbook::new(),
        &ConverterSettings::default(),
        &dummy_keypair(),
        &mut sink,
        &mut sink2,
    );
    assert!(matches!(
        result,
        Err(ConvertError::Workbook(workbook::Error::SheetNotFound(_)))
    ));
}

#[test]
fn test5() {
    use crate::workbook::{points_table, write_workbook};

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("points.xlsx");
    let prefix = dir.path().join("site").to_string_lossy().to_string();

    // 機器一覧のないブックでは出力ファイルを作らない
    let mut book = Workbook::new();
    book.push("AHU_1", points_table(&[]));
    write_workbook(&input, &book).unwrap();
    let result = convert_file(&input, &prefix, &ConverterSettings::default());
    assert!(matches!(
        result,
        Err(ConvertError::Workbook(workbook::Error::SheetNotFound(_)))
    ));
    let (bacnet_path, udmi_path) = output_paths(&prefix);
    assert!(!bacnet_path.exists());
    assert!(!udmi_path.exists());

    let result = convert_file(&dir.path().join("missing.xlsx"), &prefix, &ConverterSettings::default());
    assert!(matches!(
        result,
        Err(ConvertError::Workbook(workbook::Error::NotFound(_)))
    ));
}
