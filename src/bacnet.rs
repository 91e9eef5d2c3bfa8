// BACnet/IP
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
pub mod client;
pub mod object_type;
pub mod value;

pub use client::*;
pub use object_type::*;
pub use value::*;

use std::fmt;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// BACnet/IP 標準ポート番号 0xBAC0
pub const DEFAULT_PORT: u16 = 47808;

#[derive(Debug, Error)]
pub enum Error {
    #[error(r#"i/o "{0}""#)]
    Io(#[from] io::Error),

    #[error(r#"bacnet client "{0}""#)]
    Client(#[from] rustbac_client::ClientError),

    #[error(r#"bacnet transport "{0}""#)]
    Transport(String),

    #[error(r#"malformed value "{0}""#)]
    Malformed(String),

    #[error("no response")]
    Timeout,
}

/// オブジェクト識別子
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Debug)]
pub struct ObjectIdentifier {
    pub object_type: ObjectType,
    pub instance: u32,
}

impl ObjectIdentifier {
    pub fn new(object_type: ObjectType, instance: u32) -> Self {
        ObjectIdentifier {
            object_type,
            instance,
        }
    }

    pub fn device(instance: u32) -> Self {
        Self::new(ObjectType::Device, instance)
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.instance)
    }
}

/// 相手先アドレス
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct DeviceAddress {
    pub address: SocketAddr,
    /// ルーターの向こう側にいる機器のネットワーク番号とMACアドレス
    pub route: Option<(u16, Vec<u8>)>,
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.route {
            Some((net, mac)) => write!(
                f,
                "{}:{} via {}",
                net,
                mac.iter().map(|b| format!("{:02X}", b)).collect::<String>(),
                self.address
            ),
            None => write!(f, "{}", self.address),
        }
    }
}

/// I-Am 受信
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct IAm {
    pub device_id: u32,
    pub address: DeviceAddress,
}

/// Who-Is 要求
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct WhoIs {
    pub low_limit: Option<u32>,
    pub high_limit: Option<u32>,
    /// 全ネットワークに送る
    pub global: bool,
    /// 指定したネットワークに送る
    pub network: Option<u16>,
}

impl WhoIs {
    pub fn in_range(&self, device_id: u32) -> bool {
        self.low_limit.is_none_or(|low| low <= device_id)
            && self.high_limit.is_none_or(|high| device_id <= high)
    }
}

/// スキャナーから見たBACnetネットワーク
pub trait BacnetNetwork {
    /// Who-Is を送って I-Am を集める
    fn who_is(&mut self, request: &WhoIs) -> Result<Vec<IAm>, Error>;

    /// プロパティを読む
    fn read_property(
        &mut self,
        device: &DeviceAddress,
        object: &ObjectIdentifier,
        property: u32,
        index: Option<u32>,
    ) -> Result<Value, Error>;
}

#[test]
fn test1() {
    let oid = ObjectIdentifier::new(ObjectType::AnalogValue, 12);
    assert_eq!(oid.to_string(), "analogValue:12");
    assert_eq!(ObjectIdentifier::device(1001).to_string(), "device:1001");

    let address = DeviceAddress {
        address: "192.168.1.20:47808".parse().unwrap(),
        route: None,
    };
    assert_eq!(address.to_string(), "192.168.1.20:47808");
}

#[test]
fn test2() {
    let req = WhoIs {
        low_limit: Some(100),
        high_limit: Some(200),
        ..Default::default()
    };
    assert!(req.in_range(100));
    assert!(req.in_range(200));
    assert!(!req.in_range(99));
    assert!(!req.in_range(201));
    assert!(WhoIs::default().in_range(4194302));
}
