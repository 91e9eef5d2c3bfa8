// BACnet/IP クライアント
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::bacnet::{
    BacnetNetwork, DEFAULT_PORT, DeviceAddress, Error, IAm, ObjectIdentifier, ObjectType, Value,
    WhoIs,
};
use rustbac_client::{BacnetClient, ClientDataValue};
use rustbac_core::types::{ObjectId, PropertyId};
use rustbac_datalink::DataLinkAddress;
use rustbac_datalink::bip::transport::BacnetIpTransport;
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::runtime::{self, Runtime};

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// 自分のIPアドレス
    pub bind: Ipv4Addr,
    pub port: u16,
    /// APDU タイムアウト
    pub timeout: Duration,
    /// 再送回数
    pub retries: u32,
    /// I-Am を待つ時間
    pub discover_wait: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            bind: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(3),
            retries: 2,
            discover_wait: Duration::from_secs(5),
        }
    }
}

/// "192.168.1.10/24" から自分のアドレスを取り出す
pub fn parse_interface(s: &str) -> Result<Ipv4Addr, String> {
    let (address, prefix) = match s.split_once('/') {
        Some((address, prefix)) => (address, Some(prefix)),
        None => (s, None),
    };
    if let Some(prefix) = prefix {
        prefix
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n <= 32)
            .ok_or_else(|| format!("invalid prefix length \"{prefix}\""))?;
    }
    address
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|e| format!("{address}: {e}"))
}

/// rustbac の値をこのクレートの値にする
fn from_client_value(value: ClientDataValue) -> Value {
    match value {
        ClientDataValue::Null => Value::Null,
        ClientDataValue::Boolean(b) => Value::Boolean(b),
        ClientDataValue::Unsigned(n) => Value::Unsigned(n as u64),
        ClientDataValue::Signed(n) => Value::Signed(n as i64),
        ClientDataValue::Real(x) => Value::Real(x),
        ClientDataValue::Double(x) => Value::Double(x),
        ClientDataValue::CharacterString(s) => Value::CharacterString(s),
        ClientDataValue::Enumerated(n) => Value::Enumerated(n),
        ClientDataValue::ObjectId(oid) => Value::ObjectIdentifier(from_object_id(oid)),
        ClientDataValue::Constructed { values, .. } => {
            Value::List(values.into_iter().map(from_client_value).collect())
        }
        // 日付、ビット列などは表記だけ残す
        other => Value::CharacterString(format!("{other:?}")),
    }
}

fn from_object_id(oid: ObjectId) -> ObjectIdentifier {
    ObjectIdentifier::new(
        ObjectType::from(oid.object_type().to_u16()),
        oid.instance(),
    )
}

fn to_object_id(object: &ObjectIdentifier) -> ObjectId {
    ObjectId::new(
        rustbac_core::types::ObjectType::from_u16(object.object_type.code()),
        object.instance,
    )
}

/// 配列の要素を取り出す。0 番目は要素数
fn array_element(value: Value, index: Option<u32>) -> Result<Value, Error> {
    let Some(index) = index else {
        return Ok(value);
    };
    let mut xs = value.into_list();
    match index {
        0 => Ok(Value::Unsigned(xs.len() as u64)),
        n if (n as usize) <= xs.len() => Ok(xs.swap_remove(n as usize - 1)),
        n => Err(Error::Malformed(format!("array index {n} out of range"))),
    }
}

/// 同期 API で使う BACnet/IP クライアント
pub struct Client {
    runtime: Runtime,
    client: BacnetClient<BacnetIpTransport>,
    config: ClientConfig,
}

impl Client {
    pub fn bind(config: ClientConfig) -> Result<Self, Error> {
        let runtime = runtime::Builder::new_current_thread().enable_all().build()?;
        let address = SocketAddr::V4(SocketAddrV4::new(config.bind, config.port));
        let transport = runtime
            .block_on(BacnetIpTransport::bind(address))
            .map_err(|e| Error::Transport(e.to_string()))?;
        tracing::debug!("bind {}", address);
        Ok(Client {
            runtime,
            client: BacnetClient::with_datalink(transport),
            config,
        })
    }
}

impl BacnetNetwork for Client {
    fn who_is(&mut self, request: &WhoIs) -> Result<Vec<IAm>, Error> {
        if request.global || request.network.is_some() {
            tracing::debug!("Who-Is is sent as a local broadcast");
        }
        let wait = self.config.discover_wait;
        let devices = self.runtime.block_on(self.client.who_is(None, wait))?;

        let mut found = BTreeMap::<u32, IAm>::new();
        for device in devices {
            let (Some(oid), DataLinkAddress::Ip(address)) = (device.device_id, device.address)
            else {
                continue;
            };
            let device_id = oid.instance();
            if !request.in_range(device_id) {
                continue;
            }
            let address = DeviceAddress {
                address,
                route: None,
            };
            tracing::debug!("I-Am device {} from {}", device_id, address);
            found.entry(device_id).or_insert(IAm {
                device_id,
                address,
            });
        }
        Ok(found.into_values().collect())
    }

    fn read_property(
        &mut self,
        device: &DeviceAddress,
        object: &ObjectIdentifier,
        property: u32,
        index: Option<u32>,
    ) -> Result<Value, Error> {
        let address = DataLinkAddress::Ip(device.address);
        let object_id = to_object_id(object);
        let property_id = PropertyId::from_u32(property);
        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                tracing::debug!("retry {} {} property {}", attempt, object, property);
            }
            let request = self.client.read_property(address, object_id, property_id);
            match self
                .runtime
                .block_on(tokio::time::timeout(self.config.timeout, request))
            {
                Ok(result) => return array_element(from_client_value(result?), index),
                Err(_) => continue,
            }
        }
        Err(Error::Timeout)
    }
}

#[test]
fn test1() {
    assert_eq!(
        parse_interface("192.168.1.10/24"),
        Ok(Ipv4Addr::new(192, 168, 1, 10))
    );
    assert_eq!(parse_interface("10.0.5.3"), Ok(Ipv4Addr::new(10, 0, 5, 3)));
    assert!(parse_interface("10.0.5.3/33").is_err());
    assert!(parse_interface("host/24").is_err());
}

#[test]
fn test2() {
    let list = Value::List(vec![
        Value::ObjectIdentifier(ObjectIdentifier::device(1001)),
        Value::ObjectIdentifier(ObjectIdentifier::new(ObjectType::AnalogInput, 1)),
    ]);
    assert_eq!(
        array_element(list.clone(), Some(0)).unwrap(),
        Value::Unsigned(2)
    );
    assert_eq!(
        array_element(list.clone(), Some(2)).unwrap(),
        Value::ObjectIdentifier(ObjectIdentifier::new(ObjectType::AnalogInput, 1))
    );
    assert!(array_element(list.clone(), Some(3)).is_err());
    assert_eq!(array_element(list.clone(), None).unwrap(), list);
    // 単独の値は要素1個の配列
    assert_eq!(
        array_element(Value::Real(21.5), Some(0)).unwrap(),
        Value::Unsigned(1)
    );
}

#[test]
fn test3() {
    assert_eq!(
        from_client_value(ClientDataValue::CharacterString("AHU-1".to_string())),
        Value::CharacterString("AHU-1".to_string())
    );
    assert_eq!(from_client_value(ClientDataValue::Real(21.5)), Value::Real(21.5));
    assert_eq!(
        from_client_value(ClientDataValue::Enumerated(1)),
        Value::Enumerated(1)
    );

    let oid = ObjectIdentifier::new(ObjectType::MultiStateValue, 3);
    assert_eq!(from_object_id(to_object_id(&oid)), oid);
}
