// MQTT ブローカーからメッセージを受け取る
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::udmi::{Envelope, Error};
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration, Transport,
};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{self, Instant};

pub const DEFAULT_TOPIC: &str = "/devices/+/#";

/// 接続に失敗してから次に poll するまで
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// ブローカーの接続設定
#[derive(Clone, Debug)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 指定すれば TLS で接続する
    pub ca_file: Option<PathBuf>,
    pub topic: String,
    pub gateway_id: Option<String>,
    pub keep_alive: Duration,
}

impl Default for MqttSettings {
    fn default() -> Self {
        MqttSettings {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "udmi_commissioning".to_string(),
            username: None,
            password: None,
            ca_file: None,
            topic: DEFAULT_TOPIC.to_string(),
            gateway_id: None,
            keep_alive: Duration::from_secs(30),
        }
    }
}

impl MqttSettings {
    pub fn options(&self) -> Result<MqttOptions, Error> {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.as_deref().unwrap_or_default());
        }
        if let Some(ca_file) = &self.ca_file {
            let ca = fs::read(ca_file)?;
            options.set_transport(Transport::tls_with_config(TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth: None,
            }));
        }
        Ok(options)
    }
}

/// 受信を止めた理由
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Timeout,
    Interrupted,
}

pub struct Subscriber {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
    gateway_id: Option<String>,
}

impl Subscriber {
    pub fn new(settings: &MqttSettings) -> Result<Self, Error> {
        let (client, eventloop) = AsyncClient::new(settings.options()?, 10);
        Ok(Subscriber {
            client,
            eventloop,
            topic: settings.topic.clone(),
            gateway_id: settings.gateway_id.clone(),
        })
    }

    /// 指定時間が過ぎるか Ctrl-C まで受信して、届いたメッセージを渡す
    /// 受信確認(QoS 1)はクライアントライブラリがする
    pub async fn run<F>(self, duration: Duration, mut on_message: F) -> Result<StopReason, Error>
    where
        F: FnMut(Envelope, &[u8]),
    {
        let Subscriber {
            client,
            mut eventloop,
            topic,
            gateway_id,
        } = self;
        client.subscribe(topic.as_str(), QoS::AtLeastOnce).await?;
        tracing::info!("Listening for messages on \"{topic}\"");

        let timeout = time::sleep(duration);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(timeout, ctrl_c);
        // 再接続待ちの間は poll しない
        let mut retry_at: Option<Instant> = None;
        let reason = loop {
            tokio::select! {
                _ = &mut timeout => break StopReason::Timeout,
                _ = &mut ctrl_c => break StopReason::Interrupted,
                _ = time::sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    retry_at = None;
                }
                event = eventloop.poll(), if retry_at.is_none() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        match Envelope::from_topic(&publish.topic, gateway_id.as_deref()) {
                            Ok(envelope) => on_message(envelope, &publish.payload[..]),
                            Err(e) => tracing::warn!("{e}"),
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        tracing::info!("connected {:?}", ack.code);
                    }
                    Ok(other) => tracing::trace!("{other:?}"),
                    Err(e) => {
                        // 次の poll で再接続する
                        tracing::error!("mqtt connection: {e}");
                        retry_at = Some(Instant::now() + RECONNECT_DELAY);
                    }
                },
            }
        };
        tracing::info!("stop listening ({reason:?})");
        if let Err(e) = client.disconnect().await {
            tracing::debug!("disconnect: {e}");
        }
        Ok(reason)
    }
}

#[test]
fn test1() {
    let settings = MqttSettings {
        host: "mqtt.example.com".to_string(),
        port: 8883,
        username: Some("user".to_string()),
        password: Some("secret".to_string()),
        ..Default::default()
    };
    let options = settings.options().unwrap();
    assert_eq!(options.broker_address(), ("mqtt.example.com".to_string(), 8883));
    assert_eq!(options.keep_alive(), Duration::from_secs(30));

    let settings = MqttSettings {
        ca_file: Some(PathBuf::from("/nonexistent/ca.pem")),
        ..Default::default()
    };
    assert!(matches!(settings.options(), Err(Error::Io(_))));
}

#[tokio::test]
async fn test2() {
    // 繋がらないブローカーでも指定時間で止まる。再接続待ちで遅れない
    let settings = MqttSettings {
        host: "127.0.0.1".to_string(),
        port: 1,
        ..Default::default()
    };
    let subscriber = Subscriber::new(&settings).unwrap();
    let mut received = 0;
    let started = Instant::now();
    let reason = subscriber
        .run(Duration::from_millis(300), |_, _| received += 1)
        .await
        .unwrap();
    assert_eq!(reason, StopReason::Timeout);
    assert_eq!(received, 0);
    assert!(started.elapsed() < RECONNECT_DELAY);
}
