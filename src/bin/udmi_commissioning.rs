// クラウドに届いた値と現場の点リストを突き合わせる。
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use anyhow::Context;
use bacnetudmi::udmi::{self, ExpectedPoints, MqttSettings, Subscriber, results_table};
use bacnetudmi::workbook::write_workbook;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{Event, Subscriber as TracingSubscriber};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// UDMI のテレメトリーを受け取って点リストの値と照合する
#[derive(Parser, Debug)]
#[command(name = "udmi_commissioning")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 詳細表示(-vv でさらに詳細)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// 点リストのスプレッドシート(.xlsx / .ods)
    #[arg(short, long, default_value = "input.xlsx")]
    input: PathBuf,

    /// 照合結果を書き出すスプレッドシート(.xlsx)
    #[arg(short, long, default_value = "output.xlsx")]
    output: PathBuf,

    /// 受信する秒数
    #[arg(short, long, default_value_t = 3600)]
    timeout: u64,

    /// MQTT ブローカー
    #[arg(long, env = "MQTT_HOST")]
    host: String,

    /// 省略すると CA ファイルがあれば 8883、なければ 1883
    #[arg(long, env = "MQTT_PORT")]
    port: Option<u16>,

    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "udmi_commissioning")]
    client_id: String,

    #[arg(long, env = "MQTT_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// 指定すれば TLS で接続する
    #[arg(long, env = "MQTT_CA_FILE")]
    ca_file: Option<PathBuf>,

    /// 購読するトピック
    #[arg(long, env = "MQTT_TOPIC", default_value = udmi::DEFAULT_TOPIC)]
    topic: String,

    /// ゲートウェイID
    #[arg(long, env = "UDMI_GATEWAY_ID")]
    gateway_id: Option<String>,
}

/// ログに出てはいけない MQTT パスワード
static MQTT_PASSWORD: OnceLock<String> = OnceLock::new();

/// MQTT パスワードをマスクするフォーマッタ
struct MaskingMqttPasswordFormatter;

impl<S, N> FormatEvent<S, N> for MaskingMqttPasswordFormatter
where
    S: TracingSubscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: fmt::format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        // まず標準フォーマットをバッファに書き出す
        let mut buf = String::new();
        {
            let temp_writer = fmt::format::Writer::new(&mut buf);
            fmt::format::Format::default()
                .with_timer(fmt::time::LocalTime::rfc_3339())
                .with_target(false)
                .with_ansi(false)
                .format_event(ctx, temp_writer, event)?;
        }

        // マスク処理
        if let Some(password) = MQTT_PASSWORD.get().filter(|s| !s.is_empty()) {
            buf = buf.replace(password.as_str(), &"#".repeat(password.chars().count()));
        }
        // 出力
        writer.write_str(&buf)
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG 環境変数があればそちらを優先する
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    // systemd-journaldに接続
    match tracing_journald::layer() {
        // journaldにログ出力する
        Ok(journald_layer) => registry.with(journald_layer).init(),
        // journaldが使えないので、標準出力にログ出力する
        Err(e) => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_file(false)
                        .with_line_number(false)
                        .with_thread_names(false)
                        .with_thread_ids(false)
                        .with_ansi(false)
                        .event_format(MaskingMqttPasswordFormatter),
                )
                .init();
            tracing::debug!("couldn't connect to journald: {}", e)
        }
    }
}

async fn exec_commissioning(cli: &Cli) -> anyhow::Result<()> {
    let mut expected = ExpectedPoints::load(&cli.input)
        .with_context(|| format!("Failed to read \"{}\"", cli.input.display()))?;
    for (sheet, table) in expected.point_sheets() {
        tracing::info!("{sheet}: {} points", table.rows.len());
        if cli.verbose > 0 {
            println!("{sheet}\n{}", table.to_psql());
        }
    }

    let settings = MqttSettings {
        host: cli.host.clone(),
        port: cli
            .port
            .unwrap_or(if cli.ca_file.is_some() { 8883 } else { 1883 }),
        client_id: cli.client_id.clone(),
        username: cli.username.clone(),
        password: cli.password.clone(),
        ca_file: cli.ca_file.clone(),
        topic: cli.topic.clone(),
        gateway_id: cli.gateway_id.clone(),
        ..Default::default()
    };
    let subscriber = Subscriber::new(&settings)
        .with_context(|| format!("Failed to set up MQTT client for {}", settings.host))?;
    tracing::info!(
        "Listening for messages from all devices on {}:{}",
        settings.host,
        settings.port
    );

    let mut messages = 0usize;
    let reason = subscriber
        .run(Duration::from_secs(cli.timeout), |envelope, body| {
            messages += 1;
            match expected.check_message(&envelope, body) {
                Ok(results) if results.is_empty() => {}
                Ok(results) => println!("{}", results_table(&results).to_psql()),
                Err(e) => tracing::warn!("{envelope}: {e}"),
            }
        })
        .await?;
    tracing::info!("{messages} messages received, {reason:?}");

    write_workbook(&cli.output, expected.workbook())
        .with_context(|| format!("Failed to write \"{}\"", cli.output.display()))?;
    println!("Commissioning results written to file {}", cli.output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    if let Some(password) = &cli.password {
        let _ = MQTT_PASSWORD.set(password.clone());
    }
    init_tracing(cli.verbose);

    // プログラムの情報
    let git_head_ref = built_info::GIT_HEAD_REF.unwrap_or_default();
    let app_info = format!(
        "{} / {}{}",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::GIT_COMMIT_HASH_SHORT
            .map(|s| format!(" ({s} - {git_head_ref})"))
            .unwrap_or_default()
    );

    tracing::info!("{app_info} started.");
    match exec_commissioning(&cli).await {
        Ok(()) => {
            tracing::info!("{app_info} finished.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{app_info} aborted, reason: {e:#}");
            ExitCode::FAILURE
        }
    }
}
