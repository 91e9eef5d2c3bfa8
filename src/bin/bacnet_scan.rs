// BACnet 機器を探して点リストをスプレッドシートに書き出す。
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use anyhow::{Context, bail};
use bacnetudmi::bacnet::DEFAULT_PORT;
use bacnetudmi::bacnet::client::{Client, ClientConfig, parse_interface};
use bacnetudmi::scan::{ScanOptions, Scanner, parse_networks, parse_range};
use bacnetudmi::workbook::{self, devices_table, points_table, scan_workbook};
use clap::Parser;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// BACnet/IP ネットワークの機器と点を調べる
#[derive(Parser, Debug)]
#[command(name = "bacnet_scan")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 詳細表示(-vv でさらに詳細)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// 書き出すスプレッドシートのファイル名(.xlsx)
    #[arg(short = 'x', long, default_value = "bacnet-scan.xlsx")]
    export: PathBuf,

    /// BACnet インターフェースのアドレス("192.168.1.10/24")
    #[arg(short, long, env = "BACNET_ADDRESS", value_parser = parse_interface)]
    address: Option<Ipv4Addr>,

    /// 対象の BACnet ネットワーク番号(カンマ区切り)
    #[arg(short, long, value_parser = parse_networks)]
    networks: Option<::std::vec::Vec<u16>>,

    /// この BACnet ID の機器だけを調べる
    #[arg(short = 'b', long = "bacnetid")]
    device_id: Option<u32>,

    /// 調べる機器の範囲("1234,5678")
    #[arg(short, long, value_parser = parse_range)]
    range: Option<(u32, u32)>,

    /// 機器一覧だけで点は調べない
    #[arg(short = 'd', long = "deviceonly")]
    devices_only: bool,

    /// グローバルブロードキャストで探す
    #[arg(short = 'g', long = "globalscan")]
    global: bool,

    /// 書き出し先ディレクトリ
    #[arg(long, default_value = "bacnet_devices")]
    output_dir: PathBuf,

    /// BACnet/IP の UDP ポート
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// 応答を待つ秒数
    #[arg(long, default_value_t = 3)]
    timeout: u64,

    /// I-Am を待つ秒数
    #[arg(long, default_value_t = 5)]
    wait: u64,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG 環境変数があればそちらを優先する
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// "bacnet-scan.xlsx" -> "bacnet-scan"
fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "bacnet-scan".to_string())
}

fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::info!(
        "{} / {} ({} - {})",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::GIT_COMMIT_HASH_SHORT.unwrap_or_default(),
        built_info::GIT_HEAD_REF.unwrap_or_default()
    );
    tracing::debug!("{cli:?}");

    if cli.device_id.is_some() && cli.range.is_some() {
        bail!("--bacnetid and --range are mutually exclusive");
    }

    let bind = cli.address.unwrap_or(Ipv4Addr::UNSPECIFIED);
    let config = ClientConfig {
        bind,
        port: cli.port,
        timeout: Duration::from_secs(cli.timeout),
        discover_wait: Duration::from_secs(cli.wait),
        ..Default::default()
    };
    let client = Client::bind(config).with_context(|| format!("Failed to bind {bind}:{}", cli.port))?;

    let options = ScanOptions {
        global: cli.global,
        networks: cli.networks.clone().unwrap_or_default(),
        device_id: cli.device_id,
        range: cli.range,
        devices_only: cli.devices_only,
    };
    let mut scanner = Scanner::new(client);
    let result = scanner.scan(&options).context("BACnet scan failed")?;
    tracing::info!("{} devices found", result.devices.len());

    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("Failed to create \"{}\"", cli.output_dir.display()))?;

    let devices = devices_table(&result.devices);
    if cli.verbose > 0 {
        println!("{}", devices.to_psql());
    }

    if cli.devices_only {
        let path = cli.output_dir.join(format!("{}.csv", file_stem(&cli.export)));
        workbook::write_csv(&path, &devices)
            .with_context(|| format!("Failed to write \"{}\"", path.display()))?;
        println!("Device list written to file {}", path.display());
        return Ok(());
    }

    for (sheet, points) in result.points.iter() {
        let table = points_table(points);
        if cli.verbose > 0 {
            println!("{sheet}\n{}", table.to_psql());
        }
        let path = cli.output_dir.join(format!("{sheet}.csv"));
        workbook::write_csv(&path, &table)
            .with_context(|| format!("Failed to write \"{}\"", path.display()))?;
    }

    let path = cli.output_dir.join(&cli.export);
    let book = scan_workbook(&result.devices, &result.points);
    workbook::write_workbook(&path, &book)
        .with_context(|| format!("Failed to write \"{}\"", path.display()))?;
    println!("Devices point lists written to file {}", path.display());
    Ok(())
}
