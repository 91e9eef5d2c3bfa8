// 点リストのスプレッドシートから Mango の設定ファイルを作る。
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use anyhow::Context;
use bacnetudmi::mango::{self, ConverterSettings, UdmiVersion};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// BACnet の点リストを Mango の BACnet 設定と UDMI パブリッシャー設定に変換する
#[derive(Parser, Debug)]
#[command(name = "sheet2mangojson")]
#[command(version, about, long_about = None)]
#[command(subcommand_negates_reqs = true)]
struct Cli {
    /// 詳細表示(-vv でさらに詳細)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// 点リストのスプレッドシート(.xlsx / .ods)
    #[arg(short, long, required = true)]
    input: Option<PathBuf>,

    /// 出力ファイル名の接頭辞
    #[arg(short, long, required = true)]
    output: Option<String>,

    /// 設定ファイル(TOML)
    #[arg(short, long, env = "SHEET2MANGOJSON_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// 既定値を書いた設定ファイルを作る
    InitConfig {
        /// 書き出すファイル名
        #[arg(default_value = "sheet2mangojson.toml")]
        file: PathBuf,
    },
}

/// 設定ファイルより優先する値
#[derive(Debug, Args)]
struct Overrides {
    /// Mango の BACnet ローカルデバイス番号
    #[arg(short, long)]
    localdevice: Option<u32>,

    /// BACnet ローカルデバイスのブロードキャストアドレス
    #[arg(short, long)]
    broadcast: Option<String>,

    /// 機器ごとにデーターソースを分ける
    #[arg(short, long, num_args = 0..=1, default_missing_value = "true")]
    unique: Option<bool>,

    /// データーソースを有効にする
    #[arg(long)]
    ds_enabled: Option<bool>,

    /// UDMI パブリッシャー名
    #[arg(short, long)]
    publisher: Option<String>,

    /// GCP プロジェクト
    #[arg(short = 'j', long)]
    project: Option<String>,

    /// GCP リージョン
    #[arg(short = 'g', long)]
    region: Option<String>,

    /// レジストリ
    #[arg(short, long)]
    registry: Option<String>,

    /// サイト
    #[arg(short, long)]
    site: Option<String>,

    /// MQTT ブローカーのホスト名
    #[arg(long)]
    hostname: Option<String>,

    /// UDMI ドライバのバージョン("5.4.*" / "5.3.*")
    #[arg(long, value_parser = parse_udmi_version)]
    udmi_version: Option<UdmiVersion>,
}

impl Overrides {
    fn apply(&self, settings: &mut ConverterSettings) {
        if let Some(v) = self.localdevice {
            settings.localdevice = v;
        }
        if let Some(v) = &self.broadcast {
            settings.broadcast = v.clone();
        }
        if let Some(v) = self.unique {
            settings.unique = v;
        }
        if let Some(v) = self.ds_enabled {
            settings.ds_enabled = v;
        }
        if let Some(v) = &self.publisher {
            settings.publisher = v.clone();
        }
        if let Some(v) = &self.project {
            settings.project = v.clone();
        }
        if let Some(v) = &self.region {
            settings.region = v.clone();
        }
        if let Some(v) = &self.registry {
            settings.registry = v.clone();
        }
        if let Some(v) = &self.site {
            settings.site = v.clone();
        }
        if let Some(v) = &self.hostname {
            settings.hostname = v.clone();
        }
        if let Some(v) = self.udmi_version {
            settings.udmi_version = v;
        }
    }
}

fn parse_udmi_version(s: &str) -> Result<UdmiVersion, String> {
    s.parse::<UdmiVersion>().map_err(|e| e.to_string())
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

    if let Some(Commands::InitConfig { file }) = &cli.command {
        fs::write(file, ConverterSettings::template()?)
            .with_context(|| format!("Failed to write \"{}\"", file.display()))?;
        println!("Settings template written to file {}", file.display());
        return Ok(());
    }

    let input = cli.input.as_ref().context("--input is required")?;
    let output = cli.output.as_ref().context("--output is required")?;

    let mut settings = match &cli.config {
        Some(path) => ConverterSettings::load(path)
            .with_context(|| format!("Failed to read \"{}\"", path.display()))?,
        None => ConverterSettings::default(),
    };
    cli.overrides.apply(&mut settings);
    tracing::debug!("{settings:?}");

    let summary = mango::convert_file(input, output, &settings)
        .with_context(|| format!("Failed to convert \"{}\"", input.display()))?;

    println!("Points exported: {}", summary.points_exported);
    println!("Proxy devices: {}", summary.proxy_devices.join(", "));
    println!("Data sources: {}", summary.data_sources.join(", "));
    if summary.skipped > 0 {
        println!("Skipped rows: {}", summary.skipped);
    }
    Ok(())
}
