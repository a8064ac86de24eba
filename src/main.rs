use anyhow::Context;
use clap::{Parser, Subcommand};
use savesync_lib::config::DEFAULT_CONFIG_FILE;
use savesync_lib::logging::init_logging;
use savesync_lib::{SyncConfig, SyncEngine};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// 将本地存档目录与 S3 存储桶前缀双向同步
#[derive(Parser, Debug)]
#[command(name = "savesync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 上传有变化的本地存档
    Upload,
    /// 下载远程存档，覆盖本地同名文件
    Download,
}

fn plural(count: u64) -> &'static str {
    if count == 1 {
        "save"
    } else {
        "saves"
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = SyncConfig::load(&cli.config).context("加载配置失败")?;

    let config_dir = cli
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    init_logging(&config.log, &config_dir);

    let engine = SyncEngine::connect(config)?;

    match cli.command {
        Command::Upload => {
            let report = engine.upload_report().await.context("上传存档失败")?;
            if report.transferred > 0 {
                println!("Uploaded {} {}!", report.transferred, plural(report.transferred));
            }
            if report.skipped > 0 {
                println!(
                    "Skipped {} unchanged {}.",
                    report.skipped,
                    plural(report.skipped)
                );
            }
            if report.transferred == 0 && report.skipped == 0 {
                println!("No saves found.");
            }
        }
        Command::Download => {
            let report = engine.download_report().await.context("下载存档失败")?;
            println!("Successfully downloaded {} saves!", report.transferred);
            if report.failed > 0 {
                println!("{} {} could not be downloaded, see the log.", report.failed, plural(report.failed));
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
