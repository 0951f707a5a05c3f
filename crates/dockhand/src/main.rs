mod commands;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(about = "ブランチごとにイメージをビルドし、プッシュし、手元で動かす", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// イメージをビルドしてレジストリへプッシュ
    Build(commands::build::BuildArgs),
    /// ブランチのコンテナをローカルで起動（Ctrl-C で停止）
    Deploy(commands::deploy::DeployArgs),
    /// Dockerfile のベースイメージと公開ポートを表示
    Inspect {
        /// Dockerfile のパス
        #[arg(default_value = "Dockerfile")]
        path: PathBuf,
        /// JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// プロジェクトの Dockerfile フィンガープリントを表示
    Fingerprint {
        /// プロジェクトディレクトリ
        #[arg(short = 'C', long, default_value = ".")]
        dir: PathBuf,
        /// JSON で出力
        #[arg(long)]
        json: bool,
        /// ベースイメージのタグを書き換える（image:tag）
        #[arg(long, value_name = "IMAGE:TAG")]
        set_base: Option<String>,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログは stderr、結果は stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Version => {
            println!("dockhand {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Inspect { path, json } => {
            commands::inspect::handle(&path, json)?;
        }
        Commands::Fingerprint {
            dir,
            json,
            set_base,
        } => {
            commands::fingerprint::handle(&dir, json, set_base.as_deref()).await?;
        }
        Commands::Build(args) => {
            let config = utils::load_config()?;
            let code = commands::build::handle(args, &config).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Deploy(args) => {
            let config = utils::load_config()?;
            commands::deploy::handle(args, &config).await?;
        }
    }

    Ok(())
}
