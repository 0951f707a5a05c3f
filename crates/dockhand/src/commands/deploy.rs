use crate::utils;
use clap::Args;
use colored::Colorize;
use dockhand_config::{DeploySettings, DockhandConfig};
use dockhand_container::{BranchDeploymentManager, ContainerError, DeployOptions, connect_or_cli};
use dockhand_core::{LocalProcessRunner, ProcessRunner, RepoRef};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// リポジトリ (owner/name または name)
    #[arg(long, env = "DOCKHAND_REPO")]
    pub repo: String,
    /// ブランチ
    #[arg(long, env = "DOCKHAND_BRANCH")]
    pub branch: String,
    /// 起動するイメージ
    #[arg(long)]
    pub image: String,
    /// プロジェクトのディレクトリ（EXPOSE の読み取りに使う）
    #[arg(short = 'C', long, env = "DOCKHAND_PROJECT_DIR", default_value = ".")]
    pub project: PathBuf,
    /// コンテナ内のポート
    #[arg(long)]
    pub source_port: Option<u16>,
    /// 割り当てるホストポートの下限
    #[arg(long)]
    pub lower_port: Option<u16>,
    #[arg(long)]
    pub base_url: Option<String>,
    /// 起動完了を判定する正規表現（複数指定可）
    #[arg(long = "success-pattern")]
    pub success_patterns: Vec<String>,
    /// 起動待ちのタイムアウト（秒）
    #[arg(long)]
    pub startup_timeout: Option<u64>,
}

impl DeployArgs {
    /// 設定ファイルの値にコマンドラインの指定を重ねる
    fn settings(&self, configured: &DeploySettings) -> DeploySettings {
        let mut settings = configured.clone();
        if let Some(port) = self.lower_port {
            settings.lower_port = port;
        }
        if let Some(url) = &self.base_url {
            settings.base_url = url.clone();
        }
        if !self.success_patterns.is_empty() {
            settings.success_patterns = self.success_patterns.clone();
        }
        if let Some(seconds) = self.startup_timeout {
            settings.startup_timeout = Some(seconds);
        }
        settings
    }
}

pub async fn handle(args: DeployArgs, config: &DockhandConfig) -> anyhow::Result<()> {
    let settings = args.settings(&config.deploy);
    let source_port =
        utils::resolve_source_port(args.source_port, settings.source_port, &args.project)?;
    let options = DeployOptions {
        lower_port: settings.lower_port,
        base_url: settings.base_url.clone(),
        source_port,
        success_patterns: settings.success_patterns.clone(),
        max_containers: settings.max_containers,
        startup_timeout: settings.startup_timeout.map(Duration::from_secs),
        ..Default::default()
    };

    let runner: Arc<dyn ProcessRunner> = Arc::new(LocalProcessRunner);
    let manager = BranchDeploymentManager::new(options, runner.clone(), connect_or_cli(runner))?;
    let repo = RepoRef::parse(&args.repo).name;

    println!(
        "🚀 {} を起動中 ({} @ {})",
        args.image.cyan(),
        repo,
        args.branch
    );
    let deployment = match manager.deploy(&repo, &args.branch, &args.image).await {
        Ok(deployment) => deployment,
        Err(ContainerError::DeployFailed {
            container,
            stdout,
            stderr,
        }) => {
            eprintln!("{} コンテナ '{}' は起動完了前に終了しました", "✗".red(), container);
            utils::print_output(&dockhand_core::ProcessOutput {
                code: 1,
                stdout,
                stderr,
            });
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "{} {} → {}",
        "✓".green(),
        deployment.container_name,
        deployment.endpoint.green().bold()
    );
    println!("{}", "Ctrl-C で停止します".dimmed());

    tokio::signal::ctrl_c().await?;
    println!();
    if manager.stop(&repo, &args.branch).await? {
        println!("{} {} を停止しました", "✓".green(), deployment.container_name);
    }
    Ok(())
}
