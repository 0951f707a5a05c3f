use crate::utils;
use clap::Args;
use colored::Colorize;
use dockhand_build::{ConsoleLog, ProjectOverrides, ReleaseOrchestrator, WebhookLinkPublisher};
use dockhand_config::{DockhandConfig, ProjectSettings};
use dockhand_core::{
    BuildOptions, BuildOptionsOverlay, BuildRequest, BuilderKind, CommitVersion,
    DockerfileLocator, FixedVersion, LinkPublisher, LocalProcessRunner, LocalProject,
    RegistryTarget, RepoRef, RunMode, SkipLinkPublisher, VersionResolver,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// プロジェクトのディレクトリ
    #[arg(short = 'C', long, env = "DOCKHAND_PROJECT_DIR", default_value = ".")]
    pub project: PathBuf,
    /// リポジトリ (owner/name)
    #[arg(long, env = "DOCKHAND_REPO")]
    pub repo: String,
    /// コミットSHA
    #[arg(long, env = "DOCKHAND_SHA")]
    pub sha: String,
    /// ビルドするブランチ
    #[arg(long, env = "DOCKHAND_BRANCH")]
    pub branch: String,
    /// デフォルトブランチ（latest タグの判定に使う）
    #[arg(long, env = "DOCKHAND_DEFAULT_BRANCH", default_value = "main")]
    pub default_branch: String,
    /// イメージリンクに付けるワークスペースID
    #[arg(long, env = "DOCKHAND_WORKSPACE_ID", default_value = "")]
    pub workspace_id: String,
    /// ビルダー (docker, kaniko)
    #[arg(long, env = "DOCKHAND_BUILDER")]
    pub builder: Option<BuilderKind>,
    /// ビルダーに渡す追加引数（複数指定可）
    #[arg(long = "builder-arg", allow_hyphen_values = true)]
    pub builder_args: Vec<String>,
    /// Dockerfile のパス（`discover` でプロジェクト内を探す）
    #[arg(long, env = "DOCKHAND_DOCKERFILE")]
    pub dockerfile: Option<String>,
    /// ビルドコンテキスト（プロジェクトからの相対パス）
    #[arg(long, env = "DOCKHAND_CONTEXT")]
    pub context: Option<PathBuf>,
    /// プッシュする
    #[arg(long, conflicts_with = "no_push")]
    pub push: bool,
    /// プッシュしない
    #[arg(long)]
    pub no_push: bool,
    /// プッシュ先レジストリ（カンマ区切りで複数指定可）
    #[arg(long = "registry", env = "DOCKHAND_REGISTRY", value_delimiter = ',')]
    pub registries: Vec<String>,
    #[arg(long, env = "DOCKHAND_REGISTRY_USERNAME")]
    pub registry_username: Option<String>,
    #[arg(long, env = "DOCKHAND_REGISTRY_PASSWORD", hide_env_values = true)]
    pub registry_password: Option<String>,
    /// docker config.json の内容
    #[arg(long, env = "DOCKHAND_AUTH_CONFIG", hide_env_values = true)]
    pub auth_config: Option<String>,
    /// バージョンタグ（省略時はコミットSHAの先頭7文字）
    #[arg(long = "tag", env = "DOCKHAND_VERSION")]
    pub version: Option<String>,
    /// デフォルトブランチでは latest タグも付ける
    #[arg(long)]
    pub tag_latest: bool,
    /// ローカル実行（プッシュしない）
    #[arg(long)]
    pub local: bool,
}

impl BuildArgs {
    /// コマンドラインで明示された値だけの overlay
    pub fn overlay(&self) -> BuildOptionsOverlay {
        let push = match (self.push, self.no_push) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        let registries = (!self.registries.is_empty()).then(|| {
            self.registries
                .iter()
                .map(|url| {
                    let target = RegistryTarget::new(url.trim());
                    match (&self.registry_username, &self.registry_password) {
                        (Some(user), Some(password)) => target.with_credentials(user, password),
                        _ => target,
                    }
                })
                .collect()
        });

        BuildOptionsOverlay {
            builder: self.builder,
            builder_args: (!self.builder_args.is_empty()).then(|| self.builder_args.clone()),
            dockerfile: self.dockerfile.clone().map(DockerfileLocator::from),
            context: self.context.clone(),
            push,
            registries,
            auth_config: self.auth_config.clone(),
            tag_latest: self.tag_latest.then_some(true),
            ..Default::default()
        }
    }
}

/// ビルドを実行し、終了コードを返す
pub async fn handle(args: BuildArgs, config: &DockhandConfig) -> anyhow::Result<i32> {
    let root = args.project.canonicalize().map_err(|e| {
        anyhow::anyhow!("プロジェクトが見つかりません: {}: {}", args.project.display(), e)
    })?;

    let options = BuildOptions::merged(&args.overlay(), &config.build_overlay());
    let settings = ProjectSettings::load(&root)?;
    let overrides = ProjectOverrides {
        push_enabled: settings.push_enabled(),
        tag_latest: settings.tag_latest(),
    };

    let repo = RepoRef::parse(&args.repo);
    let mode = if args.local {
        RunMode::Local
    } else {
        RunMode::Pipeline
    };
    let request = BuildRequest::new(repo, &args.sha, &args.branch, &root)
        .with_default_branch(&args.default_branch)
        .with_workspace_id(&args.workspace_id)
        .with_mode(mode);
    let project = LocalProject::new(&root).with_name(&request.repo.name);

    let versions: Arc<dyn VersionResolver> = match &args.version {
        Some(version) => Arc::new(FixedVersion(version.clone())),
        None => Arc::new(CommitVersion),
    };
    let links: Arc<dyn LinkPublisher> = match &config.link.webhook_url {
        Some(url) => Arc::new(WebhookLinkPublisher::new(url)),
        None => Arc::new(SkipLinkPublisher),
    };

    println!(
        "🔨 {} ({} @ {})",
        request.repo.to_string().cyan(),
        request.branch,
        request.sha
    );

    let log = ConsoleLog::new(&request.repo.name);
    let orchestrator = ReleaseOrchestrator::new(Arc::new(LocalProcessRunner), versions, links);
    let report = orchestrator
        .run(&request, &project, &options, &overrides, &log)
        .await;

    if report.is_success() {
        log.finish_success();
        if let Some(image) = &report.image {
            for tag in &image.tags {
                println!("  • {}", tag.green());
            }
        }
        for link in &report.result.external_urls {
            match &link.label {
                Some(label) => println!("  🔗 {}: {}", label, link.url),
                None => println!("  🔗 {}", link.url),
            }
        }
        return Ok(0);
    }

    let message = report.result.message.clone().unwrap_or_default();
    log.finish_error(&message);
    eprintln!();
    eprintln!("{} {}", "✗".red(), message.red());
    if let Some(output) = &report.output {
        utils::print_output(output);
    }
    Ok(report.result.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: BuildArgs,
    }

    fn parse(extra: &[&str]) -> BuildArgs {
        let mut argv = vec!["dockhand", "--repo", "acme/web", "--sha", "abc", "--branch", "main"];
        argv.extend_from_slice(extra);
        temp_env::with_vars_unset(
            ["DOCKHAND_REGISTRY", "DOCKHAND_BUILDER", "DOCKHAND_AUTH_CONFIG"],
            || Wrapper::parse_from(argv).args,
        )
    }

    #[test]
    fn test_overlay_only_holds_explicit_values() {
        let overlay = parse(&[]).overlay();
        assert_eq!(overlay, BuildOptionsOverlay::default());
    }

    #[test]
    fn test_overlay_from_flags() {
        let overlay = parse(&[
            "--builder",
            "kaniko",
            "--builder-arg",
            "--cleanup",
            "--registry",
            "ghcr.io/acme,registry.acme.io",
            "--registry-username",
            "ci",
            "--registry-password",
            "pw",
            "--no-push",
            "--dockerfile",
            "discover",
        ])
        .overlay();

        assert_eq!(overlay.builder, Some(BuilderKind::Kaniko));
        assert_eq!(overlay.builder_args, Some(vec!["--cleanup".to_string()]));
        assert_eq!(overlay.push, Some(false));
        assert_eq!(overlay.dockerfile, Some(DockerfileLocator::Discover));
        let registries = overlay.registries.unwrap();
        assert_eq!(registries.len(), 2);
        assert_eq!(registries[1].credentials(), Some(("ci", "pw")));
    }
}
