//! イメージビルダー
//!
//! docker デーモンを使うネイティブビルドと、デーモン不要の kaniko
//! ビルドを閉じた enum で切り替えます。

use crate::error::{BuildError, Result};
use crate::resolver::split_image_tag;
use dockhand_core::{
    BuildOptions, BuilderKind, CommandSpec, DEFAULT_KANIKO_ARGS, ImageReference, ProcessRunner,
    RunLog,
};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// ビルド1回分の入力
pub struct BuildContext<'a> {
    pub image: &'a ImageReference,
    pub dockerfile: &'a Path,
    pub context: &'a Path,
    pub push: bool,
    /// 認証情報の準備で決まったサブプロセス環境
    pub env: &'a BTreeMap<String, String>,
    pub log: &'a dyn RunLog,
}

pub enum BuilderStrategy {
    Native(NativeBuild),
    Isolated(IsolatedBuild),
}

/// `docker build`
pub struct NativeBuild {
    runner: Arc<dyn ProcessRunner>,
    binary: String,
    extra_args: Vec<String>,
}

/// kaniko executor
pub struct IsolatedBuild {
    runner: Arc<dyn ProcessRunner>,
    binary: String,
    builder_args: Vec<String>,
    cache_root: Option<PathBuf>,
}

impl BuilderStrategy {
    pub fn from_options(options: &BuildOptions, runner: Arc<dyn ProcessRunner>) -> Self {
        match options.builder {
            BuilderKind::Docker => BuilderStrategy::Native(NativeBuild {
                runner,
                binary: options.docker_binary.clone(),
                extra_args: options.builder_args.clone(),
            }),
            BuilderKind::Kaniko => BuilderStrategy::Isolated(IsolatedBuild {
                runner,
                binary: options.kaniko_binary.clone(),
                builder_args: options.builder_args.clone(),
                cache_root: options.cache.root(),
            }),
        }
    }

    /// ビルダーが実行できるか事前に確認
    pub async fn preflight(&self, log: &dyn RunLog) -> Result<()> {
        let (runner, spec) = match self {
            BuilderStrategy::Native(native) => (
                &native.runner,
                CommandSpec::new(&native.binary).arg("--version"),
            ),
            BuilderStrategy::Isolated(isolated) => (
                &isolated.runner,
                CommandSpec::new(&isolated.binary).arg("version"),
            ),
        };

        let unavailable = |message: String| BuildError::BuilderUnavailable {
            builder: spec.program.clone(),
            message,
        };

        let output = runner
            .run(&spec, log)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !output.success() {
            return Err(unavailable(format!(
                "'{}' exited with code {}",
                spec.display(),
                output.code
            )));
        }

        tracing::debug!("Builder available: {}", output.stdout.trim());
        Ok(())
    }

    /// ビルドを実行
    pub async fn execute(&self, ctx: &BuildContext<'_>) -> Result<()> {
        match self {
            BuilderStrategy::Native(native) => native.execute(ctx).await,
            BuilderStrategy::Isolated(isolated) => isolated.execute(ctx).await,
        }
    }
}

impl NativeBuild {
    /// `docker build -f <dockerfile> -t <tag>... <extra args>... <context>`
    pub fn command(&self, ctx: &BuildContext<'_>) -> CommandSpec {
        let mut args = vec![
            "build".to_string(),
            "-f".to_string(),
            ctx.dockerfile.display().to_string(),
        ];
        for tag in &ctx.image.tags {
            args.push("-t".to_string());
            args.push(tag.clone());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(ctx.context.display().to_string());

        CommandSpec::new(&self.binary)
            .args(args)
            .cwd(ctx.context)
            .envs(ctx.env)
    }

    async fn execute(&self, ctx: &BuildContext<'_>) -> Result<()> {
        tracing::info!("Building image: {}", ctx.image.name);
        let output = self.runner.run(&self.command(ctx), ctx.log).await?;
        if !output.success() {
            return Err(BuildError::BuildFailed { output });
        }
        tracing::info!("Successfully built: {}", ctx.image.name);
        Ok(())
    }
}

impl IsolatedBuild {
    /// kaniko 固有の引数（`--dockerfile`/`--context` を除く）
    ///
    /// キャッシュルートが存在する場合だけ `base-image-cache` サブディレクトリを作成する。
    pub async fn options(&self, image: &ImageReference, push: bool) -> Result<Vec<String>> {
        kaniko_options(image, push, &self.builder_args, self.cache_root.as_deref()).await
    }

    pub async fn command(&self, ctx: &BuildContext<'_>) -> Result<CommandSpec> {
        let mut args = vec![
            format!("--dockerfile={}", ctx.dockerfile.display()),
            format!("--context=dir://{}", ctx.context.display()),
        ];
        args.extend(self.options(ctx.image, ctx.push).await?);

        Ok(CommandSpec::new(&self.binary)
            .args(dedup(args))
            .cwd(ctx.context)
            .envs(ctx.env))
    }

    async fn execute(&self, ctx: &BuildContext<'_>) -> Result<()> {
        tracing::info!("Building image with kaniko: {}", ctx.image.name);
        let spec = self.command(ctx).await?;
        let output = self.runner.run(&spec, ctx.log).await?;
        if !output.success() {
            return Err(BuildError::BuildFailed { output });
        }
        tracing::info!("Successfully built: {}", ctx.image.name);
        Ok(())
    }
}

/// kaniko の引数を組み立てる
///
/// - ビルダー引数: 指定が無ければ `--snapshotMode=time --reproducible`
/// - プッシュ時: タグごとの `-d=`、`--cache=true`、`--cache-repo=<最初のタグのリポジトリ>-cache`
/// - プッシュしない場合: `--no-push`
/// - キャッシュルートが存在する場合: `--cache=true --cache-dir=<root>/base-image-cache`
pub async fn kaniko_options(
    image: &ImageReference,
    push: bool,
    builder_args: &[String],
    cache_root: Option<&Path>,
) -> Result<Vec<String>> {
    let mut args: Vec<String> = if builder_args.is_empty() {
        DEFAULT_KANIKO_ARGS.iter().map(|s| s.to_string()).collect()
    } else {
        builder_args.to_vec()
    };

    if push {
        args.extend(image.tags.iter().map(|tag| format!("-d={}", tag)));
        if let Some(first) = image.first() {
            let (repository, _) = split_image_tag(first);
            args.push("--cache=true".to_string());
            args.push(format!("--cache-repo={}-cache", repository));
        }
    } else {
        args.push("--no-push".to_string());
    }

    if let Some(root) = cache_root {
        if tokio::fs::metadata(root).await.is_ok_and(|m| m.is_dir()) {
            let cache_dir = root.join("base-image-cache");
            tokio::fs::create_dir_all(&cache_dir).await?;
            args.push("--cache=true".to_string());
            args.push(format!("--cache-dir={}", cache_dir.display()));
        } else {
            tracing::debug!(
                "Cache root {} does not exist, building without base image cache",
                root.display()
            );
        }
    }

    Ok(dedup(args))
}

/// 最初の出現を残して重複を除く
fn dedup(args: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    args.into_iter()
        .filter(|arg| seen.insert(arg.clone()))
        .collect()
}
