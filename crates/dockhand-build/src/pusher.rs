//! イメージプッシュ処理
//!
//! プッシュするかどうかの判定と、レジストリごとのプッシュを行います。

use crate::auth::CredentialMaterializer;
use crate::error::{BuildError, Result};
use crate::resolver::{split_image_tag, validate_tag};
use dockhand_core::{
    BuildOptions, BuilderKind, CommandSpec, ImageReference, ProcessRunner, RunLog, RunMode,
};
use std::sync::Arc;

/// プロジェクト設定による上書き
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectOverrides {
    /// `docker.push.enabled`
    pub push_enabled: Option<bool>,
    /// `docker.tag.latest`
    pub tag_latest: Option<bool>,
}

/// プッシュするかどうかを決める
///
/// 1. 明示的な `push` 指定があればそれに従う
/// 2. 無ければ「使える認証情報がある」かつ「ローカル実行ではない」
/// 3. 明示指定が無い場合、プロジェクト設定 `docker.push.enabled` が 2 を置き換える
pub fn should_push(options: &BuildOptions, mode: RunMode, overrides: &ProjectOverrides) -> bool {
    if let Some(explicit) = options.push {
        return explicit;
    }
    let derived = options.has_usable_credentials() && mode != RunMode::Local;
    overrides.push_enabled.unwrap_or(derived)
}

/// レジストリへのプッシュを実行するハンドラ
pub struct PushGate {
    runner: Arc<dyn ProcessRunner>,
}

impl PushGate {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    /// イメージをレジストリにプッシュ
    ///
    /// docker ビルダーではレジストリ設定順に認証を済ませてからタグごとに
    /// `docker push` を実行し、最初の失敗で中断する。どのレジストリにも
    /// 属さないタグは最後にプッシュする。kaniko はビルド時にプッシュ済み。
    pub async fn push(
        &self,
        image: &ImageReference,
        options: &BuildOptions,
        materializer: &CredentialMaterializer,
        log: &dyn RunLog,
    ) -> Result<()> {
        if options.builder == BuilderKind::Kaniko {
            log.write(&format!(
                "Image {} was pushed by kaniko during the build",
                image.name
            ));
            return Ok(());
        }

        let mut pushed = vec![false; image.tags.len()];

        for registry in &options.registries {
            let owned: Vec<usize> = (0..image.tags.len())
                .filter(|&i| !pushed[i] && registry.owns(&image.tags[i]))
                .collect();
            if owned.is_empty() {
                continue;
            }

            materializer.ensure(registry, log).await?;
            for i in owned {
                self.push_tag(&image.tags[i], options, materializer, log)
                    .await?;
                pushed[i] = true;
            }
        }

        for (tag, _) in image
            .tags
            .iter()
            .zip(&pushed)
            .filter(|(_, done)| !**done)
        {
            self.push_tag(tag, options, materializer, log).await?;
        }

        Ok(())
    }

    async fn push_tag(
        &self,
        tag: &str,
        options: &BuildOptions,
        materializer: &CredentialMaterializer,
        log: &dyn RunLog,
    ) -> Result<()> {
        let (_, version) = split_image_tag(tag);
        validate_tag(&version)?;

        let env = materializer.env().await;
        let spec = CommandSpec::new(&options.docker_binary)
            .args(["push", tag])
            .envs(&env);

        tracing::info!("Pushing {}", tag);
        let output = self.runner.run(&spec, log).await?;
        if !output.success() {
            return Err(BuildError::PushFailed {
                image: tag.to_string(),
                output,
            });
        }
        Ok(())
    }
}
