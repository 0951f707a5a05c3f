//! ビルド＆リリースのパイプライン
//!
//! resolve → authenticate → build → push → publish の順に進み、
//! どの段階の失敗もそこで終了する。結果は常に成功か失敗のどちらかの
//! [`BuildResult`] として返す。

use crate::auth::CredentialMaterializer;
use crate::builder::{BuildContext, BuilderStrategy};
use crate::context::ContextResolver;
use crate::error::{BuildError, Result};
use crate::pusher::{ProjectOverrides, PushGate, should_push};
use crate::resolver::{ImageNameResolver, split_image_tag};
use dockhand_core::{
    BuildOptions, BuildRequest, BuildResult, ExternalLink, ImageLink, ImageReference,
    LinkPublisher, ProcessOutput, ProcessRunner, ProjectSource, RegistryTarget, RunLog,
    VersionResolver,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStage {
    Resolving,
    Authenticating,
    Building,
    Pushing,
    Publishing,
    Done,
    Failed,
}

impl fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReleaseStage::Resolving => "resolving",
            ReleaseStage::Authenticating => "authenticating",
            ReleaseStage::Building => "building",
            ReleaseStage::Pushing => "pushing",
            ReleaseStage::Publishing => "publishing",
            ReleaseStage::Done => "done",
            ReleaseStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// パイプライン1回分の結果
#[derive(Debug, Clone)]
pub struct ReleaseReport {
    /// 最終状態（`Done` または `Failed`）
    pub stage: ReleaseStage,
    /// 失敗した段階
    pub failed_at: Option<ReleaseStage>,
    pub image: Option<ImageReference>,
    pub pushed: bool,
    pub result: BuildResult,
    /// 失敗したサブプロセスの出力
    pub output: Option<ProcessOutput>,
}

impl ReleaseReport {
    pub fn is_success(&self) -> bool {
        self.stage == ReleaseStage::Done
    }
}

#[derive(Default)]
struct Attempt {
    stage: Option<ReleaseStage>,
    image: Option<ImageReference>,
    pushed: bool,
}

impl Attempt {
    fn enter(&mut self, stage: ReleaseStage) {
        tracing::debug!("Release stage: {}", stage);
        self.stage = Some(stage);
    }
}

pub struct ReleaseOrchestrator {
    runner: Arc<dyn ProcessRunner>,
    versions: Arc<dyn VersionResolver>,
    links: Arc<dyn LinkPublisher>,
}

impl ReleaseOrchestrator {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        versions: Arc<dyn VersionResolver>,
        links: Arc<dyn LinkPublisher>,
    ) -> Self {
        Self {
            runner,
            versions,
            links,
        }
    }

    /// パイプラインを実行
    pub async fn run(
        &self,
        request: &BuildRequest,
        project: &dyn ProjectSource,
        options: &BuildOptions,
        overrides: &ProjectOverrides,
        log: &dyn RunLog,
    ) -> ReleaseReport {
        let materializer =
            CredentialMaterializer::new(self.runner.clone(), options, &request.run_id);
        let mut attempt = Attempt::default();

        let outcome = self
            .execute(request, project, options, overrides, &materializer, &mut attempt, log)
            .await;
        materializer.cleanup().await;

        match outcome {
            Ok(links) => {
                tracing::info!("Release of {} completed", request.repo);
                ReleaseReport {
                    stage: ReleaseStage::Done,
                    failed_at: None,
                    image: attempt.image,
                    pushed: attempt.pushed,
                    result: BuildResult::success(links),
                    output: None,
                }
            }
            Err(err) => {
                let failed_at = attempt.stage.unwrap_or(ReleaseStage::Resolving);
                tracing::error!("Release of {} failed while {}: {}", request.repo, failed_at, err);
                log.write(&err.to_string());
                ReleaseReport {
                    stage: ReleaseStage::Failed,
                    failed_at: Some(failed_at),
                    image: attempt.image,
                    pushed: attempt.pushed,
                    result: BuildResult::failure(err.exit_code(), err.user_message()),
                    output: err.output().cloned(),
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        request: &BuildRequest,
        project: &dyn ProjectSource,
        options: &BuildOptions,
        overrides: &ProjectOverrides,
        materializer: &CredentialMaterializer,
        attempt: &mut Attempt,
        log: &dyn RunLog,
    ) -> Result<Vec<ExternalLink>> {
        attempt.enter(ReleaseStage::Resolving);
        let push = should_push(options, request.mode, overrides);
        options.validate(push)?;

        let inputs = ContextResolver::resolve(project, &options.dockerfile, options.context.as_deref())?;
        let version = self
            .versions
            .resolve(&request.repo, &request.sha, &request.branch)
            .await?;

        let mut effective = options.clone();
        if let Some(latest) = overrides.tag_latest {
            effective.tag_latest = latest;
        }
        let image = ImageNameResolver::resolve(project.name(), request, &version, &effective, push)?;
        log.write(&format!("Resolved image tags: {}", image.tags.join(", ")));
        attempt.image = Some(image.clone());

        attempt.enter(ReleaseStage::Authenticating);
        materializer
            .authenticate_all(&options.registries, log)
            .await?;

        attempt.enter(ReleaseStage::Building);
        let strategy = BuilderStrategy::from_options(options, self.runner.clone());
        strategy.preflight(log).await?;
        let env = materializer.env().await;
        strategy
            .execute(&BuildContext {
                image: &image,
                dockerfile: &inputs.dockerfile,
                context: &inputs.context,
                push,
                env: &env,
                log,
            })
            .await?;

        attempt.enter(ReleaseStage::Pushing);
        if push {
            PushGate::new(self.runner.clone())
                .push(&image, options, materializer, log)
                .await?;
            attempt.pushed = true;
        } else {
            log.write("Skipping push");
        }

        attempt.enter(ReleaseStage::Publishing);
        let first = image.first().unwrap_or(image.name.as_str());
        let link = ImageLink {
            owner: request.repo.owner.clone(),
            repo: request.repo.name.clone(),
            sha: request.sha.clone(),
            image: first.to_string(),
            workspace_id: request.workspace_id.clone(),
        };
        if !self.links.publish(&link).await {
            log.write("Image link failed");
            return Err(BuildError::LinkPublishFailed);
        }

        attempt.enter(ReleaseStage::Done);
        Ok(external_urls(&image, &options.registries))
    }
}

/// 表示URLまたはブラウズパスを持つレジストリのタグから外部リンクを作る
///
/// プッシュURLの部分を表示URLに置き換え、ブラウズパスがあれば `:tag` の
/// 代わりにそれを付ける（`{tag}` はタグに置換）。URLが同じものは1つにまとめる。
pub fn external_urls(image: &ImageReference, registries: &[RegistryTarget]) -> Vec<ExternalLink> {
    let mut links: Vec<ExternalLink> = Vec::new();

    for tag in &image.tags {
        let Some(registry) = registries
            .iter()
            .find(|r| r.owns(tag))
            .filter(|r| r.has_display())
        else {
            continue;
        };

        let rest = &tag[registry.push_url().len()..];
        let base = registry
            .display_url
            .as_deref()
            .unwrap_or(registry.push_url())
            .trim_end_matches('/');
        let url = match &registry.browse_path {
            Some(template) => {
                let (repository, version) = split_image_tag(rest);
                format!("{}{}{}", base, repository, template.replace("{tag}", &version))
            }
            None => format!("{}{}", base, rest),
        };

        if !links.iter().any(|l| l.url == url) {
            links.push(ExternalLink {
                label: registry.label.clone(),
                url,
            });
        }
    }

    links
}
