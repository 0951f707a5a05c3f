mod common;

use common::{FakeLinks, TestProject};
use dockhand_build::{ProjectOverrides, ReleaseOrchestrator, ReleaseStage};
use dockhand_core::{
    BuildOptions, BuilderKind, FixedVersion, MemoryLog, RecordingRunner, RegistryTarget, RunMode,
};
use std::sync::Arc;

fn orchestrator(runner: &Arc<RecordingRunner>, links: &Arc<FakeLinks>) -> ReleaseOrchestrator {
    ReleaseOrchestrator::new(
        runner.clone(),
        Arc::new(FixedVersion("1.4.0".into())),
        links.clone(),
    )
}

fn pushing_options(project: &TestProject) -> BuildOptions {
    BuildOptions {
        registries: vec![RegistryTarget {
            display_url: Some("https://registry.acme.io/ui".into()),
            ..RegistryTarget::new("registry.acme.io").with_credentials("ci", "pw")
        }],
        tag_latest: true,
        credentials_root: Some(project.credentials_root()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_docker_release_builds_pushes_and_links() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new());
    let links = Arc::new(FakeLinks::succeeding());
    let log = MemoryLog::new();

    let report = orchestrator(&runner, &links)
        .run(
            &project.request("main"),
            &project.source(),
            &pushing_options(&project),
            &ProjectOverrides::default(),
            &log,
        )
        .await;

    assert!(report.is_success(), "{:?}", report.result);
    assert_eq!(report.stage, ReleaseStage::Done);
    assert!(report.pushed);

    let dockerfile = project.path().join("Dockerfile");
    assert_eq!(
        runner.commands(),
        vec![
            "docker login --username ci --password pw registry.acme.io".to_string(),
            "docker --version".to_string(),
            format!(
                "docker build -f {} -t registry.acme.io/web:1.4.0 -t registry.acme.io/web:latest {}",
                dockerfile.display(),
                project.path().display()
            ),
            "docker push registry.acme.io/web:1.4.0".to_string(),
            "docker push registry.acme.io/web:latest".to_string(),
        ]
    );

    let calls = links.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].image, "registry.acme.io/web:1.4.0");
    assert_eq!(calls[0].owner, "acme");
    assert_eq!(calls[0].workspace_id, "T100");

    let urls: Vec<&str> = report
        .result
        .external_urls
        .iter()
        .map(|l| l.url.as_str())
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://registry.acme.io/ui/web:1.4.0",
            "https://registry.acme.io/ui/web:latest"
        ]
    );
    assert!(!log.contains("--password"));
}

#[tokio::test]
async fn test_feature_branch_has_no_latest_tag() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new());
    let links = Arc::new(FakeLinks::succeeding());

    let report = orchestrator(&runner, &links)
        .run(
            &project.request("feature/login"),
            &project.source(),
            &pushing_options(&project),
            &ProjectOverrides::default(),
            &MemoryLog::new(),
        )
        .await;

    assert!(report.is_success());
    assert_eq!(
        report.image.unwrap().tags,
        vec!["registry.acme.io/web:1.4.0"]
    );
}

#[tokio::test]
async fn test_link_failure_fails_release() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new());
    let links = Arc::new(FakeLinks::failing());

    let report = orchestrator(&runner, &links)
        .run(
            &project.request("main"),
            &project.source(),
            &pushing_options(&project),
            &ProjectOverrides::default(),
            &MemoryLog::new(),
        )
        .await;

    assert_eq!(report.stage, ReleaseStage::Failed);
    assert_eq!(report.failed_at, Some(ReleaseStage::Publishing));
    assert_eq!(report.result.code, 1);
    assert_eq!(
        report.result.message.as_deref(),
        Some("イメージリンクの登録に失敗しました")
    );
    assert!(report.result.external_urls.is_empty());
    // プッシュ自体は済んでいる
    assert!(report.pushed);
}

#[tokio::test]
async fn test_build_failure_propagates_exit_code() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new().output("docker build", 17, "boom\n"));
    let links = Arc::new(FakeLinks::succeeding());

    let report = orchestrator(&runner, &links)
        .run(
            &project.request("main"),
            &project.source(),
            &pushing_options(&project),
            &ProjectOverrides::default(),
            &MemoryLog::new(),
        )
        .await;

    assert_eq!(report.failed_at, Some(ReleaseStage::Building));
    assert_eq!(report.result.code, 17);
    assert_eq!(report.output.unwrap().stdout, "boom\n");
    assert!(!runner.commands().iter().any(|c| c.starts_with("docker push")));
    assert!(links.calls().is_empty());
}

#[tokio::test]
async fn test_push_failure_stops_pipeline() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new().exit_with("docker push", 3));
    let links = Arc::new(FakeLinks::succeeding());

    let report = orchestrator(&runner, &links)
        .run(
            &project.request("main"),
            &project.source(),
            &pushing_options(&project),
            &ProjectOverrides::default(),
            &MemoryLog::new(),
        )
        .await;

    assert_eq!(report.failed_at, Some(ReleaseStage::Pushing));
    assert_eq!(report.result.code, 3);
    assert_eq!(
        runner
            .commands()
            .iter()
            .filter(|c| c.starts_with("docker push"))
            .count(),
        1
    );
    assert!(links.calls().is_empty());
}

#[tokio::test]
async fn test_local_mode_skips_push_but_links() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new());
    let links = Arc::new(FakeLinks::succeeding());
    let log = MemoryLog::new();

    let request = project.request("main").with_mode(RunMode::Local);
    let report = orchestrator(&runner, &links)
        .run(
            &request,
            &project.source(),
            &pushing_options(&project),
            &ProjectOverrides::default(),
            &log,
        )
        .await;

    assert!(report.is_success());
    assert!(!report.pushed);
    assert!(log.contains("Skipping push"));
    assert!(!runner.commands().iter().any(|c| c.starts_with("docker push")));
    assert_eq!(links.calls().len(), 1);
}

#[tokio::test]
async fn test_project_override_disables_push() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new());
    let links = Arc::new(FakeLinks::succeeding());

    let overrides = ProjectOverrides {
        push_enabled: Some(false),
        tag_latest: Some(false),
    };
    let report = orchestrator(&runner, &links)
        .run(
            &project.request("main"),
            &project.source(),
            &pushing_options(&project),
            &overrides,
            &MemoryLog::new(),
        )
        .await;

    assert!(report.is_success());
    assert!(!report.pushed);
    assert_eq!(
        report.image.unwrap().tags,
        vec!["registry.acme.io/web:1.4.0"]
    );
}

#[tokio::test]
async fn test_push_without_registry_fails_before_build() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new());
    let links = Arc::new(FakeLinks::succeeding());

    let options = BuildOptions {
        push: Some(true),
        credentials_root: Some(project.credentials_root()),
        ..Default::default()
    };
    let report = orchestrator(&runner, &links)
        .run(
            &project.request("main"),
            &project.source(),
            &options,
            &ProjectOverrides::default(),
            &MemoryLog::new(),
        )
        .await;

    assert_eq!(report.failed_at, Some(ReleaseStage::Resolving));
    assert_eq!(report.result.code, 1);
    assert!(runner.commands().is_empty());
}

#[tokio::test]
async fn test_missing_credentials_fail_validation() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new());
    let links = Arc::new(FakeLinks::succeeding());

    let options = BuildOptions {
        push: Some(true),
        registries: vec![RegistryTarget::new("registry.acme.io")],
        credentials_root: Some(project.credentials_root()),
        ..Default::default()
    };
    let report = orchestrator(&runner, &links)
        .run(
            &project.request("main"),
            &project.source(),
            &options,
            &ProjectOverrides::default(),
            &MemoryLog::new(),
        )
        .await;

    assert_eq!(report.failed_at, Some(ReleaseStage::Resolving));
    assert!(
        report
            .result
            .message
            .unwrap()
            .contains("registry.acme.io")
    );
}

#[tokio::test]
async fn test_kaniko_release_pushes_during_build() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new());
    let links = Arc::new(FakeLinks::succeeding());

    let options = BuildOptions {
        builder: BuilderKind::Kaniko,
        ..pushing_options(&project)
    };
    let report = orchestrator(&runner, &links)
        .run(
            &project.request("main"),
            &project.source(),
            &options,
            &ProjectOverrides::default(),
            &MemoryLog::new(),
        )
        .await;

    assert!(report.is_success(), "{:?}", report.result);
    let commands = runner.commands();
    assert_eq!(commands[0], "/kaniko/executor version");
    assert!(commands[1].starts_with("/kaniko/executor --dockerfile="));
    assert!(commands[1].contains("-d=registry.acme.io/web:1.4.0"));
    assert!(commands[1].contains("-d=registry.acme.io/web:latest"));
    assert!(commands[1].contains("--cache-repo=registry.acme.io/web-cache"));
    assert_eq!(commands.len(), 2);

    // kaniko には DOCKER_CONFIG で実行ごとの認証ファイルを渡す
    let spec = &runner.specs()[1];
    let docker_config = spec.env.get("DOCKER_CONFIG").unwrap();
    assert!(docker_config.contains("test-run"));
}

#[tokio::test]
async fn test_builder_unavailable_stops_before_build() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new().spawn_error("docker --version"));
    let links = Arc::new(FakeLinks::succeeding());

    let report = orchestrator(&runner, &links)
        .run(
            &project.request("main"),
            &project.source(),
            &pushing_options(&project),
            &ProjectOverrides::default(),
            &MemoryLog::new(),
        )
        .await;

    assert_eq!(report.failed_at, Some(ReleaseStage::Building));
    assert!(!runner.commands().iter().any(|c| c.starts_with("docker build")));
}

#[tokio::test]
async fn test_credentials_removed_after_run() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new());
    let links = Arc::new(FakeLinks::succeeding());

    // 認証情報の無いレジストリにはインライン設定を使う
    let options = BuildOptions {
        registries: vec![RegistryTarget::new("registry.acme.io")],
        auth_config: Some(r#"{"auths":{"registry.acme.io":{"auth":"Y2k6cHc="}}}"#.into()),
        ..pushing_options(&project)
    };
    let report = orchestrator(&runner, &links)
        .run(
            &project.request("main"),
            &project.source(),
            &options,
            &ProjectOverrides::default(),
            &MemoryLog::new(),
        )
        .await;

    assert!(report.is_success(), "{:?}", report.result);
    assert!(!runner.commands().iter().any(|c| c.starts_with("docker login")));
    let build = runner
        .specs()
        .into_iter()
        .find(|spec| spec.args.first().map(String::as_str) == Some("build"))
        .unwrap();
    assert!(build.env.get("DOCKER_CONFIG").unwrap().contains("test-run"));
    assert!(!project.credentials_root().join("test-run").exists());
}

#[tokio::test]
async fn test_same_inputs_produce_same_tags() {
    let project = TestProject::new();
    let links = Arc::new(FakeLinks::succeeding());
    let options = pushing_options(&project);

    let mut tag_sets = Vec::new();
    for _ in 0..2 {
        let runner = Arc::new(RecordingRunner::new());
        let report = orchestrator(&runner, &links)
            .run(
                &project.request("main"),
                &project.source(),
                &options,
                &ProjectOverrides::default(),
                &MemoryLog::new(),
            )
            .await;
        assert!(report.is_success(), "{:?}", report.result);
        tag_sets.push(report.image.unwrap().tags);
    }

    assert_eq!(
        tag_sets[0],
        vec!["registry.acme.io/web:1.4.0", "registry.acme.io/web:latest"]
    );
    assert_eq!(tag_sets[0], tag_sets[1]);
}
