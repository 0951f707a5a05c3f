use async_trait::async_trait;
use dockhand_core::{
    BuildRequest, ImageLink, LinkPublisher, LocalProject, RepoRef, RunId,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    /// ルートに Dockerfile を持つプロジェクト
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::write(
            root.path().join("Dockerfile"),
            "FROM node:20\nEXPOSE 8080\nCMD [\"npm\", \"start\"]\n",
        )
        .unwrap();
        Self { root }
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn source(&self) -> LocalProject {
        LocalProject::new(self.path()).with_name("web")
    }

    pub fn request(&self, branch: &str) -> BuildRequest {
        BuildRequest::new(RepoRef::parse("acme/web"), "0123456789abcdef", branch, self.path())
            .with_workspace_id("T100")
            .with_run_id(RunId::new("test-run"))
    }

    /// 認証ファイルの置き場所
    pub fn credentials_root(&self) -> PathBuf {
        self.root.path().join(".credentials")
    }
}

/// 呼び出しを記録し、決められた結果を返す LinkPublisher
pub struct FakeLinks {
    succeed: bool,
    calls: Mutex<Vec<ImageLink>>,
}

impl FakeLinks {
    pub fn succeeding() -> Self {
        Self {
            succeed: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn failing() -> Self {
        Self {
            succeed: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ImageLink> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkPublisher for FakeLinks {
    async fn publish(&self, link: &ImageLink) -> bool {
        self.calls.lock().unwrap().push(link.clone());
        self.succeed
    }
}
