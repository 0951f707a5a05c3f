//! ビルドリクエスト定義

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// リポジトリの識別情報
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// "owner/name" 形式をパース
    ///
    /// owner が省略された場合は name を owner としても使う
    pub fn parse(slug: &str) -> Self {
        match slug.split_once('/') {
            Some((owner, name)) => Self::new(owner, name),
            None => Self::new(slug, slug),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// 実行モード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// 通常のパイプライン実行
    #[default]
    Pipeline,
    /// ローカル・一時的な実行（プッシュしない）
    Local,
}

/// 1回のパイプライン実行を一意に識別するID
///
/// 認証ファイルの配置先をこのIDでスコープし、同一環境で並行する
/// 実行同士が互いの認証情報を上書きしないようにする。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

impl RunId {
    /// タイムスタンプ・PID・プロセス内カウンタから新しいIDを生成
    pub fn generate() -> Self {
        let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
        Self(format!("{}-{}-{}", stamp, std::process::id(), seq))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ビルド＆リリースの1回分の入力
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub repo: RepoRef,
    pub sha: String,
    pub branch: String,
    /// リポジトリのデフォルトブランチ
    pub default_branch: String,
    /// プロジェクトのルートディレクトリ
    pub project_root: PathBuf,
    pub workspace_id: String,
    pub run_id: RunId,
    pub mode: RunMode,
}

impl BuildRequest {
    pub fn new(
        repo: RepoRef,
        sha: impl Into<String>,
        branch: impl Into<String>,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo,
            sha: sha.into(),
            branch: branch.into(),
            default_branch: "main".to_string(),
            project_root: project_root.into(),
            workspace_id: String::new(),
            run_id: RunId::generate(),
            mode: RunMode::Pipeline,
        }
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    pub fn with_workspace_id(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = workspace_id.into();
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_default_branch(&self) -> bool {
        self.branch == self.default_branch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_ref_parse() {
        let repo = RepoRef::parse("acme/web-app");
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "web-app");
        assert_eq!(repo.to_string(), "acme/web-app");

        let bare = RepoRef::parse("tool");
        assert_eq!(bare.owner, "tool");
        assert_eq!(bare.name, "tool");
    }

    #[test]
    fn test_run_id_unique() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_is_default_branch() {
        let request = BuildRequest::new(RepoRef::parse("acme/app"), "abc", "main", "/tmp");
        assert!(request.is_default_branch());

        let feature = request.clone().with_default_branch("master");
        assert!(!feature.is_default_branch());
    }
}
