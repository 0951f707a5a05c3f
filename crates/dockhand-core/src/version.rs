//! リリースバージョンの決定

use crate::error::{CoreError, Result};
use crate::model::RepoRef;
use async_trait::async_trait;

/// コミットからリリースバージョン文字列を決める
#[async_trait]
pub trait VersionResolver: Send + Sync {
    async fn resolve(&self, repo: &RepoRef, sha: &str, branch: &str) -> Result<String>;
}

/// 常に同じバージョンを返す
#[derive(Debug, Clone)]
pub struct FixedVersion(pub String);

#[async_trait]
impl VersionResolver for FixedVersion {
    async fn resolve(&self, _repo: &RepoRef, _sha: &str, _branch: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// コミットSHAの先頭7文字
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitVersion;

#[async_trait]
impl VersionResolver for CommitVersion {
    async fn resolve(&self, repo: &RepoRef, sha: &str, _branch: &str) -> Result<String> {
        let short: String = sha.trim().chars().take(7).collect();
        if short.is_empty() {
            return Err(CoreError::InvalidConfig(format!(
                "{} のコミットSHAが空のためバージョンを決定できません",
                repo
            )));
        }
        Ok(short)
    }
}
