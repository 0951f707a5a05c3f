//! イメージリンクの登録

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// コミットとイメージの対応
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLink {
    pub owner: String,
    pub repo: String,
    pub sha: String,
    /// 代表イメージ（最初のタグ）
    pub image: String,
    pub workspace_id: String,
}

/// イメージリンクを外部に登録する
///
/// 失敗は `false` で返す。呼び出し側はパイプライン失敗として扱う。
#[async_trait]
pub trait LinkPublisher: Send + Sync {
    async fn publish(&self, link: &ImageLink) -> bool;
}

/// 登録先がない場合の publisher
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipLinkPublisher;

#[async_trait]
impl LinkPublisher for SkipLinkPublisher {
    async fn publish(&self, link: &ImageLink) -> bool {
        tracing::info!(
            "No link endpoint configured, skipping link for {}",
            link.image
        );
        true
    }
}
