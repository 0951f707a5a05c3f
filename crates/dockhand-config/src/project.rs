//! プロジェクト単位の設定（`<project>/.dockhand/config.json`）

use crate::error::{ConfigError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// プロジェクト設定ファイルの相対パス
pub const PROJECT_SETTINGS_PATH: &str = ".dockhand/config.json";

/// プロジェクト単位の設定値
///
/// キーはドット区切り（`docker.push.enabled`）で、ネストした JSON と
/// フラットなキーの両方を受け付ける。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectSettings {
    root: Value,
}

impl ProjectSettings {
    /// プロジェクトルートから読み込む。ファイルが無ければ空
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(PROJECT_SETTINGS_PATH);
        if !path.exists() {
            tracing::debug!("No project settings at {}", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        Self::from_json_str(&text, path)
    }

    pub fn from_json_str(text: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let root = serde_json::from_str(text).map_err(|source| ConfigError::Json {
            path: path.into(),
            source,
        })?;
        Ok(Self { root })
    }

    /// ドット区切りのキーで値を引く
    pub fn value(&self, key: &str) -> Option<&Value> {
        if let Some(flat) = self.root.get(key) {
            return Some(flat);
        }
        key.split('.')
            .try_fold(&self.root, |node, part| node.get(part))
    }

    pub fn bool_value(&self, key: &str) -> Option<bool> {
        self.value(key).and_then(Value::as_bool)
    }

    /// `docker.push.enabled`
    pub fn push_enabled(&self) -> Option<bool> {
        self.bool_value("docker.push.enabled")
    }

    /// `docker.tag.latest`
    pub fn tag_latest(&self) -> Option<bool> {
        self.bool_value("docker.tag.latest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_nested_and_flat_keys() {
        let nested =
            ProjectSettings::from_json_str(r#"{"docker":{"push":{"enabled":false}}}"#, "a.json")
                .unwrap();
        assert_eq!(nested.push_enabled(), Some(false));
        assert_eq!(nested.tag_latest(), None);

        let flat =
            ProjectSettings::from_json_str(r#"{"docker.tag.latest": true}"#, "b.json").unwrap();
        assert_eq!(flat.tag_latest(), Some(true));
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempdir().unwrap();
        let settings = ProjectSettings::load(dir.path()).unwrap();
        assert_eq!(settings.push_enabled(), None);
    }

    #[test]
    fn test_load_from_project() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".dockhand")).unwrap();
        std::fs::write(
            dir.path().join(PROJECT_SETTINGS_PATH),
            r#"{"docker":{"push":{"enabled":true}}}"#,
        )
        .unwrap();

        let settings = ProjectSettings::load(dir.path()).unwrap();
        assert_eq!(settings.push_enabled(), Some(true));
    }

    #[test]
    fn test_non_bool_is_ignored() {
        let settings =
            ProjectSettings::from_json_str(r#"{"docker":{"push":{"enabled":"yes"}}}"#, "c.json")
                .unwrap();
        assert_eq!(settings.push_enabled(), None);
    }
}
