//! プロジェクトのファイルアクセス

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// ファイル列挙で無視するディレクトリ
const IGNORED_DIRS: [&str; 3] = [".git", "node_modules", "target"];

/// ビルド対象プロジェクトへのアクセス
#[async_trait]
pub trait ProjectSource: Send + Sync {
    /// プロジェクト名（イメージ名の元になる）
    fn name(&self) -> &str;

    /// プロジェクトのルートディレクトリ
    fn base_dir(&self) -> &Path;

    /// glob パターンに一致するファイルをルートからの相対パスで返す
    fn list_files(&self, pattern: &str) -> Result<Vec<PathBuf>>;

    async fn read_file(&self, path: &Path) -> Result<String>;

    async fn write_file(&self, path: &Path, contents: &str) -> Result<()>;
}

/// ローカルディレクトリ上のプロジェクト
#[derive(Debug, Clone)]
pub struct LocalProject {
    name: String,
    root: PathBuf,
}

impl LocalProject {
    /// ディレクトリ名をプロジェクト名として使う
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .canonicalize()
            .ok()
            .as_deref()
            .unwrap_or(root.as_path())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        Self { name, root }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl ProjectSource for LocalProject {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_dir(&self) -> &Path {
        &self.root
    }

    fn list_files(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let full = format!("{}/{}", root.trim_end_matches('/'), pattern);

        let mut files: Vec<PathBuf> = glob::glob(&full)?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .filter_map(|path| path.strip_prefix(&self.root).ok().map(Path::to_path_buf))
            .filter(|rel| {
                !rel.components().any(|c| {
                    IGNORED_DIRS
                        .iter()
                        .any(|ignored| c.as_os_str() == *ignored)
                })
            })
            .collect();
        files.sort();

        tracing::debug!("Matched {} file(s) for pattern {}", files.len(), pattern);
        Ok(files)
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        let full = self.resolve(path);
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| CoreError::IoError {
                path: full,
                message: e.to_string(),
            })
    }

    async fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::IoError {
                    path: parent.to_path_buf(),
                    message: e.to_string(),
                })?;
        }
        tokio::fs::write(&full, contents)
            .await
            .map_err(|e| CoreError::IoError {
                path: full,
                message: e.to_string(),
            })
    }
}
