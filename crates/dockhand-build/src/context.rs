//! Dockerfile とビルドコンテキストの解決

use crate::error::{BuildError, Result};
use dockhand_core::{DockerfileLocator, ProjectSource};
use std::path::{Path, PathBuf};

/// 解決済みのビルド入力
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInputs {
    pub dockerfile: PathBuf,
    pub context: PathBuf,
}

pub struct ContextResolver;

impl ContextResolver {
    /// Dockerfile とコンテキストをまとめて解決
    pub fn resolve(
        project: &dyn ProjectSource,
        dockerfile: &DockerfileLocator,
        context: Option<&Path>,
    ) -> Result<BuildInputs> {
        Ok(BuildInputs {
            dockerfile: Self::resolve_dockerfile(project, dockerfile)?,
            context: Self::resolve_context(project.base_dir(), context)?,
        })
    }

    /// Dockerfileのパスを解決
    ///
    /// - `Path`: プロジェクトルートからの相対パス（存在しなければエラー）
    /// - `Discover`: プロジェクト内で唯一の `Dockerfile`
    pub fn resolve_dockerfile(
        project: &dyn ProjectSource,
        locator: &DockerfileLocator,
    ) -> Result<PathBuf> {
        let root = project.base_dir();
        match locator {
            DockerfileLocator::Path(relative) => {
                let path = root.join(relative);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(BuildError::DockerfileNotFound(path))
                }
            }
            DockerfileLocator::Discover => {
                let found = project.list_files("**/Dockerfile")?;
                match found.as_slice() {
                    [single] => {
                        tracing::debug!("Discovered Dockerfile at {}", single.display());
                        Ok(root.join(single))
                    }
                    [] => Err(BuildError::DockerfileNotFound(root.join("**/Dockerfile"))),
                    many => Err(BuildError::InvalidConfig(format!(
                        "Dockerfile が複数見つかりました（{}件）。docker.build.dockerfile でパスを指定してください: {}",
                        many.len(),
                        many.iter()
                            .map(|p| p.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))),
                }
            }
        }
    }

    /// ビルドコンテキストのパスを解決
    ///
    /// デフォルトはプロジェクトルート
    pub fn resolve_context(root: &Path, context: Option<&Path>) -> Result<PathBuf> {
        let path = match context {
            Some(relative) => root.join(relative),
            None => root.to_path_buf(),
        };

        if !path.exists() {
            return Err(BuildError::ContextNotFound(path));
        }

        if !path.is_dir() {
            return Err(BuildError::InvalidConfig(format!(
                "Build context is not a directory: {}",
                path.display()
            )));
        }

        Ok(path)
    }
}
