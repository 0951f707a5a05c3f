//! イメージ名とタグの解決

use crate::error::{BuildError, Result};
use dockhand_core::{BuildOptions, BuildRequest, ImageReference};

/// Docker タグの最大長
const MAX_TAG_LEN: usize = 128;

pub struct ImageNameResolver;

impl ImageNameResolver {
    /// プロジェクト名とバージョンから完全修飾タグを決める
    ///
    /// レジストリ設定順に `{url}/{name}:{version}`、続けて条件付きで
    /// `{url}/{name}:latest` を並べる。`latest` は latest タグ付与が有効で
    /// かつデフォルトブランチの場合だけ。
    pub fn resolve(
        project_name: &str,
        request: &BuildRequest,
        version: &str,
        options: &BuildOptions,
        push_enabled: bool,
    ) -> Result<ImageReference> {
        let name = sanitize_image_name(project_name)?;
        let version = sanitize_tag(version)?;
        let with_latest = options.tag_latest && request.is_default_branch() && version != "latest";

        if options.registries.is_empty() && push_enabled {
            return Err(BuildError::InvalidConfig(
                "イメージのプッシュに必要な設定がありません。\
                 registries に少なくとも1つのレジストリを設定してください"
                    .to_string(),
            ));
        }

        let prefixes: Vec<Option<&str>> = if options.registries.is_empty() {
            vec![None]
        } else {
            options
                .registries
                .iter()
                .map(|r| Some(r.push_url()))
                .collect()
        };

        let mut tags = Vec::new();
        for prefix in prefixes {
            let repository = match prefix {
                Some(url) => format!("{}/{}", url, name),
                None => name.clone(),
            };
            tags.push(format!("{}:{}", repository, version));
            if with_latest {
                tags.push(format!("{}:latest", repository));
            }
        }

        tracing::debug!("Resolved image {} with tags {:?}", name, tags);
        Ok(ImageReference { name, tags })
    }
}

/// プロジェクト名をイメージ名に使える形へ
///
/// 小文字化し、`[a-z0-9._/-]` 以外の連続は `-` 1文字に置き換える。
pub fn sanitize_image_name(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut replaced = false;
    for c in raw.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '/' | '-') {
            out.push(c);
            replaced = false;
        } else if !replaced {
            out.push('-');
            replaced = true;
        }
    }

    let name = out
        .trim_matches(|c| matches!(c, '.' | '_' | '/' | '-'))
        .to_string();
    if name.is_empty() {
        return Err(BuildError::InvalidConfig(format!(
            "プロジェクト名 '{}' からイメージ名を作れません",
            raw
        )));
    }
    Ok(name)
}

/// バージョン文字列をタグの文字種に揃える
pub fn sanitize_tag(raw: &str) -> Result<String> {
    let replaced: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let mut tag = replaced.trim_start_matches(['.', '-']).to_string();
    tag.truncate(MAX_TAG_LEN);

    validate_tag(&tag)?;
    Ok(tag)
}

/// タグのバリデーション
///
/// - 128文字以下
/// - 英数字、ピリオド、ハイフン、アンダースコアのみ
/// - 先頭はピリオドまたはハイフンではない
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(BuildError::InvalidTag {
            tag: "(empty)".to_string(),
        });
    }

    if tag.len() > MAX_TAG_LEN {
        return Err(BuildError::InvalidTag {
            tag: format!("Tag too long ({} characters, max 128)", tag.len()),
        });
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(BuildError::InvalidTag {
            tag: tag.to_string(),
        });
    }

    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_'))
    {
        return Err(BuildError::InvalidTag {
            tag: format!("Invalid character '{}' in tag: {}", c, tag),
        });
    }

    Ok(())
}

/// イメージ名とタグを分離
///
/// # Examples
/// - `ghcr.io/org/app:v1.0` -> `("ghcr.io/org/app", "v1.0")`
/// - `ghcr.io/org/app` -> `("ghcr.io/org/app", "latest")`
/// - `localhost:5000/app:dev` -> `("localhost:5000/app", "dev")`
pub fn split_image_tag(image: &str) -> (String, String) {
    if let Some((repository, tag)) = image.rsplit_once(':')
        && !tag.contains('/')
    {
        return (repository.to_string(), tag.to_string());
    }

    (image.to_string(), "latest".to_string())
}
