//! Dockerfile のフィンガープリント
//!
//! プロジェクト内の Dockerfile から次の3種類を取り出す。
//!
//! - `docker-base-image`: Dockerfile ごとの最初のベースイメージとタグ
//! - `docker-ports`: すべての Dockerfile の `EXPOSE` ポート
//! - `docker-path`: Dockerfile がちょうど1つのときのパス
//!
//! `sha` はデータを JSON にした文字列の SHA-256。ベースイメージは
//! [`apply_docker_base_fingerprint`] で別バージョンへ書き換えられる。

use crate::dockerfile::{BaseImage, DockerfileFacts};
use crate::error::Result;
use crate::project::ProjectSource;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

pub const DOCKER_BASE_IMAGE_TYPE: &str = "docker-base-image";
pub const DOCKER_PORTS_TYPE: &str = "docker-ports";
pub const DOCKER_PATH_TYPE: &str = "docker-path";

const DOCKERFILE_PATTERN: &str = "**/Dockerfile";
const FINGERPRINT_VERSION: &str = "0.0.1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint<T> {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub abbreviation: String,
    pub version: String,
    pub data: T,
    pub sha: String,
}

impl<T: Serialize> Fingerprint<T> {
    fn new(kind: &str, name: &str, abbreviation: &str, data: T) -> Result<Self> {
        let sha = sha256_json(&data)?;
        Ok(Self {
            kind: kind.to_string(),
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
            version: FINGERPRINT_VERSION.to_string(),
            data,
            sha,
        })
    }
}

/// ベースイメージのデータ（フィールド順がそのまま sha に効く）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerBaseData {
    pub image: String,
    pub version: String,
    /// プロジェクトルートからの Dockerfile のパス
    pub path: String,
}

pub fn docker_base_fingerprint(
    image: &str,
    version: &str,
    path: &str,
) -> Result<Fingerprint<DockerBaseData>> {
    let data = DockerBaseData {
        image: image.to_string(),
        version: version.to_string(),
        path: path.to_string(),
    };
    Fingerprint::new(
        DOCKER_BASE_IMAGE_TYPE,
        image,
        &format!("dbi-{}", image),
        data,
    )
}

/// 空でない Dockerfile ごとにベースイメージを取り出す
pub async fn extract_docker_base_fingerprints(
    project: &dyn ProjectSource,
) -> Result<Vec<Fingerprint<DockerBaseData>>> {
    let mut fingerprints = Vec::new();
    for path in project.list_files(DOCKERFILE_PATTERN)? {
        let text = project.read_file(&path).await?;
        if text.trim().is_empty() {
            continue;
        }
        let facts = DockerfileFacts::parse(&text);
        let Some(base) = facts.base_images.first() else {
            tracing::debug!("No FROM instruction in {}", path.display());
            continue;
        };
        fingerprints.push(docker_base_fingerprint(
            &base.name,
            &base.tag,
            &path.display().to_string(),
        )?);
    }
    Ok(fingerprints)
}

/// 公開ポートを1つにまとめる。ポートが無ければ `None`
pub async fn extract_docker_ports_fingerprint(
    project: &dyn ProjectSource,
) -> Result<Option<Fingerprint<Vec<String>>>> {
    let mut ports = Vec::new();
    for path in project.list_files(DOCKERFILE_PATTERN)? {
        let text = project.read_file(&path).await?;
        ports.extend(
            DockerfileFacts::parse(&text)
                .exposed_ports
                .iter()
                .map(|p| p.port.to_string()),
        );
    }
    if ports.is_empty() {
        return Ok(None);
    }
    Fingerprint::new(DOCKER_PORTS_TYPE, DOCKER_PORTS_TYPE, "dps", ports).map(Some)
}

/// Dockerfile がちょうど1つならそのパス
pub async fn extract_docker_path_fingerprint(
    project: &dyn ProjectSource,
) -> Result<Option<Fingerprint<String>>> {
    let paths = project.list_files(DOCKERFILE_PATTERN)?;
    let [only] = paths.as_slice() else {
        return Ok(None);
    };
    Fingerprint::new(
        DOCKER_PATH_TYPE,
        DOCKER_PATH_TYPE,
        "dpa",
        only.display().to_string(),
    )
    .map(Some)
}

/// フィンガープリントの Dockerfile で、同じイメージの `FROM` タグを書き換える
///
/// タグが明示されている行だけが対象。書き換えた場合は `true`。
pub async fn apply_docker_base_fingerprint(
    project: &dyn ProjectSource,
    fingerprint: &Fingerprint<DockerBaseData>,
) -> Result<bool> {
    let data = &fingerprint.data;
    let path = Path::new(&data.path);
    let text = project.read_file(path).await?;

    let (updated, changed) = rewrite_base_tag(&text, &data.image, &data.version);
    if changed == 0 {
        tracing::debug!("No FROM {} with a tag in {}", data.image, data.path);
        return Ok(false);
    }

    project.write_file(path, &updated).await?;
    tracing::info!(
        "Updated {} FROM line(s) in {} to {}:{}",
        changed,
        data.path,
        data.image,
        data.version
    );
    Ok(true)
}

/// `FROM <image>:<tag>` のタグを置き換えた本文と置換数
pub fn rewrite_base_tag(text: &str, image: &str, version: &str) -> (String, usize) {
    let mut changed = 0;
    let lines: Vec<String> = text
        .split('\n')
        .map(|line| match rewrite_from_line(line, image, version) {
            Some(rewritten) => {
                changed += 1;
                rewritten
            }
            None => line.to_string(),
        })
        .collect();
    (lines.join("\n"), changed)
}

fn rewrite_from_line(line: &str, image: &str, version: &str) -> Option<String> {
    let tokens = tokens_with_offsets(line);
    let (_, keyword) = tokens.first()?;
    if !keyword.eq_ignore_ascii_case("FROM") {
        return None;
    }

    let (start, token) = tokens
        .iter()
        .skip(1)
        .find(|(_, t)| !t.starts_with("--"))?;
    // ダイジェスト指定とタグ無しはそのまま
    if token.contains('@') {
        return None;
    }
    let base = BaseImage::parse(token)?;
    if base.name != image || base.name.len() == token.len() {
        return None;
    }

    let end = start + token.len();
    Some(format!(
        "{}{}:{}{}",
        &line[..*start],
        base.name,
        version,
        &line[end..]
    ))
}

fn tokens_with_offsets(line: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push((s, &line[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push((s, &line[s..]));
    }
    tokens
}

fn sha256_json<T: Serialize>(data: &T) -> Result<String> {
    let bytes = serde_json::to_vec(data)?;
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(hex::encode(hasher.finalize()))
}
