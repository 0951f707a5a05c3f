//! Dockerfile から最低限の情報を取り出す
//!
//! 完全な文法解析は行わない。行継続（`\`）とコメントを処理したうえで
//! 命令ごとに分割し、`FROM` と `EXPOSE` だけを解釈する。

use serde::Serialize;

/// 1つの命令（キーワードは大文字に正規化）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub keyword: String,
    pub value: String,
}

/// `FROM` で指定されたベースイメージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseImage {
    pub name: String,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl BaseImage {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        let mut tokens = value
            .split_whitespace()
            .filter(|t| !t.starts_with("--"));
        let image = tokens.next()?;
        let alias = match (tokens.next(), tokens.next()) {
            (Some(kw), Some(alias)) if kw.eq_ignore_ascii_case("as") => Some(alias.to_string()),
            _ => None,
        };

        let (name, tag) = if let Some((name, digest)) = image.split_once('@') {
            (name, digest)
        } else {
            // registry:5000/app のポート部分はタグではない
            match image.rsplit_once(':') {
                Some((name, tag)) if !tag.contains('/') => (name, tag),
                _ => (image, "latest"),
            }
        };

        Some(Self {
            name: name.to_string(),
            tag: tag.to_string(),
            alias,
        })
    }

    /// `name:tag` 形式
    pub fn reference(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }
}

/// `EXPOSE` で宣言されたポート
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposedPort {
    pub port: u16,
    pub protocol: String,
}

/// Dockerfile から抽出した情報
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DockerfileFacts {
    pub instructions: Vec<Instruction>,
    pub base_images: Vec<BaseImage>,
    pub exposed_ports: Vec<ExposedPort>,
}

impl DockerfileFacts {
    pub fn parse(text: &str) -> Self {
        let mut facts = Self::default();

        for line in logical_lines(text) {
            let Some((keyword, value)) = split_instruction(&line) else {
                continue;
            };

            match keyword.as_str() {
                "FROM" => {
                    if let Some(image) = BaseImage::parse(&value) {
                        facts.base_images.push(image);
                    }
                }
                "EXPOSE" => {
                    facts
                        .exposed_ports
                        .extend(value.split_whitespace().filter_map(parse_port));
                }
                _ => {}
            }

            facts.instructions.push(Instruction { keyword, value });
        }

        facts
    }

    /// 最初に公開されるポート
    pub fn first_port(&self) -> Option<u16> {
        self.exposed_ports.first().map(|p| p.port)
    }
}

/// 継続行を連結し、空行とコメントを除いた論理行
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for raw in text.lines() {
        let trimmed = raw.trim();
        if trimmed.starts_with('#') {
            continue;
        }
        if let Some(body) = trimmed.strip_suffix('\\') {
            current.push_str(body.trim_end());
            current.push(' ');
            continue;
        }
        current.push_str(trimmed);
        let line = std::mem::take(&mut current);
        if !line.trim().is_empty() {
            lines.push(line.trim().to_string());
        }
    }

    if !current.trim().is_empty() {
        lines.push(current.trim().to_string());
    }

    lines
}

fn split_instruction(line: &str) -> Option<(String, String)> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let keyword = parts.next()?.to_ascii_uppercase();
    if keyword.is_empty() {
        return None;
    }
    let value = parts.next().unwrap_or("").trim().to_string();
    Some((keyword, value))
}

fn parse_port(token: &str) -> Option<ExposedPort> {
    let (port, protocol) = token.split_once('/').unwrap_or((token, "tcp"));
    Some(ExposedPort {
        port: port.parse().ok()?,
        protocol: protocol.to_ascii_lowercase(),
    })
}
