use colored::Colorize;
use dockhand_core::{
    LocalProject, apply_docker_base_fingerprint, extract_docker_base_fingerprints,
    extract_docker_path_fingerprint, extract_docker_ports_fingerprint, fingerprint,
};
use std::path::Path;

/// プロジェクト内の Dockerfile フィンガープリントを表示
///
/// `set_base` が `image:tag` のとき、該当する `FROM` をそのタグへ書き換える。
pub async fn handle(dir: &Path, json: bool, set_base: Option<&str>) -> anyhow::Result<()> {
    let project = LocalProject::new(dir);

    if let Some(reference) = set_base {
        return apply(&project, reference).await;
    }

    let bases = extract_docker_base_fingerprints(&project).await?;
    let ports = extract_docker_ports_fingerprint(&project).await?;
    let path = extract_docker_path_fingerprint(&project).await?;

    if json {
        let mut all = serde_json::Map::new();
        all.insert(
            fingerprint::DOCKER_BASE_IMAGE_TYPE.into(),
            serde_json::to_value(&bases)?,
        );
        all.insert(
            fingerprint::DOCKER_PORTS_TYPE.into(),
            serde_json::to_value(&ports)?,
        );
        all.insert(fingerprint::DOCKER_PATH_TYPE.into(), serde_json::to_value(&path)?);
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }

    if bases.is_empty() {
        println!("{}", "Dockerfile が見つかりません".dimmed());
        return Ok(());
    }
    for fp in &bases {
        println!(
            "{} {}:{} ({})",
            fp.abbreviation.bold(),
            fp.data.image.cyan(),
            fp.data.version,
            fp.data.path
        );
        println!("    sha: {}", fp.sha.dimmed());
    }
    if let Some(fp) = ports {
        println!("{} {}", fp.abbreviation.bold(), fp.data.join(", ").green());
    }
    if let Some(fp) = path {
        println!("{} {}", fp.abbreviation.bold(), fp.data);
    }

    Ok(())
}

async fn apply(project: &LocalProject, reference: &str) -> anyhow::Result<()> {
    let Some((image, version)) = reference.rsplit_once(':').filter(|(_, t)| !t.contains('/'))
    else {
        anyhow::bail!("--set-base は image:tag 形式で指定してください: {}", reference);
    };

    let mut updated = 0;
    for current in extract_docker_base_fingerprints(project).await? {
        if current.data.image != image {
            continue;
        }
        let target = fingerprint::docker_base_fingerprint(image, version, &current.data.path)?;
        if apply_docker_base_fingerprint(project, &target).await? {
            println!("{} {}", "✓".green(), current.data.path);
            updated += 1;
        }
    }

    if updated == 0 {
        anyhow::bail!("{} を FROM に持つ Dockerfile がありません", image);
    }
    Ok(())
}
