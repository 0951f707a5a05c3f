use colored::Colorize;
use dockhand_core::DockerfileFacts;
use std::path::Path;

pub fn handle(path: &Path, json: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Dockerfile を読み込めません: {}: {}", path.display(), e))?;
    let facts = DockerfileFacts::parse(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&facts)?);
        return Ok(());
    }

    println!("{}", path.display().to_string().bold());
    println!("  命令数: {}", facts.instructions.len());

    println!("  ベースイメージ:");
    for image in &facts.base_images {
        match &image.alias {
            Some(alias) => println!("    • {} (as {})", image.reference().cyan(), alias),
            None => println!("    • {}", image.reference().cyan()),
        }
    }

    if facts.exposed_ports.is_empty() {
        println!("  公開ポート: {}", "なし".dimmed());
    } else {
        println!("  公開ポート:");
        for port in &facts.exposed_ports {
            println!("    • {}/{}", port.port.to_string().green(), port.protocol);
        }
    }

    Ok(())
}
