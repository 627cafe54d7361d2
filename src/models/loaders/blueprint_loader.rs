use crate::models::blueprint::TestBlueprint;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载数据并转换为 TestBlueprint 对象
pub async fn load_toml_to_blueprint(toml_file_path: &Path) -> Result<TestBlueprint> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut blueprint: TestBlueprint = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    // 设置文件路径
    blueprint.file_path = Some(toml_file_path.to_string_lossy().to_string());

    Ok(blueprint)
}

/// 从文件夹中加载所有 TOML 蓝图文件
pub async fn load_all_blueprints(folder_path: &str) -> Result<Vec<TestBlueprint>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut blueprints = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            tracing::info!(
                "正在加载: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );

            match load_toml_to_blueprint(&path).await {
                Ok(blueprint) => {
                    tracing::info!("成功加载 {} 个节点", blueprint.node_count());
                    blueprints.push(blueprint);
                }
                Err(e) => {
                    tracing::warn!("加载文件失败 {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(blueprints)
}
