// apps/da_cli/src/commands/mod.rs

//! 子命令实现

pub mod adjoint;
pub mod quality;
pub mod reconstruct;
pub mod validate;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use da_adjoint::{BlockMesh, FvMesh};
pub(crate) use da_adjoint::numerics::linear_algebra::vector_ops::norm2;
use da_config::CaseConfig;
use tracing::info;

/// 读取算例；未给出路径时使用默认算例
pub(crate) fn load_case(path: Option<&PathBuf>) -> Result<CaseConfig> {
    match path {
        Some(p) => CaseConfig::from_file(p)
            .with_context(|| format!("读取算例配置失败: {}", p.display())),
        None => {
            info!("未指定配置文件，使用默认算例");
            let case = CaseConfig::default();
            case.validate().context("默认算例配置无效")?;
            Ok(case)
        }
    }
}

/// 由算例生成块网格
pub(crate) fn build_mesh(case: &CaseConfig, shear: f64) -> Result<Arc<FvMesh>> {
    let mesh = BlockMesh::new(case.mesh.clone())
        .with_shear(shear)
        .build()
        .context("生成块网格失败")?;
    info!(
        "网格: {} 点, {} 单元, {} 面 ({} 内部), {} patch",
        mesh.n_points(),
        mesh.n_cells(),
        mesh.n_faces(),
        mesh.n_internal_faces(),
        mesh.patches().len()
    );
    Ok(Arc::new(mesh))
}

/// 写 JSON 结果文件
pub(crate) fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content).with_context(|| format!("写入 {} 失败", path.display()))?;
    info!("结果已写入 {}", path.display());
    Ok(())
}
