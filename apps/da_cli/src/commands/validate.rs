// apps/da_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 检查算例配置，并尝试按配置创建湍流模型与目标函数。

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use da_adjoint::{ObjectiveFunction, TurbulenceModel};
use da_config::CaseConfig;
use tracing::{error, info, warn};

use super::{build_mesh, load_case};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 算例配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 把默认算例写到该路径后退出
    #[arg(long)]
    pub write_default: Option<PathBuf>,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== 算例配置验证 ===");

    if let Some(path) = &args.write_default {
        CaseConfig::default()
            .save_to_file(path)
            .with_context(|| format!("写入默认算例失败: {}", path.display()))?;
        info!("默认算例已写入 {}", path.display());
        return Ok(());
    }

    let case = load_case(args.config.as_ref())?;
    let mut warnings = Vec::new();

    info!(
        "网格 {} x {} x {}, 尺寸 {:?}, y 增长率 {}",
        case.mesh.nx, case.mesh.ny, case.mesh.nz, case.mesh.length, case.mesh.y_grading
    );
    let turb = &case.options.turbulence;
    info!(
        "湍流模型 {}, 求解器 {} ({}), 容差 {:e}",
        turb.model, turb.solver.solver, turb.solver.preconditioner, turb.solver.tolerance
    );

    let mesh = build_mesh(&case, 0.0)?;
    for patch in mesh.patches() {
        info!("patch {} ({}): {} 面", patch.name, patch.kind.type_name(), patch.size);
    }
    let model = TurbulenceModel::from_options(mesh.clone(), &case.options.turbulence)
        .context("创建湍流模型失败")?;
    info!("湍流状态: {:?}", model.state_names());

    if case.options.obj_func.is_empty() {
        warnings.push("未配置任何目标函数".to_string());
    }
    let objectives = ObjectiveFunction::all_from_options(&case.options, &mesh)
        .context("创建目标函数失败")?;
    for obj in &objectives {
        info!("目标函数 {}/{}: {}", obj.name(), obj.part(), obj.kind());
    }

    if case.decompose.n_procs > 1 && case.mesh.nx / case.decompose.n_procs < 2 {
        warnings.push(format!(
            "每个分区在 x 方向不足 2 个单元 (nx = {}, nProcs = {})",
            case.mesh.nx, case.decompose.n_procs
        ));
    }

    for w in &warnings {
        warn!("{w}");
    }
    if args.strict && !warnings.is_empty() {
        error!("严格模式下存在 {} 个警告", warnings.len());
        bail!("验证失败");
    }
    info!("验证通过");
    Ok(())
}
