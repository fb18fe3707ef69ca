// apps/da_cli/src/commands/adjoint.rs

//! 湍流伴随命令
//!
//! 在均匀来流上迭代 nuTilda 方程，然后：
//! 1. 计算 LDU 残差并与缓存残差比较
//! 2. 以 `dF/dnuTilda = V` （F 为体积加权 nuTilda 积分）求转置伴随解
//! 3. 输出状态连接关系，可选地用残差雅可比检查其完整性

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Args;
use da_adjoint::adjoint::ad::undeclared_entries;
use da_adjoint::{FlowFields, StateDependencyGraph, TurbulenceModel};
use da_foundation::SMALL;
use glam::DVec3;
use serde::Serialize;
use tracing::{info, warn};

use super::{build_mesh, load_case, norm2, write_json};

/// 伴随命令参数
#[derive(Args)]
pub struct AdjointArgs {
    /// 算例配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 覆盖配置中的前向迭代次数
    #[arg(long)]
    pub iterations: Option<usize>,

    /// 结果 JSON 输出路径
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 以自动微分雅可比检查声明的连接层级（稠密，仅适合小网格）
    #[arg(long)]
    pub check_connectivity: bool,
}

#[derive(Serialize)]
struct AdjointReport {
    model: String,
    n_cells: usize,
    forward_iterations: usize,
    ldu_residual_norm: f64,
    cached_residual_norm: f64,
    adjoint_norm: f64,
    adjoint: Vec<f64>,
    connectivity: StateDependencyGraph,
    #[serde(skip_serializing_if = "Option::is_none")]
    undeclared_entries: Option<usize>,
}

/// 执行伴随命令
pub fn execute(args: AdjointArgs) -> Result<()> {
    info!("=== nuTilda 离散伴随 ===");
    let case = load_case(args.config.as_ref())?;
    let mesh = build_mesh(&case, 0.0)?;

    let u_inf = DVec3::from_array(case.flow.u_inf);
    let flow = FlowFields::uniform(&mesh, u_inf);

    let mut model = TurbulenceModel::from_options(mesh.clone(), &case.options.turbulence)?;
    match &mut model {
        TurbulenceModel::SpalartAllmarasFv3(sa) => sa.initialize(case.flow.nu_tilda_inf),
        TurbulenceModel::Laminar(_) => bail!("层流模型没有可求伴随的湍流状态"),
    }
    model.correct_boundary_conditions(&flow);

    let n_iter = args.iterations.unwrap_or(case.flow.n_iterations);
    let start = Instant::now();
    for iter in 0..n_iter {
        model.calc_residuals(&flow)?;
        let res = norm2(model.field("nuTildaRes")?.internal());
        if let Some(result) = model.correct(&flow)? {
            info!(
                "迭代 {:>4}: |R| = {:.6e}, 线性求解 {} 次迭代",
                iter + 1,
                res,
                result.iterations
            );
        }
    }
    info!("前向求解用时 {:.3} s", start.elapsed().as_secs_f64());

    model.calc_residuals(&flow)?;
    let cached = model.field("nuTildaRes")?.internal().to_vec();
    let ldu = model.calc_ldu_residual_turb(&flow)?;
    let (cached_norm, ldu_norm) = (norm2(&cached), norm2(&ldu));
    let diff: Vec<f64> = ldu.iter().zip(&cached).map(|(a, b)| a - b).collect();
    if norm2(&diff) > 1e-8 * (cached_norm + SMALL) {
        warn!("LDU 残差与缓存残差不一致: |ΔR| = {:.6e}", norm2(&diff));
    }
    info!("|R_ldu| = {ldu_norm:.6e}, |R_cached| = {cached_norm:.6e}");

    let dfdw = mesh.cell_volumes().to_vec();
    let psi = model.inv_tran_prod_nu_tilda_eqn(&flow, &dfdw)?;
    let adjoint_norm = norm2(&psi);
    info!("|ψ| = {adjoint_norm:.6e}");

    let mut connectivity = StateDependencyGraph::new();
    model.add_model_residual_con(&mut connectivity);
    for name in connectivity.residual_names() {
        info!("{name}: {:?}", connectivity.flattened(name));
    }

    let undeclared = if args.check_connectivity {
        let level = connectivity.deepest_level("nuTildaRes", "nuTilda").unwrap_or(0);
        let jac = model.calc_residual_state_jacobian(&flow)?;
        let missing = undeclared_entries(mesh.ldu(), &jac, level, 0.0);
        if missing.is_empty() {
            info!("雅可比非零元均在声明的 {level} 层连接内");
        } else {
            warn!(
                "{} 个雅可比非零元超出声明的 {level} 层连接，首个位于 {:?}",
                missing.len(),
                missing[0]
            );
        }
        Some(missing.len())
    } else {
        None
    };

    if let Some(path) = &args.output {
        let report = AdjointReport {
            model: model.name().to_string(),
            n_cells: mesh.n_cells(),
            forward_iterations: n_iter,
            ldu_residual_norm: ldu_norm,
            cached_residual_norm: cached_norm,
            adjoint_norm,
            adjoint: psi,
            connectivity,
            undeclared_entries: undeclared,
        };
        write_json(path, &report)?;
    }
    Ok(())
}
