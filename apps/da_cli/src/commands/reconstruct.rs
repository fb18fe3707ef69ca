// apps/da_cli/src/commands/reconstruct.rs

//! 分区求解与场重构命令
//!
//! 每个分区在独立线程中迭代 nuTilda 方程（处理器边界按固定值处理），
//! 随后把 `nuTilda`、`nut`、`U`、`phi` 重构回全局网格。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use da_adjoint::{
    decompose, simple_x_split, AdjointTurbulence, Communicator, FlowFields, ProcFieldSet,
    ReconstructPar, SpalartAllmarasFv3, ThreadGroup,
};
use glam::DVec3;
use serde::Serialize;
use tracing::info;

use super::{build_mesh, load_case, norm2, write_json};

/// 重构命令参数
#[derive(Args)]
pub struct ReconstructArgs {
    /// 算例配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 覆盖配置中的分区数
    #[arg(short = 'n', long)]
    pub procs: Option<usize>,

    /// 只重构这些场（逗号分隔）
    #[arg(short, long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// 结果 JSON 输出路径（标量场单元值）
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Serialize)]
struct ReconstructReport {
    n_procs: usize,
    scalars: BTreeMap<String, Vec<f64>>,
}

/// 执行重构命令
pub fn execute(args: ReconstructArgs) -> Result<()> {
    info!("=== 分区求解与重构 ===");
    let case = load_case(args.config.as_ref())?;
    let n_procs = args.procs.unwrap_or(case.decompose.n_procs);

    let mesh = build_mesh(&case, 0.0)?;
    let cell_to_proc = simple_x_split(&mesh, n_procs)?;
    let procs = decompose(&mesh, &cell_to_proc, n_procs)?;
    info!("分解为 {n_procs} 个分区");

    let u_inf = DVec3::from_array(case.flow.u_inf);
    let turbulence = &case.options.turbulence;
    let (nu_tilda_inf, n_iter) = (case.flow.nu_tilda_inf, case.flow.n_iterations);

    let sets = ThreadGroup::run(n_procs, |comm| -> Result<ProcFieldSet> {
        let local = Arc::new(procs[comm.rank()].mesh.clone());
        let flow = FlowFields::uniform(&local, u_inf);
        let mut model = SpalartAllmarasFv3::new(Arc::clone(&local), turbulence)?;
        model.initialize(nu_tilda_inf);
        model.correct_boundary_conditions(&flow);

        for _ in 0..n_iter {
            model.correct(&flow)?;
        }
        model.calc_residuals(&flow)?;
        let local_sqr = norm2(model.field("nuTildaRes")?.internal()).powi(2);
        let global = comm.sum_reduce(local_sqr)?.sqrt();
        if comm.is_master() {
            info!("分区求解完成: 全局 |R| = {global:.6e}");
        }

        let mut set = ProcFieldSet::default();
        set.add_scalar(model.state("nuTilda")?.clone());
        set.add_scalar(model.nut().clone());
        set.add_vector(flow.u);
        set.add_surface(flow.phi);
        Ok(set)
    })?
    .into_iter()
    .collect::<Result<Vec<_>>>()?;

    let mut runner = ReconstructPar::new();
    if !args.fields.is_empty() {
        runner = runner.with_selected(args.fields.clone());
    }
    let out = runner
        .run(&mesh, &procs, &sets)
        .context("重构失败")?;

    for (name, field) in &out.scalars {
        let values = field.internal();
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        info!("{name}: min = {min:.6e}, max = {max:.6e}");
    }
    for (name, field) in &out.surfaces {
        let net: f64 = field.internal().iter().sum();
        info!("{name}: 内部面通量和 = {net:.6e}");
    }

    if let Some(path) = &args.output {
        let report = ReconstructReport {
            n_procs,
            scalars: out
                .scalars
                .iter()
                .map(|(k, f)| (k.clone(), f.internal().to_vec()))
                .collect(),
        };
        write_json(path, &report)?;
    }
    Ok(())
}
