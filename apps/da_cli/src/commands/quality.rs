// apps/da_cli/src/commands/quality.rs

//! 网格质量 KS 目标命令
//!
//! 按算例分区后在线程组中并行计算，未配置目标函数时按命令行参数创建一个。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use da_adjoint::{decompose, simple_x_split, Communicator, ObjectiveFunction, ThreadGroup};
use da_config::ObjFuncDict;
use serde::Serialize;
use tracing::info;

use super::{build_mesh, load_case, write_json};

/// 质量目标参数
#[derive(Args)]
pub struct QualityArgs {
    /// 算例配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 网格错切系数（x += shear * y）
    #[arg(long, default_value = "0.0")]
    pub shear: f64,

    /// 覆盖配置中的分区数
    #[arg(short = 'n', long)]
    pub procs: Option<usize>,

    /// 未配置目标函数时使用的指标
    #[arg(long, default_value = "faceOrthogonality")]
    pub metric: String,

    /// 未配置目标函数时使用的 KS 系数
    #[arg(long, default_value = "10.0")]
    pub coeff_ks: f64,

    /// 结果 JSON 输出路径
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Serialize)]
struct QualityReport {
    n_procs: usize,
    values: BTreeMap<String, f64>,
    scales: BTreeMap<String, f64>,
}

/// 执行质量目标命令
pub fn execute(args: QualityArgs) -> Result<()> {
    info!("=== 网格质量 KS ===");
    let mut case = load_case(args.config.as_ref())?;
    if case.options.obj_func.is_empty() {
        let dict = ObjFuncDict::mesh_quality_ks(&args.metric, args.coeff_ks);
        case.options
            .obj_func
            .entry("MESHQUALITY".to_string())
            .or_default()
            .insert("part1".to_string(), dict);
    }
    let n_procs = args.procs.unwrap_or(case.decompose.n_procs);

    let mesh = build_mesh(&case, args.shear)?;
    let cell_to_proc = simple_x_split(&mesh, n_procs)?;
    let locals: Vec<_> = decompose(&mesh, &cell_to_proc, n_procs)?
        .into_iter()
        .map(|p| Arc::new(p.mesh))
        .collect();
    info!("分解为 {n_procs} 个分区");

    let options = &case.options;
    let per_rank = ThreadGroup::run(n_procs, |comm| -> Result<Vec<(String, f64, f64)>> {
        let mesh = &locals[comm.rank()];
        let mut out = Vec::new();
        for mut obj in ObjectiveFunction::all_from_options(options, mesh)? {
            let value = obj.calc_obj_func(&comm)?;
            out.push((format!("{}/{}", obj.name(), obj.part()), value, obj.scale()));
        }
        Ok(out)
    })?;

    // 全局归约后各分区结果相同，取主分区
    let master = per_rank
        .into_iter()
        .next()
        .context("线程组没有返回结果")??;

    let mut report = QualityReport {
        n_procs,
        values: BTreeMap::new(),
        scales: BTreeMap::new(),
    };
    for (key, value, scale) in master {
        info!("{key} = {value:.10e} (scale = {scale})");
        report.scales.insert(key.clone(), scale);
        report.values.insert(key, value);
    }

    if let Some(path) = &args.output {
        write_json(path, &report)?;
    }
    Ok(())
}
