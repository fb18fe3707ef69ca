// crates/da_config/src/case.rs

//! 算例配置 `CaseConfig`
//!
//! 命令行工具使用的完整算例描述：结构化块网格、来流条件、
//! 分区方式以及伴随选项。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::options::DaOptions;

/// 算例配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseConfig {
    /// 块网格参数
    #[serde(default)]
    pub mesh: BlockMeshConfig,

    /// 来流条件
    #[serde(default)]
    pub flow: FlowConfig,

    /// 分区参数
    #[serde(default)]
    pub decompose: DecomposeConfig,

    /// 伴随选项
    #[serde(default)]
    pub options: DaOptions,
}

/// 结构化块网格参数
///
/// 网格为 `[0, lx] x [0, ly] x [0, lz]` 的长方体，`y = 0` 为壁面，
/// `x = 0` 入口，`x = lx` 出口，`y = ly` 远场，z 方向两侧为 empty。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMeshConfig {
    /// x 方向单元数
    #[serde(default = "default_nx")]
    pub nx: usize,
    /// y 方向单元数
    #[serde(default = "default_ny")]
    pub ny: usize,
    /// z 方向单元数
    #[serde(default = "default_nz")]
    pub nz: usize,
    /// 计算域尺寸 [m]
    #[serde(default = "default_length")]
    pub length: [f64; 3],
    /// y 方向网格增长率（壁面加密，1.0 为均匀）
    #[serde(default = "default_grading")]
    pub y_grading: f64,
}

fn default_nx() -> usize { 20 }
fn default_ny() -> usize { 10 }
fn default_nz() -> usize { 1 }
fn default_length() -> [f64; 3] { [1.0, 0.5, 0.1] }
fn default_grading() -> f64 { 1.0 }

impl Default for BlockMeshConfig {
    fn default() -> Self {
        Self {
            nx: default_nx(),
            ny: default_ny(),
            nz: default_nz(),
            length: default_length(),
            y_grading: default_grading(),
        }
    }
}

/// 来流条件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowConfig {
    /// 来流速度 [m/s]
    #[serde(default = "default_u_inf")]
    pub u_inf: [f64; 3],
    /// 入口 nuTilda [m²/s]
    #[serde(default = "default_nu_tilda_inf")]
    pub nu_tilda_inf: f64,
    /// 前向 SA 迭代次数
    #[serde(default = "default_n_iterations")]
    pub n_iterations: usize,
}

fn default_u_inf() -> [f64; 3] { [10.0, 0.0, 0.0] }
fn default_nu_tilda_inf() -> f64 { 4.5e-5 }
fn default_n_iterations() -> usize { 50 }

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            u_inf: default_u_inf(),
            nu_tilda_inf: default_nu_tilda_inf(),
            n_iterations: default_n_iterations(),
        }
    }
}

/// 分区参数（沿 x 方向等分）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecomposeConfig {
    /// 分区数
    #[serde(default = "default_n_procs")]
    pub n_procs: usize,
}

fn default_n_procs() -> usize { 1 }

impl Default for DecomposeConfig {
    fn default() -> Self {
        Self {
            n_procs: default_n_procs(),
        }
    }
}

impl CaseConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        let config: CaseConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.mesh;
        for (key, n) in [("mesh.nx", m.nx), ("mesh.ny", m.ny), ("mesh.nz", m.nz)] {
            if n == 0 {
                return Err(ConfigError::invalid(key, n, "单元数必须为正"));
            }
        }
        if m.length.iter().any(|&l| !(l > 0.0)) {
            return Err(ConfigError::invalid(
                "mesh.length",
                format!("{:?}", m.length),
                "计算域尺寸必须为正",
            ));
        }
        if !(m.y_grading > 0.0) {
            return Err(ConfigError::invalid("mesh.yGrading", m.y_grading, "增长率必须为正"));
        }
        if self.flow.nu_tilda_inf < 0.0 {
            return Err(ConfigError::invalid(
                "flow.nuTildaInf",
                self.flow.nu_tilda_inf,
                "nuTilda 不能为负",
            ));
        }
        if self.decompose.n_procs == 0 || self.decompose.n_procs > m.nx {
            return Err(ConfigError::invalid(
                "decompose.nProcs",
                self.decompose.n_procs,
                format!("分区数必须在 [1, nx={}] 范围内", m.nx),
            ));
        }
        self.options.validate()
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }
}
