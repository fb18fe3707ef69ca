// crates/da_config/src/options.rs

//! 伴随选项 `DaOptions`
//!
//! 与外部传入的 `daOptions` 字典保持同样的层级和键名：
//!
//! ```json
//! {
//!   "solverName": "DASimpleFoam",
//!   "debug": false,
//!   "turbulence": { "model": "SpalartAllmarasFv3", "nu": 1.5e-5 },
//!   "objFunc": {
//!     "MESHQUALITY": {
//!       "part1": { "type": "meshQualityKS", "scale": 1.0, "coeffKS": 10.0,
//!                  "metric": "faceOrthogonality", "includeProcPatches": 0 }
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::linear_solver::LinearSolverDict;

/// 伴随计算选项
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaOptions {
    /// 主求解器名称
    #[serde(default = "default_solver_name")]
    pub solver_name: String,

    /// 调试输出开关
    #[serde(default)]
    pub debug: bool,

    /// 湍流模型选项
    #[serde(default)]
    pub turbulence: TurbulenceOptions,

    /// 目标函数：名称 -> 分项名 -> 分项字典
    #[serde(default)]
    pub obj_func: BTreeMap<String, BTreeMap<String, ObjFuncDict>>,
}

fn default_solver_name() -> String { "DASimpleFoam".to_string() }

impl Default for DaOptions {
    fn default() -> Self {
        Self {
            solver_name: default_solver_name(),
            debug: false,
            turbulence: TurbulenceOptions::default(),
            obj_func: BTreeMap::new(),
        }
    }
}

/// 湍流模型选项
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurbulenceOptions {
    /// 湍流模型类型名（如 `SpalartAllmarasFv3`、`laminar`）
    #[serde(default = "default_turbulence_model")]
    pub model: String,

    /// 层流运动粘度 [m²/s]
    #[serde(default = "default_nu")]
    pub nu: f64,

    /// nuTilda 方程松弛因子
    #[serde(default = "default_relax", rename = "relaxNuTildaEqn")]
    pub relax_nu_tilda: f64,

    /// 是否在 `correct` 中求解湍流状态
    #[serde(default = "default_true")]
    pub solve_turb_state: bool,

    /// nuTilda 线性求解器字典
    #[serde(default)]
    pub solver: LinearSolverDict,
}

fn default_turbulence_model() -> String { "SpalartAllmarasFv3".to_string() }
fn default_nu() -> f64 { 1.5e-5 }
fn default_relax() -> f64 { 1.0 }
fn default_true() -> bool { true }

impl Default for TurbulenceOptions {
    fn default() -> Self {
        Self {
            model: default_turbulence_model(),
            nu: default_nu(),
            relax_nu_tilda: default_relax(),
            solve_turb_state: true,
            solver: LinearSolverDict::default(),
        }
    }
}

/// 目标函数分项字典
///
/// 只显式建模网格质量 KS 目标使用的键，其余键原样保留在 `extra` 中。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjFuncDict {
    /// 目标函数类型名（如 `meshQualityKS`）
    #[serde(rename = "type")]
    pub obj_type: String,

    /// 缩放因子
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// KS 聚合系数
    #[serde(rename = "coeffKS", default, skip_serializing_if = "Option::is_none")]
    pub coeff_ks: Option<f64>,

    /// 网格质量指标名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,

    /// 是否包含处理器边界面（接受 0/1 或 true/false）
    #[serde(
        rename = "includeProcPatches",
        default,
        deserialize_with = "bool_or_label"
    )]
    pub include_proc_patches: bool,

    /// 其它键
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_scale() -> f64 { 1.0 }

/// 宿主字典中的开关通常写成 0/1
fn bool_or_label<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrLabel {
        Bool(bool),
        Label(i64),
    }

    Ok(match BoolOrLabel::deserialize(deserializer)? {
        BoolOrLabel::Bool(b) => b,
        BoolOrLabel::Label(v) => v != 0,
    })
}

impl ObjFuncDict {
    /// 创建网格质量 KS 目标分项
    pub fn mesh_quality_ks(metric: impl Into<String>, coeff_ks: f64) -> Self {
        Self {
            obj_type: "meshQualityKS".to_string(),
            scale: 1.0,
            coeff_ks: Some(coeff_ks),
            metric: Some(metric.into()),
            include_proc_patches: false,
            extra: BTreeMap::new(),
        }
    }

    /// 读取必需的 `coeffKS`
    pub fn require_coeff_ks(&self) -> Result<f64, ConfigError> {
        self.coeff_ks.ok_or_else(|| ConfigError::Missing("coeffKS".to_string()))
    }

    /// 读取必需的 `metric`
    pub fn require_metric(&self) -> Result<&str, ConfigError> {
        self.metric
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("metric".to_string()))
    }
}

impl DaOptions {
    /// 从 JSON 字符串加载
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let options: DaOptions =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// 从文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let turb = &self.turbulence;
        if turb.model.trim().is_empty() {
            return Err(ConfigError::Missing("turbulence.model".to_string()));
        }
        if !(turb.nu > 0.0) {
            return Err(ConfigError::invalid("turbulence.nu", turb.nu, "粘度必须为正"));
        }
        if !(turb.relax_nu_tilda > 0.0 && turb.relax_nu_tilda <= 1.0) {
            return Err(ConfigError::invalid(
                "turbulence.relaxNuTildaEqn",
                turb.relax_nu_tilda,
                "松弛因子必须在 (0, 1] 范围内",
            ));
        }
        turb.solver.validate("turbulence.solver")?;

        for (name, parts) in &self.obj_func {
            for (part, dict) in parts {
                let key = format!("objFunc.{name}.{part}");
                if dict.obj_type.trim().is_empty() {
                    return Err(ConfigError::Missing(format!("{key}.type")));
                }
                if !dict.scale.is_finite() {
                    return Err(ConfigError::invalid(format!("{key}.scale"), dict.scale, "必须为有限值"));
                }
                if let Some(c) = dict.coeff_ks {
                    if !(c > 0.0) {
                        return Err(ConfigError::invalid(
                            format!("{key}.coeffKS"),
                            c,
                            "KS 系数必须为正",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// 保存到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }
}
