// crates/da_config/src/linear_solver.rs

//! 线性求解器字典
//!
//! 对应宿主框架 `fvSolution` 中每个变量的求解器子字典：
//!
//! ```json
//! {
//!   "solver": "PBiCGStab",
//!   "preconditioner": "DILU",
//!   "tolerance": 1e-12,
//!   "relTol": 0.0,
//!   "maxIter": 1000
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Krylov 求解器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LinearSolverKind {
    /// 预条件双共轭梯度稳定法（非对称矩阵）
    #[default]
    #[serde(rename = "PBiCGStab")]
    PBiCGStab,
    /// 预条件共轭梯度法（对称正定矩阵）
    #[serde(rename = "PCG")]
    Pcg,
}

impl std::fmt::Display for LinearSolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PBiCGStab => write!(f, "PBiCGStab"),
            Self::Pcg => write!(f, "PCG"),
        }
    }
}

/// 预条件器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PreconditionerKind {
    /// 无预条件
    #[serde(rename = "none")]
    None,
    /// 对角（Jacobi）预条件
    #[serde(rename = "diagonal")]
    Diagonal,
    /// 对角不完全 LU 分解
    #[default]
    #[serde(rename = "DILU")]
    Dilu,
}

impl std::fmt::Display for PreconditionerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Diagonal => write!(f, "diagonal"),
            Self::Dilu => write!(f, "DILU"),
        }
    }
}

/// 线性求解器字典
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearSolverDict {
    /// 求解器类型
    #[serde(default)]
    pub solver: LinearSolverKind,
    /// 预条件器类型
    #[serde(default)]
    pub preconditioner: PreconditionerKind,
    /// 绝对收敛容差
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// 相对收敛容差（0 表示只使用绝对容差）
    #[serde(default)]
    pub rel_tol: f64,
    /// 最大迭代次数
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// 最小迭代次数
    #[serde(default)]
    pub min_iter: usize,
    /// 是否逐步输出残差（trace 级别）
    #[serde(default)]
    pub verbose: bool,
}

fn default_tolerance() -> f64 { 1e-12 }
fn default_max_iter() -> usize { 1000 }

impl Default for LinearSolverDict {
    fn default() -> Self {
        Self {
            solver: LinearSolverKind::default(),
            preconditioner: PreconditionerKind::default(),
            tolerance: default_tolerance(),
            rel_tol: 0.0,
            max_iter: default_max_iter(),
            min_iter: 0,
            verbose: false,
        }
    }
}

impl LinearSolverDict {
    /// 创建求解器字典
    pub fn new(solver: LinearSolverKind, preconditioner: PreconditionerKind) -> Self {
        Self {
            solver,
            preconditioner,
            ..Default::default()
        }
    }

    /// 设置绝对/相对容差
    pub fn with_tolerance(mut self, tolerance: f64, rel_tol: f64) -> Self {
        self.tolerance = tolerance;
        self.rel_tol = rel_tol;
        self
    }

    /// 设置最大迭代次数
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// 验证字典
    pub fn validate(&self, prefix: &str) -> Result<(), ConfigError> {
        if !(self.tolerance >= 0.0) {
            return Err(ConfigError::invalid(
                format!("{prefix}.tolerance"),
                self.tolerance,
                "容差不能为负",
            ));
        }
        if !(0.0..1.0).contains(&self.rel_tol) {
            return Err(ConfigError::invalid(
                format!("{prefix}.relTol"),
                self.rel_tol,
                "relTol 必须在 [0, 1) 范围内",
            ));
        }
        if self.max_iter == 0 {
            return Err(ConfigError::invalid(
                format!("{prefix}.maxIter"),
                self.max_iter,
                "maxIter 必须为正",
            ));
        }
        if self.min_iter > self.max_iter {
            return Err(ConfigError::invalid(
                format!("{prefix}.minIter"),
                self.min_iter,
                "minIter 不能超过 maxIter",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dict_is_valid() {
        let dict = LinearSolverDict::default();
        assert!(dict.validate("solver").is_ok());
        assert_eq!(dict.solver, LinearSolverKind::PBiCGStab);
        assert_eq!(dict.preconditioner, PreconditionerKind::Dilu);
    }

    #[test]
    fn test_parse_foam_style_keys() {
        let json = r#"{"solver": "PCG", "preconditioner": "diagonal", "tolerance": 1e-8, "relTol": 0.01, "maxIter": 50}"#;
        let dict: LinearSolverDict = serde_json::from_str(json).unwrap();
        assert_eq!(dict.solver, LinearSolverKind::Pcg);
        assert_eq!(dict.preconditioner, PreconditionerKind::Diagonal);
        assert_eq!(dict.max_iter, 50);
        assert!((dict.rel_tol - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_unknown_solver_rejected() {
        let json = r#"{"solver": "GAMG"}"#;
        assert!(serde_json::from_str::<LinearSolverDict>(json).is_err());
    }

    #[test]
    fn test_invalid_rel_tol() {
        let dict = LinearSolverDict::default().with_tolerance(1e-10, 1.5);
        let err = dict.validate("turbulence.solver").unwrap_err();
        assert!(err.to_string().contains("relTol"));
    }
}
