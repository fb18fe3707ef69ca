// crates/da_config/src/lib.rs

//! DA Config Layer (Layer 2)
//!
//! 配置层，提供伴随计算的全部运行参数。所有结构均可 JSON 序列化，
//! 字段名沿用宿主框架字典的键名（`solverName`、`coeffKS`、
//! `includeProcPatches` 等），便于直接复用既有算例配置。
//!
//! # 模块概览
//!
//! - [`options`]: `DaOptions` 伴随选项（湍流、目标函数）
//! - [`linear_solver`]: `LinearSolverDict` 线性求解器字典
//! - [`case`]: `CaseConfig` 算例配置（网格、来流、分区）
//! - [`error`]: 配置错误类型
//!
//! # 设计原则
//!
//! 1. **全 f64 配置**: 数值参数统一使用 f64
//! 2. **字符串类型标签**: 湍流模型和目标函数类型保留为字符串，
//!    由上层工厂函数解析为封闭枚举，未知名称在构造时报错
//! 3. **先加载后验证**: `from_file` 在返回前调用 `validate`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod case;
pub mod error;
pub mod linear_solver;
pub mod options;

/// 层级标识
pub const LAYER: u8 = 2;

// 重导出核心类型
pub use case::{BlockMeshConfig, CaseConfig, DecomposeConfig, FlowConfig};
pub use error::ConfigError;
pub use linear_solver::{LinearSolverDict, LinearSolverKind, PreconditionerKind};
pub use options::{DaOptions, ObjFuncDict, TurbulenceOptions};
