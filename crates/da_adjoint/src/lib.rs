// crates/da_adjoint/src/lib.rs

//! DA Adjoint Layer (Layer 3)
//!
//! 离散伴随支撑库，提供：
//! - 多面体有限体积网格与逐面质量指标 (mesh)
//! - 体场、面通量场与边界条件 (fields)
//! - 隐式/显式离散与 LDU 线性代数 (numerics)
//! - SA-Fv3 湍流模型的伴随操作 (turbulence)
//! - 转置伪系统、状态连接关系、残差雅可比 (adjoint)
//! - 目标函数 (objective)
//! - 分区分解、归约与场重构 (parallel)
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: da_cli        ─> 命令行
//! Layer 3: da_adjoint    ─> 网格、LDU 矩阵、湍流伴随、目标函数、重构 (本层)
//! Layer 2: da_config     ─> DaOptions、CaseConfig
//! Layer 1: da_foundation ─> DaError、Scalar
//! ```
//!
//! # 约定
//!
//! LDU 方程统一写成 `A x = source`，残差 `R = A x - source`。
//! `upper[f]` 位于 owner 行、neighbour 列，`lower[f]` 位于 neighbour 行、owner 列。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adjoint;
pub mod fields;
pub mod mesh;
pub mod numerics;
pub mod objective;
pub mod parallel;
pub mod turbulence;

/// 层级标识
pub const LAYER: u8 = 3;

// 重导出常用类型
pub use adjoint::{PseudoSystem, StateDependencyGraph};
pub use fields::{
    BoundaryKind, FlowFields, PatchField, SurfaceScalarField, VolField, VolScalarField,
    VolVectorField,
};
pub use mesh::{AddressingId, BlockMesh, FvMesh, LduAddressing, Patch, PatchKind};
pub use numerics::linear_algebra::{
    LduCoefficients, LduMatrix, LduResidualNormalization, LinearSolver, SolverResult,
    SolverStatus,
};
pub use objective::{MeshQualityKs, MeshQualityMetric, ObjFuncKind, Objective, ObjectiveFunction};
pub use parallel::{
    decompose, simple_x_split, Communicator, ProcAddressing, ProcFieldSet, ProcessorMesh,
    ReconstructPar, ReconstructedFields, SerialCommunicator, ThreadCommunicator, ThreadGroup,
};
pub use turbulence::{
    AdjointTurbulence, Laminar, SaCoefficients, SpalartAllmarasFv3, TurbulenceModel,
    TurbulenceModelKind,
};
