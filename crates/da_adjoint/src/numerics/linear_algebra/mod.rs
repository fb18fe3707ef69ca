// crates/da_adjoint/src/numerics/linear_algebra/mod.rs

//! LDU 稀疏线性代数
//!
//! - [`ldu_matrix`]: LDU 矩阵、泛型残差内核、松弛
//! - [`preconditioner`]: 恒等、对角、DILU 预条件器
//! - [`solver`]: PCG / PBiCGStab 与按字典分派的 [`LinearSolver`]
//! - [`vector_ops`]: 向量运算

pub mod ldu_matrix;
pub mod preconditioner;
pub mod solver;
pub mod vector_ops;

pub use ldu_matrix::{
    ldu_residual, max_re, min_re, LduBands, LduCoefficients, LduMatrix, LduResidualNormalization,
    LduScalar,
};
pub use preconditioner::{
    DiagonalPreconditioner, DiluPreconditioner, IdentityPreconditioner, LduPreconditioner,
    Preconditioner,
};
pub use solver::{
    BiCgStabSolver, IterativeSolver, LinearSolver, PcgSolver, SolverConfig, SolverResult,
    SolverStatus,
};
