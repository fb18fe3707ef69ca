// crates/da_adjoint/src/numerics/mod.rs

//! 数值离散与线性代数
//!
//! - [`fvm`]: 隐式离散（对流、拉普拉斯）生成 LDU 矩阵
//! - [`fvc`]: 显式运算（通量、插值、梯度、涡量）
//! - [`linear_algebra`]: LDU 矩阵与 Krylov 求解器

pub mod fvc;
pub mod fvm;
pub mod linear_algebra;
