// crates/da_adjoint/src/mesh/mod.rs

//! 网格模块
//!
//! - [`ldu_addressing`]: 内部面 LDU 寻址与指纹
//! - [`fv_mesh`]: 多面体有限体积网格及其几何量
//! - [`block`]: 结构化块网格生成器
//! - [`quality`]: 逐面质量指标（正交性、非正交角、偏斜度）

pub mod block;
pub mod fv_mesh;
pub mod ldu_addressing;
pub mod quality;

pub use block::BlockMesh;
pub use fv_mesh::{FvMesh, Patch, PatchKind};
pub use ldu_addressing::{AddressingId, LduAddressing};
