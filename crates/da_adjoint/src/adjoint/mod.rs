// crates/da_adjoint/src/adjoint/mod.rs

//! 离散伴随支撑
//!
//! - [`pseudo_system`]: 转置伪系统及其过期检查
//! - [`state_info`]: 残差-状态分层连接关系
//! - [`ad`]: 以前向自动微分求残差雅可比

pub mod ad;
pub mod pseudo_system;
pub mod state_info;

pub use pseudo_system::PseudoSystem;
pub use state_info::StateDependencyGraph;
