// crates/da_foundation/src/lib.rs

//! DA Foundation Layer (Layer 1)
//!
//! 基础层，提供整个工作区共享的最小抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `DaError` / `DaResult`
//! - [`scalar`]: 计算标量类型与数值常量（SMALL、VSMALL 等）
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: da_cli        ─> 命令行
//! Layer 3: da_adjoint    ─> 网格、LDU 矩阵、湍流伴随、目标函数、重构
//! Layer 2: da_config     ─> DaOptions、CaseConfig
//! Layer 1: da_foundation ─> DaError、Scalar (本层)
//! ```
//!
//! # 示例
//!
//! ```
//! use da_foundation::{DaError, DaResult};
//!
//! fn lookup(name: &str) -> DaResult<usize> {
//!     match name {
//!         "nuTilda" => Ok(0),
//!         _ => Err(DaError::invalid_state(name)),
//!     }
//! }
//!
//! assert!(lookup("nuTilda").is_ok());
//! assert!(lookup("k").is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod scalar;

/// 层级标识
pub const LAYER: u8 = 1;

// 重导出常用类型
pub use error::{DaError, DaResult};
pub use scalar::{Scalar, GREAT, ROOT_VSMALL, SMALL, VSMALL};

/// 条件不满足时提前返回错误
///
/// ```
/// use da_foundation::{ensure, DaError, DaResult};
///
/// fn positive(x: f64) -> DaResult<f64> {
///     ensure!(x > 0.0, DaError::invalid_input("x 必须为正"));
///     Ok(x)
/// }
///
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}

