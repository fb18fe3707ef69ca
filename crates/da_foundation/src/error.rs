// crates/da_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `DaError` 枚举和 `DaResult` 类型别名。
//!
//! # 错误分级
//!
//! 1. **致命错误**: 配置无效（如未知的网格质量指标）、数值溢出
//!    （如 KS 求和超过 1e200）。直接返回 `Err`，由调用方终止运行。
//! 2. **可恢复问题**: 线性求解器未收敛。不作为错误返回，
//!    由求解器结果状态表达并记录警告日志，继续使用当前最佳迭代值。
//!
//! # 示例
//!
//! ```
//! use da_foundation::error::{DaError, DaResult};
//!
//! fn check_metric(metric: &str) -> DaResult<()> {
//!     Err(DaError::invalid_config("metric", metric, "未知的网格质量指标"))
//! }
//! assert!(check_metric("aspectRatio").is_err());
//! ```

use thiserror::Error;

/// 统一结果类型
pub type DaResult<T> = Result<T, DaError>;

/// 伴随计算错误类型
#[derive(Error, Debug)]
pub enum DaError {
    // ========================================================================
    // 状态与模型
    // ========================================================================

    /// 无效状态名（没有对应的已组装线性系统）
    #[error("无效状态: '{name}' 没有对应的已组装线性系统")]
    InvalidState {
        /// 请求的状态名
        name: String,
    },

    /// 未知的模型类型
    #[error("未知的{kind}类型: '{name}' (可选: {available:?})")]
    UnknownModel {
        /// 模型类别（如 "湍流模型"、"目标函数"）
        kind: &'static str,
        /// 请求的类型名
        name: String,
        /// 可用类型列表
        available: Vec<&'static str>,
    },

    /// 伪系统过期（网格连接关系已变化，必须重建）
    #[error("伪系统已过期: {message}")]
    StaleSystem {
        /// 具体说明
        message: String,
    },

    // ========================================================================
    // 数值
    // ========================================================================

    /// 数值溢出（致命）
    #[error("数值溢出: {context} (值 = {value:e})")]
    NumericalOverflow {
        /// 发生溢出的位置和建议
        context: String,
        /// 溢出时的值
        value: f64,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    // ========================================================================
    // 网格与输入
    // ========================================================================

    /// 无效网格拓扑
    #[error("无效的网格拓扑: {message}")]
    InvalidMesh {
        /// 具体错误信息
        message: String,
    },

    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    // ========================================================================
    // 配置
    // ========================================================================

    /// 缺少配置项
    #[error("缺少必需的配置项: {key}")]
    MissingConfig {
        /// 配置键名
        key: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    // ========================================================================
    // IO 与并行
    // ========================================================================

    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        #[source]
        /// 可选的底层 IO 错误
        source: Option<std::io::Error>,
    },

    /// 序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        /// 序列化失败原因
        message: String,
    },

    /// 并行通信失败
    #[error("并行通信失败: {message}")]
    Communication {
        /// 失败原因
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl DaError {
    /// 无效状态名
    pub fn invalid_state(name: impl Into<String>) -> Self {
        Self::InvalidState { name: name.into() }
    }

    /// 未知模型类型
    pub fn unknown_model(
        kind: &'static str,
        name: impl Into<String>,
        available: Vec<&'static str>,
    ) -> Self {
        Self::UnknownModel {
            kind,
            name: name.into(),
            available,
        }
    }

    /// 伪系统过期
    pub fn stale_system(message: impl Into<String>) -> Self {
        Self::StaleSystem {
            message: message.into(),
        }
    }

    /// 数值溢出
    pub fn overflow(context: impl Into<String>, value: f64) -> Self {
        Self::NumericalOverflow {
            context: context.into(),
            value,
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 无效网格
    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            message: message.into(),
        }
    }

    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 缺少配置
    pub fn missing_config(key: impl Into<String>) -> Self {
        Self::MissingConfig { key: key.into() }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 序列化错误
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// 并行通信失败
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// 是否为致命的配置/数值错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NumericalOverflow { .. }
                | Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::UnknownModel { .. }
        )
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl DaError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> DaResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> DaResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

impl From<std::io::Error> for DaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_display() {
        let err = DaError::invalid_state("kTilda");
        assert!(err.to_string().contains("kTilda"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_overflow_is_fatal() {
        let err = DaError::overflow("KS 求和项过大, 请减小 coeffKS", 2e200);
        assert!(err.is_fatal());
        assert!(err.to_string().contains("coeffKS"));
    }

    #[test]
    fn test_unknown_model_lists_options() {
        let err = DaError::unknown_model("湍流模型", "kOmega", vec!["laminar", "SpalartAllmarasFv3"]);
        let msg = err.to_string();
        assert!(msg.contains("kOmega"));
        assert!(msg.contains("SpalartAllmarasFv3"));
    }

    #[test]
    fn test_check_size() {
        assert!(DaError::check_size("diag", 3, 3).is_ok());
        assert!(matches!(
            DaError::check_size("diag", 3, 2),
            Err(DaError::SizeMismatch { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn test_check_index() {
        assert!(DaError::check_index("Cell", 2, 3).is_ok());
        assert!(DaError::check_index("Cell", 3, 3).is_err());
    }

    #[test]
    fn test_ensure_macro() {
        fn check(value: i32) -> DaResult<i32> {
            crate::ensure!(value > 0, DaError::invalid_input("value must be positive"));
            Ok(value)
        }
        assert!(check(1).is_ok());
        assert!(check(-1).is_err());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DaError = io.into();
        assert!(err.to_string().contains("IO错误"));
    }
}
