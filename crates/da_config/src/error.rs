// crates/da_config/src/error.rs

//! 配置层错误类型

use da_foundation::DaError;

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 无效值
    #[error("无效值 '{key}': {value} - {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },

    /// 缺失配置
    #[error("缺失配置: {0}")]
    Missing(String),
}

impl ConfigError {
    /// 构造无效值错误
    pub fn invalid(key: impl Into<String>, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for DaError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(source) => DaError::Io {
                message: source.to_string(),
                source: Some(source),
            },
            ConfigError::Parse(message) => DaError::serialization(message),
            ConfigError::InvalidValue { key, value, reason } => {
                DaError::invalid_config(key, value, reason)
            }
            ConfigError::Missing(key) => DaError::missing_config(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("coeffKS", -1.0, "必须为正");
        assert!(err.to_string().contains("coeffKS"));
    }

    #[test]
    fn test_into_da_error() {
        let err: DaError = ConfigError::invalid("metric", "volume", "未知指标").into();
        assert!(matches!(err, DaError::InvalidConfig { .. }));
        assert!(err.is_fatal());

        let err: DaError = ConfigError::Missing("turbulence.model".into()).into();
        assert!(matches!(err, DaError::MissingConfig { .. }));
    }
}
