// crates/da_foundation/src/scalar.rs

//! 标量类型与数值常量
//!
//! 伴随计算统一使用双精度。常量取值与有限体积宿主框架的约定一致，
//! 保证前向组装、残差计算和伴随求解使用完全相同的截断阈值。

/// 计算用标量类型
pub type Scalar = f64;

/// 小量，用于避免除零（如 `max(chi, SMALL)`）
pub const SMALL: Scalar = 1.0e-15;

/// 极小量
pub const VSMALL: Scalar = 1.0e-300;

/// 极小量的平方根，用于几何量归一化
pub const ROOT_VSMALL: Scalar = 1.0e-150;

/// 大数
pub const GREAT: Scalar = 1.0e15;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_ordering() {
        assert!(VSMALL < ROOT_VSMALL);
        assert!(ROOT_VSMALL < SMALL);
        assert!(SMALL * GREAT > 0.99 && SMALL * GREAT < 1.01);
    }
}
