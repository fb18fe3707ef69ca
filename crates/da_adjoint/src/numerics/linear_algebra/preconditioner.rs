// crates/da_adjoint/src/numerics/linear_algebra/preconditioner.rs

//! 预条件器
//!
//! 核心操作为 `apply`: z = M⁻¹ * r。
//!
//! - [`IdentityPreconditioner`]: 无预条件
//! - [`DiagonalPreconditioner`]: 对角（Jacobi）预条件
//! - [`DiluPreconditioner`]: 对角不完全 LU，M = (D + L) D⁻¹ (D + U)，
//!   其中 D 由消元递推得到。对一维链（三对角）矩阵 M 与 A 完全相同。

use da_config::PreconditionerKind;

use super::ldu_matrix::LduMatrix;

/// 对角小于该阈值时按 1 处理
const DIAG_THRESHOLD: f64 = 1e-14;

#[inline]
fn safe_reciprocal(d: f64) -> f64 {
    if d.abs() > DIAG_THRESHOLD {
        1.0 / d
    } else {
        1.0
    }
}

/// 预条件器 trait
pub trait Preconditioner: Send + Sync {
    /// 应用预条件器: z = M⁻¹ * r
    fn apply(&self, r: &[f64], z: &mut [f64]);

    /// 预条件器名称
    fn name(&self) -> &'static str;
}

/// 恒等预条件器
#[derive(Debug, Clone, Default)]
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        z.copy_from_slice(r);
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// 对角预条件器
#[derive(Debug, Clone)]
pub struct DiagonalPreconditioner {
    inv_diag: Vec<f64>,
}

impl DiagonalPreconditioner {
    /// 从 LDU 矩阵创建
    pub fn from_matrix(matrix: &LduMatrix) -> Self {
        Self {
            inv_diag: matrix.diag().iter().map(|&d| safe_reciprocal(d)).collect(),
        }
    }
}

impl Preconditioner for DiagonalPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        for ((zi, &ri), &di) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = ri * di;
        }
    }

    fn name(&self) -> &'static str {
        "diagonal"
    }
}

/// DILU 预条件器
#[derive(Debug, Clone)]
pub struct DiluPreconditioner {
    r_d: Vec<f64>,
    upper: Vec<f64>,
    lower: Vec<f64>,
    lower_addr: Vec<usize>,
    upper_addr: Vec<usize>,
    losort: Vec<usize>,
}

impl DiluPreconditioner {
    /// 从 LDU 矩阵创建
    ///
    /// 面按上三角顺序遍历，`r_d[l]` 在被使用前已完成消元。
    pub fn from_matrix(matrix: &LduMatrix) -> Self {
        let addr = matrix.addressing();
        let l = addr.lower_addr();
        let u = addr.upper_addr();
        let upper = matrix.upper();
        let lower = matrix.lower();

        let mut r_d = matrix.diag().to_vec();
        for f in 0..matrix.n_faces() {
            r_d[u[f]] -= upper[f] * lower[f] / r_d[l[f]];
        }
        for d in &mut r_d {
            *d = safe_reciprocal(*d);
        }

        Self {
            r_d,
            upper: upper.to_vec(),
            lower: lower.to_vec(),
            lower_addr: l.to_vec(),
            upper_addr: u.to_vec(),
            losort: addr.losort().to_vec(),
        }
    }
}

impl Preconditioner for DiluPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        let (l, u) = (&self.lower_addr, &self.upper_addr);

        for ((zi, &ri), &di) in z.iter_mut().zip(r).zip(&self.r_d) {
            *zi = di * ri;
        }
        // 前代：按 neighbour 顺序消去下三角
        for &f in &self.losort {
            z[u[f]] -= self.r_d[u[f]] * self.lower[f] * z[l[f]];
        }
        // 回代：逆面序消去上三角
        for f in (0..self.upper.len()).rev() {
            z[l[f]] -= self.r_d[l[f]] * self.upper[f] * z[u[f]];
        }
    }

    fn name(&self) -> &'static str {
        "DILU"
    }
}

/// 按字典选择的预条件器
#[derive(Debug, Clone)]
pub enum LduPreconditioner {
    /// 无预条件
    Identity(IdentityPreconditioner),
    /// 对角
    Diagonal(DiagonalPreconditioner),
    /// DILU
    Dilu(DiluPreconditioner),
}

impl LduPreconditioner {
    /// 为给定矩阵创建预条件器
    pub fn new(kind: PreconditionerKind, matrix: &LduMatrix) -> Self {
        match kind {
            PreconditionerKind::None => Self::Identity(IdentityPreconditioner),
            PreconditionerKind::Diagonal => {
                Self::Diagonal(DiagonalPreconditioner::from_matrix(matrix))
            }
            PreconditionerKind::Dilu => Self::Dilu(DiluPreconditioner::from_matrix(matrix)),
        }
    }
}

impl Preconditioner for LduPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        match self {
            Self::Identity(p) => p.apply(r, z),
            Self::Diagonal(p) => p.apply(r, z),
            Self::Dilu(p) => p.apply(r, z),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Identity(p) => p.name(),
            Self::Diagonal(p) => p.name(),
            Self::Dilu(p) => p.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::LduAddressing;
    use std::sync::Arc;

    fn chain_matrix(n: usize) -> LduMatrix {
        let addr = Arc::new(LduAddressing::new(n, (0..n - 1).collect(), (1..n).collect()).unwrap());
        let upper: Vec<f64> = (0..n - 1).map(|f| -1.0 - 0.1 * f as f64).collect();
        let lower: Vec<f64> = (0..n - 1).map(|f| -0.5 - 0.2 * f as f64).collect();
        let diag: Vec<f64> = (0..n).map(|i| 4.0 + i as f64).collect();
        LduMatrix::from_parts(addr, diag, upper, lower, vec![0.0; n]).unwrap()
    }

    #[test]
    fn test_diagonal_preconditioner() {
        let m = chain_matrix(3);
        let p = DiagonalPreconditioner::from_matrix(&m);
        let mut z = [0.0; 3];
        p.apply(&[4.0, 10.0, 6.0], &mut z);
        assert_eq!(z, [1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_dilu_is_exact_for_chain() {
        let m = chain_matrix(6);
        let p = DiluPreconditioner::from_matrix(&m);
        let x: Vec<f64> = (0..6).map(|i| (i as f64 * 0.7).sin()).collect();
        let mut b = vec![0.0; 6];
        m.amul(&x, &mut b);
        let mut z = vec![0.0; 6];
        p.apply(&b, &mut z);
        for (zi, xi) in z.iter().zip(&x) {
            assert!((zi - xi).abs() < 1e-12);
        }
    }

    #[test]
    fn test_dispatch_by_kind() {
        let m = chain_matrix(3);
        assert_eq!(LduPreconditioner::new(PreconditionerKind::None, &m).name(), "none");
        assert_eq!(LduPreconditioner::new(PreconditionerKind::Dilu, &m).name(), "DILU");
    }
}
