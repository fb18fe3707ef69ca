// crates/da_adjoint/src/adjoint/ad.rs

//! 前向自动微分驱动
//!
//! [`state_jacobian`] 以 `Dual64` 逐列播种状态，对任意以
//! [`LduScalar`](crate::numerics::linear_algebra::LduScalar) 写成的残差函数求
//! `∂R_i/∂ψ_j`。湍流模型的组装对标量泛型，系数、边界值与源项随状态一起求导。
//! 结果可与声明的连接层级比对，检查是否遗漏了残差的实际依赖。

use num_dual::Dual64;

use crate::mesh::LduAddressing;

/// 稠密雅可比 `∂R_i/∂ψ_j`（行主序）
///
/// 每列调用一次 `residual`，第 `j` 列播种 `ψ_j` 的导数为 1。
/// 行数取残差长度，状态为空时返回空矩阵。
pub fn state_jacobian<F>(state: &[f64], mut residual: F) -> Vec<Vec<f64>>
where
    F: FnMut(&[Dual64]) -> Vec<Dual64>,
{
    let n = state.len();
    let mut seeded: Vec<Dual64> = state.iter().map(|&v| Dual64::from(v)).collect();
    let mut jac: Vec<Vec<f64>> = Vec::new();

    for j in 0..n {
        seeded[j].eps = 1.0;
        let res = residual(&seeded);
        if jac.is_empty() {
            jac = vec![vec![0.0; n]; res.len()];
        }
        for (row, r) in jac.iter_mut().zip(&res) {
            row[j] = r.eps;
        }
        seeded[j].eps = 0.0;
    }
    jac
}

/// 非零元的连接层级：0 为本单元，1 为面相邻，`None` 为更远
pub fn connectivity_level(addr: &LduAddressing, row: usize, col: usize) -> Option<usize> {
    if row == col {
        Some(0)
    } else if addr.cell_neighbours(row).contains(&col) {
        Some(1)
    } else {
        None
    }
}

/// 雅可比中超出 `max_level` 的非零元位置
pub fn undeclared_entries(
    addr: &LduAddressing,
    jac: &[Vec<f64>],
    max_level: usize,
    tol: f64,
) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for (i, row) in jac.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            if v.abs() <= tol {
                continue;
            }
            match connectivity_level(addr, i, j) {
                Some(level) if level <= max_level => {}
                _ => out.push((i, j)),
            }
        }
    }
    out
}
