// crates/da_adjoint/src/adjoint/pseudo_system.rs

//! 伪系统（转置系统）
//!
//! 由前向系统交换上下三角得到，对角不变、源项清空，右端项由调用方给出。
//! 记录构造时的寻址指纹，寻址变化后必须重建。

use da_foundation::{DaError, DaResult};

use crate::mesh::{AddressingId, LduAddressing};
use crate::numerics::linear_algebra::{LduMatrix, LinearSolver, SolverResult};

/// 伪系统
#[derive(Debug, Clone)]
pub struct PseudoSystem {
    matrix: LduMatrix,
    built_from: AddressingId,
}

impl PseudoSystem {
    /// 由前向系统构造
    pub fn from_forward(forward: &LduMatrix) -> Self {
        let built_from = forward.addressing().id();
        log::trace!(
            "构造伪系统: {} 单元, {} 内部面",
            built_from.n_cells,
            built_from.n_faces
        );
        Self {
            matrix: forward.transposed(),
            built_from,
        }
    }

    /// 转置后的矩阵
    #[inline]
    pub fn matrix(&self) -> &LduMatrix {
        &self.matrix
    }

    /// 构造时的寻址指纹
    #[inline]
    pub fn built_from(&self) -> AddressingId {
        self.built_from
    }

    /// 检查寻址是否仍与当前网格一致
    pub fn check(&self, current: &LduAddressing) -> DaResult<()> {
        let id = current.id();
        if id != self.built_from {
            return Err(DaError::stale_system(format!(
                "构造时寻址 {:?}, 当前寻址 {:?}",
                self.built_from, id
            )));
        }
        Ok(())
    }

    /// 以给定右端项求解 `Aᵀ x = rhs`
    ///
    /// `x` 输入为初值，输出为解（未收敛时为最佳迭代值）。
    pub fn solve(
        &self,
        current: &LduAddressing,
        solver: &LinearSolver,
        field_name: &str,
        rhs: &[f64],
        x: &mut [f64],
    ) -> DaResult<SolverResult> {
        self.check(current)?;
        DaError::check_size("rhs", self.matrix.n_cells(), rhs.len())?;
        DaError::check_size("x", self.matrix.n_cells(), x.len())?;
        Ok(solver.solve(field_name, &self.matrix, rhs, x))
    }
}
