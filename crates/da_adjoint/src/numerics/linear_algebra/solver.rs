// crates/da_adjoint/src/numerics/linear_algebra/solver.rs

//! 迭代线性求解器
//!
//! 在 LDU 矩阵上求解 `A x = b`：
//!
//! - [`PcgSolver`]: 预条件共轭梯度法（对称矩阵）
//! - [`BiCgStabSolver`]: 预条件双共轭梯度稳定法（非对称矩阵）
//! - [`LinearSolver`]: 按 [`LinearSolverDict`] 选择求解器与预条件器
//!
//! 未收敛不是错误：结果状态记录在 [`SolverResult`] 中，
//! `x` 保留迭代过程中残差最小的解。

use da_config::{LinearSolverDict, LinearSolverKind};
use serde::{Deserialize, Serialize};

use super::ldu_matrix::LduMatrix;
use super::preconditioner::{LduPreconditioner, Preconditioner};
use super::vector_ops::{axpy, copy, dot, norm2};

/// 判定停滞的分母阈值
const STAG_TOL: f64 = 1e-300;
/// BiCGStab 中断判定的相对阈值
const BREAKDOWN_TOL: f64 = 1e-12;
/// 残差超过初始残差该倍数视为发散
const DIV_FACTOR: f64 = 1e6;

/// 求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 相对收敛容差（0 表示不使用）
    pub rtol: f64,
    /// 绝对收敛容差
    pub atol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
    /// 最小迭代次数
    pub min_iter: usize,
    /// 是否逐步输出残差
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 0.0,
            atol: 1e-12,
            max_iter: 1000,
            min_iter: 0,
            verbose: false,
        }
    }
}

impl SolverConfig {
    /// 创建求解器配置
    pub fn new(atol: f64, max_iter: usize) -> Self {
        Self {
            atol,
            max_iter,
            ..Default::default()
        }
    }
}

impl From<&LinearSolverDict> for SolverConfig {
    fn from(dict: &LinearSolverDict) -> Self {
        Self {
            rtol: dict.rel_tol,
            atol: dict.tolerance,
            max_iter: dict.max_iter,
            min_iter: dict.min_iter,
            verbose: dict.verbose,
        }
    }
}

/// 求解器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 发散
    Diverged,
    /// 停滞
    Stagnated,
}

/// 求解器结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverResult {
    /// 求解状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 最终残差范数
    pub residual_norm: f64,
    /// 初始残差范数
    pub initial_residual_norm: f64,
    /// 相对残差
    pub relative_residual: f64,
}

impl SolverResult {
    /// 是否成功收敛
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    fn new(status: SolverStatus, iterations: usize, residual_norm: f64, initial: f64) -> Self {
        Self {
            status,
            iterations,
            residual_norm,
            initial_residual_norm: initial,
            relative_residual: if initial > 0.0 { residual_norm / initial } else { 0.0 },
        }
    }
}

/// 迭代过程中残差最小的解
struct BestIterate {
    x: Vec<f64>,
    norm: f64,
}

impl BestIterate {
    fn new(x: &[f64], norm: f64) -> Self {
        Self { x: x.to_vec(), norm }
    }

    fn update(&mut self, x: &[f64], norm: f64) {
        if norm < self.norm {
            self.x.copy_from_slice(x);
            self.norm = norm;
        }
    }

    /// 未收敛时回退到最佳解
    fn restore(self, x: &mut [f64], result: SolverResult) -> SolverResult {
        if self.norm < result.residual_norm {
            x.copy_from_slice(&self.x);
            SolverResult::new(
                result.status,
                result.iterations,
                self.norm,
                result.initial_residual_norm,
            )
        } else {
            result
        }
    }
}

/// 内积相对两向量范数可忽略时判定 Lanczos 中断
fn breakdown(inner: f64, a: &[f64], b: &[f64]) -> bool {
    inner.abs() <= BREAKDOWN_TOL * norm2(a) * norm2(b)
}

fn is_converged(config: &SolverConfig, iter: usize, res: f64, initial: f64) -> bool {
    iter >= config.min_iter
        && (res < config.atol || (config.rtol > 0.0 && res < config.rtol * initial))
}

fn initial_residual(matrix: &LduMatrix, b: &[f64], x: &[f64], r: &mut [f64]) -> f64 {
    matrix.amul(x, r);
    for (ri, &bi) in r.iter_mut().zip(b) {
        *ri = bi - *ri;
    }
    norm2(r)
}

/// 迭代求解器 trait
pub trait IterativeSolver {
    /// 求解 `A x = b`，`x` 输入初始猜测、输出解
    fn solve<P: Preconditioner>(
        &mut self,
        matrix: &LduMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &P,
    ) -> SolverResult;

    /// 求解器名称
    fn name(&self) -> &'static str;
}

/// 预条件共轭梯度法求解器
pub struct PcgSolver {
    config: SolverConfig,
    r: Vec<f64>,
    z: Vec<f64>,
    p: Vec<f64>,
    ap: Vec<f64>,
}

impl PcgSolver {
    /// 创建 PCG 求解器
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            r: Vec::new(),
            z: Vec::new(),
            p: Vec::new(),
            ap: Vec::new(),
        }
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            self.r = vec![0.0; n];
            self.z = vec![0.0; n];
            self.p = vec![0.0; n];
            self.ap = vec![0.0; n];
        }
    }
}

impl IterativeSolver for PcgSolver {
    fn solve<P: Preconditioner>(
        &mut self,
        matrix: &LduMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &P,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);

        let initial_norm = initial_residual(matrix, b, x, &mut self.r);
        if is_converged(&self.config, 0, initial_norm, initial_norm) {
            return SolverResult::new(SolverStatus::Converged, 0, initial_norm, initial_norm);
        }
        let mut best = BestIterate::new(x, initial_norm);

        precond.apply(&self.r, &mut self.z);
        copy(&self.z, &mut self.p);
        let mut rz = dot(&self.r, &self.z);

        for iter in 0..self.config.max_iter {
            matrix.amul(&self.p, &mut self.ap);
            let pap = dot(&self.p, &self.ap);
            if pap.abs() < STAG_TOL {
                let res = norm2(&self.r);
                let result = SolverResult::new(SolverStatus::Stagnated, iter, res, initial_norm);
                return best.restore(x, result);
            }

            let alpha = rz / pap;
            axpy(alpha, &self.p, x);
            axpy(-alpha, &self.ap, &mut self.r);

            let res_norm = norm2(&self.r);
            if self.config.verbose {
                log::trace!("PCG iter {}: residual = {:.6e}", iter + 1, res_norm);
            }
            best.update(x, res_norm);

            if is_converged(&self.config, iter + 1, res_norm, initial_norm) {
                return SolverResult::new(SolverStatus::Converged, iter + 1, res_norm, initial_norm);
            }

            precond.apply(&self.r, &mut self.z);
            let rz_new = dot(&self.r, &self.z);
            let beta = rz_new / rz;
            rz = rz_new;
            for i in 0..n {
                self.p[i] = self.z[i] + beta * self.p[i];
            }
        }

        let res = norm2(&self.r);
        let result = SolverResult::new(
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            res,
            initial_norm,
        );
        best.restore(x, result)
    }

    fn name(&self) -> &'static str {
        "PCG"
    }
}

/// 双共轭梯度稳定法求解器
pub struct BiCgStabSolver {
    config: SolverConfig,
    r: Vec<f64>,
    r0: Vec<f64>,
    p: Vec<f64>,
    v: Vec<f64>,
    s: Vec<f64>,
    t: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
}

impl BiCgStabSolver {
    /// 创建 BiCGStab 求解器
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            r: Vec::new(),
            r0: Vec::new(),
            p: Vec::new(),
            v: Vec::new(),
            s: Vec::new(),
            t: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
        }
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            self.r = vec![0.0; n];
            self.r0 = vec![0.0; n];
            self.p = vec![0.0; n];
            self.v = vec![0.0; n];
            self.s = vec![0.0; n];
            self.t = vec![0.0; n];
            self.y = vec![0.0; n];
            self.z = vec![0.0; n];
        }
    }
}

impl IterativeSolver for BiCgStabSolver {
    fn solve<P: Preconditioner>(
        &mut self,
        matrix: &LduMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &P,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);

        let initial_norm = initial_residual(matrix, b, x, &mut self.r);
        if is_converged(&self.config, 0, initial_norm, initial_norm) {
            return SolverResult::new(SolverStatus::Converged, 0, initial_norm, initial_norm);
        }
        let mut best = BestIterate::new(x, initial_norm);

        // 影子残差取初始残差，Lanczos 中断时以当前残差重启
        copy(&self.r, &mut self.r0);
        let mut rho_old = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        let mut restarted = true;
        let mut n_restarts = 0usize;
        self.v.fill(0.0);
        self.p.fill(0.0);

        for iter in 0..self.config.max_iter {
            let mut rho = dot(&self.r0, &self.r);
            if breakdown(rho, &self.r0, &self.r) {
                if restarted {
                    let res = norm2(&self.r);
                    let result = SolverResult::new(SolverStatus::Stagnated, iter, res, initial_norm);
                    return best.restore(x, result);
                }
                copy(&self.r, &mut self.r0);
                rho = dot(&self.r0, &self.r);
                restarted = true;
                n_restarts += 1;
            }

            let beta = if restarted {
                0.0
            } else {
                (rho / rho_old) * (alpha / omega)
            };
            rho_old = rho;

            // p = r + beta * (p - omega * v)
            for i in 0..n {
                self.p[i] = self.r[i] + beta * (self.p[i] - omega * self.v[i]);
            }

            // y = M⁻¹ p, v = A y
            precond.apply(&self.p, &mut self.y);
            matrix.amul(&self.y, &mut self.v);

            let r0v = dot(&self.r0, &self.v);
            if breakdown(r0v, &self.r0, &self.v) {
                if restarted {
                    let res = norm2(&self.r);
                    let result = SolverResult::new(SolverStatus::Stagnated, iter, res, initial_norm);
                    return best.restore(x, result);
                }
                copy(&self.r, &mut self.r0);
                restarted = true;
                n_restarts += 1;
                continue;
            }
            restarted = false;
            alpha = rho / r0v;

            // s = r - alpha * v
            for i in 0..n {
                self.s[i] = self.r[i] - alpha * self.v[i];
            }

            let s_norm = norm2(&self.s);
            if is_converged(&self.config, iter + 1, s_norm, initial_norm) {
                axpy(alpha, &self.y, x);
                return SolverResult::new(SolverStatus::Converged, iter + 1, s_norm, initial_norm);
            }

            // z = M⁻¹ s, t = A z
            precond.apply(&self.s, &mut self.z);
            matrix.amul(&self.z, &mut self.t);

            let tt = dot(&self.t, &self.t);
            omega = if tt < STAG_TOL {
                0.0
            } else {
                dot(&self.t, &self.s) / tt
            };

            axpy(alpha, &self.y, x);
            if omega.abs() < STAG_TOL {
                best.update(x, s_norm);
                let result =
                    SolverResult::new(SolverStatus::Stagnated, iter + 1, s_norm, initial_norm);
                return best.restore(x, result);
            }
            axpy(omega, &self.z, x);

            // r = s - omega * t
            for i in 0..n {
                self.r[i] = self.s[i] - omega * self.t[i];
            }

            let res_norm = norm2(&self.r);
            if self.config.verbose {
                log::trace!(
                    "PBiCGStab iter {}: residual = {:.6e}, restarts = {n_restarts}",
                    iter + 1,
                    res_norm
                );
            }
            best.update(x, res_norm);

            if is_converged(&self.config, iter + 1, res_norm, initial_norm) {
                return SolverResult::new(SolverStatus::Converged, iter + 1, res_norm, initial_norm);
            }
            if res_norm > initial_norm * DIV_FACTOR {
                let result =
                    SolverResult::new(SolverStatus::Diverged, iter + 1, res_norm, initial_norm);
                return best.restore(x, result);
            }
        }

        let res = norm2(&self.r);
        let result = SolverResult::new(
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            res,
            initial_norm,
        );
        best.restore(x, result)
    }

    fn name(&self) -> &'static str {
        "PBiCGStab"
    }
}

/// 按字典配置的线性求解器
#[derive(Debug, Clone)]
pub struct LinearSolver {
    dict: LinearSolverDict,
}

impl LinearSolver {
    /// 由字典创建
    pub fn from_dict(dict: &LinearSolverDict) -> Self {
        Self { dict: dict.clone() }
    }

    /// 求解字典
    pub fn dict(&self) -> &LinearSolverDict {
        &self.dict
    }

    /// 求解 `matrix * x = b`，未收敛时记录警告
    pub fn solve(
        &self,
        field_name: &str,
        matrix: &LduMatrix,
        b: &[f64],
        x: &mut [f64],
    ) -> SolverResult {
        let config = SolverConfig::from(&self.dict);
        let precond = LduPreconditioner::new(self.dict.preconditioner, matrix);

        let (name, result) = match self.dict.solver {
            LinearSolverKind::PBiCGStab => {
                let mut solver = BiCgStabSolver::new(config);
                (solver.name(), solver.solve(matrix, b, x, &precond))
            }
            LinearSolverKind::Pcg => {
                let mut solver = PcgSolver::new(config);
                (solver.name(), solver.solve(matrix, b, x, &precond))
            }
        };

        log::debug!(
            "{name}({}): Solving for {field_name}, Initial residual = {:.6e}, Final residual = {:.6e}, No Iterations {}",
            precond.name(),
            result.initial_residual_norm,
            result.residual_norm,
            result.iterations
        );
        if !result.is_converged() {
            log::warn!(
                "{name} 求解 {field_name} 未收敛 ({:?}): 残差 {:.6e} / 初始 {:.6e}, 迭代 {} 次，保留当前最佳解",
                result.status,
                result.residual_norm,
                result.initial_residual_norm,
                result.iterations
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::LduAddressing;
    use crate::numerics::linear_algebra::preconditioner::{
        DiagonalPreconditioner, IdentityPreconditioner,
    };
    use da_config::PreconditionerKind;
    use std::sync::Arc;

    /// 二维 n x n 五点格式（对称正定），可选对流使之非对称
    fn grid_matrix(n: usize, convection: f64) -> LduMatrix {
        let idx = |i: usize, j: usize| i + n * j;
        let mut faces = Vec::new();
        for j in 0..n {
            for i in 0..n {
                if i + 1 < n {
                    faces.push((idx(i, j), idx(i + 1, j)));
                }
                if j + 1 < n {
                    faces.push((idx(i, j), idx(i, j + 1)));
                }
            }
        }
        faces.sort_unstable();
        let addr = Arc::new(
            LduAddressing::new(
                n * n,
                faces.iter().map(|f| f.0).collect(),
                faces.iter().map(|f| f.1).collect(),
            )
            .unwrap(),
        );
        let mut m = LduMatrix::new(addr);
        for f in 0..faces.len() {
            m.upper_mut()[f] = -1.0;
            m.lower_mut()[f] = -1.0 - convection;
        }
        m.neg_sum_diag();
        for d in m.diag_mut() {
            *d += 0.5;
        }
        m
    }

    #[test]
    fn test_pcg_converges() {
        let m = grid_matrix(8, 0.0);
        let b = vec![1.0; 64];
        let mut x = vec![0.0; 64];
        let mut solver = PcgSolver::new(SolverConfig::new(1e-12, 200));
        let result = solver.solve(&m, &b, &mut x, &DiagonalPreconditioner::from_matrix(&m));
        assert!(result.is_converged());

        let mut r = vec![0.0; 64];
        assert!(initial_residual(&m, &b, &x, &mut r) < 1e-10);
    }

    #[test]
    fn test_bicgstab_nonsymmetric() {
        let m = grid_matrix(8, 0.8);
        let b: Vec<f64> = (0..64).map(|i| (i as f64).cos()).collect();
        let mut x = vec![0.0; 64];
        let mut solver = BiCgStabSolver::new(SolverConfig::new(1e-12, 500));
        let result = solver.solve(&m, &b, &mut x, &IdentityPreconditioner);
        assert!(result.is_converged(), "{result:?}");

        let mut ax = vec![0.0; 64];
        m.amul(&x, &mut ax);
        for (a, bi) in ax.iter().zip(&b) {
            assert!((a - bi).abs() < 1e-9);
        }
    }

    #[test]
    fn test_dilu_accelerates_bicgstab() {
        let m = grid_matrix(10, 0.5);
        let b = vec![1.0; 100];

        let mut x_none = vec![0.0; 100];
        let none = BiCgStabSolver::new(SolverConfig::new(1e-10, 500)).solve(
            &m,
            &b,
            &mut x_none,
            &IdentityPreconditioner,
        );
        let mut x_dilu = vec![0.0; 100];
        let dilu = BiCgStabSolver::new(SolverConfig::new(1e-10, 500)).solve(
            &m,
            &b,
            &mut x_dilu,
            &LduPreconditioner::new(PreconditionerKind::Dilu, &m),
        );
        assert!(none.is_converged() && dilu.is_converged());
        assert!(dilu.iterations <= none.iterations);
    }

    #[test]
    fn test_bicgstab_restarts_after_breakdown() {
        // 均匀右端项在该网格上使初始影子残差与后续残差正交
        let m = grid_matrix(10, 0.5);
        let b = vec![1.0; 100];
        let mut x = vec![0.0; 100];
        let result = BiCgStabSolver::new(SolverConfig::new(1e-10, 500)).solve(
            &m,
            &b,
            &mut x,
            &IdentityPreconditioner,
        );
        assert_eq!(result.status, SolverStatus::Converged, "{result:?}");

        let mut r = vec![0.0; 100];
        assert!(initial_residual(&m, &b, &x, &mut r) < 1e-9);
    }

    #[test]
    fn test_already_converged() {
        let m = grid_matrix(3, 0.0);
        let x_exact = vec![0.25; 9];
        let mut b = vec![0.0; 9];
        m.amul(&x_exact, &mut b);
        let mut x = x_exact.clone();
        let result = PcgSolver::new(SolverConfig::new(1e-10, 100)).solve(
            &m,
            &b,
            &mut x,
            &IdentityPreconditioner,
        );
        assert!(result.is_converged());
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_max_iterations_keeps_best_iterate() {
        let m = grid_matrix(10, 0.5);
        let b = vec![1.0; 100];
        let mut x = vec![0.0; 100];
        let dict = LinearSolverDict::default().with_tolerance(1e-30, 0.0).with_max_iter(3);
        let result = LinearSolver::from_dict(&dict).solve("psi", &m, &b, &mut x);
        assert_eq!(result.status, SolverStatus::MaxIterationsReached);

        let mut r = vec![0.0; 100];
        let actual = initial_residual(&m, &b, &x, &mut r);
        assert!((actual - result.residual_norm).abs() <= 1e-9 * actual.max(1.0));
        assert!(result.residual_norm < result.initial_residual_norm);
    }
}
