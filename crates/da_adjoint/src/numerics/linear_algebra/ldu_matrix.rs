// crates/da_adjoint/src/numerics/linear_algebra/ldu_matrix.rs

//! LDU 格式稀疏矩阵
//!
//! 对角、上三角、下三角系数分别存储：
//!
//! - 行 `l = lower_addr[f]` 在列 `u = upper_addr[f]` 处的系数为 `upper[f]`
//! - 行 `u` 在列 `l` 处的系数为 `lower[f]`
//!
//! 方程形式为 `A x = source`，边界贡献在组装时并入对角与源项。
//!
//! 残差内核 [`ldu_residual`] 对标量类型泛型，`f64` 与 `Dual64`
//! 走完全相同的运算顺序，前向自动微分的结果因此与手写残差逐位对应。

use da_foundation::{DaError, DaResult};
use num_dual::Dual64;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use crate::mesh::LduAddressing;

/// 残差内核与方程组装支持的标量
///
/// 除四则运算外只需要组装中实际出现的初等函数。`Dual64` 的实现按链式法则
/// 直接写出导数部分。
pub trait LduScalar:
    Copy
    + Send
    + Sync
    + From<f64>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// 实部
    fn re(self) -> f64;

    /// 整数次幂
    fn powi(self, n: i32) -> Self;

    /// 实数次幂
    fn powf(self, p: f64) -> Self;
}

impl LduScalar for f64 {
    #[inline]
    fn re(self) -> f64 {
        self
    }

    #[inline]
    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }

    #[inline]
    fn powf(self, p: f64) -> Self {
        f64::powf(self, p)
    }
}

/// 值为 `value`、导数为 `x.eps * slope` 的对偶数
#[inline]
fn chain(x: Dual64, value: f64, slope: f64) -> Dual64 {
    let mut d = Dual64::from(value);
    d.eps = x.eps * slope;
    d
}

impl LduScalar for Dual64 {
    #[inline]
    fn re(self) -> f64 {
        self.re
    }

    fn powi(self, n: i32) -> Self {
        let slope = match n {
            0 => 0.0,
            _ => f64::from(n) * self.re.powi(n - 1),
        };
        chain(self, self.re.powi(n), slope)
    }

    fn powf(self, p: f64) -> Self {
        chain(self, self.re.powf(p), p * self.re.powf(p - 1.0))
    }
}

/// 按实部取 `max(x, floor)`，`f64::max` 的泛型版本
#[inline]
pub fn max_re<T: LduScalar>(x: T, floor: f64) -> T {
    if x.re() >= floor {
        x
    } else {
        T::from(floor)
    }
}

/// 按实部取 `min(x, cap)`
#[inline]
pub fn min_re<T: LduScalar>(x: T, cap: f64) -> T {
    if x.re() <= cap {
        x
    } else {
        T::from(cap)
    }
}

/// 残差归一化方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LduResidualNormalization {
    /// 不归一化
    #[default]
    None,
    /// 除以单元体积
    CellVolume,
}

/// 由 LDU 系数计算残差 `R = A x - source`
///
/// 运算顺序固定：先 `diag*x - source`，再按面序累加上三角（owner 行）
/// 与下三角（neighbour 行）贡献，最后归一化。
#[allow(clippy::too_many_arguments)]
pub fn ldu_residual<T: LduScalar>(
    addr: &LduAddressing,
    diag: &[T],
    upper: &[T],
    lower: &[T],
    source: &[T],
    psi: &[T],
    volumes: Option<&[f64]>,
    res: &mut [T],
) {
    let l = addr.lower_addr();
    let u = addr.upper_addr();

    for i in 0..addr.n_cells() {
        res[i] = diag[i] * psi[i] - source[i];
    }
    for f in 0..addr.n_faces() {
        res[l[f]] = res[l[f]] + upper[f] * psi[u[f]];
        res[u[f]] = res[u[f]] + lower[f] * psi[l[f]];
    }
    if let Some(v) = volumes {
        for i in 0..addr.n_cells() {
            res[i] = res[i] / T::from(v[i]);
        }
    }
}

/// 对外暴露的 LDU 三带系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LduCoefficients {
    /// 对角（长度 n_cells）
    pub diag: Vec<f64>,
    /// 上三角（长度 n_internal_faces）
    pub upper: Vec<f64>,
    /// 下三角（长度 n_internal_faces）
    pub lower: Vec<f64>,
}

/// LDU 矩阵
#[derive(Debug, Clone)]
pub struct LduMatrix {
    addr: Arc<LduAddressing>,
    diag: Vec<f64>,
    upper: Vec<f64>,
    lower: Vec<f64>,
    source: Vec<f64>,
}

impl LduMatrix {
    /// 创建零矩阵
    pub fn new(addr: Arc<LduAddressing>) -> Self {
        let (n, nf) = (addr.n_cells(), addr.n_faces());
        Self {
            addr,
            diag: vec![0.0; n],
            upper: vec![0.0; nf],
            lower: vec![0.0; nf],
            source: vec![0.0; n],
        }
    }

    /// 由系数创建，检查长度
    pub fn from_parts(
        addr: Arc<LduAddressing>,
        diag: Vec<f64>,
        upper: Vec<f64>,
        lower: Vec<f64>,
        source: Vec<f64>,
    ) -> DaResult<Self> {
        DaError::check_size("diag", addr.n_cells(), diag.len())?;
        DaError::check_size("source", addr.n_cells(), source.len())?;
        DaError::check_size("upper", addr.n_faces(), upper.len())?;
        DaError::check_size("lower", addr.n_faces(), lower.len())?;
        Ok(Self {
            addr,
            diag,
            upper,
            lower,
            source,
        })
    }

    /// 寻址
    #[inline]
    pub fn addressing(&self) -> &LduAddressing {
        &self.addr
    }

    /// 行数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.diag.len()
    }

    /// 非对角系数对数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.upper.len()
    }

    /// 对角
    #[inline]
    pub fn diag(&self) -> &[f64] {
        &self.diag
    }

    /// 对角（可变）
    #[inline]
    pub fn diag_mut(&mut self) -> &mut [f64] {
        &mut self.diag
    }

    /// 上三角
    #[inline]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// 上三角（可变）
    #[inline]
    pub fn upper_mut(&mut self) -> &mut [f64] {
        &mut self.upper
    }

    /// 下三角
    #[inline]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// 下三角（可变）
    #[inline]
    pub fn lower_mut(&mut self) -> &mut [f64] {
        &mut self.lower
    }

    /// 源项
    #[inline]
    pub fn source(&self) -> &[f64] {
        &self.source
    }

    /// 源项（可变）
    #[inline]
    pub fn source_mut(&mut self) -> &mut [f64] {
        &mut self.source
    }

    /// 是否对称
    pub fn is_symmetric(&self) -> bool {
        self.upper
            .iter()
            .zip(&self.lower)
            .all(|(u, l)| (u - l).abs() <= 1e-14 * u.abs().max(l.abs()).max(1.0))
    }

    /// 复制三带系数
    pub fn coefficients(&self) -> LduCoefficients {
        LduCoefficients {
            diag: self.diag.clone(),
            upper: self.upper.clone(),
            lower: self.lower.clone(),
        }
    }

    /// `y = A x`
    pub fn amul(&self, x: &[f64], y: &mut [f64]) {
        let l = self.addr.lower_addr();
        let u = self.addr.upper_addr();
        for i in 0..self.n_cells() {
            y[i] = self.diag[i] * x[i];
        }
        for f in 0..self.n_faces() {
            y[l[f]] += self.upper[f] * x[u[f]];
            y[u[f]] += self.lower[f] * x[l[f]];
        }
    }

    /// `y = Aᵀ x`
    pub fn tmul(&self, x: &[f64], y: &mut [f64]) {
        let l = self.addr.lower_addr();
        let u = self.addr.upper_addr();
        for i in 0..self.n_cells() {
            y[i] = self.diag[i] * x[i];
        }
        for f in 0..self.n_faces() {
            y[l[f]] += self.lower[f] * x[u[f]];
            y[u[f]] += self.upper[f] * x[l[f]];
        }
    }

    /// 残差 `R = A psi - source`
    pub fn residual(
        &self,
        psi: &[f64],
        normalization: LduResidualNormalization,
        volumes: &[f64],
    ) -> DaResult<Vec<f64>> {
        DaError::check_size("psi", self.n_cells(), psi.len())?;
        let volumes = match normalization {
            LduResidualNormalization::None => None,
            LduResidualNormalization::CellVolume => {
                DaError::check_size("volumes", self.n_cells(), volumes.len())?;
                Some(volumes)
            }
        };
        let mut res = vec![0.0; self.n_cells()];
        ldu_residual(
            &self.addr,
            &self.diag,
            &self.upper,
            &self.lower,
            &self.source,
            psi,
            volumes,
            &mut res,
        );
        Ok(res)
    }

    /// 每行非对角系数绝对值之和
    pub fn sum_mag_off_diag(&self) -> Vec<f64> {
        let l = self.addr.lower_addr();
        let u = self.addr.upper_addr();
        let mut sum = vec![0.0; self.n_cells()];
        for f in 0..self.n_faces() {
            sum[l[f]] += self.upper[f].abs();
            sum[u[f]] += self.lower[f].abs();
        }
        sum
    }

    /// 对角取为所在列非对角系数之和的相反数
    ///
    /// 用于由面系数生成守恒离散的对角。
    pub fn neg_sum_diag(&mut self) {
        let l = self.addr.lower_addr();
        let u = self.addr.upper_addr();
        for f in 0..self.upper.len() {
            self.diag[l[f]] -= self.lower[f];
            self.diag[u[f]] -= self.upper[f];
        }
    }

    /// 隐式欠松弛
    ///
    /// 先把对角提升到不小于非对角绝对值之和（对角占优），再除以 `alpha`，
    /// 并把对角增量乘当前解加入源项。收敛解 `psi` 仍满足松弛后的方程。
    /// `alpha <= 0` 时不做任何处理。
    pub fn relax(&mut self, psi: &[f64], alpha: f64) -> DaResult<()> {
        if alpha <= 0.0 {
            return Ok(());
        }
        DaError::check_size("psi", self.n_cells(), psi.len())?;

        let sum_off = self.sum_mag_off_diag();
        for i in 0..self.n_cells() {
            let d0 = self.diag[i];
            let d = d0.abs().max(sum_off[i]) / alpha;
            self.source[i] += (d - d0) * psi[i];
            self.diag[i] = d;
        }
        Ok(())
    }

    /// 交换上下三角、保留对角、清空源项
    pub fn transposed(&self) -> Self {
        Self {
            addr: Arc::clone(&self.addr),
            diag: self.diag.clone(),
            upper: self.lower.clone(),
            lower: self.upper.clone(),
            source: vec![0.0; self.n_cells()],
        }
    }

    /// 稠密矩阵（行主序），仅用于小规模检查
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        let n = self.n_cells();
        let mut a = vec![vec![0.0; n]; n];
        for (i, &d) in self.diag.iter().enumerate() {
            a[i][i] = d;
        }
        let l = self.addr.lower_addr();
        let u = self.addr.upper_addr();
        for f in 0..self.n_faces() {
            a[l[f]][u[f]] += self.upper[f];
            a[u[f]][l[f]] += self.lower[f];
        }
        a
    }
}

/// 组装阶段的泛型 LDU 系数
///
/// 与 [`LduMatrix`] 布局相同但不持有寻址，标量可为 `f64` 或 `Dual64`。
/// 湍流方程在此类型上组装，`f64` 结果再转成 [`LduMatrix`] 求解。
#[derive(Debug, Clone)]
pub struct LduBands<T> {
    /// 对角
    pub diag: Vec<T>,
    /// 上三角
    pub upper: Vec<T>,
    /// 下三角
    pub lower: Vec<T>,
    /// 源项
    pub source: Vec<T>,
}

impl<T: LduScalar> LduBands<T> {
    /// 全零系数
    pub fn zeros(n_cells: usize, n_faces: usize) -> Self {
        Self {
            diag: vec![T::from(0.0); n_cells],
            upper: vec![T::from(0.0); n_faces],
            lower: vec![T::from(0.0); n_faces],
            source: vec![T::from(0.0); n_cells],
        }
    }

    /// 把 `f64` 矩阵当作常数提升
    pub fn lift(matrix: &LduMatrix) -> Self {
        let lift = |v: &[f64]| v.iter().map(|&x| T::from(x)).collect::<Vec<T>>();
        Self {
            diag: lift(&matrix.diag),
            upper: lift(&matrix.upper),
            lower: lift(&matrix.lower),
            source: lift(&matrix.source),
        }
    }

    /// `self -= other`，两者须来自同一寻址
    pub fn sub_assign(&mut self, other: &Self) {
        let sub = |a: &mut [T], b: &[T]| {
            for (x, &y) in a.iter_mut().zip(b) {
                *x = *x - y;
            }
        };
        sub(&mut self.diag, &other.diag);
        sub(&mut self.upper, &other.upper);
        sub(&mut self.lower, &other.lower);
        sub(&mut self.source, &other.source);
    }

    /// 对角取为所在列非对角系数之和的相反数
    pub fn neg_sum_diag(&mut self, addr: &LduAddressing) {
        let l = addr.lower_addr();
        let u = addr.upper_addr();
        for f in 0..self.upper.len() {
            self.diag[l[f]] = self.diag[l[f]] - self.lower[f];
            self.diag[u[f]] = self.diag[u[f]] - self.upper[f];
        }
    }

    /// 对角增加 `coeffs[i] * volumes[i]`（隐式源项）
    pub fn add_sp(&mut self, coeffs: &[T], volumes: &[f64]) {
        for ((d, &c), &v) in self.diag.iter_mut().zip(coeffs).zip(volumes) {
            *d = *d + c * T::from(v);
        }
    }

    /// 源项增加 `values[i] * volumes[i]`（显式源项）
    pub fn add_su(&mut self, values: &[T], volumes: &[f64]) {
        for ((s, &x), &v) in self.source.iter_mut().zip(values).zip(volumes) {
            *s = *s + x * T::from(v);
        }
    }

    /// 残差 `R = A psi - source`，`volumes` 非空时按体积归一化
    pub fn residual(&self, addr: &LduAddressing, psi: &[T], volumes: Option<&[f64]>) -> Vec<T> {
        let mut res = vec![T::from(0.0); self.diag.len()];
        ldu_residual(
            addr,
            &self.diag,
            &self.upper,
            &self.lower,
            &self.source,
            psi,
            volumes,
            &mut res,
        );
        res
    }
}

impl LduBands<f64> {
    /// 绑定寻址，得到可求解的矩阵
    pub fn into_matrix(self, addr: Arc<LduAddressing>) -> DaResult<LduMatrix> {
        LduMatrix::from_parts(addr, self.diag, self.upper, self.lower, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3 单元链：0-1, 1-2
    fn three_cell() -> LduMatrix {
        let addr = Arc::new(LduAddressing::new(3, vec![0, 1], vec![1, 2]).unwrap());
        LduMatrix::from_parts(
            addr,
            vec![4.0, 5.0, 6.0],
            vec![-1.0, -2.0],
            vec![-0.5, -1.5],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap()
    }

    #[test]
    fn test_from_parts_checks_sizes() {
        let addr = Arc::new(LduAddressing::new(3, vec![0, 1], vec![1, 2]).unwrap());
        let result = LduMatrix::from_parts(addr, vec![1.0; 3], vec![0.0; 1], vec![0.0; 2], vec![0.0; 3]);
        assert!(matches!(result, Err(DaError::SizeMismatch { name: "upper", .. })));
    }

    #[test]
    fn test_residual_by_hand() {
        let m = three_cell();
        let x = [1.0, 2.0, 3.0];
        let r = m.residual(&x, LduResidualNormalization::None, &[]).unwrap();
        // R0 = 4*1 - 1 + (-1)*2          = 1
        // R1 = 5*2 - 2 + (-2)*3 + (-0.5)*1 = 1.5
        // R2 = 6*3 - 3 + (-1.5)*2        = 12
        assert!((r[0] - 1.0).abs() < 1e-14);
        assert!((r[1] - 1.5).abs() < 1e-14);
        assert!((r[2] - 12.0).abs() < 1e-14);

        let rv = m
            .residual(&x, LduResidualNormalization::CellVolume, &[2.0, 3.0, 4.0])
            .unwrap();
        assert!((rv[1] - 0.5).abs() < 1e-14);
        assert!((rv[2] - 3.0).abs() < 1e-14);
    }

    #[test]
    fn test_amul_matches_dense() {
        let m = three_cell();
        let dense = m.to_dense();
        let x = [0.3, -1.0, 2.0];
        let mut y = [0.0; 3];
        m.amul(&x, &mut y);
        for i in 0..3 {
            let yi: f64 = (0..3).map(|j| dense[i][j] * x[j]).sum();
            assert!((y[i] - yi).abs() < 1e-14);
        }
        let mut yt = [0.0; 3];
        m.tmul(&x, &mut yt);
        for i in 0..3 {
            let yi: f64 = (0..3).map(|j| dense[j][i] * x[j]).sum();
            assert!((yt[i] - yi).abs() < 1e-14);
        }
    }

    #[test]
    fn test_transposed_swaps_bands() {
        let m = three_cell();
        let t = m.transposed();
        assert_eq!(t.upper(), m.lower());
        assert_eq!(t.lower(), m.upper());
        assert_eq!(t.diag(), m.diag());
        assert!(t.source().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_relax_keeps_solution() {
        let mut m = three_cell();
        let psi = [1.0, 2.0, 3.0];
        let before = m.residual(&psi, LduResidualNormalization::None, &[]).unwrap();
        m.relax(&psi, 0.7).unwrap();
        let after = m.residual(&psi, LduResidualNormalization::None, &[]).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!((m.diag()[0] - 4.0 / 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_relax_enforces_dominance() {
        let addr = Arc::new(LduAddressing::new(2, vec![0], vec![1]).unwrap());
        let mut m =
            LduMatrix::from_parts(addr, vec![0.5, 3.0], vec![-2.0], vec![-1.0], vec![0.0; 2]).unwrap();
        m.relax(&[1.0, 1.0], 1.0).unwrap();
        assert_eq!(m.diag(), &[2.0, 3.0]);
        assert_eq!(m.source(), &[1.5, 0.0]);
    }

    #[test]
    fn test_bands_match_matrix_residual() {
        let m = three_cell();
        let x = [1.0, 2.0, 3.0];
        let mut bands = LduBands::<f64>::lift(&m);
        bands.add_su(&[1.0, 0.0, 0.0], &[2.0, 1.0, 1.0]);
        bands.add_sp(&[0.0, 0.5, 0.0], &[1.0, 4.0, 1.0]);
        let r = bands.residual(m.addressing(), &x, None);
        // 源项 +2 使 R0 减 2，隐式项 0.5*4 使 R1 增 2*2
        assert!((r[0] + 1.0).abs() < 1e-14);
        assert!((r[1] - 5.5).abs() < 1e-14);
        assert!((r[2] - 12.0).abs() < 1e-14);

        let mut zero = bands.clone();
        zero.sub_assign(&bands);
        assert!(zero.diag.iter().chain(&zero.source).all(|&v| v == 0.0));
    }

    #[test]
    fn test_dual_powers_carry_derivative() {
        let mut x = Dual64::from(2.0);
        x.eps = 1.0;
        let cube = LduScalar::powi(x, 3);
        assert!((cube.re - 8.0).abs() < 1e-14);
        assert!((cube.eps - 12.0).abs() < 1e-14);
        let root = LduScalar::powf(x, 0.5);
        assert!((root.eps - 0.5 / 2.0f64.sqrt()).abs() < 1e-14);
        assert_eq!(max_re(x, 3.0).eps, 0.0);
        assert_eq!(min_re(x, 3.0).eps, 1.0);
    }

    #[test]
    fn test_neg_sum_diag() {
        let addr = Arc::new(LduAddressing::new(2, vec![0], vec![1]).unwrap());
        let mut m = LduMatrix::new(addr);
        m.upper_mut()[0] = -3.0;
        m.lower_mut()[0] = -1.0;
        m.neg_sum_diag();
        assert_eq!(m.diag(), &[1.0, 3.0]);
    }
}
