// crates/da_adjoint/src/turbulence/spalart_allmaras_fv3.rs

//! Spalart-Allmaras 一方程模型（Fv3 变体）
//!
//! 输运方程：
//!
//! ```text
//! div(phi, ν̃) - laplacian(DnuTildaEff, ν̃) - Cb2/σ |∇ν̃|²
//!     = Cb1 S̃ ν̃ βFI - Sp(Cw1 fw ν̃ / y², ν̃)
//! DnuTildaEff = (ν̃ + ν) / σ
//! S̃ = fv3 |Ω| + fv2 ν̃ / (κ² y²),   |Ω| = √2 |skew(∇U)|
//! ```
//!
//! 涡粘性 `nut = ν̃ fv1`。

use std::sync::Arc;

use da_config::TurbulenceOptions;
use da_foundation::{ensure, DaError, DaResult, SMALL};
use rayon::prelude::*;

use super::model::AdjointTurbulence;
use crate::adjoint::state_info::names;
use crate::adjoint::{ad, PseudoSystem, StateDependencyGraph};
use crate::fields::{BoundaryKind, FlowFields, VolScalarField};
use crate::mesh::{FvMesh, PatchKind};
use crate::numerics::linear_algebra::{
    max_re, min_re, LduBands, LduCoefficients, LduMatrix, LduResidualNormalization, LduScalar,
    LinearSolver, SolverResult,
};
use crate::numerics::{fvc, fvm};

const NU_TILDA: &str = "nuTilda";
const NU_TILDA_RES: &str = "nuTildaRes";
const PSEUDO_NU_TILDA: &str = "pseudoNuTilda";

/// 模型常数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaCoefficients {
    /// σ
    pub sigma_nut: f64,
    /// κ
    pub kappa: f64,
    /// Cb1
    pub cb1: f64,
    /// Cb2
    pub cb2: f64,
    /// Cw1 = Cb1/κ² + (1 + Cb2)/σ
    pub cw1: f64,
    /// Cw2
    pub cw2: f64,
    /// Cw3
    pub cw3: f64,
    /// Cv1
    pub cv1: f64,
    /// Cv2
    pub cv2: f64,
}

impl Default for SaCoefficients {
    fn default() -> Self {
        let sigma_nut = 0.66666;
        let kappa = 0.41;
        let cb1 = 0.1355;
        let cb2 = 0.622;
        Self {
            sigma_nut,
            kappa,
            cb1,
            cb2,
            cw1: cb1 / (kappa * kappa) + (1.0 + cb2) / sigma_nut,
            cw2: 0.3,
            cw3: 2.0,
            cv1: 7.1,
            cv2: 5.0,
        }
    }
}

impl SaCoefficients {
    /// `fv1 = χ³/(χ³ + Cv1³)`
    #[inline]
    pub fn fv1<T: LduScalar>(&self, chi: T) -> T {
        let chi3 = chi.powi(3);
        chi3 / (chi3 + T::from(self.cv1.powi(3)))
    }

    /// `fv2 = 1/(1 + χ/Cv2)³`
    #[inline]
    pub fn fv2<T: LduScalar>(&self, chi: T) -> T {
        T::from(1.0) / (T::from(1.0) + chi / T::from(self.cv2)).powi(3)
    }

    /// `fv3 = (1 + χ fv1)(1 - fv2)/max(χ, SMALL)`
    #[inline]
    pub fn fv3<T: LduScalar>(&self, chi: T) -> T {
        let one = T::from(1.0);
        (one + chi * self.fv1(chi)) * (one - self.fv2(chi)) / max_re(chi, SMALL)
    }

    /// 壁面函数 fw
    #[inline]
    pub fn fw<T: LduScalar>(&self, nu_tilda: T, stilda: T, y: f64) -> T {
        let ky2 = (self.kappa * y).powi(2);
        let r = min_re(nu_tilda / (max_re(stilda, SMALL) * T::from(ky2)), 10.0);
        let g = r + T::from(self.cw2) * (r.powi(6) - r);
        let cw3_6 = self.cw3.powi(6);
        g * (T::from(1.0 + cw3_6) / (g.powi(6) + T::from(cw3_6))).powf(1.0 / 6.0)
    }

    /// 修正涡量 `S̃`
    #[inline]
    pub fn stilda<T: LduScalar>(&self, nu_tilda: T, nu: f64, omega: f64, y: f64) -> T {
        let chi = nu_tilda / T::from(nu);
        let ky2 = (self.kappa * y).powi(2);
        self.fv3(chi) * T::from(omega) + self.fv2(chi) * nu_tilda / T::from(ky2)
    }
}

/// 逐单元源项
#[derive(Debug, Clone, Copy)]
struct CellSource<T> {
    /// 生成项 Cb1 S̃ ν̃ βFI
    production: T,
    /// 隐式耗散系数 Cw1 fw ν̃ / y²
    destruction_coeff: T,
}

/// SA-Fv3 模型
#[derive(Debug)]
pub struct SpalartAllmarasFv3 {
    mesh: Arc<FvMesh>,
    coeffs: SaCoefficients,
    nu: f64,
    relax_nu_tilda: f64,
    solve_turb_state: bool,
    solver: LinearSolver,

    nu_tilda: VolScalarField,
    nut: VolScalarField,
    beta_fi: Vec<f64>,
    y: Vec<f64>,

    nu_tilda_res: VolScalarField,
    pseudo_nu_tilda: VolScalarField,
    pseudo_system: Option<PseudoSystem>,
}

impl SpalartAllmarasFv3 {
    /// 创建模型，`nuTilda` 初值为 0，壁面固定为 0
    pub fn new(mesh: Arc<FvMesh>, options: &TurbulenceOptions) -> DaResult<Self> {
        ensure!(
            options.nu > 0.0,
            DaError::invalid_config("turbulence.nu", options.nu.to_string(), "粘度必须为正")
        );

        let mut nu_tilda = VolScalarField::new(NU_TILDA, &mesh, 0.0);
        for (p, patch) in mesh.patches().iter().enumerate() {
            if patch.kind == PatchKind::Wall {
                nu_tilda.set_patch(p, BoundaryKind::FixedValue, 0.0)?;
            }
        }
        let nut = VolScalarField::calculated("nut", &mesh, 0.0);
        let nu_tilda_res = VolScalarField::calculated(NU_TILDA_RES, &mesh, 0.0);
        let pseudo_nu_tilda = VolScalarField::calculated(PSEUDO_NU_TILDA, &mesh, 0.0);
        let y = mesh.wall_distance();
        let n_cells = mesh.n_cells();

        log::debug!(
            "SpalartAllmarasFv3: nu = {:e}, relaxNuTildaEqn = {}, solver = {}",
            options.nu,
            options.relax_nu_tilda,
            options.solver.solver
        );

        Ok(Self {
            mesh,
            coeffs: SaCoefficients::default(),
            nu: options.nu,
            relax_nu_tilda: options.relax_nu_tilda,
            solve_turb_state: options.solve_turb_state,
            solver: LinearSolver::from_dict(&options.solver),
            nu_tilda,
            nut,
            beta_fi: vec![1.0; n_cells],
            y,
            nu_tilda_res,
            pseudo_nu_tilda,
            pseudo_system: None,
        })
    }

    /// 模型常数
    pub fn coeffs(&self) -> &SaCoefficients {
        &self.coeffs
    }

    /// 壁面距离
    pub fn wall_distance(&self) -> &[f64] {
        &self.y
    }

    /// 以来流值初始化 `nuTilda`（壁面保持 0）并更新 `nut`
    pub fn initialize(&mut self, nu_tilda_inf: f64) {
        self.nu_tilda.set_uniform(&self.mesh, nu_tilda_inf);
        self.correct_nut();
    }

    /// 生成项修正系数 βFI
    pub fn beta_fi(&self) -> &[f64] {
        &self.beta_fi
    }

    /// 设置生成项修正系数
    pub fn set_beta_fi(&mut self, beta: &[f64]) -> DaResult<()> {
        DaError::check_size("betaFI", self.beta_fi.len(), beta.len())?;
        self.beta_fi.copy_from_slice(beta);
        Ok(())
    }

    /// 缓存的伪系统
    pub fn pseudo_system(&self) -> Option<&PseudoSystem> {
        self.pseudo_system.as_ref()
    }

    fn check_state(name: &str) -> DaResult<()> {
        if name == NU_TILDA {
            Ok(())
        } else {
            Err(DaError::invalid_state(name))
        }
    }

    /// 涡量模 `|Ω|`，只依赖速度
    fn vorticity(&self, flow: &FlowFields) -> Vec<f64> {
        fvc::vorticity_magnitude(&fvc::grad_vector(&self.mesh, &flow.u))
    }

    /// 逐单元生成与耗散
    fn cell_sources<T: LduScalar>(&self, omega: &[f64], nt: &[T]) -> Vec<CellSource<T>> {
        let c = self.coeffs;
        let nu = self.nu;

        (0..self.mesh.n_cells())
            .into_par_iter()
            .map(|i| {
                let y = self.y[i];
                let stilda = c.stilda(nt[i], nu, omega[i], y);
                CellSource {
                    production: T::from(c.cb1) * stilda * nt[i] * T::from(self.beta_fi[i]),
                    destruction_coeff: T::from(c.cw1) * c.fw(nt[i], stilda, y) * nt[i]
                        / T::from(y * y),
                }
            })
            .collect()
    }

    /// 有效扩散系数 `(ν̃ + ν)/σ`：内部面插值值与边界面值
    fn d_nu_tilda_eff<T: LduScalar>(
        &self,
        internal: &[T],
        boundary: &[Vec<T>],
    ) -> (Vec<T>, Vec<Vec<T>>) {
        let sigma = T::from(self.coeffs.sigma_nut);
        let nu = T::from(self.nu);
        let eff = |nt: T| (nt + nu) / sigma;

        let cells: Vec<T> = internal.iter().map(|&nt| eff(nt)).collect();
        let patches = boundary
            .iter()
            .map(|values| values.iter().map(|&nt| eff(nt)).collect())
            .collect();
        (fvc::interpolate(&self.mesh, &cells), patches)
    }

    /// 以给定单元值与边界值组装未松弛的 nuTilda 方程
    ///
    /// 对流项只依赖 `phi` 与固定边界值，按常数提升；其余各项随标量类型求导。
    fn assemble_bands<T: LduScalar>(
        &self,
        flow: &FlowFields,
        internal: &[T],
        boundary: &[Vec<T>],
    ) -> LduBands<T> {
        let mesh = &*self.mesh;
        let vols = mesh.cell_volumes();

        let mut eqn = LduBands::lift(&fvm::div(mesh, &flow.phi, &self.nu_tilda));
        let (gamma_faces, gamma_patches) = self.d_nu_tilda_eff(internal, boundary);
        eqn.sub_assign(&fvm::laplacian(
            mesh,
            &gamma_faces,
            &gamma_patches,
            &self.nu_tilda,
            boundary,
            Some(&flow.phi),
        ));

        let cb2_sigma = T::from(self.coeffs.cb2 / self.coeffs.sigma_nut);
        let grad_sqr: Vec<T> = fvc::grad(mesh, internal, boundary)
            .iter()
            .map(|g| cb2_sigma * (g[0] * g[0] + g[1] * g[1] + g[2] * g[2]))
            .collect();
        eqn.add_su(&grad_sqr, vols);

        let sources = self.cell_sources(&self.vorticity(flow), internal);
        let production: Vec<T> = sources.iter().map(|s| s.production).collect();
        let destruction: Vec<T> = sources.iter().map(|s| s.destruction_coeff).collect();
        eqn.add_su(&production, vols);
        eqn.add_sp(&destruction, vols);
        eqn
    }

    /// 组装未松弛的 nuTilda 方程
    fn assemble(&self, flow: &FlowFields) -> DaResult<LduMatrix> {
        self.assemble_bands(flow, self.nu_tilda.internal(), &self.nu_tilda.boundary_values())
            .into_matrix(self.mesh.ldu_arc())
    }

    /// 组装并按 `relaxNuTildaEqn` 松弛
    fn assemble_relaxed(&self, flow: &FlowFields) -> DaResult<LduMatrix> {
        let mut eqn = self.assemble(flow)?;
        eqn.relax(self.nu_tilda.internal(), self.relax_nu_tilda)?;
        Ok(eqn)
    }
}

impl AdjointTurbulence for SpalartAllmarasFv3 {
    fn name(&self) -> &'static str {
        "SpalartAllmarasFv3"
    }

    fn state_names(&self) -> &'static [&'static str] {
        &[NU_TILDA]
    }

    fn state(&self, name: &str) -> DaResult<&VolScalarField> {
        Self::check_state(name)?;
        Ok(&self.nu_tilda)
    }

    fn state_mut(&mut self, name: &str) -> DaResult<&mut VolScalarField> {
        Self::check_state(name)?;
        Ok(&mut self.nu_tilda)
    }

    fn nut(&self) -> &VolScalarField {
        &self.nut
    }

    fn correct_nut(&mut self) {
        let c = self.coeffs;
        let nu = self.nu;
        for (nut, &nt) in self.nut.internal_mut().iter_mut().zip(self.nu_tilda.internal()) {
            *nut = nt * c.fv1(nt / nu);
        }
        for (pf, src) in self.nut.boundary_mut().iter_mut().zip(self.nu_tilda.boundary()) {
            for (nut, &nt) in pf.values.iter_mut().zip(&src.values) {
                *nut = nt * c.fv1(nt / nu);
            }
        }
    }

    fn correct_boundary_conditions(&mut self, flow: &FlowFields) {
        self.nu_tilda.correct_boundary_conditions(&self.mesh, Some(&flow.phi));
    }

    fn correct_model_states(&self, states: &mut Vec<String>) {
        for s in states.iter_mut() {
            if s == "nut" {
                *s = NU_TILDA.to_string();
            }
        }
    }

    fn correct_state_residual_model_con(&self, con: &mut [Vec<String>]) {
        for level in con.iter_mut() {
            let Some(pos) = level.iter().position(|s| s == "nut") else {
                continue;
            };
            if level.iter().any(|s| s == NU_TILDA) {
                level.remove(pos);
            } else {
                level[pos] = NU_TILDA.to_string();
            }
        }
    }

    fn add_model_residual_con(&self, graph: &mut StateDependencyGraph) {
        graph.insert(
            NU_TILDA_RES,
            vec![
                names(&["U", NU_TILDA, "phi"]),
                names(&["U", NU_TILDA]),
                names(&[NU_TILDA]),
            ],
        );
    }

    fn calc_residual_state_jacobian(&self, flow: &FlowFields) -> DaResult<Vec<Vec<f64>>> {
        let mesh = &*self.mesh;
        let vols = mesh.cell_volumes();
        Ok(ad::state_jacobian(self.nu_tilda.internal(), |psi| {
            let boundary = self.nu_tilda.evaluate_boundary(mesh, psi, Some(&flow.phi));
            self.assemble_bands(flow, psi, &boundary)
                .residual(mesh.ldu(), psi, Some(vols))
        }))
    }

    fn calc_residuals(&mut self, flow: &FlowFields) -> DaResult<()> {
        let eqn = self.assemble(flow)?;
        let res = eqn.residual(
            self.nu_tilda.internal(),
            LduResidualNormalization::CellVolume,
            self.mesh.cell_volumes(),
        )?;
        self.nu_tilda_res.internal_mut().copy_from_slice(&res);
        Ok(())
    }

    fn correct(&mut self, flow: &FlowFields) -> DaResult<Option<SolverResult>> {
        if !self.solve_turb_state {
            return Ok(None);
        }
        self.correct_boundary_conditions(flow);
        let eqn = self.assemble_relaxed(flow)?;

        let mut x = self.nu_tilda.internal().to_vec();
        let result = self.solver.solve(NU_TILDA, &eqn, eqn.source(), &mut x);

        let mut n_bounded = 0usize;
        for (v, new) in self.nu_tilda.internal_mut().iter_mut().zip(x) {
            if new < 0.0 {
                n_bounded += 1;
            }
            *v = new.max(0.0);
        }
        if n_bounded > 0 {
            log::debug!("nuTilda 下界修正 {n_bounded} 个单元");
        }

        self.correct_boundary_conditions(flow);
        self.correct_nut();
        Ok(Some(result))
    }

    fn get_fv_matrix_fields(
        &self,
        flow: &FlowFields,
        state_name: &str,
    ) -> DaResult<LduCoefficients> {
        Self::check_state(state_name)?;
        Ok(self.assemble_relaxed(flow)?.coefficients())
    }

    fn construct_pseudo_nu_tilda_eqn(&mut self, flow: &FlowFields) -> DaResult<()> {
        let eqn = self.assemble_relaxed(flow)?;
        self.pseudo_system = Some(PseudoSystem::from_forward(&eqn));
        Ok(())
    }

    fn rhs_solve_pseudo_nu_tilda_eqn(&mut self, source: &[f64]) -> DaResult<SolverResult> {
        let pseudo = self
            .pseudo_system
            .as_ref()
            .ok_or_else(|| DaError::stale_system("伪系统尚未构造"))?;

        let mut x = vec![0.0; self.mesh.n_cells()];
        let result = pseudo.solve(self.mesh.ldu(), &self.solver, PSEUDO_NU_TILDA, source, &mut x)?;
        self.pseudo_nu_tilda.internal_mut().copy_from_slice(&x);
        Ok(result)
    }

    fn calc_ldu_residual_turb(&self, flow: &FlowFields) -> DaResult<Vec<f64>> {
        self.assemble_relaxed(flow)?.residual(
            self.nu_tilda.internal(),
            LduResidualNormalization::CellVolume,
            self.mesh.cell_volumes(),
        )
    }

    fn field(&self, name: &str) -> DaResult<&VolScalarField> {
        match name {
            NU_TILDA => Ok(&self.nu_tilda),
            "nut" => Ok(&self.nut),
            NU_TILDA_RES => Ok(&self.nu_tilda_res),
            PSEUDO_NU_TILDA => Ok(&self.pseudo_nu_tilda),
            other => Err(DaError::invalid_state(other)),
        }
    }

    fn get_turb_prod_over_destruct(&self, flow: &FlowFields) -> DaResult<Vec<f64>> {
        let nt = self.nu_tilda.internal();
        Ok(self
            .cell_sources(&self.vorticity(flow), nt)
            .iter()
            .zip(nt)
            .map(|(s, &n)| s.production / (s.destruction_coeff * n + SMALL))
            .collect())
    }

    fn get_turb_conv_over_prod(&self, flow: &FlowFields) -> DaResult<Vec<f64>> {
        let conv = fvm::div(&self.mesh, &flow.phi, &self.nu_tilda).residual(
            self.nu_tilda.internal(),
            LduResidualNormalization::CellVolume,
            self.mesh.cell_volumes(),
        )?;
        Ok(self
            .cell_sources(&self.vorticity(flow), self.nu_tilda.internal())
            .iter()
            .zip(conv)
            .map(|(s, c)| c / (s.production + SMALL))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::BlockMesh;
    use da_config::BlockMeshConfig;
    use glam::DVec3;

    fn setup() -> (SpalartAllmarasFv3, FlowFields) {
        let mesh = Arc::new(
            BlockMesh::new(BlockMeshConfig {
                nx: 6,
                ny: 4,
                nz: 1,
                length: [1.0, 0.5, 0.1],
                y_grading: 1.0,
            })
            .build()
            .unwrap(),
        );
        let flow = FlowFields::uniform(&mesh, DVec3::new(1.0, 0.0, 0.0));
        let mut model = SpalartAllmarasFv3::new(mesh, &TurbulenceOptions::default()).unwrap();
        model.initialize(4.5e-5);
        model.correct_boundary_conditions(&flow);
        (model, flow)
    }

    #[test]
    fn test_coefficients() {
        let c = SaCoefficients::default();
        assert!((c.cw1 - (0.1355 / 0.1681 + 1.622 / 0.66666)).abs() < 1e-12);
        assert!((c.fv1(0.0f64)).abs() < 1e-15);
        assert!((c.fv2(0.0f64) - 1.0).abs() < 1e-15);
        // χ → 0 时 fv3 → 3/Cv2
        assert!((c.fv3(1e-8f64) - 3.0 / c.cv2).abs() < 1e-6);
    }

    #[test]
    fn test_fw_saturates() {
        let c = SaCoefficients::default();
        // r = 10 上限处 fw 接近 (1 + Cw3⁶)^(1/6)
        let fw: f64 = c.fw(1.0, 1e-12, 1e-3);
        assert!((fw - (1.0 + 64.0f64).powf(1.0 / 6.0)).abs() < 1e-3);
        // r = 1 时 g = 1, fw = 1
        let ky2 = (c.kappa * 0.1f64).powi(2);
        assert!((c.fw(ky2, 1.0f64, 0.1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_nut_follows_fv1() {
        let (model, _) = setup();
        let c = model.coeffs();
        let chi: f64 = 4.5e-5 / 1.5e-5;
        let expected = 4.5e-5 * c.fv1(chi);
        assert!(model.nut().internal().iter().all(|&v| (v - expected).abs() < 1e-18));
    }

    #[test]
    fn test_extraction_lengths() {
        let (model, flow) = setup();
        let coeffs = model.get_fv_matrix_fields(&flow, "nuTilda").unwrap();
        let mesh = &model.mesh;
        assert_eq!(coeffs.diag.len(), mesh.n_cells());
        assert_eq!(coeffs.upper.len(), mesh.n_internal_faces());
        assert_eq!(coeffs.lower.len(), mesh.n_internal_faces());
        assert!(matches!(
            model.get_fv_matrix_fields(&flow, "k"),
            Err(DaError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_ldu_residual_matches_calc_residuals() {
        let (mut model, flow) = setup();
        model.calc_residuals(&flow).unwrap();
        let ldu = model.calc_ldu_residual_turb(&flow).unwrap();
        let cached = model.field("nuTildaRes").unwrap().internal();
        for (a, b) in ldu.iter().zip(cached) {
            assert!((a - b).abs() <= 1e-10 * (1.0 + b.abs()));
        }
    }

    #[test]
    fn test_residual_con_replaces_nut() {
        let (model, _) = setup();
        let mut con = vec![names(&["p", "nut"]), names(&["nut", "nuTilda"]), names(&["p"])];
        model.correct_state_residual_model_con(&mut con);
        assert_eq!(con[0], names(&["p", "nuTilda"]));
        assert_eq!(con[1], names(&["nuTilda"]));
        assert_eq!(con[2], names(&["p"]));

        let mut states = names(&["U", "p", "nut"]);
        model.correct_model_states(&mut states);
        assert_eq!(states, names(&["U", "p", "nuTilda"]));
    }

    /// 写入单元值、更新边界并返回 `nuTildaRes`
    fn residual_at(model: &mut SpalartAllmarasFv3, flow: &FlowFields, psi: &[f64]) -> Vec<f64> {
        model.nu_tilda.internal_mut().copy_from_slice(psi);
        model.correct_boundary_conditions(flow);
        model.calc_residuals(flow).unwrap();
        model.field("nuTildaRes").unwrap().internal().to_vec()
    }

    #[test]
    fn test_state_jacobian_matches_finite_difference() {
        let (mut model, flow) = setup();
        let n = model.mesh.n_cells();
        // χ 取 2 到 4，r 远小于 10，各截断分支不起作用
        let base: Vec<f64> = (0..n)
            .map(|i| 3.0e-5 + 3.0e-5 * ((i * 7) % n) as f64 / n as f64)
            .collect();
        residual_at(&mut model, &flow, &base);
        let jac = model.calc_residual_state_jacobian(&flow).unwrap();
        assert_eq!(jac.len(), n);

        let mut fd = vec![vec![0.0; n]; n];
        for j in 0..n {
            let h = 1e-5 * base[j];
            let mut psi = base.clone();
            psi[j] = base[j] + h;
            let plus = residual_at(&mut model, &flow, &psi);
            psi[j] = base[j] - h;
            let minus = residual_at(&mut model, &flow, &psi);
            for i in 0..n {
                fd[i][j] = (plus[i] - minus[i]) / (2.0 * h);
            }
        }
        residual_at(&mut model, &flow, &base);

        for (ad_row, fd_row) in jac.iter().zip(&fd) {
            let row_max = fd_row.iter().fold(0.0f64, |m, v| m.max(v.abs()));
            for (a, f) in ad_row.iter().zip(fd_row) {
                assert!(
                    (a - f).abs() <= 1e-6 * f.abs() + 1e-8 * row_max,
                    "ad = {a:e}, fd = {f:e}"
                );
            }
        }

        // 系数冻结的矩阵漏掉扩散系数与源项对 ν̃ 的导数
        let frozen = model.assemble(&flow).unwrap().to_dense();
        let vols = model.mesh.cell_volumes();
        let max_gap = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .map(|(i, j)| (jac[i][j] - frozen[i][j] / vols[i]).abs())
            .fold(0.0f64, f64::max);
        assert!(max_gap > 1e-3, "max_gap = {max_gap:e}");

        // 依赖只到面相邻单元
        assert!(ad::undeclared_entries(model.mesh.ldu(), &jac, 1, 0.0).is_empty());
    }

    #[test]
    fn test_beta_fi_scales_production() {
        let (mut model, flow) = setup();
        let n = model.mesh.n_cells();
        let base = model.get_turb_prod_over_destruct(&flow).unwrap();

        model.set_beta_fi(&vec![0.0; n]).unwrap();
        let off = model.get_turb_prod_over_destruct(&flow).unwrap();
        assert!(off.iter().all(|&v| v == 0.0));

        model.set_beta_fi(&vec![2.0; n]).unwrap();
        let doubled = model.get_turb_prod_over_destruct(&flow).unwrap();
        for (d, b) in doubled.iter().zip(&base) {
            assert!((d - 2.0 * b).abs() <= 1e-12 * b.abs().max(1.0));
        }
        assert!(model.set_beta_fi(&[1.0]).is_err());
    }

    #[test]
    fn test_rhs_solve_requires_pseudo_system() {
        let (mut model, _) = setup();
        let n = model.mesh.n_cells();
        assert!(matches!(
            model.rhs_solve_pseudo_nu_tilda_eqn(&vec![1.0; n]),
            Err(DaError::StaleSystem { .. })
        ));
    }

    #[test]
    fn test_correct_keeps_nu_tilda_bounded() {
        let (mut model, flow) = setup();
        for _ in 0..3 {
            model.correct(&flow).unwrap();
        }
        assert!(model.state("nuTilda").unwrap().internal().iter().all(|&v| v >= 0.0));
    }
}
