// crates/da_adjoint/src/fields.rs

//! 体场与面场
//!
//! 体场 [`VolField`] 保存单元值与每个 patch 的边界值；
//! 面场 [`SurfaceScalarField`] 保存内部面值与边界面值（如通量 `phi`）。

use da_foundation::{DaError, DaResult};
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::mesh::{FvMesh, PatchKind};
use crate::numerics::linear_algebra::LduScalar;

/// 场值类型
pub trait FieldValue: Copy + Default + Send + Sync + std::fmt::Debug + 'static {}

impl FieldValue for f64 {}
impl FieldValue for DVec3 {}

/// 边界条件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// 固定值
    FixedValue,
    /// 零梯度（边界值等于相邻单元值）
    ZeroGradient,
    /// 入流面固定值、出流面零梯度，依据通量符号逐面切换
    InletOutlet,
    /// 由外部给定（处理器边界、输入速度场）
    Calculated,
}

impl BoundaryKind {
    /// 按 patch 类型给出标量输运量的默认边界条件
    pub fn default_for(kind: PatchKind) -> Self {
        match kind {
            PatchKind::Wall => Self::FixedValue,
            PatchKind::Patch => Self::InletOutlet,
            PatchKind::Symmetry | PatchKind::Empty => Self::ZeroGradient,
            PatchKind::Processor { .. } => Self::Calculated,
        }
    }
}

/// 单个 patch 上的边界场
#[derive(Debug, Clone, PartialEq)]
pub struct PatchField<T> {
    /// 边界条件类型
    pub kind: BoundaryKind,
    /// 当前边界值
    pub values: Vec<T>,
    /// 固定值/入流值
    pub ref_values: Vec<T>,
}

impl<T: FieldValue> PatchField<T> {
    /// 创建均匀边界场
    pub fn uniform(kind: BoundaryKind, size: usize, value: T) -> Self {
        Self {
            kind,
            values: vec![value; size],
            ref_values: vec![value; size],
        }
    }

    /// 面数
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 通量为 `face_flux` 的面是否按固定值处理
    #[inline]
    pub fn is_fixed(&self, face_flux: f64) -> bool {
        match self.kind {
            BoundaryKind::FixedValue | BoundaryKind::Calculated => true,
            BoundaryKind::ZeroGradient => false,
            BoundaryKind::InletOutlet => face_flux < 0.0,
        }
    }
}

/// 体场
#[derive(Debug, Clone, PartialEq)]
pub struct VolField<T> {
    name: String,
    internal: Vec<T>,
    boundary: Vec<PatchField<T>>,
}

/// 标量体场
pub type VolScalarField = VolField<f64>;
/// 矢量体场
pub type VolVectorField = VolField<DVec3>;

impl<T: FieldValue> VolField<T> {
    /// 创建均匀场，边界条件按 patch 类型取默认值
    pub fn new(name: impl Into<String>, mesh: &FvMesh, value: T) -> Self {
        let boundary = mesh
            .patches()
            .iter()
            .map(|p| PatchField::uniform(BoundaryKind::default_for(p.kind), p.size, value))
            .collect();
        Self {
            name: name.into(),
            internal: vec![value; mesh.n_cells()],
            boundary,
        }
    }

    /// 创建所有边界均为 `Calculated` 的均匀场
    pub fn calculated(name: impl Into<String>, mesh: &FvMesh, value: T) -> Self {
        let boundary = mesh
            .patches()
            .iter()
            .map(|p| PatchField::uniform(BoundaryKind::Calculated, p.size, value))
            .collect();
        Self {
            name: name.into(),
            internal: vec![value; mesh.n_cells()],
            boundary,
        }
    }

    /// 由分量创建
    pub fn from_parts(
        name: impl Into<String>,
        mesh: &FvMesh,
        internal: Vec<T>,
        boundary: Vec<PatchField<T>>,
    ) -> DaResult<Self> {
        DaError::check_size("internal", mesh.n_cells(), internal.len())?;
        DaError::check_size("boundary", mesh.patches().len(), boundary.len())?;
        for (patch, pf) in mesh.patches().iter().zip(&boundary) {
            if pf.values.len() != patch.size || pf.ref_values.len() != patch.size {
                return Err(DaError::invalid_input(format!(
                    "patch '{}' 边界值数目 {} 与面数 {} 不符",
                    patch.name,
                    pf.values.len(),
                    patch.size
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            internal,
            boundary,
        })
    }

    /// 场名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 单元值
    #[inline]
    pub fn internal(&self) -> &[T] {
        &self.internal
    }

    /// 单元值（可变）
    #[inline]
    pub fn internal_mut(&mut self) -> &mut [T] {
        &mut self.internal
    }

    /// 边界场
    #[inline]
    pub fn boundary(&self) -> &[PatchField<T>] {
        &self.boundary
    }

    /// 边界场（可变）
    #[inline]
    pub fn boundary_mut(&mut self) -> &mut [PatchField<T>] {
        &mut self.boundary
    }

    /// 设置某个 patch 的边界条件与固定值
    pub fn set_patch(&mut self, patch: usize, kind: BoundaryKind, value: T) -> DaResult<()> {
        DaError::check_index("Patch", patch, self.boundary.len())?;
        let size = self.boundary[patch].len();
        self.boundary[patch] = PatchField::uniform(kind, size, value);
        Ok(())
    }

    /// 以同一值覆盖单元值及全部非固壁边界的参考值
    pub fn set_uniform(&mut self, mesh: &FvMesh, value: T) {
        self.internal.fill(value);
        for (pf, patch) in self.boundary.iter_mut().zip(mesh.patches()) {
            if patch.kind != PatchKind::Wall {
                pf.ref_values.fill(value);
                pf.values.fill(value);
            }
        }
    }

    /// 更新边界值
    ///
    /// 零梯度面取相邻单元值；`InletOutlet` 按 `phi` 符号切换，
    /// 未给出 `phi` 时按固定值处理。
    pub fn correct_boundary_conditions(&mut self, mesh: &FvMesh, phi: Option<&SurfaceScalarField>) {
        let owner = mesh.owner();
        for (pi, (pf, patch)) in self.boundary.iter_mut().zip(mesh.patches()).enumerate() {
            match pf.kind {
                BoundaryKind::FixedValue => pf.values.copy_from_slice(&pf.ref_values),
                BoundaryKind::Calculated => {}
                BoundaryKind::ZeroGradient => {
                    for (i, f) in patch.range().enumerate() {
                        pf.values[i] = self.internal[owner[f]];
                    }
                }
                BoundaryKind::InletOutlet => {
                    for (i, f) in patch.range().enumerate() {
                        let flux = phi.map_or(-1.0, |phi| phi.boundary()[pi][i]);
                        pf.values[i] = if flux < 0.0 {
                            pf.ref_values[i]
                        } else {
                            self.internal[owner[f]]
                        };
                    }
                }
            }
        }
    }
}

impl VolScalarField {
    /// 当前边界值的副本，逐 patch 排列
    pub fn boundary_values(&self) -> Vec<Vec<f64>> {
        self.boundary.iter().map(|pf| pf.values.clone()).collect()
    }

    /// 以给定单元值按边界条件求边界值，不修改场本身
    ///
    /// 规则与 [`Self::correct_boundary_conditions`] 相同。单元值为对偶数时，
    /// 零梯度面与出流面的边界值随之携带导数。
    pub fn evaluate_boundary<S: LduScalar>(
        &self,
        mesh: &FvMesh,
        internal: &[S],
        phi: Option<&SurfaceScalarField>,
    ) -> Vec<Vec<S>> {
        let owner = mesh.owner();
        self.boundary
            .iter()
            .zip(mesh.patches())
            .enumerate()
            .map(|(pi, (pf, patch))| {
                patch
                    .range()
                    .enumerate()
                    .map(|(i, f)| match pf.kind {
                        BoundaryKind::FixedValue => S::from(pf.ref_values[i]),
                        BoundaryKind::Calculated => S::from(pf.values[i]),
                        BoundaryKind::ZeroGradient => internal[owner[f]],
                        BoundaryKind::InletOutlet => {
                            let flux = phi.map_or(-1.0, |phi| phi.boundary()[pi][i]);
                            if flux < 0.0 {
                                S::from(pf.ref_values[i])
                            } else {
                                internal[owner[f]]
                            }
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

/// 标量面场
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceScalarField {
    name: String,
    internal: Vec<f64>,
    boundary: Vec<Vec<f64>>,
}

impl SurfaceScalarField {
    /// 创建均匀面场
    pub fn new(name: impl Into<String>, mesh: &FvMesh, value: f64) -> Self {
        Self {
            name: name.into(),
            internal: vec![value; mesh.n_internal_faces()],
            boundary: mesh.patches().iter().map(|p| vec![value; p.size]).collect(),
        }
    }

    /// 由分量创建
    pub fn from_parts(
        name: impl Into<String>,
        mesh: &FvMesh,
        internal: Vec<f64>,
        boundary: Vec<Vec<f64>>,
    ) -> DaResult<Self> {
        DaError::check_size("internal", mesh.n_internal_faces(), internal.len())?;
        DaError::check_size("boundary", mesh.patches().len(), boundary.len())?;
        for (patch, values) in mesh.patches().iter().zip(&boundary) {
            DaError::check_size("patch values", patch.size, values.len())?;
        }
        Ok(Self {
            name: name.into(),
            internal,
            boundary,
        })
    }

    /// 场名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 内部面值
    #[inline]
    pub fn internal(&self) -> &[f64] {
        &self.internal
    }

    /// 内部面值（可变）
    #[inline]
    pub fn internal_mut(&mut self) -> &mut [f64] {
        &mut self.internal
    }

    /// 边界面值
    #[inline]
    pub fn boundary(&self) -> &[Vec<f64>] {
        &self.boundary
    }

    /// 边界面值（可变）
    #[inline]
    pub fn boundary_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.boundary
    }
}

/// 流场输入
///
/// 湍流模型只读取速度与通量，不拥有它们。
#[derive(Debug, Clone)]
pub struct FlowFields {
    /// 速度
    pub u: VolVectorField,
    /// 面通量
    pub phi: SurfaceScalarField,
}

impl FlowFields {
    /// 以均匀来流初始化，`phi` 由速度插值得到
    pub fn uniform(mesh: &FvMesh, u_inf: DVec3) -> Self {
        let u = VolVectorField::calculated("U", mesh, u_inf);
        let phi = crate::numerics::fvc::flux(mesh, &u);
        Self { u, phi }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::BlockMesh;
    use da_config::BlockMeshConfig;
    use num_dual::Dual64;

    fn mesh() -> FvMesh {
        BlockMesh::new(BlockMeshConfig {
            nx: 3,
            ny: 2,
            nz: 1,
            length: [3.0, 2.0, 1.0],
            y_grading: 1.0,
        })
        .build()
        .unwrap()
    }

    #[test]
    fn test_default_boundary_kinds() {
        let mesh = mesh();
        let field = VolScalarField::new("nuTilda", &mesh, 1.0);
        let wall = mesh.find_patch("wall").unwrap();
        let empty = mesh.find_patch("frontAndBack").unwrap();
        assert_eq!(field.boundary()[wall].kind, BoundaryKind::FixedValue);
        assert_eq!(field.boundary()[empty].kind, BoundaryKind::ZeroGradient);
    }

    #[test]
    fn test_zero_gradient_copies_owner() {
        let mesh = mesh();
        let mut field = VolScalarField::new("T", &mesh, 0.0);
        for (i, v) in field.internal_mut().iter_mut().enumerate() {
            *v = i as f64;
        }
        let outlet = mesh.find_patch("outlet").unwrap();
        field.set_patch(outlet, BoundaryKind::ZeroGradient, 0.0).unwrap();
        field.correct_boundary_conditions(&mesh, None);
        let patch = &mesh.patches()[outlet];
        for (i, f) in patch.range().enumerate() {
            assert_eq!(field.boundary()[outlet].values[i], mesh.owner()[f] as f64);
        }
    }

    #[test]
    fn test_inlet_outlet_switches_on_flux() {
        let mesh = mesh();
        let flow = FlowFields::uniform(&mesh, DVec3::new(1.0, 0.0, 0.0));
        let mut field = VolScalarField::new("nuTilda", &mesh, 3.0);
        field.internal_mut().fill(5.0);
        field.correct_boundary_conditions(&mesh, Some(&flow.phi));

        let inlet = mesh.find_patch("inlet").unwrap();
        let outlet = mesh.find_patch("outlet").unwrap();
        assert!(field.boundary()[inlet].values.iter().all(|&v| v == 3.0));
        assert!(field.boundary()[outlet].values.iter().all(|&v| v == 5.0));
    }

    #[test]
    fn test_evaluate_boundary_matches_correction() {
        let mesh = mesh();
        let flow = FlowFields::uniform(&mesh, DVec3::new(1.0, 0.0, 0.0));
        let mut field = VolScalarField::new("nuTilda", &mesh, 3.0);
        for (i, v) in field.internal_mut().iter_mut().enumerate() {
            *v = 1.0 + i as f64;
        }
        let evaluated = field.evaluate_boundary(&mesh, field.internal(), Some(&flow.phi));
        field.correct_boundary_conditions(&mesh, Some(&flow.phi));
        assert_eq!(evaluated, field.boundary_values());

        // 出流面的导数来自相邻单元，入流面与固壁为常数
        let mut seeded: Vec<Dual64> = field.internal().iter().map(|&v| Dual64::from(v)).collect();
        let outlet = mesh.find_patch("outlet").unwrap();
        let inlet = mesh.find_patch("inlet").unwrap();
        let c = mesh.owner()[mesh.patches()[outlet].start];
        seeded[c].eps = 1.0;
        let dual = field.evaluate_boundary(&mesh, &seeded, Some(&flow.phi));
        assert_eq!(dual[outlet][0].eps, 1.0);
        assert!(dual[inlet].iter().all(|v| v.eps == 0.0));
    }

    #[test]
    fn test_from_parts_checks_sizes() {
        let mesh = mesh();
        let result = VolScalarField::from_parts("x", &mesh, vec![0.0; 2], Vec::new());
        assert!(matches!(result, Err(DaError::SizeMismatch { .. })));
    }
}
