// crates/da_adjoint/src/mesh/fv_mesh.rs

//! 有限体积多面体网格
//!
//! 面-单元拓扑遵循常见的 owner/neighbour 约定：
//!
//! - 前 `n_internal_faces` 个面为内部面，按上三角顺序排列
//! - 其余为边界面，按 patch 连续存储
//! - 面法向（`Sf`）由 owner 指向 neighbour，边界面指向域外
//!
//! 构造时一次性计算全部几何量（面心、面积矢量、单元中心、体积、
//! 插值权重、扩散系数），此后网格只读。

use da_foundation::{ensure, DaError, DaResult, GREAT, ROOT_VSMALL, VSMALL};
use glam::DVec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ldu_addressing::LduAddressing;

/// 边界类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchKind {
    /// 固壁
    Wall,
    /// 一般边界（入口、出口、远场）
    Patch,
    /// 对称面
    Symmetry,
    /// 二维算例的空边界，不参与离散
    Empty,
    /// 分区之间的处理器边界
    Processor {
        /// 本分区编号
        my_proc: usize,
        /// 相邻分区编号
        neighb_proc: usize,
    },
}

impl PatchKind {
    /// 类型名
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Wall => "wall",
            Self::Patch => "patch",
            Self::Symmetry => "symmetry",
            Self::Empty => "empty",
            Self::Processor { .. } => "processor",
        }
    }
}

/// 边界 patch
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// 名称
    pub name: String,
    /// 类型
    pub kind: PatchKind,
    /// 起始面索引（全局面编号）
    pub start: usize,
    /// 面数
    pub size: usize,
    /// 处理器边界上相邻分区的单元中心（光环数据），其它类型为空
    pub neighbour_centres: Vec<DVec3>,
}

impl Patch {
    /// 创建非耦合 patch
    pub fn new(name: impl Into<String>, kind: PatchKind, start: usize, size: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            start,
            size,
            neighbour_centres: Vec::new(),
        }
    }

    /// 创建处理器 patch
    pub fn processor(
        my_proc: usize,
        neighb_proc: usize,
        start: usize,
        neighbour_centres: Vec<DVec3>,
    ) -> Self {
        Self {
            name: format!("procBoundary{my_proc}to{neighb_proc}"),
            kind: PatchKind::Processor {
                my_proc,
                neighb_proc,
            },
            start,
            size: neighbour_centres.len(),
            neighbour_centres,
        }
    }

    /// 是否为耦合（处理器）边界
    #[inline]
    pub fn is_coupled(&self) -> bool {
        matches!(self.kind, PatchKind::Processor { .. })
    }

    /// 面索引范围
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.size
    }
}

/// 有限体积网格
#[derive(Debug, Clone)]
pub struct FvMesh {
    points: Vec<DVec3>,
    faces: Vec<Vec<usize>>,
    owner: Vec<usize>,
    neighbour: Vec<usize>,
    patches: Vec<Patch>,
    n_cells: usize,

    face_centres: Vec<DVec3>,
    face_areas: Vec<DVec3>,
    mag_sf: Vec<f64>,
    cell_centres: Vec<DVec3>,
    cell_volumes: Vec<f64>,
    weights: Vec<f64>,
    delta_coeffs: Vec<f64>,
    boundary_delta_coeffs: Vec<f64>,

    ldu: Arc<LduAddressing>,
}

impl FvMesh {
    /// 由拓扑创建网格并计算几何量
    ///
    /// - `owner`: 每个面（含边界面）的 owner 单元
    /// - `neighbour`: 每个内部面的 neighbour 单元
    /// - `patches`: 覆盖全部边界面、按面编号连续排列
    pub fn new(
        points: Vec<DVec3>,
        faces: Vec<Vec<usize>>,
        owner: Vec<usize>,
        neighbour: Vec<usize>,
        patches: Vec<Patch>,
    ) -> DaResult<Self> {
        DaError::check_size("owner", faces.len(), owner.len())?;
        let n_faces = faces.len();
        let n_internal = neighbour.len();
        if n_internal > n_faces {
            return Err(DaError::invalid_mesh(format!(
                "内部面数 {n_internal} 超过总面数 {n_faces}"
            )));
        }

        for (f, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(DaError::invalid_mesh(format!("面 {f} 只有 {} 个点", face.len())));
            }
            for &p in face {
                DaError::check_index("Point", p, points.len())?;
            }
        }

        let mut next = n_internal;
        for patch in &patches {
            if patch.start != next {
                return Err(DaError::invalid_mesh(format!(
                    "patch '{}' 起始面 {} 与期望 {next} 不符",
                    patch.name, patch.start
                )));
            }
            if patch.is_coupled() && patch.neighbour_centres.len() != patch.size {
                return Err(DaError::invalid_mesh(format!(
                    "处理器 patch '{}' 缺少相邻单元中心",
                    patch.name
                )));
            }
            next += patch.size;
        }
        if next != n_faces {
            return Err(DaError::invalid_mesh(format!(
                "边界 patch 覆盖到面 {next}，总面数为 {n_faces}"
            )));
        }

        let n_cells = owner
            .iter()
            .chain(neighbour.iter())
            .copied()
            .max()
            .map_or(0, |m| m + 1);
        if n_cells == 0 {
            return Err(DaError::invalid_mesh("网格没有单元"));
        }

        let ldu = Arc::new(LduAddressing::new(
            n_cells,
            owner[..n_internal].to_vec(),
            neighbour.clone(),
        )?);

        let mut mesh = Self {
            points,
            faces,
            owner,
            neighbour,
            patches,
            n_cells,
            face_centres: Vec::new(),
            face_areas: Vec::new(),
            mag_sf: Vec::new(),
            cell_centres: Vec::new(),
            cell_volumes: Vec::new(),
            weights: Vec::new(),
            delta_coeffs: Vec::new(),
            boundary_delta_coeffs: Vec::new(),
            ldu,
        };
        mesh.calc_face_geometry();
        mesh.calc_cell_geometry()?;
        mesh.calc_interpolation();
        Ok(mesh)
    }

    // ========================================================================
    // 几何计算
    // ========================================================================

    fn calc_face_geometry(&mut self) {
        let points = &self.points;
        let (centres, areas): (Vec<DVec3>, Vec<DVec3>) = self
            .faces
            .par_iter()
            .map(|face| face_centre_and_area(points, face))
            .unzip();
        self.mag_sf = areas.iter().map(|a| a.length()).collect();
        self.face_centres = centres;
        self.face_areas = areas;
    }

    /// 以面心平均值为顶点把单元剖分为棱锥
    fn calc_cell_geometry(&mut self) -> DaResult<()> {
        let n = self.n_cells;
        let mut c_est = vec![DVec3::ZERO; n];
        let mut n_cell_faces = vec![0usize; n];
        for (f, &o) in self.owner.iter().enumerate() {
            c_est[o] += self.face_centres[f];
            n_cell_faces[o] += 1;
        }
        for (f, &nb) in self.neighbour.iter().enumerate() {
            c_est[nb] += self.face_centres[f];
            n_cell_faces[nb] += 1;
        }
        for (c, &k) in c_est.iter_mut().zip(&n_cell_faces) {
            *c /= k.max(1) as f64;
        }

        let mut centres = vec![DVec3::ZERO; n];
        let mut volumes = vec![0.0; n];
        for (f, &o) in self.owner.iter().enumerate() {
            let pyr3_vol = self.face_areas[f].dot(self.face_centres[f] - c_est[o]);
            let pc = 0.75 * self.face_centres[f] + 0.25 * c_est[o];
            centres[o] += pyr3_vol * pc;
            volumes[o] += pyr3_vol;
        }
        for (f, &nb) in self.neighbour.iter().enumerate() {
            let pyr3_vol = self.face_areas[f].dot(c_est[nb] - self.face_centres[f]);
            let pc = 0.75 * self.face_centres[f] + 0.25 * c_est[nb];
            centres[nb] += pyr3_vol * pc;
            volumes[nb] += pyr3_vol;
        }

        for c in 0..n {
            if volumes[c].abs() > VSMALL {
                centres[c] /= volumes[c];
            } else {
                centres[c] = c_est[c];
            }
            volumes[c] /= 3.0;
            ensure!(
                volumes[c] > 0.0,
                DaError::invalid_mesh(format!("单元 {c} 体积非正 ({:e})，检查面的朝向", volumes[c]))
            );
        }

        self.cell_centres = centres;
        self.cell_volumes = volumes;
        Ok(())
    }

    fn calc_interpolation(&mut self) {
        let n_internal = self.n_internal_faces();
        let mut weights = Vec::with_capacity(n_internal);
        let mut delta = Vec::with_capacity(n_internal);
        for f in 0..n_internal {
            let sf = self.face_areas[f];
            let cf = self.face_centres[f];
            let co = self.cell_centres[self.owner[f]];
            let cn = self.cell_centres[self.neighbour[f]];

            let own = sf.dot(cf - co).abs();
            let nei = sf.dot(cn - cf).abs();
            weights.push(nei / (own + nei).max(VSMALL));

            let d = cn - co;
            let n_hat = sf / self.mag_sf[f].max(VSMALL);
            delta.push(1.0 / n_hat.dot(d).max(0.05 * d.length()).max(VSMALL));
        }

        let boundary = (n_internal..self.n_faces())
            .map(|f| {
                let n_hat = self.face_areas[f] / self.mag_sf[f].max(VSMALL);
                let d = self.face_centres[f] - self.cell_centres[self.owner[f]];
                1.0 / n_hat.dot(d).max(0.05 * d.length()).max(VSMALL)
            })
            .collect();

        self.weights = weights;
        self.delta_coeffs = delta;
        self.boundary_delta_coeffs = boundary;
    }

    // ========================================================================
    // 访问器
    // ========================================================================

    /// 点数
    #[inline]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// 总面数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// 内部面数
    #[inline]
    pub fn n_internal_faces(&self) -> usize {
        self.neighbour.len()
    }

    /// 点坐标
    #[inline]
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// 面的点列表
    #[inline]
    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    /// 全部面的 owner
    #[inline]
    pub fn owner(&self) -> &[usize] {
        &self.owner
    }

    /// 内部面的 neighbour
    #[inline]
    pub fn neighbour(&self) -> &[usize] {
        &self.neighbour
    }

    /// 边界 patch 列表
    #[inline]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// 按名称查找 patch
    pub fn find_patch(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    /// 面心
    #[inline]
    pub fn face_centres(&self) -> &[DVec3] {
        &self.face_centres
    }

    /// 面积矢量 `Sf`
    #[inline]
    pub fn face_areas(&self) -> &[DVec3] {
        &self.face_areas
    }

    /// 面积 `|Sf|`
    #[inline]
    pub fn mag_sf(&self) -> &[f64] {
        &self.mag_sf
    }

    /// 单元中心
    #[inline]
    pub fn cell_centres(&self) -> &[DVec3] {
        &self.cell_centres
    }

    /// 单元体积
    #[inline]
    pub fn cell_volumes(&self) -> &[f64] {
        &self.cell_volumes
    }

    /// 内部面线性插值权重（owner 侧）
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// 内部面扩散系数 `1/max(n·d, 0.05|d|)`
    #[inline]
    pub fn delta_coeffs(&self) -> &[f64] {
        &self.delta_coeffs
    }

    /// 边界面扩散系数，按 `face - n_internal_faces` 索引
    #[inline]
    pub fn boundary_delta_coeffs(&self) -> &[f64] {
        &self.boundary_delta_coeffs
    }

    /// LDU 寻址
    #[inline]
    pub fn ldu(&self) -> &LduAddressing {
        &self.ldu
    }

    /// 共享的 LDU 寻址（矩阵持有）
    #[inline]
    pub fn ldu_arc(&self) -> Arc<LduAddressing> {
        Arc::clone(&self.ldu)
    }

    /// 到最近壁面的距离
    ///
    /// 逐单元见 [`distance_to_nearest_wall`]。没有壁面时返回 `GREAT`。
    pub fn wall_distance(&self) -> Vec<f64> {
        let wall_faces: Vec<(DVec3, DVec3)> = self
            .patches
            .iter()
            .filter(|p| p.kind == PatchKind::Wall)
            .flat_map(|p| p.range())
            .map(|f| {
                let n_hat = self.face_areas[f] / (self.mag_sf[f] + ROOT_VSMALL);
                (self.face_centres[f], n_hat)
            })
            .collect();

        if wall_faces.is_empty() {
            return vec![GREAT; self.n_cells];
        }

        self.cell_centres
            .par_iter()
            .map(|&c| distance_to_nearest_wall(c, &wall_faces))
            .collect()
    }
}

/// 点到最近壁面面的距离，`wall_faces` 为（面心, 单位法向）且非空
///
/// 取面心最近的壁面面，返回到该面所在平面的距离。点落在该面的延长平面上
/// （凸角附近）时投影退化为 0，因此以到面心距离的一半为下限。
fn distance_to_nearest_wall(c: DVec3, wall_faces: &[(DVec3, DVec3)]) -> f64 {
    let mut best = (f64::MAX, 0usize);
    for (i, (cf, _)) in wall_faces.iter().enumerate() {
        let d2 = (c - *cf).length_squared();
        if d2 < best.0 {
            best = (d2, i);
        }
    }
    let (cf, n_hat) = wall_faces[best.1];
    let to_face = c - cf;
    to_face
        .dot(n_hat)
        .abs()
        .max(0.5 * to_face.length())
        .max(ROOT_VSMALL)
}

/// 多边形面心与面积矢量
///
/// 三角形直接计算；多边形以点平均值为公共顶点剖分为三角形后加权。
pub(crate) fn face_centre_and_area(points: &[DVec3], face: &[usize]) -> (DVec3, DVec3) {
    let n = face.len();
    if n == 3 {
        let (a, b, c) = (points[face[0]], points[face[1]], points[face[2]]);
        return ((a + b + c) / 3.0, 0.5 * (b - a).cross(c - a));
    }

    let mut f_centre = DVec3::ZERO;
    for &p in face {
        f_centre += points[p];
    }
    f_centre /= n as f64;

    let mut sum_n = DVec3::ZERO;
    let mut sum_a = 0.0;
    let mut sum_ac = DVec3::ZERO;
    for i in 0..n {
        let this = points[face[i]];
        let next = points[face[(i + 1) % n]];
        let c = this + next + f_centre;
        let tri_n = (next - this).cross(f_centre - this);
        let a = tri_n.length();
        sum_n += tri_n;
        sum_a += a;
        sum_ac += a * c;
    }

    let centre = if sum_a < ROOT_VSMALL {
        f_centre
    } else {
        sum_ac / (3.0 * sum_a)
    };
    (centre, 0.5 * sum_n)
}
