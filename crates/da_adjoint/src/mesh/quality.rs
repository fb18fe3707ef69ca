// crates/da_adjoint/src/mesh/quality.rs

//! 逐面网格质量指标
//!
//! - 正交性 `d·Sf / (|d| |Sf|)`，1 为完全正交
//! - 非正交角（度）
//! - 偏斜度：面心到单元中心连线的偏离量，按面尺度归一化
//!
//! 非耦合边界面的正交性恒为 1；处理器边界面使用光环中的相邻单元中心，
//! 与未分区网格上的内部面结果一致。

use da_foundation::ROOT_VSMALL;
use glam::DVec3;
use rayon::prelude::*;

use super::fv_mesh::FvMesh;

/// 非正交角计算时对余弦值的截断界
pub const ORTHO_BOUND: f64 = 1.0 - 1e-6;

impl FvMesh {
    /// 每个面的相邻单元中心（内部面与处理器面），非耦合边界面返回 `None`
    fn coupled_neighbour_centre(&self, face: usize) -> Option<DVec3> {
        let n_internal = self.n_internal_faces();
        if face < n_internal {
            return Some(self.cell_centres()[self.neighbour()[face]]);
        }
        self.patches()
            .iter()
            .find(|p| p.range().contains(&face))
            .filter(|p| p.is_coupled())
            .map(|p| p.neighbour_centres[face - p.start])
    }

    /// 逐面正交性
    pub fn face_orthogonality(&self) -> Vec<f64> {
        let neighbours: Vec<Option<DVec3>> = (0..self.n_faces())
            .map(|f| self.coupled_neighbour_centre(f))
            .collect();
        let owner = self.owner();
        let cc = self.cell_centres();
        let sf = self.face_areas();

        neighbours
            .par_iter()
            .enumerate()
            .map(|(f, nei)| match nei {
                Some(cn) => {
                    let d = *cn - cc[owner[f]];
                    d.dot(sf[f]) / (d.length() * sf[f].length() + ROOT_VSMALL)
                }
                None => 1.0,
            })
            .collect()
    }

    /// 逐面非正交角（度）
    pub fn non_ortho_angle(&self) -> Vec<f64> {
        self.face_orthogonality()
            .into_iter()
            .map(|v| v.clamp(-ORTHO_BOUND, ORTHO_BOUND).acos().to_degrees())
            .collect()
    }

    /// 逐面偏斜度
    pub fn face_skewness(&self) -> Vec<f64> {
        let neighbours: Vec<Option<DVec3>> = (0..self.n_faces())
            .map(|f| self.coupled_neighbour_centre(f))
            .collect();

        (0..self.n_faces())
            .into_par_iter()
            .map(|f| {
                let own_cc = self.cell_centres()[self.owner()[f]];
                match neighbours[f] {
                    Some(nei_cc) => self.skewness(f, own_cc, nei_cc - own_cc, 0.2),
                    None => {
                        let cpf = self.face_centres()[f] - own_cc;
                        let sf = self.face_areas()[f];
                        let normal = sf / (sf.length() + ROOT_VSMALL);
                        self.skewness(f, own_cc, normal * normal.dot(cpf), 0.4)
                    }
                }
            })
            .collect()
    }

    fn skewness(&self, face: usize, own_cc: DVec3, d: DVec3, d_factor: f64) -> f64 {
        let cf = self.face_centres()[face];
        let sf = self.face_areas()[face];
        let cpf = cf - own_cc;

        let sv = cpf - (sf.dot(cpf) / (sf.dot(d) + ROOT_VSMALL)) * d;
        let sv_hat = sv / (sv.length() + ROOT_VSMALL);

        let mut fd = d_factor * d.length() + ROOT_VSMALL;
        for &p in &self.faces()[face] {
            fd = fd.max(sv_hat.dot(self.points()[p] - cf).abs());
        }
        sv.length() / fd
    }
}
