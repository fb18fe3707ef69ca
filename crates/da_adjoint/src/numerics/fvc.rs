// crates/da_adjoint/src/numerics/fvc.rs

//! 显式有限体积运算（Gauss 线性格式）
//!
//! 结果为单元或面上的数值，不生成矩阵。`empty` 边界不参与积分。

use glam::{DMat3, DVec3};

use crate::fields::{SurfaceScalarField, VolVectorField};
use crate::mesh::{FvMesh, PatchKind};
use crate::numerics::linear_algebra::LduScalar;

/// 面通量 `phi = U_f · Sf`
pub fn flux(mesh: &FvMesh, u: &VolVectorField) -> SurfaceScalarField {
    let sf = mesh.face_areas();
    let w = mesh.weights();
    let (own, nei) = (mesh.owner(), mesh.neighbour());
    let ui = u.internal();

    let internal = (0..mesh.n_internal_faces())
        .map(|f| (w[f] * ui[own[f]] + (1.0 - w[f]) * ui[nei[f]]).dot(sf[f]))
        .collect();
    let boundary = mesh
        .patches()
        .iter()
        .zip(u.boundary())
        .map(|(patch, pf)| {
            if patch.kind == PatchKind::Empty {
                return vec![0.0; patch.size];
            }
            patch
                .range()
                .zip(&pf.values)
                .map(|(f, ub)| ub.dot(sf[f]))
                .collect()
        })
        .collect();

    SurfaceScalarField::from_parts("phi", mesh, internal, boundary)
        .unwrap_or_else(|_| SurfaceScalarField::new("phi", mesh, 0.0))
}

/// 线性插值到内部面，边界面值由调用方给出
pub fn interpolate<T: LduScalar>(mesh: &FvMesh, internal: &[T]) -> Vec<T> {
    let w = mesh.weights();
    let (own, nei) = (mesh.owner(), mesh.neighbour());
    (0..mesh.n_internal_faces())
        .map(|f| T::from(w[f]) * internal[own[f]] + T::from(1.0 - w[f]) * internal[nei[f]])
        .collect()
}

/// 标量梯度 `Σ Sf φ_f / V`
///
/// `boundary` 为逐 patch 的边界面值，返回每个单元的三个分量。
pub fn grad<T: LduScalar>(mesh: &FvMesh, internal: &[T], boundary: &[Vec<T>]) -> Vec<[T; 3]> {
    let sf = mesh.face_areas();
    let own = mesh.owner();
    let nei = mesh.neighbour();
    let zero = T::from(0.0);
    let mut g = vec![[zero; 3]; mesh.n_cells()];

    for (f, phi_f) in interpolate(mesh, internal).into_iter().enumerate() {
        let s = sf[f].to_array();
        for k in 0..3 {
            let sk = T::from(s[k]) * phi_f;
            g[own[f]][k] = g[own[f]][k] + sk;
            g[nei[f]][k] = g[nei[f]][k] - sk;
        }
    }
    for (patch, values) in mesh.patches().iter().zip(boundary) {
        if patch.kind == PatchKind::Empty {
            continue;
        }
        for (f, &v) in patch.range().zip(values) {
            let s = sf[f].to_array();
            for k in 0..3 {
                g[own[f]][k] = g[own[f]][k] + T::from(s[k]) * v;
            }
        }
    }
    for (gc, &vol) in g.iter_mut().zip(mesh.cell_volumes()) {
        for c in gc.iter_mut() {
            *c = *c / T::from(vol);
        }
    }
    g
}

/// 外积 `a ⊗ b`，分量 `(i, j) = a_i b_j`
#[inline]
fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

/// 速度梯度 `∇U`，分量 `(i, j) = ∂U_j/∂x_i`
pub fn grad_vector(mesh: &FvMesh, u: &VolVectorField) -> Vec<DMat3> {
    let sf = mesh.face_areas();
    let w = mesh.weights();
    let (own, nei) = (mesh.owner(), mesh.neighbour());
    let ui = u.internal();
    let mut g = vec![DMat3::ZERO; mesh.n_cells()];

    for f in 0..mesh.n_internal_faces() {
        let uf = w[f] * ui[own[f]] + (1.0 - w[f]) * ui[nei[f]];
        let s = outer(sf[f], uf);
        g[own[f]] += s;
        g[nei[f]] -= s;
    }
    for (patch, pf) in mesh.patches().iter().zip(u.boundary()) {
        if patch.kind == PatchKind::Empty {
            continue;
        }
        for (f, &ub) in patch.range().zip(&pf.values) {
            g[own[f]] += outer(sf[f], ub);
        }
    }
    for (gc, &vol) in g.iter_mut().zip(mesh.cell_volumes()) {
        *gc *= 1.0 / vol;
    }
    g
}

/// 张量模 `sqrt(T:T)`
#[inline]
pub fn mag_tensor(t: &DMat3) -> f64 {
    (t.x_axis.length_squared() + t.y_axis.length_squared() + t.z_axis.length_squared()).sqrt()
}

/// 涡量模 `sqrt(2) |skew(∇U)|`
pub fn vorticity_magnitude(grad_u: &[DMat3]) -> Vec<f64> {
    grad_u
        .iter()
        .map(|g| {
            let skew = (*g - g.transpose()) * 0.5;
            std::f64::consts::SQRT_2 * mag_tensor(&skew)
        })
        .collect()
}

/// 通量散度 `Σ phi / V`
pub fn div_flux(mesh: &FvMesh, phi: &SurfaceScalarField) -> Vec<f64> {
    let (own, nei) = (mesh.owner(), mesh.neighbour());
    let mut d = vec![0.0; mesh.n_cells()];
    for (f, &p) in phi.internal().iter().enumerate() {
        d[own[f]] += p;
        d[nei[f]] -= p;
    }
    for (patch, values) in mesh.patches().iter().zip(phi.boundary()) {
        for (f, &p) in patch.range().zip(values) {
            d[own[f]] += p;
        }
    }
    for (dc, &vol) in d.iter_mut().zip(mesh.cell_volumes()) {
        *dc /= vol;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{BoundaryKind, VolScalarField};
    use crate::mesh::BlockMesh;
    use da_config::BlockMeshConfig;
    use num_dual::Dual64;

    fn mesh() -> FvMesh {
        BlockMesh::new(BlockMeshConfig {
            nx: 4,
            ny: 4,
            nz: 1,
            length: [1.0, 1.0, 0.1],
            y_grading: 1.0,
        })
        .build()
        .unwrap()
    }

    /// 边界值取面心处精确值的线性场
    fn linear_field(mesh: &FvMesh, a: DVec3) -> VolScalarField {
        let mut field = VolScalarField::calculated("T", mesh, 0.0);
        for (c, v) in field.internal_mut().iter_mut().enumerate() {
            *v = a.dot(mesh.cell_centres()[c]);
        }
        for (patch, pf) in mesh.patches().iter().zip(field.boundary_mut()) {
            for (i, f) in patch.range().enumerate() {
                pf.values[i] = a.dot(mesh.face_centres()[f]);
            }
        }
        field
    }

    #[test]
    fn test_grad_of_linear_field_is_exact() {
        let mesh = mesh();
        let a = DVec3::new(2.0, -3.0, 0.0);
        let field = linear_field(&mesh, a);
        let g = grad(&mesh, field.internal(), &field.boundary_values());
        for gc in g {
            assert!((DVec3::from_array(gc) - a).length() < 1e-10);
        }
    }

    #[test]
    fn test_dual_grad_is_linear_in_seed() {
        // 梯度对单元值线性，对偶部等于以种子为单元值的梯度
        let mesh = mesh();
        let field = linear_field(&mesh, DVec3::new(1.0, 2.0, 0.0));
        let mut seeded: Vec<Dual64> = field.internal().iter().map(|&v| Dual64::from(v)).collect();
        seeded[5].eps = 1.0;
        let boundary: Vec<Vec<Dual64>> = field
            .boundary_values()
            .iter()
            .map(|p| p.iter().map(|&v| Dual64::from(v)).collect())
            .collect();
        let dual = grad(&mesh, &seeded, &boundary);

        let mut unit = vec![0.0; mesh.n_cells()];
        unit[5] = 1.0;
        let zeros: Vec<Vec<f64>> = mesh.patches().iter().map(|p| vec![0.0; p.size]).collect();
        let expected = grad(&mesh, &unit, &zeros);
        for (d, e) in dual.iter().zip(&expected) {
            for k in 0..3 {
                assert!((d[k].eps - e[k]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_uniform_flow_is_divergence_free() {
        let mesh = mesh();
        let u = VolVectorField::calculated("U", &mesh, DVec3::new(3.0, 1.0, 0.0));
        let phi = flux(&mesh, &u);
        for d in div_flux(&mesh, &phi) {
            assert!(d.abs() < 1e-10);
        }
    }

    #[test]
    fn test_shear_flow_vorticity() {
        let mesh = mesh();
        let gamma = 5.0;
        let mut u = VolVectorField::calculated("U", &mesh, DVec3::ZERO);
        for (c, v) in u.internal_mut().iter_mut().enumerate() {
            *v = DVec3::new(gamma * mesh.cell_centres()[c].y, 0.0, 0.0);
        }
        for (p, patch) in mesh.patches().iter().enumerate() {
            let values: Vec<DVec3> = patch
                .range()
                .map(|f| DVec3::new(gamma * mesh.face_centres()[f].y, 0.0, 0.0))
                .collect();
            u.boundary_mut()[p].values = values;
            assert_eq!(u.boundary()[p].kind, BoundaryKind::Calculated);
        }
        let omega = vorticity_magnitude(&grad_vector(&mesh, &u));
        for w in omega {
            assert!((w - gamma).abs() < 1e-9);
        }
    }
}
