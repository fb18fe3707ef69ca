// crates/da_adjoint/src/mesh/block.rs

//! 结构化块网格生成
//!
//! 在长方体 `[0, lx] x [0, ly] x [0, lz]` 上生成六面体网格，
//! 输出为一般多面体 [`FvMesh`]。边界 patch 依次为：
//!
//! | patch | 位置 | 类型 |
//! |-------|------|------|
//! | `inlet` | x = 0 | patch |
//! | `outlet` | x = lx | patch |
//! | `wall` | y = 0 | wall |
//! | `top` | y = ly | patch |
//! | `frontAndBack` | z = 0, lz | empty（nz = 1）或 symmetry |
//!
//! `with_shear` 在 x 方向按 `x += shear * y` 错切点坐标，
//! 用于生成非正交网格。

use da_config::BlockMeshConfig;
use da_foundation::{DaError, DaResult};
use glam::DVec3;

use super::fv_mesh::{FvMesh, Patch, PatchKind};

/// 块网格生成器
#[derive(Debug, Clone)]
pub struct BlockMesh {
    config: BlockMeshConfig,
    shear: f64,
}

impl BlockMesh {
    /// 创建生成器
    pub fn new(config: BlockMeshConfig) -> Self {
        Self { config, shear: 0.0 }
    }

    /// 设置 x 方向错切系数
    pub fn with_shear(mut self, shear: f64) -> Self {
        self.shear = shear;
        self
    }

    /// y 方向网格线坐标（几何增长）
    fn y_lines(&self) -> Vec<f64> {
        let ny = self.config.ny;
        let ly = self.config.length[1];
        let ratio = if ny > 1 {
            self.config.y_grading.powf(1.0 / (ny - 1) as f64)
        } else {
            1.0
        };
        let widths: Vec<f64> = (0..ny).map(|j| ratio.powi(j as i32)).collect();
        let total: f64 = widths.iter().sum();

        let mut lines = Vec::with_capacity(ny + 1);
        let mut y = 0.0;
        lines.push(0.0);
        for w in widths {
            y += w * ly / total;
            lines.push(y);
        }
        lines[ny] = ly;
        lines
    }

    /// 生成网格
    pub fn build(&self) -> DaResult<FvMesh> {
        let BlockMeshConfig { nx, ny, nz, length, .. } = self.config;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(DaError::invalid_input(format!(
                "块网格单元数必须为正: {nx} x {ny} x {nz}"
            )));
        }

        let ys = self.y_lines();
        let pid = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
        let cid = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);

        let mut points = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    let x = length[0] * i as f64 / nx as f64;
                    let y = ys[j];
                    let z = length[2] * k as f64 / nz as f64;
                    points.push(DVec3::new(x + self.shear * y, y, z));
                }
            }
        }

        // 法向分别为 +x、+y、+z 的四边形面
        let x_face = |i, j, k| vec![pid(i, j, k), pid(i, j + 1, k), pid(i, j + 1, k + 1), pid(i, j, k + 1)];
        let y_face = |i, j, k| vec![pid(i, j, k), pid(i, j, k + 1), pid(i + 1, j, k + 1), pid(i + 1, j, k)];
        let z_face = |i, j, k| vec![pid(i, j, k), pid(i + 1, j, k), pid(i + 1, j + 1, k), pid(i, j + 1, k)];
        let reversed = |mut f: Vec<usize>| {
            f.reverse();
            f
        };

        let mut internal: Vec<(usize, usize, Vec<usize>)> = Vec::new();
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let c = cid(i, j, k);
                    if i + 1 < nx {
                        internal.push((c, cid(i + 1, j, k), x_face(i + 1, j, k)));
                    }
                    if j + 1 < ny {
                        internal.push((c, cid(i, j + 1, k), y_face(i, j + 1, k)));
                    }
                    if k + 1 < nz {
                        internal.push((c, cid(i, j, k + 1), z_face(i, j, k + 1)));
                    }
                }
            }
        }
        internal.sort_by_key(|&(o, n, _)| (o, n));

        let mut faces = Vec::new();
        let mut owner = Vec::new();
        let mut neighbour = Vec::new();
        for (o, n, f) in internal {
            faces.push(f);
            owner.push(o);
            neighbour.push(n);
        }

        let mut patches = Vec::new();
        let mut add_patch = |name: &str,
                             kind: PatchKind,
                             patch_faces: Vec<(usize, Vec<usize>)>,
                             faces: &mut Vec<Vec<usize>>,
                             owner: &mut Vec<usize>| {
            let start = faces.len();
            let size = patch_faces.len();
            for (c, f) in patch_faces {
                faces.push(f);
                owner.push(c);
            }
            patches.push(Patch::new(name, kind, start, size));
        };

        let mut inlet = Vec::new();
        let mut outlet = Vec::new();
        for k in 0..nz {
            for j in 0..ny {
                inlet.push((cid(0, j, k), reversed(x_face(0, j, k))));
                outlet.push((cid(nx - 1, j, k), x_face(nx, j, k)));
            }
        }
        let mut wall = Vec::new();
        let mut top = Vec::new();
        for k in 0..nz {
            for i in 0..nx {
                wall.push((cid(i, 0, k), reversed(y_face(i, 0, k))));
                top.push((cid(i, ny - 1, k), y_face(i, ny, k)));
            }
        }
        let mut front_back = Vec::new();
        for j in 0..ny {
            for i in 0..nx {
                front_back.push((cid(i, j, 0), reversed(z_face(i, j, 0))));
            }
        }
        for j in 0..ny {
            for i in 0..nx {
                front_back.push((cid(i, j, nz - 1), z_face(i, j, nz)));
            }
        }

        let side_kind = if nz == 1 {
            PatchKind::Empty
        } else {
            PatchKind::Symmetry
        };
        add_patch("inlet", PatchKind::Patch, inlet, &mut faces, &mut owner);
        add_patch("outlet", PatchKind::Patch, outlet, &mut faces, &mut owner);
        add_patch("wall", PatchKind::Wall, wall, &mut faces, &mut owner);
        add_patch("top", PatchKind::Patch, top, &mut faces, &mut owner);
        add_patch("frontAndBack", side_kind, front_back, &mut faces, &mut owner);

        log::debug!(
            "块网格: {nx} x {ny} x {nz} = {} 单元, {} 内部面, {} 边界 patch",
            nx * ny * nz,
            neighbour.len(),
            patches.len()
        );

        FvMesh::new(points, faces, owner, neighbour, patches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(nx: usize, ny: usize, nz: usize) -> BlockMeshConfig {
        BlockMeshConfig {
            nx,
            ny,
            nz,
            length: [1.0, 1.0, 1.0],
            y_grading: 1.0,
        }
    }

    #[test]
    fn test_counts() {
        let mesh = BlockMesh::new(config(4, 3, 2)).build().unwrap();
        assert_eq!(mesh.n_cells(), 24);
        // (nx-1)*ny*nz + nx*(ny-1)*nz + nx*ny*(nz-1)
        assert_eq!(mesh.n_internal_faces(), 3 * 3 * 2 + 4 * 2 * 2 + 4 * 3);
        assert_eq!(mesh.patches().len(), 5);
        assert_eq!(mesh.patches()[4].kind, PatchKind::Symmetry);
    }

    #[test]
    fn test_total_volume() {
        let mut cfg = config(5, 4, 1);
        cfg.y_grading = 3.0;
        let mesh = BlockMesh::new(cfg).build().unwrap();
        let total: f64 = mesh.cell_volumes().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_grading_refines_wall() {
        let mut cfg = config(1, 4, 1);
        cfg.y_grading = 4.0;
        let mesh = BlockMesh::new(cfg).build().unwrap();
        let v = mesh.cell_volumes();
        assert!(v[0] < v[3]);
        assert!((v[3] / v[0] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_shear_keeps_volume() {
        let mesh = BlockMesh::new(config(3, 3, 1)).with_shear(0.5).build().unwrap();
        let total: f64 = mesh.cell_volumes().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }
}
