// crates/da_adjoint/src/parallel/decompose.rs

//! 按单元分配表分解网格
//!
//! 每个分区得到一个带处理器 patch 的局部网格，以及回到全局网格的寻址：
//!
//! - `cell[i]`: 局部单元 i 的全局单元号
//! - `face[f]`: `±(全局面号 + 1)`，负号表示局部面与全局面方向相反
//! - `boundary[p]`: 局部 patch p 对应的全局 patch，处理器 patch 为 `None`
//! - `point[k]`: 局部点 k 的全局点号

use std::collections::BTreeMap;

use da_foundation::{DaError, DaResult};
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::mesh::{FvMesh, Patch};

/// 分区到全局的寻址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcAddressing {
    /// 单元
    pub cell: Vec<usize>,
    /// 面（带方向符号，从 1 起）
    pub face: Vec<i64>,
    /// patch
    pub boundary: Vec<Option<usize>>,
    /// 点
    pub point: Vec<usize>,
}

impl ProcAddressing {
    /// 解码面寻址：`(全局面号, 是否翻转)`
    #[inline]
    pub fn decode_face(code: i64) -> (usize, bool) {
        ((code.unsigned_abs() - 1) as usize, code < 0)
    }

    #[inline]
    fn encode_face(global: usize, flipped: bool) -> i64 {
        let code = global as i64 + 1;
        if flipped {
            -code
        } else {
            code
        }
    }
}

/// 一个分区
#[derive(Debug, Clone)]
pub struct ProcessorMesh {
    /// 分区编号
    pub proc_id: usize,
    /// 局部网格
    pub mesh: FvMesh,
    /// 到全局网格的寻址
    pub addressing: ProcAddressing,
}

/// 按 x 方向单元中心坐标把单元均分到 `n_procs` 个分区
pub fn simple_x_split(mesh: &FvMesh, n_procs: usize) -> DaResult<Vec<usize>> {
    if n_procs == 0 || n_procs > mesh.n_cells() {
        return Err(DaError::invalid_input(format!(
            "分区数 {n_procs} 必须在 1..={} 之间",
            mesh.n_cells()
        )));
    }
    let mut order: Vec<usize> = (0..mesh.n_cells()).collect();
    let centres = mesh.cell_centres();
    order.sort_by(|&a, &b| centres[a].x.total_cmp(&centres[b].x).then(a.cmp(&b)));

    let mut cell_to_proc = vec![0; mesh.n_cells()];
    for (rank, &cell) in order.iter().enumerate() {
        cell_to_proc[cell] = rank * n_procs / mesh.n_cells();
    }
    Ok(cell_to_proc)
}

/// 局部面的临时表示
struct LocalFace {
    vertices: Vec<usize>,
    owner: usize,
    code: i64,
}

/// 分解网格
pub fn decompose(mesh: &FvMesh, cell_to_proc: &[usize], n_procs: usize) -> DaResult<Vec<ProcessorMesh>> {
    DaError::check_size("cell_to_proc", mesh.n_cells(), cell_to_proc.len())?;
    for &p in cell_to_proc {
        DaError::check_index("Processor", p, n_procs)?;
    }
    if mesh.patches().iter().any(Patch::is_coupled) {
        return Err(DaError::invalid_mesh("只能分解不含处理器边界的全局网格"));
    }

    let mut local_index = vec![0usize; mesh.n_cells()];
    let mut cells: Vec<Vec<usize>> = vec![Vec::new(); n_procs];
    for (c, &p) in cell_to_proc.iter().enumerate() {
        local_index[c] = cells[p].len();
        cells[p].push(c);
    }

    (0..n_procs)
        .map(|p| {
            if cells[p].is_empty() {
                return Err(DaError::invalid_input(format!("分区 {p} 没有单元")));
            }
            build_processor(mesh, p, cell_to_proc, &local_index, &cells[p])
        })
        .collect()
}

fn build_processor(
    mesh: &FvMesh,
    proc_id: usize,
    cell_to_proc: &[usize],
    local_index: &[usize],
    proc_cells: &[usize],
) -> DaResult<ProcessorMesh> {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let faces = mesh.faces();

    let mut internal: Vec<(LocalFace, usize)> = Vec::new();
    // 相邻分区 -> (全局面, 是否本分区持有 owner)
    let mut shared: BTreeMap<usize, Vec<(usize, bool)>> = BTreeMap::new();

    for f in 0..mesh.n_internal_faces() {
        let (po, pn) = (cell_to_proc[owner[f]], cell_to_proc[neighbour[f]]);
        match (po == proc_id, pn == proc_id) {
            (true, true) => internal.push((
                LocalFace {
                    vertices: faces[f].clone(),
                    owner: local_index[owner[f]],
                    code: ProcAddressing::encode_face(f, false),
                },
                local_index[neighbour[f]],
            )),
            (true, false) => shared.entry(pn).or_default().push((f, true)),
            (false, true) => shared.entry(po).or_default().push((f, false)),
            (false, false) => {}
        }
    }

    let mut boundary_faces: Vec<LocalFace> = Vec::new();
    let mut patches = Vec::new();
    let mut boundary_map = Vec::new();
    let mut start = internal.len();

    for (pi, patch) in mesh.patches().iter().enumerate() {
        let before = boundary_faces.len();
        for f in patch.range() {
            if cell_to_proc[owner[f]] == proc_id {
                boundary_faces.push(LocalFace {
                    vertices: faces[f].clone(),
                    owner: local_index[owner[f]],
                    code: ProcAddressing::encode_face(f, false),
                });
            }
        }
        let size = boundary_faces.len() - before;
        patches.push(Patch::new(patch.name.clone(), patch.kind, start, size));
        boundary_map.push(Some(pi));
        start += size;
    }

    for (&nb_proc, list) in &shared {
        let mut centres: Vec<DVec3> = Vec::with_capacity(list.len());
        for &(f, own_side) in list {
            let (mine, theirs) = if own_side {
                (owner[f], neighbour[f])
            } else {
                (neighbour[f], owner[f])
            };
            let mut vertices = faces[f].clone();
            if !own_side {
                vertices.reverse();
            }
            boundary_faces.push(LocalFace {
                vertices,
                owner: local_index[mine],
                code: ProcAddressing::encode_face(f, !own_side),
            });
            centres.push(mesh.cell_centres()[theirs]);
        }
        let size = centres.len();
        patches.push(Patch::processor(proc_id, nb_proc, start, centres));
        boundary_map.push(None);
        start += size;
    }

    // 点按全局编号升序重新编号
    let mut point_map: BTreeMap<usize, usize> = BTreeMap::new();
    for face in internal.iter().map(|(lf, _)| lf).chain(&boundary_faces) {
        for &v in &face.vertices {
            point_map.insert(v, 0);
        }
    }
    for (k, slot) in point_map.values_mut().enumerate() {
        *slot = k;
    }
    let points: Vec<DVec3> = point_map.keys().map(|&g| mesh.points()[g]).collect();
    let point_addr: Vec<usize> = point_map.keys().copied().collect();

    let n_faces = internal.len() + boundary_faces.len();
    let mut local_faces = Vec::with_capacity(n_faces);
    let mut local_owner = Vec::with_capacity(n_faces);
    let mut local_neighbour = Vec::with_capacity(internal.len());
    let mut face_addr = Vec::with_capacity(n_faces);

    let mut push_face = |lf: LocalFace| {
        local_faces.push(lf.vertices.iter().map(|v| point_map[v]).collect::<Vec<_>>());
        local_owner.push(lf.owner);
        face_addr.push(lf.code);
    };
    for (lf, nb) in internal {
        push_face(lf);
        local_neighbour.push(nb);
    }
    for lf in boundary_faces {
        push_face(lf);
    }

    log::debug!(
        "分区 {proc_id}: {} 单元, {} 内部面, {} 处理器 patch",
        proc_cells.len(),
        local_neighbour.len(),
        shared.len()
    );

    let local = FvMesh::new(points, local_faces, local_owner, local_neighbour, patches)?;
    Ok(ProcessorMesh {
        proc_id,
        mesh: local,
        addressing: ProcAddressing {
            cell: proc_cells.to_vec(),
            face: face_addr,
            boundary: boundary_map,
            point: point_addr,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{BlockMesh, PatchKind};
    use da_config::BlockMeshConfig;

    fn mesh() -> FvMesh {
        BlockMesh::new(BlockMeshConfig {
            nx: 4,
            ny: 2,
            nz: 1,
            length: [2.0, 1.0, 0.1],
            y_grading: 1.0,
        })
        .build()
        .unwrap()
    }

    #[test]
    fn test_face_code_round_trip() {
        assert_eq!(ProcAddressing::decode_face(ProcAddressing::encode_face(0, false)), (0, false));
        assert_eq!(ProcAddressing::decode_face(ProcAddressing::encode_face(7, true)), (7, true));
    }

    #[test]
    fn test_two_way_split() {
        let mesh = mesh();
        let cell_to_proc = simple_x_split(&mesh, 2).unwrap();
        let procs = decompose(&mesh, &cell_to_proc, 2).unwrap();
        assert_eq!(procs.len(), 2);

        let total: usize = procs.iter().map(|p| p.mesh.n_cells()).sum();
        assert_eq!(total, mesh.n_cells());

        // x 方向一刀切，两侧各有 ny 个处理器面
        for (p, proc) in procs.iter().enumerate() {
            let last = proc.mesh.patches().last().unwrap();
            assert_eq!(last.kind, PatchKind::Processor { my_proc: p, neighb_proc: 1 - p });
            assert_eq!(last.size, 2);
            assert_eq!(proc.addressing.boundary.last(), Some(&None));
        }

        // 第二分区持有 neighbour 一侧，处理器面方向翻转
        let p1 = &procs[1];
        let patch = p1.mesh.patches().last().unwrap();
        for f in patch.range() {
            assert!(p1.addressing.face[f] < 0);
        }
    }

    #[test]
    fn test_volumes_preserved() {
        let mesh = mesh();
        let cell_to_proc = simple_x_split(&mesh, 3).unwrap();
        let procs = decompose(&mesh, &cell_to_proc, 3).unwrap();
        for proc in &procs {
            for (i, &g) in proc.addressing.cell.iter().enumerate() {
                assert!((proc.mesh.cell_volumes()[i] - mesh.cell_volumes()[g]).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn test_invalid_proc_rejected() {
        let mesh = mesh();
        let cell_to_proc = vec![5; mesh.n_cells()];
        assert!(decompose(&mesh, &cell_to_proc, 2).is_err());
    }
}
