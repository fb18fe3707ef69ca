// crates/da_adjoint/src/parallel/reconstruct.rs

//! 分区场重构
//!
//! [`FieldReconstructor`] 依据分区寻址把各分区的体场、面场合并回全局网格；
//! [`ReconstructPar`] 以分区 0 的场名列表为准批量重构。

use std::collections::BTreeMap;

use da_foundation::{DaError, DaResult};

use super::decompose::{ProcAddressing, ProcessorMesh};
use crate::fields::{
    BoundaryKind, FieldValue, PatchField, SurfaceScalarField, VolField, VolScalarField,
    VolVectorField,
};
use crate::mesh::FvMesh;

/// 场重构器
#[derive(Debug)]
pub struct FieldReconstructor<'a> {
    mesh: &'a FvMesh,
    procs: &'a [ProcessorMesh],
}

impl<'a> FieldReconstructor<'a> {
    /// 创建，检查分区寻址长度
    pub fn new(mesh: &'a FvMesh, procs: &'a [ProcessorMesh]) -> DaResult<Self> {
        for proc in procs {
            let addr = &proc.addressing;
            let local = &proc.mesh;
            DaError::check_size("cellProcAddressing", local.n_cells(), addr.cell.len())?;
            DaError::check_size("faceProcAddressing", local.n_faces(), addr.face.len())?;
            DaError::check_size("boundaryProcAddressing", local.patches().len(), addr.boundary.len())?;
            for &c in &addr.cell {
                DaError::check_index("Cell", c, mesh.n_cells())?;
            }
            for &code in &addr.face {
                if code == 0 {
                    return Err(DaError::invalid_mesh(format!(
                        "分区 {} 的面寻址含 0",
                        proc.proc_id
                    )));
                }
                DaError::check_index("Face", ProcAddressing::decode_face(code).0, mesh.n_faces())?;
            }
            for gp in addr.boundary.iter().flatten() {
                DaError::check_index("Patch", *gp, mesh.patches().len())?;
            }
        }
        Ok(Self { mesh, procs })
    }

    fn check_count(&self, n: usize) -> DaResult<()> {
        DaError::check_size("processor fields", self.procs.len(), n)
    }

    /// 重构体场（单元值与物理边界）
    pub fn reconstruct_vol_field<T: FieldValue>(&self, fields: &[&VolField<T>]) -> DaResult<VolField<T>> {
        self.check_count(fields.len())?;
        let mesh = self.mesh;

        let mut internal: Vec<Option<T>> = vec![None; mesh.n_cells()];
        let mut boundary: Vec<Option<PatchField<T>>> = vec![None; mesh.patches().len()];

        for (proc, field) in self.procs.iter().zip(fields) {
            DaError::check_size("field internal", proc.mesh.n_cells(), field.internal().len())?;
            for (&g, &v) in proc.addressing.cell.iter().zip(field.internal()) {
                internal[g] = Some(v);
            }

            for (lp, patch) in proc.mesh.patches().iter().enumerate() {
                let Some(gp) = proc.addressing.boundary[lp] else {
                    continue;
                };
                let global_patch = &mesh.patches()[gp];
                let pf = &field.boundary()[lp];
                let target = boundary[gp].get_or_insert_with(|| {
                    PatchField::uniform(pf.kind, global_patch.size, T::default())
                });
                for (k, f) in patch.range().enumerate() {
                    let (gf, _) = ProcAddressing::decode_face(proc.addressing.face[f]);
                    let Some(i) = gf.checked_sub(global_patch.start).filter(|&i| i < global_patch.size)
                    else {
                        return Err(DaError::invalid_mesh(format!(
                            "分区 {} 的面 {f} 映射到 {gf}，不在 patch '{}' 内",
                            proc.proc_id, global_patch.name
                        )));
                    };
                    target.values[i] = pf.values[k];
                    target.ref_values[i] = pf.ref_values[k];
                }
            }
        }

        let internal = internal
            .into_iter()
            .enumerate()
            .map(|(c, v)| v.ok_or_else(|| DaError::invalid_mesh(format!("单元 {c} 未被任何分区覆盖"))))
            .collect::<DaResult<Vec<T>>>()?;
        let boundary = boundary
            .into_iter()
            .zip(mesh.patches())
            .map(|(pf, patch)| {
                pf.unwrap_or_else(|| {
                    PatchField::uniform(BoundaryKind::Calculated, patch.size, T::default())
                })
            })
            .collect();

        let name = fields.first().map_or("", |f| f.name());
        VolField::from_parts(name, mesh, internal, boundary)
    }

    /// 重构面标量场
    ///
    /// 方向与全局面相反的分区面取相反数。
    pub fn reconstruct_surface_field(&self, fields: &[&SurfaceScalarField]) -> DaResult<SurfaceScalarField> {
        self.check_count(fields.len())?;
        let mesh = self.mesh;
        let n_internal = mesh.n_internal_faces();

        let mut values: Vec<Option<f64>> = vec![None; mesh.n_faces()];
        for (proc, field) in self.procs.iter().zip(fields) {
            let local = &proc.mesh;
            let mut put = |f: usize, v: f64| {
                let (gf, flipped) = ProcAddressing::decode_face(proc.addressing.face[f]);
                values[gf] = Some(if flipped { -v } else { v });
            };
            for (f, &v) in field.internal().iter().enumerate() {
                put(f, v);
            }
            for (patch, pv) in local.patches().iter().zip(field.boundary()) {
                for (f, &v) in patch.range().zip(pv) {
                    put(f, v);
                }
            }
        }

        let all = values
            .into_iter()
            .enumerate()
            .map(|(f, v)| v.ok_or_else(|| DaError::invalid_mesh(format!("面 {f} 未被任何分区覆盖"))))
            .collect::<DaResult<Vec<f64>>>()?;
        let boundary = mesh.patches().iter().map(|p| all[p.range()].to_vec()).collect();

        let name = fields.first().map_or("", |f| f.name());
        SurfaceScalarField::from_parts(name, mesh, all[..n_internal].to_vec(), boundary)
    }
}

/// 一个分区上的待重构场
#[derive(Debug, Clone, Default)]
pub struct ProcFieldSet {
    /// 标量体场
    pub scalars: BTreeMap<String, VolScalarField>,
    /// 矢量体场
    pub vectors: BTreeMap<String, VolVectorField>,
    /// 面标量场
    pub surfaces: BTreeMap<String, SurfaceScalarField>,
}

impl ProcFieldSet {
    /// 登记标量体场
    pub fn add_scalar(&mut self, field: VolScalarField) {
        self.scalars.insert(field.name().to_string(), field);
    }

    /// 登记矢量体场
    pub fn add_vector(&mut self, field: VolVectorField) {
        self.vectors.insert(field.name().to_string(), field);
    }

    /// 登记面标量场
    pub fn add_surface(&mut self, field: SurfaceScalarField) {
        self.surfaces.insert(field.name().to_string(), field);
    }
}

/// 重构后的全局场
#[derive(Debug, Clone, Default)]
pub struct ReconstructedFields {
    /// 标量体场
    pub scalars: BTreeMap<String, VolScalarField>,
    /// 矢量体场
    pub vectors: BTreeMap<String, VolVectorField>,
    /// 面标量场
    pub surfaces: BTreeMap<String, SurfaceScalarField>,
}

impl ReconstructedFields {
    /// 场总数
    pub fn len(&self) -> usize {
        self.scalars.len() + self.vectors.len() + self.surfaces.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 批量重构
#[derive(Debug, Default)]
pub struct ReconstructPar {
    selected: Option<Vec<String>>,
}

impl ReconstructPar {
    /// 重构全部场
    pub fn new() -> Self {
        Self::default()
    }

    /// 只重构指定名称的场
    pub fn with_selected(mut self, names: Vec<String>) -> Self {
        self.selected = Some(names);
        self
    }

    fn is_selected(&self, name: &str) -> bool {
        self.selected
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| n == name))
    }

    /// 执行重构
    pub fn run(
        &self,
        mesh: &FvMesh,
        procs: &[ProcessorMesh],
        fields: &[ProcFieldSet],
    ) -> DaResult<ReconstructedFields> {
        DaError::check_size("processor field sets", procs.len(), fields.len())?;
        let first = fields
            .first()
            .ok_or_else(|| DaError::invalid_input("没有分区场可供重构"))?;
        let reconstructor = FieldReconstructor::new(mesh, procs)?;
        let mut out = ReconstructedFields::default();

        log::info!("reconstructPar: {} 个分区", procs.len());

        for name in first.scalars.keys().filter(|n| self.is_selected(n)) {
            let per_proc = collect(fields, name, |set| set.scalars.get(name))?;
            log::info!("    重构 volScalarField {name}");
            out.scalars.insert(name.clone(), reconstructor.reconstruct_vol_field(&per_proc)?);
        }
        for name in first.vectors.keys().filter(|n| self.is_selected(n)) {
            let per_proc = collect(fields, name, |set| set.vectors.get(name))?;
            log::info!("    重构 volVectorField {name}");
            out.vectors.insert(name.clone(), reconstructor.reconstruct_vol_field(&per_proc)?);
        }
        for name in first.surfaces.keys().filter(|n| self.is_selected(n)) {
            let per_proc = collect(fields, name, |set| set.surfaces.get(name))?;
            log::info!("    重构 surfaceScalarField {name}");
            out.surfaces
                .insert(name.clone(), reconstructor.reconstruct_surface_field(&per_proc)?);
        }

        if out.is_empty() {
            log::warn!("reconstructPar: 没有重构任何场");
        }
        Ok(out)
    }
}

fn collect<'a, T>(
    fields: &'a [ProcFieldSet],
    name: &str,
    get: impl Fn(&'a ProcFieldSet) -> Option<&'a T>,
) -> DaResult<Vec<&'a T>> {
    fields
        .iter()
        .enumerate()
        .map(|(p, set)| {
            get(set).ok_or_else(|| DaError::invalid_input(format!("分区 {p} 缺少场 '{name}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FlowFields;
    use crate::mesh::BlockMesh;
    use crate::parallel::decompose::{decompose, simple_x_split};
    use da_config::BlockMeshConfig;
    use glam::DVec3;

    fn split(n_procs: usize) -> (FvMesh, Vec<ProcessorMesh>) {
        let mesh = BlockMesh::new(BlockMeshConfig {
            nx: 6,
            ny: 3,
            nz: 1,
            length: [3.0, 1.0, 0.1],
            y_grading: 1.0,
        })
        .build()
        .unwrap();
        let cell_to_proc = simple_x_split(&mesh, n_procs).unwrap();
        let procs = decompose(&mesh, &cell_to_proc, n_procs).unwrap();
        (mesh, procs)
    }

    #[test]
    fn test_flux_sign_flip() {
        let (mesh, procs) = split(2);
        let global = FlowFields::uniform(&mesh, DVec3::new(1.0, 0.5, 0.0));
        let locals: Vec<SurfaceScalarField> = procs
            .iter()
            .map(|p| FlowFields::uniform(&p.mesh, DVec3::new(1.0, 0.5, 0.0)).phi)
            .collect();
        let refs: Vec<&SurfaceScalarField> = locals.iter().collect();

        let rec = FieldReconstructor::new(&mesh, &procs)
            .unwrap()
            .reconstruct_surface_field(&refs)
            .unwrap();
        for (a, b) in rec.internal().iter().zip(global.phi.internal()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_missing_field_rejected() {
        let (mesh, procs) = split(2);
        let mut sets = vec![ProcFieldSet::default(), ProcFieldSet::default()];
        sets[0].add_scalar(VolScalarField::new("p", &procs[0].mesh, 0.0));
        let err = ReconstructPar::new().run(&mesh, &procs, &sets).unwrap_err();
        assert!(err.to_string().contains("'p'"));
    }

    #[test]
    fn test_selected_fields_only() {
        let (mesh, procs) = split(2);
        let sets: Vec<ProcFieldSet> = procs
            .iter()
            .map(|p| {
                let mut set = ProcFieldSet::default();
                set.add_scalar(VolScalarField::new("p", &p.mesh, 1.0));
                set.add_scalar(VolScalarField::new("nuTilda", &p.mesh, 2.0));
                set
            })
            .collect();
        let out = ReconstructPar::new()
            .with_selected(vec!["nuTilda".to_string()])
            .run(&mesh, &procs, &sets)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert!(out.scalars["nuTilda"].internal().iter().all(|&v| v == 2.0));
    }
}
