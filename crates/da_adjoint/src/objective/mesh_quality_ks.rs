// crates/da_adjoint/src/objective/mesh_quality_ks.rs

//! 网格质量 KS 聚合目标
//!
//! ```text
//! f = ln( Σ_faces exp(coeffKS · m_f) ) / coeffKS
//! ```
//!
//! 求和跨分区归约，`coeffKS` 越大越接近逐面最大值。字典中的 `scale`
//! 只经 [`Objective::scale`] 提供给调用方，不乘入 `f`。
//! 默认排除处理器边界面（`includeProcPatches = 0`）。

use std::str::FromStr;
use std::sync::Arc;

use da_config::ObjFuncDict;
use da_foundation::{ensure, DaError, DaResult};

use super::{ObjFuncKind, Objective};
use crate::mesh::FvMesh;
use crate::parallel::Communicator;

/// 求和项超过该值视为溢出
pub const KS_OVERFLOW_LIMIT: f64 = 1e200;

/// 网格质量指标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshQualityMetric {
    /// 正交性（0~1）
    FaceOrthogonality,
    /// 非正交角（度）
    NonOrthoAngle,
    /// 偏斜度
    FaceSkewness,
}

impl MeshQualityMetric {
    /// 全部可选名称
    pub const NAMES: [&'static str; 3] = ["faceOrthogonality", "nonOrthoAngle", "faceSkewness"];

    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::FaceOrthogonality => "faceOrthogonality",
            Self::NonOrthoAngle => "nonOrthoAngle",
            Self::FaceSkewness => "faceSkewness",
        }
    }

    /// 逐面计算指标
    pub fn evaluate(&self, mesh: &FvMesh) -> Vec<f64> {
        match self {
            Self::FaceOrthogonality => mesh.face_orthogonality(),
            Self::NonOrthoAngle => mesh.non_ortho_angle(),
            Self::FaceSkewness => mesh.face_skewness(),
        }
    }
}

impl FromStr for MeshQualityMetric {
    type Err = DaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "faceOrthogonality" => Ok(Self::FaceOrthogonality),
            "nonOrthoAngle" => Ok(Self::NonOrthoAngle),
            "faceSkewness" => Ok(Self::FaceSkewness),
            other => Err(DaError::invalid_config(
                "metric",
                other,
                format!("可选: {}", Self::NAMES.join(", ")),
            )),
        }
    }
}

/// 本分区的 KS 求和项
///
/// 每累加一项即检查是否超过 [`KS_OVERFLOW_LIMIT`]。
pub fn ks_local_sum(values: &[f64], include: &[bool], coeff_ks: f64) -> DaResult<f64> {
    DaError::check_size("includeFaceList", values.len(), include.len())?;
    let mut sum = 0.0;
    for (&v, &inc) in values.iter().zip(include) {
        if inc {
            sum += (coeff_ks * v).exp();
        }
        ensure!(
            sum <= KS_OVERFLOW_LIMIT,
            DaError::overflow("KS 求和项过大, 请减小 coeffKS", sum)
        );
    }
    Ok(sum)
}

/// 由全局求和得到 KS 值
pub fn ks_value(global_sum: f64, coeff_ks: f64) -> DaResult<f64> {
    ensure!(global_sum > 0.0, DaError::invalid_input("KS 聚合没有任何参与的面"));
    Ok(global_sum.ln() / coeff_ks)
}

/// 网格质量 KS 目标
#[derive(Debug)]
pub struct MeshQualityKs {
    name: String,
    part: String,
    mesh: Arc<FvMesh>,
    metric: MeshQualityMetric,
    coeff_ks: f64,
    scale: f64,
    include_face_list: Vec<bool>,
    face_values: Vec<f64>,
}

impl MeshQualityKs {
    /// 由目标函数字典创建
    pub fn new(
        name: impl Into<String>,
        part: impl Into<String>,
        dict: &ObjFuncDict,
        mesh: Arc<FvMesh>,
        debug: bool,
    ) -> DaResult<Self> {
        let coeff_ks = dict.require_coeff_ks()?;
        ensure!(
            coeff_ks > 0.0,
            DaError::invalid_config("coeffKS", coeff_ks.to_string(), "必须为正")
        );
        let metric: MeshQualityMetric = dict.require_metric()?.parse()?;

        let mut include_face_list = vec![true; mesh.n_faces()];
        if !dict.include_proc_patches {
            for patch in mesh.patches().iter().filter(|p| p.is_coupled()) {
                for f in patch.range() {
                    include_face_list[f] = false;
                }
            }
        }

        let name = name.into();
        let part = part.into();
        if debug {
            let excluded: Vec<usize> = include_face_list
                .iter()
                .enumerate()
                .filter(|(_, &inc)| !inc)
                .map(|(f, _)| f)
                .collect();
            log::debug!(
                "{name}/{part}: includeFaceList {} 个面, 排除 {:?}",
                include_face_list.len(),
                excluded
            );
        }

        Ok(Self {
            name,
            part,
            mesh,
            metric,
            coeff_ks,
            scale: dict.scale,
            include_face_list,
            face_values: Vec::new(),
        })
    }

    /// 质量指标
    pub fn metric(&self) -> MeshQualityMetric {
        self.metric
    }

    /// 参与聚合的面
    pub fn include_face_list(&self) -> &[bool] {
        &self.include_face_list
    }
}

impl Objective for MeshQualityKs {
    fn name(&self) -> &str {
        &self.name
    }

    fn part(&self) -> &str {
        &self.part
    }

    fn kind(&self) -> ObjFuncKind {
        ObjFuncKind::MeshQualityKs
    }

    fn scale(&self) -> f64 {
        self.scale
    }

    fn calc_obj_func(&mut self, comm: &dyn Communicator) -> DaResult<f64> {
        self.face_values = self.metric.evaluate(&self.mesh);
        let local = ks_local_sum(&self.face_values, &self.include_face_list, self.coeff_ks)?;
        let global = comm.sum_reduce(local)?;
        let value = ks_value(global, self.coeff_ks)?;
        log::debug!(
            "{}/{} ({}): KS = {value:.10e}",
            self.name,
            self.part,
            self.metric.name()
        );
        Ok(value)
    }

    fn face_values(&self) -> &[f64] {
        &self.face_values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::BlockMesh;
    use crate::parallel::SerialCommunicator;
    use da_config::BlockMeshConfig;

    fn sheared_mesh() -> Arc<FvMesh> {
        Arc::new(
            BlockMesh::new(BlockMeshConfig {
                nx: 4,
                ny: 4,
                nz: 1,
                length: [1.0, 1.0, 0.1],
                y_grading: 1.0,
            })
            .with_shear(0.5)
            .build()
            .unwrap(),
        )
    }

    #[test]
    fn test_ks_bounds_max() {
        // max ≤ KS ≤ max + ln(n)/c
        let values = [1.0, 2.0];
        let include = [true, true];
        let c = 10.0;
        let ks = ks_value(ks_local_sum(&values, &include, c).unwrap(), c).unwrap();
        // 较小项贡献 exp(-c) 的相对量，两侧不等号都严格成立
        assert!(ks > 2.0);
        assert!(ks < 2.0 + 2f64.ln() / c);
    }

    #[test]
    fn test_ks_gap_shrinks_with_coeff() {
        // 均匀值 v 上 KS - v = ln(n)/c，随 coeffKS 单调趋于 0
        let v = 0.75;
        let values = [v; 8];
        let include = [true; 8];
        let mut last_gap = f64::INFINITY;
        for c in [1.0, 10.0, 100.0] {
            let ks = ks_value(ks_local_sum(&values, &include, c).unwrap(), c).unwrap();
            let gap = ks - v;
            assert!((gap - 8f64.ln() / c).abs() < 1e-12);
            assert!(gap > 0.0 && gap < last_gap);
            last_gap = gap;
        }
        assert!(last_gap < 0.03);
    }

    #[test]
    fn test_excluded_faces_ignored() {
        let sum = ks_local_sum(&[1.0, 100.0], &[true, false], 1.0).unwrap();
        assert!((sum - 1f64.exp()).abs() < 1e-12);
    }

    #[test]
    fn test_overflow_is_fatal() {
        let err = ks_local_sum(&[1.0], &[true], 500.0).unwrap_err();
        assert!(matches!(err, DaError::NumericalOverflow { .. }));
    }

    #[test]
    fn test_invalid_metric_lists_options() {
        let dict = ObjFuncDict::mesh_quality_ks("aspectRatio", 10.0);
        let err = MeshQualityKs::new("MQ", "part1", &dict, sheared_mesh(), false).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("faceOrthogonality"));
        assert!(msg.contains("faceSkewness"));
    }

    #[test]
    fn test_non_ortho_angle_of_sheared_mesh() {
        let mesh = sheared_mesh();
        let dict = ObjFuncDict::mesh_quality_ks("nonOrthoAngle", 5.0);
        let mut obj = MeshQualityKs::new("MQ", "part1", &dict, mesh, false).unwrap();
        let ks = obj.calc_obj_func(&SerialCommunicator).unwrap();

        let max = obj.face_values().iter().cloned().fold(f64::MIN, f64::max);
        assert!(ks >= max);
        // 剪切 0.5 的内部 x 向面非正交角 atan(0.5)
        assert!((max - 0.5f64.atan().to_degrees()).abs() < 1e-6);
    }

    #[test]
    fn test_scale_reported_not_applied() {
        let mesh = sheared_mesh();
        let mut dict = ObjFuncDict::mesh_quality_ks("faceOrthogonality", 10.0);
        let mut base = MeshQualityKs::new("MQ", "part1", &dict, Arc::clone(&mesh), false).unwrap();
        dict.scale = 2.0;
        let mut scaled = MeshQualityKs::new("MQ", "part1", &dict, mesh, false).unwrap();
        let a = base.calc_obj_func(&SerialCommunicator).unwrap();
        let b = scaled.calc_obj_func(&SerialCommunicator).unwrap();
        assert_eq!(a, b);
        assert_eq!(base.scale(), 1.0);
        assert_eq!(scaled.scale(), 2.0);
    }
}
