// crates/da_adjoint/src/objective/mod.rs

//! 目标函数
//!
//! 目标函数按 `objFunc` 字典中的 `type` 创建。每个目标持有自己的
//! 面/单元选择，计算时通过 [`Communicator`] 做全局归约。
//!
//! | type | 实现 |
//! |------|------|
//! | `meshQualityKS` | [`MeshQualityKs`] |

pub mod mesh_quality_ks;

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::Arc;

use da_config::{DaOptions, ObjFuncDict};
use da_foundation::{DaError, DaResult};

use crate::mesh::FvMesh;
use crate::parallel::Communicator;

pub use mesh_quality_ks::{MeshQualityKs, MeshQualityMetric};

/// 目标函数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjFuncKind {
    /// 网格质量 KS 聚合
    MeshQualityKs,
}

impl ObjFuncKind {
    /// 已注册的类型名
    pub const NAMES: [&'static str; 1] = ["meshQualityKS"];

    /// 类型名
    pub fn name(&self) -> &'static str {
        match self {
            Self::MeshQualityKs => "meshQualityKS",
        }
    }
}

impl FromStr for ObjFuncKind {
    type Err = DaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meshQualityKS" => Ok(Self::MeshQualityKs),
            other => Err(DaError::unknown_model("目标函数", other, Self::NAMES.to_vec())),
        }
    }
}

impl fmt::Display for ObjFuncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 目标函数接口
pub trait Objective: Send + Sync {
    /// 目标函数名
    fn name(&self) -> &str;

    /// 分项名
    fn part(&self) -> &str;

    /// 类型
    fn kind(&self) -> ObjFuncKind;

    /// 字典中的缩放系数
    ///
    /// `calc_obj_func` 返回未缩放的值，组合多个目标时由调用方乘上。
    fn scale(&self) -> f64;

    /// 计算全局目标值，所有分区都必须调用
    fn calc_obj_func(&mut self, comm: &dyn Communicator) -> DaResult<f64>;

    /// 最近一次计算的逐面值
    fn face_values(&self) -> &[f64];
}

/// 目标函数实例
#[derive(Debug)]
pub enum ObjectiveFunction {
    /// 网格质量 KS
    MeshQualityKs(MeshQualityKs),
}

impl ObjectiveFunction {
    /// 由字典创建
    pub fn from_dict(
        name: &str,
        part: &str,
        dict: &ObjFuncDict,
        mesh: Arc<FvMesh>,
        debug: bool,
    ) -> DaResult<Self> {
        match dict.obj_type.parse::<ObjFuncKind>()? {
            ObjFuncKind::MeshQualityKs => Ok(Self::MeshQualityKs(MeshQualityKs::new(
                name, part, dict, mesh, debug,
            )?)),
        }
    }

    /// 创建选项中的全部目标函数（名称、分项按字典序）
    pub fn all_from_options(options: &DaOptions, mesh: &Arc<FvMesh>) -> DaResult<Vec<Self>> {
        let mut out = Vec::new();
        for (name, parts) in &options.obj_func {
            for (part, dict) in parts {
                out.push(Self::from_dict(name, part, dict, Arc::clone(mesh), options.debug)?);
            }
        }
        Ok(out)
    }
}

impl Deref for ObjectiveFunction {
    type Target = dyn Objective;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::MeshQualityKs(obj) => obj,
        }
    }
}

impl DerefMut for ObjectiveFunction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Self::MeshQualityKs(obj) => obj,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::BlockMesh;
    use crate::parallel::SerialCommunicator;
    use da_config::BlockMeshConfig;

    fn mesh() -> Arc<FvMesh> {
        Arc::new(BlockMesh::new(BlockMeshConfig::default()).build().unwrap())
    }

    #[test]
    fn test_unknown_type() {
        let mut dict = ObjFuncDict::mesh_quality_ks("faceSkewness", 1.0);
        dict.obj_type = "force".to_string();
        let err = ObjectiveFunction::from_dict("CD", "part1", &dict, mesh(), false).unwrap_err();
        assert!(matches!(err, DaError::UnknownModel { .. }));
    }

    #[test]
    fn test_missing_coeff_ks() {
        let mut dict = ObjFuncDict::mesh_quality_ks("faceSkewness", 1.0);
        dict.coeff_ks = None;
        let err = ObjectiveFunction::from_dict("MQ", "part1", &dict, mesh(), false).unwrap_err();
        assert!(matches!(err, DaError::MissingConfig { .. }));
    }

    #[test]
    fn test_dispatch_through_deref() {
        let dict = ObjFuncDict::mesh_quality_ks("faceOrthogonality", 20.0);
        let mut obj = ObjectiveFunction::from_dict("MQ", "part1", &dict, mesh(), true).unwrap();
        assert_eq!(obj.name(), "MQ");
        assert_eq!(obj.kind(), ObjFuncKind::MeshQualityKs);
        // 正交网格：所有面正交性为 1
        let value = obj.calc_obj_func(&SerialCommunicator).unwrap();
        let n = obj.face_values().len() as f64;
        assert!((value - (1.0 + n.ln() / 20.0)).abs() < 1e-10);
    }
}
