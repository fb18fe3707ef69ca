// crates/da_adjoint/src/turbulence/model.rs

//! 湍流模型公共接口与工厂
//!
//! 伴随层只通过 [`AdjointTurbulence`] 访问模型；具体模型由
//! [`TurbulenceModel::new`] 按类型名创建。

use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::Arc;

use da_config::TurbulenceOptions;
use da_foundation::{DaError, DaResult};

use super::laminar::Laminar;
use super::spalart_allmaras_fv3::SpalartAllmarasFv3;
use crate::adjoint::StateDependencyGraph;
use crate::fields::{FlowFields, VolScalarField};
use crate::mesh::FvMesh;
use crate::numerics::linear_algebra::{LduCoefficients, SolverResult};

/// 湍流模型类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurbulenceModelKind {
    /// 层流（无湍流状态）
    Laminar,
    /// Spalart-Allmaras Fv3 变体
    SpalartAllmarasFv3,
}

impl TurbulenceModelKind {
    /// 全部可选类型名
    pub const NAMES: [&'static str; 2] = ["laminar", "SpalartAllmarasFv3"];

    /// 类型名
    pub fn name(&self) -> &'static str {
        match self {
            Self::Laminar => "laminar",
            Self::SpalartAllmarasFv3 => "SpalartAllmarasFv3",
        }
    }
}

impl FromStr for TurbulenceModelKind {
    type Err = DaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "laminar" => Ok(Self::Laminar),
            "SpalartAllmarasFv3" => Ok(Self::SpalartAllmarasFv3),
            other => Err(DaError::unknown_model(
                "湍流模型",
                other,
                Self::NAMES.to_vec(),
            )),
        }
    }
}

impl std::fmt::Display for TurbulenceModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 伴随湍流模型接口
///
/// 所有操作每次调用都重新组装线性系统，不在调用之间修补已有系统。
pub trait AdjointTurbulence: Send + Sync {
    /// 模型名称
    fn name(&self) -> &'static str;

    /// 模型状态名（如 `nuTilda`）
    fn state_names(&self) -> &'static [&'static str];

    /// 只读访问状态场
    fn state(&self, name: &str) -> DaResult<&VolScalarField>;

    /// 可变访问状态场
    fn state_mut(&mut self, name: &str) -> DaResult<&mut VolScalarField>;

    /// 涡粘性
    fn nut(&self) -> &VolScalarField;

    /// 由状态更新涡粘性
    fn correct_nut(&mut self);

    /// 更新状态场边界值
    fn correct_boundary_conditions(&mut self, flow: &FlowFields);

    /// 更新依赖于状态的中间量（涡粘性）
    fn update_intermediate_variables(&mut self) {
        self.correct_nut();
    }

    /// 把状态列表中的占位名 `nut` 换成模型状态
    fn correct_model_states(&self, states: &mut Vec<String>);

    /// 修正其它残差的连接关系中的 `nut`
    fn correct_state_residual_model_con(&self, con: &mut [Vec<String>]);

    /// 登记模型残差的连接关系
    fn add_model_residual_con(&self, graph: &mut StateDependencyGraph);

    /// 计算模型残差并缓存
    fn calc_residuals(&mut self, flow: &FlowFields) -> DaResult<()>;

    /// 模型残差（按体积归一化、未松弛）对模型状态单元值的稠密雅可比
    ///
    /// 由前向自动微分求得，只适合小网格上的连接关系检查。
    fn calc_residual_state_jacobian(&self, flow: &FlowFields) -> DaResult<Vec<Vec<f64>>>;

    /// 前向求解湍流状态，未启用时返回 `None`
    fn correct(&mut self, flow: &FlowFields) -> DaResult<Option<SolverResult>>;

    /// 提取当前（松弛后）系统的 LDU 系数
    fn get_fv_matrix_fields(&self, flow: &FlowFields, state_name: &str)
        -> DaResult<LduCoefficients>;

    /// 组装并缓存伪系统
    fn construct_pseudo_nu_tilda_eqn(&mut self, flow: &FlowFields) -> DaResult<()>;

    /// 以给定右端项求解伪系统，结果写入 `pseudoNuTilda`
    fn rhs_solve_pseudo_nu_tilda_eqn(&mut self, source: &[f64]) -> DaResult<SolverResult>;

    /// 求 `A⁻ᵀ source`
    fn inv_tran_prod_nu_tilda_eqn(
        &mut self,
        flow: &FlowFields,
        source: &[f64],
    ) -> DaResult<Vec<f64>> {
        self.construct_pseudo_nu_tilda_eqn(flow)?;
        self.rhs_solve_pseudo_nu_tilda_eqn(source)?;
        Ok(self.field("pseudoNuTilda")?.internal().to_vec())
    }

    /// 由 LDU 系数直接计算按体积归一化的残差
    fn calc_ldu_residual_turb(&self, flow: &FlowFields) -> DaResult<Vec<f64>>;

    /// 按名称访问模型持有的任意场（状态、`nut`、残差、伪解）
    fn field(&self, name: &str) -> DaResult<&VolScalarField>;

    /// 逐单元生成/耗散比
    fn get_turb_prod_over_destruct(&self, flow: &FlowFields) -> DaResult<Vec<f64>>;

    /// 逐单元对流/生成比
    fn get_turb_conv_over_prod(&self, flow: &FlowFields) -> DaResult<Vec<f64>>;
}

/// 按类型创建的湍流模型
#[derive(Debug)]
pub enum TurbulenceModel {
    /// 层流
    Laminar(Laminar),
    /// SA-Fv3
    SpalartAllmarasFv3(Box<SpalartAllmarasFv3>),
}

impl TurbulenceModel {
    /// 创建模型
    pub fn new(
        kind: TurbulenceModelKind,
        mesh: Arc<FvMesh>,
        options: &TurbulenceOptions,
    ) -> DaResult<Self> {
        log::debug!("选择湍流模型 {kind}");
        Ok(match kind {
            TurbulenceModelKind::Laminar => Self::Laminar(Laminar::new(mesh)),
            TurbulenceModelKind::SpalartAllmarasFv3 => {
                Self::SpalartAllmarasFv3(Box::new(SpalartAllmarasFv3::new(mesh, options)?))
            }
        })
    }

    /// 按选项中的类型名创建
    pub fn from_options(mesh: Arc<FvMesh>, options: &TurbulenceOptions) -> DaResult<Self> {
        let kind = options.model.parse()?;
        Self::new(kind, mesh, options)
    }

    /// 模型类型
    pub fn kind(&self) -> TurbulenceModelKind {
        match self {
            Self::Laminar(_) => TurbulenceModelKind::Laminar,
            Self::SpalartAllmarasFv3(_) => TurbulenceModelKind::SpalartAllmarasFv3,
        }
    }
}

impl Deref for TurbulenceModel {
    type Target = dyn AdjointTurbulence;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Laminar(m) => m as &dyn AdjointTurbulence,
            Self::SpalartAllmarasFv3(m) => &**m,
        }
    }
}

impl DerefMut for TurbulenceModel {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Self::Laminar(m) => m as &mut dyn AdjointTurbulence,
            Self::SpalartAllmarasFv3(m) => &mut **m,
        }
    }
}
