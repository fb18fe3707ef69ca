// crates/da_adjoint/src/turbulence/mod.rs

//! 湍流模型的离散伴随接口
//!
//! | 模型 | 状态 | 伴随操作 |
//! |------|------|----------|
//! | `laminar` | 无 | 返回 `InvalidState` |
//! | `SpalartAllmarasFv3` | `nuTilda` | 系数提取、伪系统、转置求解、LDU 残差 |
//!
//! ```ignore
//! use da_adjoint::turbulence::{TurbulenceModel, TurbulenceModelKind};
//!
//! let mut model = TurbulenceModel::new(TurbulenceModelKind::SpalartAllmarasFv3, mesh, &options)?;
//! let psi = model.inv_tran_prod_nu_tilda_eqn(&flow, &dfdw)?;
//! ```

pub mod laminar;
pub mod model;
pub mod spalart_allmaras_fv3;

pub use laminar::Laminar;
pub use model::{AdjointTurbulence, TurbulenceModel, TurbulenceModelKind};
pub use spalart_allmaras_fv3::{SaCoefficients, SpalartAllmarasFv3};
