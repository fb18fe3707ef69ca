// crates/da_adjoint/src/turbulence/laminar.rs

//! 层流：无湍流状态，涡粘性恒为 0

use std::sync::Arc;

use da_foundation::{DaError, DaResult};

use super::model::AdjointTurbulence;
use crate::adjoint::StateDependencyGraph;
use crate::fields::{FlowFields, VolScalarField};
use crate::mesh::FvMesh;
use crate::numerics::linear_algebra::{LduCoefficients, SolverResult};

/// 层流模型
#[derive(Debug)]
pub struct Laminar {
    nut: VolScalarField,
}

impl Laminar {
    /// 创建
    pub fn new(mesh: Arc<FvMesh>) -> Self {
        Self {
            nut: VolScalarField::calculated("nut", &mesh, 0.0),
        }
    }
}

impl AdjointTurbulence for Laminar {
    fn name(&self) -> &'static str {
        "laminar"
    }

    fn state_names(&self) -> &'static [&'static str] {
        &[]
    }

    fn state(&self, name: &str) -> DaResult<&VolScalarField> {
        Err(DaError::invalid_state(name))
    }

    fn state_mut(&mut self, name: &str) -> DaResult<&mut VolScalarField> {
        Err(DaError::invalid_state(name))
    }

    fn nut(&self) -> &VolScalarField {
        &self.nut
    }

    fn correct_nut(&mut self) {}

    fn correct_boundary_conditions(&mut self, _flow: &FlowFields) {}

    fn correct_model_states(&self, states: &mut Vec<String>) {
        states.retain(|s| s != "nut");
    }

    fn correct_state_residual_model_con(&self, con: &mut [Vec<String>]) {
        for level in con.iter_mut() {
            level.retain(|s| s != "nut");
        }
    }

    fn add_model_residual_con(&self, _graph: &mut StateDependencyGraph) {}

    fn calc_residuals(&mut self, _flow: &FlowFields) -> DaResult<()> {
        Ok(())
    }

    fn calc_residual_state_jacobian(&self, _flow: &FlowFields) -> DaResult<Vec<Vec<f64>>> {
        Err(DaError::invalid_state("nuTilda"))
    }

    fn correct(&mut self, _flow: &FlowFields) -> DaResult<Option<SolverResult>> {
        Ok(None)
    }

    fn get_fv_matrix_fields(
        &self,
        _flow: &FlowFields,
        state_name: &str,
    ) -> DaResult<LduCoefficients> {
        Err(DaError::invalid_state(state_name))
    }

    fn construct_pseudo_nu_tilda_eqn(&mut self, _flow: &FlowFields) -> DaResult<()> {
        Err(DaError::invalid_state("nuTilda"))
    }

    fn rhs_solve_pseudo_nu_tilda_eqn(&mut self, _source: &[f64]) -> DaResult<SolverResult> {
        Err(DaError::invalid_state("nuTilda"))
    }

    fn calc_ldu_residual_turb(&self, _flow: &FlowFields) -> DaResult<Vec<f64>> {
        Err(DaError::invalid_state("nuTilda"))
    }

    fn field(&self, name: &str) -> DaResult<&VolScalarField> {
        match name {
            "nut" => Ok(&self.nut),
            other => Err(DaError::invalid_state(other)),
        }
    }

    fn get_turb_prod_over_destruct(&self, _flow: &FlowFields) -> DaResult<Vec<f64>> {
        Err(DaError::invalid_state("nuTilda"))
    }

    fn get_turb_conv_over_prod(&self, _flow: &FlowFields) -> DaResult<Vec<f64>> {
        Err(DaError::invalid_state("nuTilda"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::BlockMesh;
    use da_config::BlockMeshConfig;
    use glam::DVec3;

    #[test]
    fn test_adjoint_operations_fail() {
        let mesh = Arc::new(BlockMesh::new(BlockMeshConfig::default()).build().unwrap());
        let flow = FlowFields::uniform(&mesh, DVec3::X);
        let mut model = Laminar::new(mesh);
        assert!(matches!(
            model.inv_tran_prod_nu_tilda_eqn(&flow, &[]),
            Err(DaError::InvalidState { .. })
        ));
        assert!(model.calc_ldu_residual_turb(&flow).is_err());
        assert!(model.calc_residual_state_jacobian(&flow).is_err());
        assert!(model.correct(&flow).unwrap().is_none());
    }

    #[test]
    fn test_removes_nut() {
        let mesh = Arc::new(BlockMesh::new(BlockMeshConfig::default()).build().unwrap());
        let model = Laminar::new(mesh);
        let mut states = vec!["U".to_string(), "nut".to_string()];
        model.correct_model_states(&mut states);
        assert_eq!(states, vec!["U".to_string()]);
    }
}
