//! Configuration of the offline and online phases.
use crate::assembly::BoundaryCoupling;
use crate::RomError;
use serde::{Deserialize, Serialize};

/// How the advection term is linearized.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Linearization {
    /// Single solve with a zero advecting field.
    Stokes,
    /// Fixed-point (Oseen) iteration: the advecting field is the previous iterate.
    #[default]
    Oseen,
    /// Oseen terms plus the projected bilinear Newton correction online.
    Newton,
}

/// How the Dirichlet (fixed) dofs are determined.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirichletDetection {
    /// Compare two snapshots exactly: boundary dofs with identical values are fixed.
    ProbeSnapshots { first: usize, second: usize },
    /// Use the provider's boundary-condition metadata.
    FromProvider,
}

impl Default for DirichletDetection {
    fn default() -> Self {
        DirichletDetection::ProbeSnapshots { first: 0, second: 1 }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PicardSettings {
    pub max_iterations: usize,
    /// Relative tolerance on the update `‖u_{k+1} - u_k‖ / ‖u_{k+1}‖`.
    pub tolerance: f64,
}

impl Default for PicardSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RomSettings {
    pub number_of_snapshots: usize,
    /// Cumulative singular value energy the POD basis must capture, in `(0, 1]`.
    pub pod_tolerance: f64,
    /// Overrides the tolerance-based choice of the basis size.
    pub basis_size: Option<usize>,
    /// Snapshot whose advecting field is used to assemble the reference operators.
    pub reference_index: usize,
    pub reference_viscosity: f64,
    pub linearization: Linearization,
    pub coupling: BoundaryCoupling,
    pub dirichlet: DirichletDetection,
    /// Weight of the projected Newton correction added to the reduced right-hand side.
    pub newton_correction_weight: f64,
    /// Hand recovered fields to the field writer during validation.
    pub write_rom_field: bool,
    pub picard: PicardSettings,
}

impl Default for RomSettings {
    fn default() -> Self {
        Self {
            number_of_snapshots: 2,
            pod_tolerance: 0.99,
            basis_size: None,
            reference_index: 0,
            reference_viscosity: 1.0,
            linearization: Linearization::default(),
            coupling: BoundaryCoupling::default(),
            dirichlet: DirichletDetection::default(),
            newton_correction_weight: 0.5,
            write_rom_field: false,
            picard: PicardSettings::default(),
        }
    }
}

impl RomSettings {
    pub fn validate(&self) -> Result<(), RomError> {
        let invalid = |msg: String| Err(RomError::InvalidSettings(msg));
        if self.number_of_snapshots == 0 {
            return invalid("at least one snapshot is required".to_string());
        }
        if !(self.pod_tolerance > 0.0 && self.pod_tolerance <= 1.0) {
            return invalid(format!("POD tolerance {} is not in (0, 1]", self.pod_tolerance));
        }
        if self.basis_size == Some(0) {
            return invalid("basis size must be positive".to_string());
        }
        if self.reference_index >= self.number_of_snapshots {
            return invalid(format!(
                "reference index {} out of range for {} snapshots",
                self.reference_index, self.number_of_snapshots
            ));
        }
        if !(self.reference_viscosity.is_finite() && self.reference_viscosity > 0.0) {
            return invalid(format!(
                "reference viscosity {} must be positive and finite",
                self.reference_viscosity
            ));
        }
        if let DirichletDetection::ProbeSnapshots { first, second } = self.dirichlet {
            if first == second {
                return invalid("Dirichlet probe snapshots must be distinct".to_string());
            }
            if first.max(second) >= self.number_of_snapshots {
                return invalid(format!(
                    "Dirichlet probe snapshot {} out of range for {} snapshots",
                    first.max(second),
                    self.number_of_snapshots
                ));
            }
        }
        if self.picard.max_iterations == 0 || !(self.picard.tolerance > 0.0) {
            return invalid("Picard iteration needs a positive iteration count and tolerance".to_string());
        }
        Ok(())
    }
}
