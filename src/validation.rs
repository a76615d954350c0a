//! Functionality for error measurement and field recovery.
use crate::online::{OnlineQuery, ReducedModel};
use crate::provider::{TruthOperatorProvider, VelocityField};
use crate::snapshot::SnapshotSet;
use crate::{Real, RomError};
use eyre::WrapErr;
use log::{info, warn};
use nalgebra::{DVector, DVectorView};
use serde::{Deserialize, Serialize};

/// Relative error `‖lifted - truth‖ / ‖truth‖`.
///
/// If the truth vector is zero, the absolute error `‖lifted - truth‖` is returned instead.
pub fn relative_error<T: Real>(lifted: DVectorView<T>, truth: DVectorView<T>) -> Result<T, RomError> {
    if lifted.len() != truth.len() {
        return Err(RomError::LayoutMismatch {
            context: "relative error",
            expected: truth.len(),
            actual: lifted.len(),
        });
    }
    let difference = (lifted - truth).norm();
    let truth_norm = truth.norm();
    if truth_norm == T::zero() {
        Ok(difference)
    } else {
        Ok(difference / truth_norm)
    }
}

/// Maps a full vector in the provider's local numbering to physical space, for output only.
pub fn reconstruct_field<T, P>(provider: &P, local_full: DVectorView<T>) -> eyre::Result<VelocityField<T>>
where
    T: Real,
    P: ?Sized + TruthOperatorProvider<T>,
{
    provider.layout().check_len(local_full.len(), "reconstructed vector")?;
    provider.to_physical(local_full)
}

/// Receives recovered fields, e.g. to write them to disk in some visualization format.
pub trait FieldWriter<T: Real> {
    fn write_field(&mut self, index: usize, field: &VelocityField<T>) -> eyre::Result<()>;
}

/// Collects fields in memory.
impl<T: Real> FieldWriter<T> for Vec<(usize, VelocityField<T>)> {
    fn write_field(&mut self, index: usize, field: &VelocityField<T>) -> eyre::Result<()> {
        self.push((index, field.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport<T: Real> {
    pub index: usize,
    pub viscosity: T,
    pub relative_error: T,
    pub reduced_coefficients: DVector<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedQuery<T> {
    pub index: usize,
    pub viscosity: T,
    /// Display form of the [`RomError`] that ended the query.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport<T: Real> {
    pub reports: Vec<ErrorReport<T>>,
    pub failures: Vec<FailedQuery<T>>,
}

impl<T: Real> SweepReport<T> {
    pub fn max_error(&self) -> Option<T> {
        self.reports
            .iter()
            .map(|report| report.relative_error)
            .reduce(|a, b| a.max(b))
    }

    pub fn mean_error(&self) -> Option<T> {
        if self.reports.is_empty() {
            return None;
        }
        let sum = self
            .reports
            .iter()
            .fold(T::zero(), |acc, report| acc + report.relative_error);
        Some(sum / T::from_usize(self.reports.len()).unwrap())
    }
}

impl<T: Real> ReducedModel<T> {
    /// Solves the reduced problem at every training snapshot and measures the error against it.
    ///
    /// Each query uses the snapshot's viscosity and physical field, and the snapshot itself as Newton
    /// reference if the model carries a Newton tensor. Failed queries are recorded and do not stop the
    /// sweep. If field output is enabled in the settings, recovered fields are handed to `writer`.
    pub fn validate<P>(
        &self,
        snapshots: &SnapshotSet<T>,
        provider: &P,
        mut writer: Option<&mut dyn FieldWriter<T>>,
    ) -> eyre::Result<SweepReport<T>>
    where
        P: ?Sized + TruthOperatorProvider<T>,
    {
        let mut reports = Vec::with_capacity(snapshots.len());
        let mut failures = Vec::new();

        for index in 0..snapshots.len() {
            let viscosity = snapshots.point(index).viscosity;
            let truth = self.to_coupled(DVectorView::from(&snapshots.vector(index)))?;
            let mut query = OnlineQuery::new(viscosity, snapshots.field(index).clone());
            if self.newton_tensor().is_some() {
                query = query.with_newton_reference(truth.clone());
            }

            let solution = match self.solve(&query) {
                Ok(solution) => solution,
                Err(err) => {
                    warn!("Reduced solve for snapshot {} failed: {}", index, err);
                    failures.push(FailedQuery {
                        index,
                        viscosity,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let error = relative_error(DVectorView::from(&solution.lifted), DVectorView::from(&truth))?;
            info!("Snapshot {} (viscosity {}): relative error {}", index, viscosity, error);

            if let Some(writer) = writer.as_deref_mut().filter(|_| self.settings.write_rom_field) {
                let local = self.to_local(DVectorView::from(&solution.lifted))?;
                let field = reconstruct_field(provider, DVectorView::from(&local))?;
                writer
                    .write_field(index, &field)
                    .wrap_err_with(|| format!("failed to write recovered field {}", index))?;
            }

            reports.push(ErrorReport {
                index,
                viscosity,
                relative_error: error,
                reduced_coefficients: solution.coefficients,
            });
        }

        Ok(SweepReport { reports, failures })
    }
}
