//! Error type for the reduced-order pipeline.
use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::projection::Direction;

#[derive(Debug, Clone, PartialEq)]
pub enum RomError {
    /// The dense reduced system is singular or numerically rank-deficient.
    SingularReducedSystem { size: usize },
    /// A vector or matrix does not match the dof layout it is combined with.
    LayoutMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    InvalidSettings(String),
    EmptySnapshotSet,
    /// The full-order fixed-point iteration did not converge.
    NotConverged { iterations: usize },
    /// A physical basis vector became linearly dependent on the previous ones.
    DegeneratePhysicalBasis { direction: Direction, mode: usize },
    /// A restricted POD mode became linearly dependent on the previous ones.
    DegenerateBasis { mode: usize },
    InvalidGeometry { region: &'static str, value: f64 },
    IndexOutOfBounds { index: usize, len: usize },
    SvdNotConverged,
}

impl Display for RomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            RomError::SingularReducedSystem { size } => {
                write!(f, "Reduced system of size {} is singular.", size)
            }
            RomError::LayoutMismatch {
                context,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Dof layout mismatch in {}: expected length {}, got {}.",
                    context, expected, actual
                )
            }
            RomError::InvalidSettings(msg) => write!(f, "Invalid settings: {}", msg),
            RomError::EmptySnapshotSet => write!(f, "Snapshot set is empty."),
            RomError::NotConverged { iterations } => {
                write!(f, "Full-order solve failed to converge within {} iterations.", iterations)
            }
            RomError::DegeneratePhysicalBasis { direction, mode } => {
                write!(
                    f,
                    "Physical basis vector {} in direction {:?} is linearly dependent on previous vectors.",
                    mode, direction
                )
            }
            RomError::DegenerateBasis { mode } => {
                write!(
                    f,
                    "Free-dof restriction of POD mode {} is linearly dependent on previous modes.",
                    mode
                )
            }
            RomError::InvalidGeometry { region, value } => {
                write!(f, "Geometry parameter {} gives a singular map for region {}.", value, region)
            }
            RomError::IndexOutOfBounds { index, len } => {
                write!(f, "Index {} out of bounds for length {}.", index, len)
            }
            RomError::SvdNotConverged => write!(f, "Singular value decomposition did not converge."),
        }
    }
}

impl Error for RomError {}
