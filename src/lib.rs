//! Offline/online reduced-order modelling of parametrized saddle-point systems.
//!
//! The offline phase gathers full-order snapshots, splits the dofs into Dirichlet (fixed) and free
//! sets, builds a POD basis and projects every affine operator term onto it. The online phase
//! assembles and solves the small projected system for a new parameter and lifts the result back
//! to the full dof space.
use nalgebra::RealField;

pub mod assembly;
pub mod dirichlet;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod offline;
pub mod online;
pub mod physical;
pub mod pod;
pub mod projection;
pub mod provider;
pub mod settings;
pub mod snapshot;
pub mod validation;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;

pub use error::RomError;

/// Scalar type used throughout the crate.
///
/// Used as a trait alias for the traits needed by generic routines.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
