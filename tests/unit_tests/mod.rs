mod dirichlet;
mod geometry;
mod physical;
mod snapshot;
