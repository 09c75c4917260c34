//! Translational-efficiency coupling and ribosome stoichiometry analyses.
//!
//! Two batch pipelines share the parsers in [`data_handling`] and the
//! statistics in [`analysis`]:
//!
//! * [`pipeline::coupling`] relates mRNA abundance, footprint abundance,
//!   differential expression, transcript length and half-life.
//! * [`pipeline::stoichiometry`] turns proteomics fold-changes into
//!   per-timepoint ribosomal-protein stoichiometries and flags outliers.

pub mod analysis;
pub mod data_handling;
pub mod helper_functions;
pub mod models;
pub mod pipeline;
