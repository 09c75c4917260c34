//! End-to-end runs: locate inputs under the project root, analyse, write outputs.

pub mod coupling;
pub mod stoichiometry;
