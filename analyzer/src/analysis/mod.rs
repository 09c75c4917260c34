pub mod controls;
pub mod differential;
pub mod figures;
pub mod regression;
pub mod regulation;
pub mod stats;
pub mod stoichiometry;
pub mod summary;
