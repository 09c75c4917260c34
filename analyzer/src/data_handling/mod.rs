pub mod annotation;
pub mod expression_matrix;
pub mod half_life;
pub mod proteomics;
pub mod ribosomal_names;
pub mod sleuth_calls;
