pub mod analysis; // Image analysis: prompt → model fallback chain → report sections
pub mod diagnostic; // Pipeline diagnostic dump (CLINIVISION_DUMP_DIR)
