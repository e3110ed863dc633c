pub mod analysis;
pub mod batch;
pub mod dimensions;
pub mod prompt_templates;
pub mod vision;
