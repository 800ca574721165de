//! Pipeline management system

mod cache;
mod variant;

pub use cache::{PipelineCache, PipelineKey};
pub use variant::{PipelineDescriptor, PipelineVariant, ShaderDefine};
