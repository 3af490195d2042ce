pub mod config;
pub mod render;

// Re-export commonly used types
pub use config::rendering::{BindingNames, PrimitiveConfig};
pub use render::driver::{GlowDriver, GraphicsApiError, GraphicsDriver, ShaderStage};
#[cfg(any(test, feature = "headless"))]
pub use render::driver::HeadlessDriver;
pub use render::error::RenderError;
pub use render::mesh::{MeshData, VertexLayout};
pub use render::primitive::{PrimitiveRenderable, RenderableState};
pub use render::shaders::{primitive_shaders, ShaderProgramBuilder, ShaderSource};
