pub mod driver;
pub mod error;
pub mod mesh;
pub mod primitive;
pub mod shaders;

pub use driver::{GlowDriver, GraphicsDriver, ShaderStage};
#[cfg(any(test, feature = "headless"))]
pub use driver::HeadlessDriver;
pub use error::RenderError;
pub use mesh::{GpuBuffer, MeshData, VertexLayout};
pub use primitive::{PrimitiveRenderable, RenderableState};
pub use shaders::{ShaderProgram, ShaderProgramBuilder, ShaderSource};
