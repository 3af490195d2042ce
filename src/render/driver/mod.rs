// driver/mod.rs - Typed seam over the GL entry points used by the pipeline

pub mod glow_driver;
#[cfg(any(test, feature = "headless"))]
pub mod headless;

use std::fmt;
use thiserror::Error;

pub use glow_driver::GlowDriver;
#[cfg(any(test, feature = "headless"))]
pub use headless::HeadlessDriver;

/// Upper bound on error flags drained after a single call. A lost context can
/// keep reporting errors forever.
const MAX_DRAINED_ERRORS: usize = 16;

/// Raised when the driver's error queue is non-empty right after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{operation}: glError 0x{code:04X}")]
pub struct GraphicsApiError {
    pub operation: &'static str,
    pub code: u32,
}

pub type DriverResult<T> = Result<T, GraphicsApiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn gl_enum(self) -> u32 {
        match self {
            Self::Vertex => glow::VERTEX_SHADER,
            Self::Fragment => glow::FRAGMENT_SHADER,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

impl BufferTarget {
    pub fn gl_enum(self) -> u32 {
        match self {
            Self::Vertex => glow::ARRAY_BUFFER,
            Self::Index => glow::ELEMENT_ARRAY_BUFFER,
        }
    }
}

/// One method per GL entry point the pipeline touches.
///
/// Every call reports failure through its return value instead of leaving it
/// in a global error queue; implementations drain the queue themselves with
/// [`check_error_queue`]. All methods must be called on the thread that owns
/// the current context.
pub trait GraphicsDriver {
    type Shader: Copy + fmt::Debug;
    type Program: Copy + fmt::Debug;
    type Buffer: Copy + fmt::Debug;
    type UniformLocation: Clone + fmt::Debug;

    fn create_shader(&self, stage: ShaderStage) -> DriverResult<Self::Shader>;
    fn shader_source(&self, shader: Self::Shader, source: &str) -> DriverResult<()>;
    fn compile_shader(&self, shader: Self::Shader) -> DriverResult<()>;
    fn shader_compile_status(&self, shader: Self::Shader) -> DriverResult<bool>;
    fn shader_info_log(&self, shader: Self::Shader) -> DriverResult<String>;
    fn delete_shader(&self, shader: Self::Shader) -> DriverResult<()>;

    fn create_program(&self) -> DriverResult<Self::Program>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) -> DriverResult<()>;
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) -> DriverResult<()>;
    fn link_program(&self, program: Self::Program) -> DriverResult<()>;
    fn program_link_status(&self, program: Self::Program) -> DriverResult<bool>;
    fn program_info_log(&self, program: Self::Program) -> DriverResult<String>;
    fn delete_program(&self, program: Self::Program) -> DriverResult<()>;

    fn attrib_location(&self, program: Self::Program, name: &str) -> DriverResult<Option<u32>>;
    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> DriverResult<Option<Self::UniformLocation>>;
    fn use_program(&self, program: Option<Self::Program>) -> DriverResult<()>;

    fn create_buffer(&self) -> DriverResult<Self::Buffer>;
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>) -> DriverResult<()>;
    /// Uploads `data` into whatever buffer is bound to `target` (static usage).
    fn buffer_data(&self, target: BufferTarget, data: &[u8]) -> DriverResult<()>;
    fn delete_buffer(&self, buffer: Self::Buffer) -> DriverResult<()>;

    fn enable_vertex_attrib_array(&self, index: u32) -> DriverResult<()>;
    fn disable_vertex_attrib_array(&self, index: u32) -> DriverResult<()>;
    /// Describes float attribute `index` in the bound vertex buffer.
    /// `stride` and `offset` are in bytes.
    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        components: i32,
        stride: i32,
        offset: i32,
    ) -> DriverResult<()>;

    fn uniform_4_f32(&self, location: &Self::UniformLocation, value: &[f32; 4]) -> DriverResult<()>;
    /// `value` is column-major; no transpose is applied.
    fn uniform_matrix_4_f32(
        &self,
        location: &Self::UniformLocation,
        value: &[f32; 16],
    ) -> DriverResult<()>;
    fn uniform_values(
        &self,
        program: Self::Program,
        location: &Self::UniformLocation,
        out: &mut [f32],
    ) -> DriverResult<()>;

    /// Indexed draw of `count` u16 indices from the bound index buffer,
    /// assembled as a triangle list. `offset` is in bytes.
    fn draw_indexed_triangles(&self, count: i32, offset: i32) -> DriverResult<()>;
}

/// Drains the error queue through `next_error`, logging every flag and
/// reporting the first one against `operation`.
pub fn check_error_queue(
    operation: &'static str,
    mut next_error: impl FnMut() -> u32,
) -> DriverResult<()> {
    let mut first = None;
    for _ in 0..MAX_DRAINED_ERRORS {
        let code = next_error();
        if code == glow::NO_ERROR {
            break;
        }
        log::error!("{}: glError 0x{:04X}", operation, code);
        first.get_or_insert(code);
    }

    match first {
        Some(code) => Err(GraphicsApiError { operation, code }),
        None => Ok(()),
    }
}
