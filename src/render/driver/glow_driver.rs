// glow_driver.rs - OpenGL / OpenGL ES backend with an error check after every call

use super::{check_error_queue, BufferTarget, DriverResult, GraphicsApiError, GraphicsDriver, ShaderStage};
use glow::HasContext;
use std::sync::Arc;

pub struct GlowDriver {
    gl: Arc<glow::Context>,
    vertex_array: Option<glow::VertexArray>,
}

impl GlowDriver {
    /// Wraps a context that is current on the calling thread.
    ///
    /// Desktop GL 3.0+ and GLES 3.0+ contexts get a vertex array object bound
    /// for the driver's lifetime, since core profiles reject attribute setup
    /// without one.
    pub fn new(gl: Arc<glow::Context>) -> DriverResult<Self> {
        let version = gl.version();
        let needs_vertex_array = version.major >= 3;
        log::info!(
            "GL {}.{} ({}), {}",
            version.major,
            version.minor,
            if version.is_embedded { "ES" } else { "desktop" },
            version.vendor_info
        );

        let mut driver = Self {
            gl,
            vertex_array: None,
        };

        if needs_vertex_array {
            let vertex_array = driver.created(
                "glGenVertexArrays",
                unsafe { driver.gl.create_vertex_array() },
            )?;
            driver.vertex_array = Some(vertex_array);
            unsafe { driver.gl.bind_vertex_array(Some(vertex_array)) };
            driver.check("glBindVertexArray")?;
        }

        Ok(driver)
    }

    fn check(&self, operation: &'static str) -> DriverResult<()> {
        check_error_queue(operation, || unsafe { self.gl.get_error() })
    }

    fn created<T>(&self, operation: &'static str, result: Result<T, String>) -> DriverResult<T> {
        self.check(operation)?;
        result.map_err(|message| {
            log::error!("{}: {}", operation, message);
            GraphicsApiError {
                operation,
                code: glow::INVALID_OPERATION,
            }
        })
    }
}

impl Drop for GlowDriver {
    fn drop(&mut self) {
        if let Some(vertex_array) = self.vertex_array.take() {
            unsafe {
                self.gl.bind_vertex_array(None);
                self.gl.delete_vertex_array(vertex_array);
            }
        }
    }
}

impl GraphicsDriver for GlowDriver {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Buffer = glow::Buffer;
    type UniformLocation = glow::UniformLocation;

    fn create_shader(&self, stage: ShaderStage) -> DriverResult<Self::Shader> {
        let result = unsafe { self.gl.create_shader(stage.gl_enum()) };
        self.created("glCreateShader", result)
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) -> DriverResult<()> {
        unsafe { self.gl.shader_source(shader, source) };
        self.check("glShaderSource")
    }

    fn compile_shader(&self, shader: Self::Shader) -> DriverResult<()> {
        unsafe { self.gl.compile_shader(shader) };
        self.check("glCompileShader")
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> DriverResult<bool> {
        let status = unsafe { self.gl.get_shader_compile_status(shader) };
        self.check("glGetShaderiv")?;
        Ok(status)
    }

    fn shader_info_log(&self, shader: Self::Shader) -> DriverResult<String> {
        let log = unsafe { self.gl.get_shader_info_log(shader) };
        self.check("glGetShaderInfoLog")?;
        Ok(log)
    }

    fn delete_shader(&self, shader: Self::Shader) -> DriverResult<()> {
        unsafe { self.gl.delete_shader(shader) };
        self.check("glDeleteShader")
    }

    fn create_program(&self) -> DriverResult<Self::Program> {
        let result = unsafe { self.gl.create_program() };
        self.created("glCreateProgram", result)
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) -> DriverResult<()> {
        unsafe { self.gl.attach_shader(program, shader) };
        self.check("glAttachShader")
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) -> DriverResult<()> {
        unsafe { self.gl.detach_shader(program, shader) };
        self.check("glDetachShader")
    }

    fn link_program(&self, program: Self::Program) -> DriverResult<()> {
        unsafe { self.gl.link_program(program) };
        self.check("glLinkProgram")
    }

    fn program_link_status(&self, program: Self::Program) -> DriverResult<bool> {
        let status = unsafe { self.gl.get_program_link_status(program) };
        self.check("glGetProgramiv")?;
        Ok(status)
    }

    fn program_info_log(&self, program: Self::Program) -> DriverResult<String> {
        let log = unsafe { self.gl.get_program_info_log(program) };
        self.check("glGetProgramInfoLog")?;
        Ok(log)
    }

    fn delete_program(&self, program: Self::Program) -> DriverResult<()> {
        unsafe { self.gl.delete_program(program) };
        self.check("glDeleteProgram")
    }

    fn attrib_location(&self, program: Self::Program, name: &str) -> DriverResult<Option<u32>> {
        let location = unsafe { self.gl.get_attrib_location(program, name) };
        self.check("glGetAttribLocation")?;
        Ok(location)
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> DriverResult<Option<Self::UniformLocation>> {
        let location = unsafe { self.gl.get_uniform_location(program, name) };
        self.check("glGetUniformLocation")?;
        Ok(location)
    }

    fn use_program(&self, program: Option<Self::Program>) -> DriverResult<()> {
        unsafe { self.gl.use_program(program) };
        self.check("glUseProgram")
    }

    fn create_buffer(&self) -> DriverResult<Self::Buffer> {
        let result = unsafe { self.gl.create_buffer() };
        self.created("glGenBuffers", result)
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>) -> DriverResult<()> {
        unsafe { self.gl.bind_buffer(target.gl_enum(), buffer) };
        self.check("glBindBuffer")
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) -> DriverResult<()> {
        unsafe {
            self.gl
                .buffer_data_u8_slice(target.gl_enum(), data, glow::STATIC_DRAW)
        };
        self.check("glBufferData")
    }

    fn delete_buffer(&self, buffer: Self::Buffer) -> DriverResult<()> {
        unsafe { self.gl.delete_buffer(buffer) };
        self.check("glDeleteBuffers")
    }

    fn enable_vertex_attrib_array(&self, index: u32) -> DriverResult<()> {
        unsafe { self.gl.enable_vertex_attrib_array(index) };
        self.check("glEnableVertexAttribArray")
    }

    fn disable_vertex_attrib_array(&self, index: u32) -> DriverResult<()> {
        unsafe { self.gl.disable_vertex_attrib_array(index) };
        self.check("glDisableVertexAttribArray")
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        components: i32,
        stride: i32,
        offset: i32,
    ) -> DriverResult<()> {
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(index, components, glow::FLOAT, false, stride, offset)
        };
        self.check("glVertexAttribPointer")
    }

    fn uniform_4_f32(&self, location: &Self::UniformLocation, value: &[f32; 4]) -> DriverResult<()> {
        unsafe { self.gl.uniform_4_f32_slice(Some(location), value) };
        self.check("glUniform4fv")
    }

    fn uniform_matrix_4_f32(
        &self,
        location: &Self::UniformLocation,
        value: &[f32; 16],
    ) -> DriverResult<()> {
        unsafe { self.gl.uniform_matrix_4_f32_slice(Some(location), false, value) };
        self.check("glUniformMatrix4fv")
    }

    fn uniform_values(
        &self,
        program: Self::Program,
        location: &Self::UniformLocation,
        out: &mut [f32],
    ) -> DriverResult<()> {
        unsafe { self.gl.get_uniform_f32(program, location, out) };
        self.check("glGetUniformfv")
    }

    fn draw_indexed_triangles(&self, count: i32, offset: i32) -> DriverResult<()> {
        unsafe {
            self.gl
                .draw_elements(glow::TRIANGLES, count, glow::UNSIGNED_SHORT, offset)
        };
        self.check("glDrawElements")
    }
}
