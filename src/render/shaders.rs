// shaders.rs - Shader compilation, program linking and binding lookup

use crate::config::BindingNames;
use crate::render::driver::{GraphicsDriver, ShaderStage};
use crate::render::error::RenderError;
use std::rc::Rc;

/// Vertex and fragment source text, fixed once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    vertex: String,
    fragment: String,
}

impl ShaderSource {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    pub fn vertex(&self) -> &str {
        &self.vertex
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }
}

/// Embedded shader pairs. Written without a `#version` line so they compile
/// as GLSL ES 1.00 and desktop GLSL 1.10.
pub mod primitive_shaders {
    use super::ShaderSource;

    /// Transforms positions by the MVP matrix and passes the constant color on.
    pub const VERTEX_SOURCE: &str = r#"
uniform mat4 u_MVPMatrix;
uniform vec4 u_Color;
attribute vec4 a_Position;
varying vec4 v_Color;

void main() {
    v_Color = u_Color;
    gl_Position = u_MVPMatrix * a_Position;
}
"#;

    /// Reads the color per vertex from the interleaved buffer instead.
    pub const VERTEX_COLOR_SOURCE: &str = r#"
uniform mat4 u_MVPMatrix;
attribute vec4 a_Position;
attribute vec4 a_Color;
varying vec4 v_Color;

void main() {
    v_Color = a_Color;
    gl_Position = u_MVPMatrix * a_Position;
}
"#;

    pub const FRAGMENT_SOURCE: &str = r#"
#ifdef GL_ES
precision mediump float;
#endif
varying vec4 v_Color;

void main() {
    gl_FragColor = v_Color;
}
"#;

    pub fn uniform_color() -> ShaderSource {
        ShaderSource::new(VERTEX_SOURCE, FRAGMENT_SOURCE)
    }

    pub fn vertex_color() -> ShaderSource {
        ShaderSource::new(VERTEX_COLOR_SOURCE, FRAGMENT_SOURCE)
    }
}

/// A successfully compiled stage. Deleted on drop; the driver keeps it alive
/// while it is still attached to a program.
pub struct CompiledShader<D: GraphicsDriver> {
    driver: Rc<D>,
    handle: D::Shader,
    stage: ShaderStage,
}

impl<D: GraphicsDriver> CompiledShader<D> {
    pub fn handle(&self) -> D::Shader {
        self.handle
    }
}

impl<D: GraphicsDriver> Drop for CompiledShader<D> {
    fn drop(&mut self) {
        if let Err(err) = self.driver.delete_shader(self.handle) {
            log::warn!("Failed to release {} shader {:?}: {}", self.stage, self.handle, err);
        }
    }
}

/// Locations resolved by name after linking. `None` means the program does
/// not use that binding.
#[derive(Debug, Clone)]
pub struct ProgramBindings<L> {
    pub position: Option<u32>,
    pub color_attribute: Option<u32>,
    pub color_uniform: Option<L>,
    pub mvp_matrix: Option<L>,
}

/// A linked program, deleted on drop.
pub struct ShaderProgram<D: GraphicsDriver> {
    driver: Rc<D>,
    handle: D::Program,
    bindings: ProgramBindings<D::UniformLocation>,
}

impl<D: GraphicsDriver> ShaderProgram<D> {
    pub fn handle(&self) -> D::Program {
        self.handle
    }

    pub fn bindings(&self) -> &ProgramBindings<D::UniformLocation> {
        &self.bindings
    }

    /// Makes this the current program.
    pub fn activate(&self) -> Result<(), RenderError> {
        self.driver.use_program(Some(self.handle))?;
        Ok(())
    }
}

impl<D: GraphicsDriver> Drop for ShaderProgram<D> {
    fn drop(&mut self) {
        if let Err(err) = self.driver.delete_program(self.handle) {
            log::warn!("Failed to release program {:?}: {}", self.handle, err);
        }
    }
}

pub struct ShaderProgramBuilder<D: GraphicsDriver> {
    driver: Rc<D>,
    bindings: BindingNames,
}

impl<D: GraphicsDriver> ShaderProgramBuilder<D> {
    pub fn new(driver: Rc<D>) -> Self {
        Self {
            driver,
            bindings: BindingNames::default(),
        }
    }

    pub fn with_bindings(mut self, bindings: BindingNames) -> Self {
        self.bindings = bindings;
        self
    }

    /// Compiles one stage. On failure the shader object is released and the
    /// driver's info log is returned in the error.
    pub fn compile(&self, stage: ShaderStage, source: &str) -> Result<CompiledShader<D>, RenderError> {
        let shader = CompiledShader {
            driver: Rc::clone(&self.driver),
            handle: self.driver.create_shader(stage)?,
            stage,
        };
        self.driver.shader_source(shader.handle, source)?;
        self.driver.compile_shader(shader.handle)?;

        if !self.driver.shader_compile_status(shader.handle)? {
            let mut log = self.driver.shader_info_log(shader.handle)?;
            if log.trim().is_empty() {
                log = "driver reported a compile failure without a log".to_string();
            }
            log::error!("Shader log ({} stage): {}", stage, log.trim_end());
            return Err(RenderError::ShaderCompile { stage, log });
        }

        log::debug!("Compiled {} shader {:?}", stage, shader.handle);
        Ok(shader)
    }

    /// Links two compiled stages and resolves the configured bindings.
    /// Stage pairing is left to the driver's link validation.
    pub fn link(
        &self,
        vertex: &CompiledShader<D>,
        fragment: &CompiledShader<D>,
    ) -> Result<ShaderProgram<D>, RenderError> {
        // Owned from the start so every early return below releases it.
        let mut program = ShaderProgram {
            driver: Rc::clone(&self.driver),
            handle: self.driver.create_program()?,
            bindings: ProgramBindings {
                position: None,
                color_attribute: None,
                color_uniform: None,
                mvp_matrix: None,
            },
        };
        let handle = program.handle;

        self.driver.attach_shader(handle, vertex.handle)?;
        self.driver.attach_shader(handle, fragment.handle)?;
        self.driver.link_program(handle)?;

        if !self.driver.program_link_status(handle)? {
            let log = self.driver.program_info_log(handle)?;
            log::error!("Program link log: {}", log.trim_end());
            return Err(RenderError::ProgramLink { log });
        }

        self.driver.detach_shader(handle, vertex.handle)?;
        self.driver.detach_shader(handle, fragment.handle)?;

        program.bindings = ProgramBindings {
            position: self.driver.attrib_location(handle, &self.bindings.position)?,
            color_attribute: self
                .driver
                .attrib_location(handle, &self.bindings.color_attribute)?,
            color_uniform: self
                .driver
                .uniform_location(handle, &self.bindings.color_uniform)?,
            mvp_matrix: self
                .driver
                .uniform_location(handle, &self.bindings.mvp_matrix)?,
        };
        log::info!("Linked program {:?} with {:?}", handle, program.bindings);

        Ok(program)
    }

    /// Compiles both stages of `source` and links them.
    pub fn build(&self, source: &ShaderSource) -> Result<ShaderProgram<D>, RenderError> {
        let vertex = self.compile(ShaderStage::Vertex, source.vertex())?;
        let fragment = self.compile(ShaderStage::Fragment, source.fragment())?;
        self.link(&vertex, &fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::driver::HeadlessDriver;

    fn builder() -> (Rc<HeadlessDriver>, ShaderProgramBuilder<HeadlessDriver>) {
        let driver = Rc::new(HeadlessDriver::new());
        let builder = ShaderProgramBuilder::new(Rc::clone(&driver));
        (driver, builder)
    }

    #[test]
    fn test_build_resolves_bindings() {
        let (driver, builder) = builder();
        let program = builder.build(&primitive_shaders::uniform_color()).unwrap();

        let bindings = program.bindings();
        assert_eq!(bindings.position, Some(0));
        assert!(bindings.color_uniform.is_some());
        assert!(bindings.mvp_matrix.is_some());
        assert_eq!(bindings.color_attribute, None);

        // Only the program survives; both stages were released after linking.
        assert_eq!(driver.live_objects().shaders, 0);
        assert_eq!(driver.live_objects().programs, 1);
    }

    #[test]
    fn test_vertex_color_variant_resolves_color_attribute() {
        let (_driver, builder) = builder();
        let program = builder.build(&primitive_shaders::vertex_color()).unwrap();

        assert_eq!(program.bindings().color_attribute, Some(1));
        assert!(program.bindings().color_uniform.is_none());
    }

    #[test]
    fn test_syntax_error_reports_log_and_leaks_nothing() {
        let (driver, builder) = builder();
        let broken = "attribute vec4 a_Position;\nvoid main() {\n    gl_Position = a_Position\n}\n";

        let err = builder.compile(ShaderStage::Vertex, broken).err().unwrap();
        match err {
            RenderError::ShaderCompile { stage, log } => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(driver.live_objects().total(), 0);
    }

    #[test]
    fn test_build_stops_at_broken_fragment_stage() {
        let (driver, builder) = builder();
        let source = ShaderSource::new(primitive_shaders::VERTEX_SOURCE, "void main() { gl_FragColor = $; }");

        let err = builder.build(&source).err().unwrap();
        assert!(matches!(
            err,
            RenderError::ShaderCompile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        assert_eq!(driver.live_objects().total(), 0);
    }

    #[test]
    fn test_link_failure_releases_program() {
        let (driver, builder) = builder();
        let vertex = builder
            .compile(ShaderStage::Vertex, primitive_shaders::VERTEX_SOURCE)
            .unwrap();
        let fragment = builder
            .compile(
                ShaderStage::Fragment,
                "varying vec4 v_Normal;\nvoid main() { gl_FragColor = v_Normal; }",
            )
            .unwrap();

        let err = builder.link(&vertex, &fragment).err().unwrap();
        match err {
            RenderError::ProgramLink { log } => assert!(log.contains("v_Normal"), "{log}"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(driver.live_objects().programs, 0);
    }

    #[test]
    fn test_varying_type_mismatch_fails_link() {
        let (driver, builder) = builder();
        let source = ShaderSource::new(
            "attribute vec4 a_Position;\nvarying vec3 v_Color;\nvoid main() {\n    v_Color = vec3(1.0);\n    gl_Position = a_Position;\n}",
            "varying vec4 v_Color;\nvoid main() { gl_FragColor = v_Color; }",
        );

        let err = builder.build(&source).err().unwrap();
        match err {
            RenderError::ProgramLink { log } => {
                assert!(log.contains("v_Color"), "{log}");
                assert!(log.contains("vec3") && log.contains("vec4"), "{log}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(driver.live_objects().total(), 0);
    }

    #[test]
    fn test_malformed_vertex_sources_fail_to_compile() {
        let (driver, builder) = builder();
        let broken = [
            "atribute vec4 a_Position;\nvoid main() { gl_Position = a_Position; }",
            "attribute vec4 a_Position;\nvoid main() { gl_Position = a_Position a_Position; }",
            "attribute vec4 a_Position;\nvoid main() { gl_Position = * ; }",
            "attribute vec4 a_Position;\nvoid main() { gl_Position = a_Position +; }",
            "attribute vec5 a_Position;\nvoid main() { gl_Position = vec4(1.0); }",
        ];

        for source in broken {
            let err = builder.compile(ShaderStage::Vertex, source).err();
            assert!(
                matches!(err, Some(RenderError::ShaderCompile { .. })),
                "accepted: {source}"
            );
        }
        assert_eq!(driver.live_objects().total(), 0);
    }

    #[test]
    fn test_mismatched_stage_pair_is_left_to_the_driver() {
        let (driver, builder) = builder();
        let a = builder
            .compile(ShaderStage::Vertex, primitive_shaders::VERTEX_SOURCE)
            .unwrap();
        let b = builder
            .compile(ShaderStage::Vertex, primitive_shaders::VERTEX_COLOR_SOURCE)
            .unwrap();

        let err = builder.link(&a, &b).err().unwrap();
        assert!(matches!(err, RenderError::GraphicsApi(_)));
        assert_eq!(driver.live_objects().programs, 0);
    }

    #[test]
    fn test_driver_error_aborts_build() {
        let (driver, builder) = builder();
        driver.inject_fault("glLinkProgram", glow::OUT_OF_MEMORY);

        let err = builder.build(&primitive_shaders::uniform_color()).err().unwrap();
        match err {
            RenderError::GraphicsApi(api) => {
                assert_eq!(api.operation, "glLinkProgram");
                assert_eq!(api.code, glow::OUT_OF_MEMORY);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(driver.live_objects().total(), 0);
    }

    #[test]
    fn test_custom_binding_names() {
        let (_driver, builder) = builder();
        let builder = builder.with_bindings(BindingNames {
            position: "aPos".to_string(),
            ..BindingNames::default()
        });
        let source = ShaderSource::new(
            "uniform mat4 u_MVPMatrix;\nattribute vec3 aPos;\nvoid main() { gl_Position = u_MVPMatrix * vec4(aPos, 1.0); }",
            "void main() { gl_FragColor = vec4(1.0); }",
        );

        let program = builder.build(&source).unwrap();
        assert_eq!(program.bindings().position, Some(0));
        assert!(program.bindings().color_uniform.is_none());
    }

    #[test]
    fn test_dropping_program_releases_it() {
        let (driver, builder) = builder();
        let program = builder.build(&primitive_shaders::uniform_color()).unwrap();
        program.activate().unwrap();
        assert_eq!(driver.current_program(), Some(program.handle()));

        drop(program);
        assert_eq!(driver.live_objects().total(), 0);
        assert_eq!(driver.current_program(), None);
    }
}
