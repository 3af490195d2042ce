// primitive.rs - One program, one static mesh, one draw call per frame

use crate::config::PrimitiveConfig;
use crate::render::driver::GraphicsDriver;
use crate::render::error::RenderError;
use crate::render::mesh::{GpuBuffer, MeshData};
use crate::render::shaders::{ShaderProgram, ShaderProgramBuilder, ShaderSource};
use glam::Mat4;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderableState {
    /// Constructed, nothing submitted to the driver yet.
    Uninitialized,
    /// Program linked, buffers not uploaded yet.
    Built,
    /// Program and buffers in place; `draw` may be called.
    Ready,
    /// A build step failed. Terminal.
    Failed,
}

pub struct PrimitiveRenderable<D: GraphicsDriver> {
    driver: Rc<D>,
    mesh: MeshData,
    source: ShaderSource,
    config: PrimitiveConfig,
    state: RenderableState,
    program: Option<ShaderProgram<D>>,
    vertex_buffer: Option<GpuBuffer<D>>,
    index_buffer: Option<GpuBuffer<D>>,
}

impl<D: GraphicsDriver> PrimitiveRenderable<D> {
    /// Records the inputs only. Call [`build`](Self::build) with the context
    /// current before drawing.
    pub fn new(driver: Rc<D>, mesh: MeshData, source: ShaderSource, config: PrimitiveConfig) -> Self {
        Self {
            driver,
            mesh,
            source,
            config,
            state: RenderableState::Uninitialized,
            program: None,
            vertex_buffer: None,
            index_buffer: None,
        }
    }

    /// Builds a renderable and returns it ready to draw.
    pub fn create(
        driver: Rc<D>,
        mesh: MeshData,
        source: ShaderSource,
        config: PrimitiveConfig,
    ) -> Result<Self, RenderError> {
        let mut renderable = Self::new(driver, mesh, source, config);
        renderable.build()?;
        Ok(renderable)
    }

    /// Compiles the program and uploads the geometry. A failure leaves the
    /// renderable in [`RenderableState::Failed`] for good.
    pub fn build(&mut self) -> Result<(), RenderError> {
        match self.state {
            RenderableState::Ready => return Ok(()),
            RenderableState::Uninitialized => {}
            state => return Err(RenderError::NotReady { state }),
        }

        match self.try_build() {
            Ok(()) => {
                self.state = RenderableState::Ready;
                log::info!(
                    "Primitive ready: {} vertices, {} triangles",
                    self.mesh.vertex_count(),
                    self.mesh.index_count() / 3
                );
                Ok(())
            }
            Err(err) => {
                self.state = RenderableState::Failed;
                self.program = None;
                self.vertex_buffer = None;
                self.index_buffer = None;
                log::error!("Primitive build failed: {}", err);
                Err(err)
            }
        }
    }

    fn try_build(&mut self) -> Result<(), RenderError> {
        self.mesh.validate()?;

        let program = ShaderProgramBuilder::new(Rc::clone(&self.driver))
            .with_bindings(self.config.bindings.clone())
            .build(&self.source)?;

        let bindings = program.bindings();
        if bindings.position.is_none() {
            return Err(RenderError::MissingBinding {
                name: self.config.bindings.position.clone(),
            });
        }
        if self.config.require_transform && bindings.mvp_matrix.is_none() {
            return Err(RenderError::MissingBinding {
                name: self.config.bindings.mvp_matrix.clone(),
            });
        }
        if bindings.color_attribute.is_some() && !self.mesh.layout.has_color() {
            return Err(RenderError::LayoutMismatch(format!(
                "program reads '{}' but the vertex layout carries no color",
                self.config.bindings.color_attribute
            )));
        }

        self.program = Some(program);
        self.state = RenderableState::Built;

        self.vertex_buffer = Some(GpuBuffer::vertices(&self.driver, &self.mesh.vertices)?);
        self.index_buffer = Some(GpuBuffer::indices(&self.driver, &self.mesh.indices)?);
        Ok(())
    }

    /// Draws the primitive with `mvp` (uploaded column-major).
    ///
    /// Re-asserts program, buffers and attribute layout every call and
    /// disables the attribute arrays again before returning, so successive
    /// renderables never depend on each other's state.
    pub fn draw(&self, mvp: &Mat4) -> Result<(), RenderError> {
        let (Some(program), Some(vertex_buffer), Some(index_buffer)) =
            (&self.program, &self.vertex_buffer, &self.index_buffer)
        else {
            return Err(RenderError::NotReady { state: self.state });
        };
        if self.state != RenderableState::Ready {
            return Err(RenderError::NotReady { state: self.state });
        }

        let mut enabled = Vec::with_capacity(2);
        let result = self.submit(program, vertex_buffer, index_buffer, mvp, &mut enabled);

        let mut cleanup = Ok(());
        for &index in &enabled {
            if let Err(err) = self.driver.disable_vertex_attrib_array(index) {
                cleanup = cleanup.and(Err(err));
            }
        }

        result?;
        cleanup?;
        Ok(())
    }

    fn submit(
        &self,
        program: &ShaderProgram<D>,
        vertex_buffer: &GpuBuffer<D>,
        index_buffer: &GpuBuffer<D>,
        mvp: &Mat4,
        enabled: &mut Vec<u32>,
    ) -> Result<(), RenderError> {
        let bindings = program.bindings();
        let layout = self.mesh.layout;
        let stride = layout.stride() as i32;

        program.activate()?;

        vertex_buffer.bind()?;
        if let Some(position) = bindings.position {
            self.driver.enable_vertex_attrib_array(position)?;
            enabled.push(position);
            self.driver.vertex_attrib_pointer_f32(
                position,
                layout.position_components as i32,
                stride,
                0,
            )?;
        }
        if let Some(color) = bindings.color_attribute {
            self.driver.enable_vertex_attrib_array(color)?;
            enabled.push(color);
            self.driver.vertex_attrib_pointer_f32(
                color,
                layout.color_components as i32,
                stride,
                layout.color_offset() as i32,
            )?;
        }

        if let Some(color) = &bindings.color_uniform {
            self.driver.uniform_4_f32(color, &self.config.color)?;
        }
        if let Some(mvp_matrix) = &bindings.mvp_matrix {
            self.driver.uniform_matrix_4_f32(mvp_matrix, &mvp.to_cols_array())?;
        }

        index_buffer.bind()?;
        self.driver
            .draw_indexed_triangles(self.mesh.index_count() as i32, 0)?;
        Ok(())
    }

    pub fn state(&self) -> RenderableState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == RenderableState::Ready
    }

    pub fn program(&self) -> Option<&ShaderProgram<D>> {
        self.program.as_ref()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::driver::{HeadlessDriver, ShaderStage};
    use crate::render::shaders::primitive_shaders;
    use glam::{Vec3, Vec4};

    const SQUARE_COLOR: [f32; 4] = [0.2, 0.71, 0.90, 1.0];

    fn square(driver: &Rc<HeadlessDriver>) -> PrimitiveRenderable<HeadlessDriver> {
        let config = PrimitiveConfig {
            color: SQUARE_COLOR,
            ..PrimitiveConfig::default()
        };
        PrimitiveRenderable::create(
            Rc::clone(driver),
            MeshData::square(),
            primitive_shaders::uniform_color(),
            config,
        )
        .map_err(|err| err.to_string())
        .unwrap()
    }

    #[test]
    fn test_identity_draw_submits_untransformed_square() {
        let driver = Rc::new(HeadlessDriver::new());
        let renderable = square(&driver);
        assert!(renderable.is_ready());

        renderable.draw(&Mat4::IDENTITY).unwrap();

        let draws = driver.submitted_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].indices, vec![0, 1, 2, 0, 2, 3]);

        let top_left = Vec4::new(-0.5, 0.5, 0.0, 1.0);
        let bottom_left = Vec4::new(-0.5, -0.5, 0.0, 1.0);
        let bottom_right = Vec4::new(0.5, -0.5, 0.0, 1.0);
        let top_right = Vec4::new(0.5, 0.5, 0.0, 1.0);
        assert_eq!(
            draws[0].triangles(),
            vec![
                [top_left, bottom_left, bottom_right],
                [top_left, bottom_right, top_right],
            ]
        );

        let program = renderable.program().unwrap();
        let color = program.bindings().color_uniform.clone().unwrap();
        let mut read = [0.0; 4];
        driver.uniform_values(program.handle(), &color, &mut read).unwrap();
        assert_eq!(read, SQUARE_COLOR);
    }

    #[test]
    fn test_position_array_is_disabled_after_draw() {
        let driver = Rc::new(HeadlessDriver::new());
        let renderable = square(&driver);
        let position = renderable.program().unwrap().bindings().position.unwrap();

        renderable.draw(&Mat4::IDENTITY).unwrap();

        assert!(!driver.vertex_attrib_array_enabled(position).unwrap());
    }

    #[test]
    fn test_repeated_draws_are_identical() {
        let driver = Rc::new(HeadlessDriver::new());
        let renderable = square(&driver);
        let mvp = Mat4::from_translation(Vec3::new(0.25, 0.0, 0.0)) * Mat4::from_rotation_z(0.3);

        renderable.draw(&mvp).unwrap();
        renderable.draw(&mvp).unwrap();

        let draws = driver.submitted_draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].triangles(), draws[1].triangles());
        assert_eq!(draws[0].uniforms, draws[1].uniforms);
        assert_eq!(draws[0].uniforms["u_MVPMatrix"], mvp.to_cols_array().to_vec());
        assert_eq!(draws[0].uniforms["u_Color"], SQUARE_COLOR.to_vec());
    }

    #[test]
    fn test_mvp_transforms_vertices() {
        let driver = Rc::new(HeadlessDriver::new());
        let renderable = square(&driver);
        let mvp = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));

        renderable.draw(&mvp).unwrap();

        let triangles = driver.submitted_draws()[0].triangles();
        assert_eq!(triangles[0][0], Vec4::new(0.5, 2.5, 3.0, 1.0));
    }

    #[test]
    fn test_draw_after_failed_build_touches_no_driver() {
        let driver = Rc::new(HeadlessDriver::new());
        let source = ShaderSource::new("void main() { gl_Position = vec4(0.0) }", primitive_shaders::FRAGMENT_SOURCE);
        let mut renderable = PrimitiveRenderable::new(
            Rc::clone(&driver),
            MeshData::square(),
            source,
            PrimitiveConfig::default(),
        );

        let err = renderable.build().unwrap_err();
        assert!(matches!(
            err,
            RenderError::ShaderCompile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
        assert_eq!(renderable.state(), RenderableState::Failed);

        let calls = driver.call_count();
        let err = renderable.draw(&Mat4::IDENTITY).unwrap_err();
        assert!(matches!(
            err,
            RenderError::NotReady {
                state: RenderableState::Failed
            }
        ));
        assert_eq!(driver.call_count(), calls);
        assert!(renderable.build().is_err());
    }

    #[test]
    fn test_draw_before_build_is_not_ready() {
        let driver = Rc::new(HeadlessDriver::new());
        let renderable = PrimitiveRenderable::new(
            Rc::clone(&driver),
            MeshData::square(),
            primitive_shaders::uniform_color(),
            PrimitiveConfig::default(),
        );

        let err = renderable.draw(&Mat4::IDENTITY).unwrap_err();
        assert!(matches!(
            err,
            RenderError::NotReady {
                state: RenderableState::Uninitialized
            }
        ));
        assert_eq!(driver.call_count(), 0);
    }

    #[test]
    fn test_driver_error_aborts_only_that_draw() {
        let driver = Rc::new(HeadlessDriver::new());
        let first = square(&driver);
        let second = square(&driver);
        let position = first.program().unwrap().bindings().position.unwrap();

        driver.inject_fault("glUniformMatrix4fv", glow::INVALID_OPERATION);
        let err = first.draw(&Mat4::IDENTITY).unwrap_err();
        assert!(matches!(err, RenderError::GraphicsApi(api) if api.operation == "glUniformMatrix4fv"));
        assert!(driver.submitted_draws().is_empty());
        assert!(!driver.vertex_attrib_array_enabled(position).unwrap());

        second.draw(&Mat4::IDENTITY).unwrap();
        first.draw(&Mat4::IDENTITY).unwrap();
        assert_eq!(driver.submitted_draws().len(), 2);
    }

    #[test]
    fn test_missing_transform_binding_fails_build() {
        let driver = Rc::new(HeadlessDriver::new());
        let source = ShaderSource::new(
            "attribute vec4 a_Position;\nvoid main() { gl_Position = a_Position; }",
            "void main() { gl_FragColor = vec4(1.0); }",
        );

        let err = PrimitiveRenderable::create(
            Rc::clone(&driver),
            MeshData::square(),
            source.clone(),
            PrimitiveConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, RenderError::MissingBinding { ref name } if name == "u_MVPMatrix"));
        assert_eq!(driver.live_objects().total(), 0);

        let config = PrimitiveConfig {
            require_transform: false,
            ..PrimitiveConfig::default()
        };
        let renderable =
            PrimitiveRenderable::create(Rc::clone(&driver), MeshData::square(), source, config)
                .map_err(|err| err.to_string())
                .unwrap();
        renderable.draw(&Mat4::from_scale(Vec3::splat(4.0))).unwrap();
        let triangles = driver.submitted_draws()[0].triangles();
        assert_eq!(triangles[0][0], Vec4::new(-0.5, 0.5, 0.0, 1.0));
    }

    #[test]
    fn test_layout_mismatch_fails_before_any_driver_call() {
        let driver = Rc::new(HeadlessDriver::new());
        let mut mesh = MeshData::square();
        mesh.indices = vec![0, 1, 7];

        let err = PrimitiveRenderable::create(
            Rc::clone(&driver),
            mesh,
            primitive_shaders::uniform_color(),
            PrimitiveConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, RenderError::LayoutMismatch(_)));
        assert_eq!(driver.call_count(), 0);
    }

    #[test]
    fn test_color_attribute_requires_color_in_layout() {
        let driver = Rc::new(HeadlessDriver::new());
        let err = PrimitiveRenderable::create(
            Rc::clone(&driver),
            MeshData::square(),
            primitive_shaders::vertex_color(),
            PrimitiveConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, RenderError::LayoutMismatch(_)));
        assert_eq!(driver.live_objects().total(), 0);
    }

    #[test]
    fn test_vertex_color_triangle_feeds_color_attribute() {
        let driver = Rc::new(HeadlessDriver::new());
        let renderable = PrimitiveRenderable::create(
            Rc::clone(&driver),
            MeshData::rgb_triangle(),
            primitive_shaders::vertex_color(),
            PrimitiveConfig::default(),
        )
        .map_err(|err| err.to_string())
        .unwrap();
        let color = renderable.program().unwrap().bindings().color_attribute.unwrap();

        renderable.draw(&Mat4::IDENTITY).unwrap();

        let draw = &driver.submitted_draws()[0];
        assert_eq!(
            draw.attributes["a_Color"],
            vec![
                Vec4::new(1.0, 0.0, 0.0, 1.0),
                Vec4::new(0.0, 0.0, 1.0, 1.0),
                Vec4::new(0.0, 1.0, 0.0, 1.0),
            ]
        );
        assert_eq!(draw.triangles()[0][2], Vec4::new(0.0, 0.559016994, 0.0, 1.0));
        assert!(!driver.vertex_attrib_array_enabled(color).unwrap());
    }

    #[test]
    fn test_drop_releases_everything() {
        let driver = Rc::new(HeadlessDriver::new());
        let renderable = square(&driver);
        assert_eq!(driver.live_objects().programs, 1);
        assert_eq!(driver.live_objects().buffers, 2);

        drop(renderable);
        assert_eq!(driver.live_objects().total(), 0);
    }

    #[test]
    fn test_build_is_idempotent_once_ready() {
        let driver = Rc::new(HeadlessDriver::new());
        let mut renderable = square(&driver);
        let calls = driver.call_count();

        renderable.build().unwrap();
        assert_eq!(driver.call_count(), calls);
    }
}
