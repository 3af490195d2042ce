// mesh.rs - Static geometry and the GPU buffers it is uploaded into

use crate::render::driver::{BufferTarget, GraphicsDriver};
use crate::render::error::RenderError;
use std::mem::size_of;
use std::rc::Rc;

/// Interleaved per-vertex float layout: position first, then optional color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub position_components: usize,
    pub color_components: usize,
}

impl VertexLayout {
    pub const POSITION_XYZ: Self = Self {
        position_components: 3,
        color_components: 0,
    };

    pub const POSITION_XYZ_COLOR_RGBA: Self = Self {
        position_components: 3,
        color_components: 4,
    };

    pub fn floats_per_vertex(&self) -> usize {
        self.position_components + self.color_components
    }

    pub fn stride(&self) -> usize {
        self.floats_per_vertex() * size_of::<f32>()
    }

    pub fn color_offset(&self) -> usize {
        self.position_components * size_of::<f32>()
    }

    pub fn has_color(&self) -> bool {
        self.color_components > 0
    }

    fn validate(&self) -> Result<(), RenderError> {
        if !(1..=4).contains(&self.position_components) {
            return Err(RenderError::LayoutMismatch(format!(
                "position needs 1 to 4 components, layout has {}",
                self.position_components
            )));
        }
        if !matches!(self.color_components, 0 | 3 | 4) {
            return Err(RenderError::LayoutMismatch(format!(
                "color needs 0, 3 or 4 components, layout has {}",
                self.color_components
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u16>,
    pub layout: VertexLayout,
}

impl MeshData {
    pub fn new(vertices: Vec<f32>, indices: Vec<u16>, layout: VertexLayout) -> Self {
        Self {
            vertices,
            indices,
            layout,
        }
    }

    /// Unit square centred on the origin, drawn as two counter-clockwise
    /// triangles.
    pub fn square() -> Self {
        #[rustfmt::skip]
        let vertices = vec![
            -0.5,  0.5, 0.0, // top left
            -0.5, -0.5, 0.0, // bottom left
             0.5, -0.5, 0.0, // bottom right
             0.5,  0.5, 0.0, // top right
        ];
        Self::new(vertices, vec![0, 1, 2, 0, 2, 3], VertexLayout::POSITION_XYZ)
    }

    /// Equilateral triangle with red, blue and green corners.
    pub fn rgb_triangle() -> Self {
        #[rustfmt::skip]
        let vertices = vec![
            // X, Y, Z,             R, G, B, A
            -0.5, -0.25,        0.0, 1.0, 0.0, 0.0, 1.0,
             0.5, -0.25,        0.0, 0.0, 0.0, 1.0, 1.0,
             0.0,  0.559016994, 0.0, 0.0, 1.0, 0.0, 1.0,
        ];
        Self::new(vertices, vec![0, 1, 2], VertexLayout::POSITION_XYZ_COLOR_RGBA)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.layout.floats_per_vertex().max(1)
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Index triples in draw order.
    pub fn triangles(&self) -> impl Iterator<Item = [u16; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
    }

    /// Checks that the data and the layout agree.
    pub fn validate(&self) -> Result<(), RenderError> {
        self.layout.validate()?;

        let stride = self.layout.floats_per_vertex();
        if self.vertices.is_empty() || self.vertices.len() % stride != 0 {
            return Err(RenderError::LayoutMismatch(format!(
                "{} vertex floats do not fill whole vertices of {} floats",
                self.vertices.len(),
                stride
            )));
        }
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(RenderError::LayoutMismatch(format!(
                "{} indices do not form whole triangles",
                self.indices.len()
            )));
        }
        if i32::try_from(self.indices.len()).is_err() {
            return Err(RenderError::LayoutMismatch(format!(
                "{} indices exceed a single draw call",
                self.indices.len()
            )));
        }

        let vertex_count = self.vertex_count();
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(RenderError::LayoutMismatch(format!(
                "index {} is out of range for {} vertices",
                index, vertex_count
            )));
        }
        Ok(())
    }
}

/// A GPU-resident buffer owned for its whole lifetime. Released on drop.
pub struct GpuBuffer<D: GraphicsDriver> {
    driver: Rc<D>,
    handle: D::Buffer,
    target: BufferTarget,
    size: usize,
}

impl<D: GraphicsDriver> GpuBuffer<D> {
    /// Creates a buffer and uploads `bytes` into it. The buffer is left bound
    /// to `target`.
    pub fn upload(driver: &Rc<D>, target: BufferTarget, bytes: &[u8]) -> Result<Self, RenderError> {
        let buffer = Self {
            driver: Rc::clone(driver),
            handle: driver.create_buffer()?,
            target,
            size: bytes.len(),
        };
        buffer.bind()?;
        driver.buffer_data(target, bytes)?;

        log::debug!("Uploaded {} bytes to {:?} buffer {:?}", bytes.len(), target, buffer.handle);
        Ok(buffer)
    }

    pub fn vertices(driver: &Rc<D>, vertices: &[f32]) -> Result<Self, RenderError> {
        Self::upload(driver, BufferTarget::Vertex, bytemuck::cast_slice(vertices))
    }

    pub fn indices(driver: &Rc<D>, indices: &[u16]) -> Result<Self, RenderError> {
        Self::upload(driver, BufferTarget::Index, bytemuck::cast_slice(indices))
    }

    pub fn bind(&self) -> Result<(), RenderError> {
        self.driver.bind_buffer(self.target, Some(self.handle))?;
        Ok(())
    }

    pub fn handle(&self) -> D::Buffer {
        self.handle
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl<D: GraphicsDriver> Drop for GpuBuffer<D> {
    fn drop(&mut self) {
        if let Err(err) = self.driver.delete_buffer(self.handle) {
            log::warn!("Failed to release buffer {:?}: {}", self.handle, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::driver::HeadlessDriver;

    #[test]
    fn test_square_is_two_triangles() {
        let square = MeshData::square();
        assert!(square.validate().is_ok());
        assert_eq!(square.vertex_count(), 4);
        assert_eq!(square.triangles().collect::<Vec<_>>(), vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_layout_stride_and_offsets() {
        let layout = VertexLayout::POSITION_XYZ_COLOR_RGBA;
        assert_eq!(layout.stride(), 28);
        assert_eq!(layout.color_offset(), 12);
        assert_eq!(VertexLayout::POSITION_XYZ.stride(), 12);
        assert!(MeshData::rgb_triangle().validate().is_ok());
    }

    #[test]
    fn test_partial_vertex_is_rejected() {
        let mut mesh = MeshData::square();
        mesh.vertices.pop();
        assert!(matches!(mesh.validate(), Err(RenderError::LayoutMismatch(_))));
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let mut mesh = MeshData::square();
        mesh.indices[5] = 4;
        let err = mesh.validate().unwrap_err();
        assert!(err.to_string().contains("index 4"), "{err}");
    }

    #[test]
    fn test_dangling_indices_are_rejected() {
        let mut mesh = MeshData::square();
        mesh.indices.push(1);
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_unsupported_color_width_is_rejected() {
        let mut mesh = MeshData::rgb_triangle();
        mesh.layout.color_components = 2;
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_buffer_uploads_native_bytes_and_releases_on_drop() {
        let driver = Rc::new(HeadlessDriver::new());
        let buffer = GpuBuffer::indices(&driver, &[0, 1, 2, 0, 2, 3]).unwrap();
        assert_eq!(buffer.size(), 12);
        assert_eq!(buffer.target(), BufferTarget::Index);
        assert_eq!(driver.live_objects().buffers, 1);

        drop(buffer);
        assert_eq!(driver.live_objects().buffers, 0);
    }
}
