// headless/mod.rs - Software GL reference driver
//
// Emulates the slice of OpenGL ES 2.0 the pipeline uses: object names, the
// error flag queue, shader compile/link, attribute arrays backed by buffer
// objects, uniform storage and indexed triangle assembly. Draws are recorded
// instead of rasterized, with `gl_Position` evaluated for the plain
// `uniform * ... * attribute` form.

mod glsl;

use super::{check_error_queue, BufferTarget, DriverResult, GraphicsApiError, GraphicsDriver, ShaderStage};
use glam::{Mat4, Vec4};
use glsl::{CompiledStage, Qualifier};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;

pub const MAX_VERTEX_ATTRIBS: usize = 16;

/// Value a disabled attribute array feeds the vertex stage.
const DEFAULT_ATTRIBUTE: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessShader(NonZeroU32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessProgram(NonZeroU32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessBuffer(NonZeroU32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessUniformLocation(u32);

/// A draw call as the headless driver received it.
#[derive(Debug, Clone)]
pub struct SubmittedDraw {
    pub program: HeadlessProgram,
    pub indices: Vec<u16>,
    /// Per submitted index, every active attribute as the vertex stage saw it.
    pub attributes: HashMap<String, Vec<Vec4>>,
    pub uniforms: HashMap<String, Vec<f32>>,
    /// Per submitted index; `None` when `gl_Position` could not be evaluated.
    pub clip_positions: Option<Vec<Vec4>>,
}

impl SubmittedDraw {
    pub fn triangles(&self) -> Vec<[Vec4; 3]> {
        self.clip_positions
            .as_deref()
            .unwrap_or_default()
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveObjects {
    pub shaders: usize,
    pub programs: usize,
    pub buffers: usize,
}

impl LiveObjects {
    pub fn total(&self) -> usize {
        self.shaders + self.programs + self.buffers
    }
}

struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: Option<CompiledStage>,
    info_log: String,
    delete_pending: bool,
}

struct UniformSlot {
    name: String,
    ty: String,
    values: Vec<f32>,
}

struct LinkedProgram {
    /// Index is the attribute location.
    attributes: Vec<String>,
    /// Index is the uniform location.
    uniforms: Vec<UniformSlot>,
    position_factors: Option<Vec<String>>,
}

#[derive(Default)]
struct ProgramObject {
    attached: Vec<NonZeroU32>,
    linked: Option<LinkedProgram>,
    info_log: String,
}

#[derive(Debug, Clone, Copy)]
struct AttribPointer {
    buffer: NonZeroU32,
    components: usize,
    stride: usize,
    offset: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct AttribArray {
    enabled: bool,
    pointer: Option<AttribPointer>,
}

#[derive(Default)]
struct State {
    last_name: u32,
    shaders: HashMap<NonZeroU32, ShaderObject>,
    programs: HashMap<NonZeroU32, ProgramObject>,
    buffers: HashMap<NonZeroU32, Vec<u8>>,
    array_buffer: Option<NonZeroU32>,
    element_buffer: Option<NonZeroU32>,
    current_program: Option<NonZeroU32>,
    attribs: [AttribArray; MAX_VERTEX_ATTRIBS],
    errors: VecDeque<u32>,
    faults: HashMap<&'static str, u32>,
    calls: usize,
    draws: Vec<SubmittedDraw>,
}

type Flag<T> = Result<T, u32>;

fn uniform_size(ty: &str) -> usize {
    match ty {
        "vec2" | "ivec2" | "bvec2" => 2,
        "vec3" | "ivec3" | "bvec3" => 3,
        "vec4" | "ivec4" | "bvec4" | "mat2" => 4,
        "mat3" => 9,
        "mat4" => 16,
        _ => 1,
    }
}

impl State {
    fn gen_name(&mut self) -> NonZeroU32 {
        self.last_name += 1;
        NonZeroU32::MIN.saturating_add(self.last_name - 1)
    }

    fn binding(&self, target: BufferTarget) -> Option<NonZeroU32> {
        match target {
            BufferTarget::Vertex => self.array_buffer,
            BufferTarget::Index => self.element_buffer,
        }
    }

    fn binding_mut(&mut self, target: BufferTarget) -> &mut Option<NonZeroU32> {
        match target {
            BufferTarget::Vertex => &mut self.array_buffer,
            BufferTarget::Index => &mut self.element_buffer,
        }
    }

    fn is_attached(&self, shader: NonZeroU32) -> bool {
        self.programs
            .values()
            .any(|program| program.attached.contains(&shader))
    }

    fn release_if_orphaned(&mut self, shader: NonZeroU32) {
        let pending = self
            .shaders
            .get(&shader)
            .is_some_and(|object| object.delete_pending);
        if pending && !self.is_attached(shader) {
            self.shaders.remove(&shader);
        }
    }

    fn linked(&self, program: NonZeroU32) -> Flag<&LinkedProgram> {
        let object = self.programs.get(&program).ok_or(glow::INVALID_VALUE)?;
        object.linked.as_ref().ok_or(glow::INVALID_OPERATION)
    }

    fn current_uniform(&mut self, location: HeadlessUniformLocation, ty: &str) -> Flag<&mut UniformSlot> {
        let program = self.current_program.ok_or(glow::INVALID_OPERATION)?;
        let linked = self
            .programs
            .get_mut(&program)
            .and_then(|object| object.linked.as_mut())
            .ok_or(glow::INVALID_OPERATION)?;
        let slot = linked
            .uniforms
            .get_mut(location.0 as usize)
            .ok_or(glow::INVALID_OPERATION)?;
        if slot.ty != ty {
            return Err(glow::INVALID_OPERATION);
        }
        Ok(slot)
    }

    fn link(&self, object: &ProgramObject) -> Result<LinkedProgram, String> {
        let mut vertex = None;
        let mut fragment = None;
        for name in &object.attached {
            let Some(shader) = self.shaders.get(name) else {
                continue;
            };
            let slot = match shader.stage {
                ShaderStage::Vertex => &mut vertex,
                ShaderStage::Fragment => &mut fragment,
            };
            match &shader.compiled {
                Some(compiled) => *slot = Some(compiled),
                None => return Err(format!("error: {} shader is not compiled\n", shader.stage)),
            }
        }

        let vertex = vertex.ok_or("error: no vertex shader attached\n")?;
        let fragment = fragment.ok_or("error: no fragment shader attached\n")?;
        if !vertex.has_main {
            return Err("error: vertex shader lacks `main'\n".to_string());
        }
        if !fragment.has_main {
            return Err("error: fragment shader lacks `main'\n".to_string());
        }

        for input in fragment
            .declarations
            .iter()
            .filter(|d| d.qualifier == Qualifier::VaryingIn)
        {
            let produced = vertex
                .declarations
                .iter()
                .find(|d| d.qualifier == Qualifier::VaryingOut && d.name == input.name);
            match produced {
                None => {
                    return Err(format!(
                        "error: varying `{}' is not written by the vertex shader\n",
                        input.name
                    ))
                }
                Some(output) if output.ty != input.ty => {
                    return Err(format!(
                        "error: varying `{}' declared as {} in the vertex shader and {} in the fragment shader\n",
                        input.name, output.ty, input.ty
                    ))
                }
                Some(_) => {}
            }
        }

        let attributes: Vec<String> = vertex
            .declarations
            .iter()
            .filter(|d| d.qualifier == Qualifier::Attribute)
            .map(|d| d.name.clone())
            .collect();
        if attributes.len() > MAX_VERTEX_ATTRIBS {
            return Err("error: too many vertex attributes\n".to_string());
        }

        let mut uniforms: Vec<UniformSlot> = Vec::new();
        for declaration in vertex
            .declarations
            .iter()
            .chain(&fragment.declarations)
            .filter(|d| d.qualifier == Qualifier::Uniform)
        {
            match uniforms.iter().find(|u| u.name == declaration.name) {
                Some(existing) if existing.ty != declaration.ty => {
                    return Err(format!(
                        "error: uniform `{}' declared as {} and {}\n",
                        declaration.name, existing.ty, declaration.ty
                    ))
                }
                Some(_) => {}
                None => uniforms.push(UniformSlot {
                    name: declaration.name.clone(),
                    ty: declaration.ty.clone(),
                    values: vec![0.0; uniform_size(&declaration.ty)],
                }),
            }
        }

        Ok(LinkedProgram {
            attributes,
            uniforms,
            position_factors: vertex.position_factors.clone(),
        })
    }

    fn fetch_attribute(&self, pointer: AttribPointer, index: u16) -> Flag<Vec4> {
        let data = self.buffers.get(&pointer.buffer).ok_or(glow::INVALID_OPERATION)?;
        let stride = if pointer.stride == 0 {
            pointer.components * 4
        } else {
            pointer.stride
        };
        let start = pointer.offset + index as usize * stride;
        let end = start + pointer.components * 4;
        let bytes = data.get(start..end).ok_or(glow::INVALID_OPERATION)?;

        let mut value = DEFAULT_ATTRIBUTE;
        for (component, chunk) in bytes.chunks_exact(4).enumerate() {
            value[component] = f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(value)
    }

    fn draw(&mut self, count: i32, offset: i32) -> Flag<()> {
        if count < 0 || offset < 0 {
            return Err(glow::INVALID_VALUE);
        }
        let program = self.current_program.ok_or(glow::INVALID_OPERATION)?;
        let element_buffer = self.element_buffer.ok_or(glow::INVALID_OPERATION)?;
        let linked = self.linked(program)?;

        let start = offset as usize;
        let end = start + count as usize * 2;
        let indices: Vec<u16> = self
            .buffers
            .get(&element_buffer)
            .and_then(|data| data.get(start..end))
            .ok_or(glow::INVALID_OPERATION)?
            .chunks_exact(2)
            .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
            .collect();

        let mut attributes = HashMap::new();
        for (location, name) in linked.attributes.iter().enumerate() {
            let array = self.attribs[location];
            let values = if array.enabled {
                let pointer = array.pointer.ok_or(glow::INVALID_OPERATION)?;
                indices
                    .iter()
                    .map(|&index| self.fetch_attribute(pointer, index))
                    .collect::<Flag<Vec<_>>>()?
            } else {
                vec![DEFAULT_ATTRIBUTE; indices.len()]
            };
            attributes.insert(name.clone(), values);
        }

        let uniforms: HashMap<String, Vec<f32>> = linked
            .uniforms
            .iter()
            .map(|slot| (slot.name.clone(), slot.values.clone()))
            .collect();

        let clip_positions = linked
            .position_factors
            .as_ref()
            .and_then(|factors| evaluate_position(factors, &attributes, linked));

        self.draws.push(SubmittedDraw {
            program: HeadlessProgram(program),
            indices,
            attributes,
            uniforms,
            clip_positions,
        });
        Ok(())
    }
}

fn evaluate_position(
    factors: &[String],
    attributes: &HashMap<String, Vec<Vec4>>,
    linked: &LinkedProgram,
) -> Option<Vec<Vec4>> {
    let (attribute, matrices) = factors.split_last()?;
    let vertices = attributes.get(attribute)?;

    let mut transform = Mat4::IDENTITY;
    for name in matrices {
        let slot = linked
            .uniforms
            .iter()
            .find(|slot| &slot.name == name && slot.ty == "mat4")?;
        let columns: [f32; 16] = slot.values.as_slice().try_into().ok()?;
        transform *= Mat4::from_cols_array(&columns);
    }

    Some(vertices.iter().map(|&v| transform * v).collect())
}

/// Software stand-in for a GL context; see the module docs for what it covers.
#[derive(Default)]
pub struct HeadlessDriver {
    state: RefCell<State>,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call named `operation` fail with `code` and no effect.
    pub fn inject_fault(&self, operation: &'static str, code: u32) {
        self.state.borrow_mut().faults.insert(operation, code);
    }

    pub fn call_count(&self) -> usize {
        self.state.borrow().calls
    }

    pub fn submitted_draws(&self) -> Vec<SubmittedDraw> {
        self.state.borrow().draws.clone()
    }

    pub fn live_objects(&self) -> LiveObjects {
        let state = self.state.borrow();
        LiveObjects {
            shaders: state.shaders.len(),
            programs: state.programs.len(),
            buffers: state.buffers.len(),
        }
    }

    pub fn current_program(&self) -> Option<HeadlessProgram> {
        self.state.borrow().current_program.map(HeadlessProgram)
    }

    /// Whether attribute array `index` is enabled. Counts as a driver call.
    pub fn vertex_attrib_array_enabled(&self, index: u32) -> DriverResult<bool> {
        self.call("glGetVertexAttribfv", |state| {
            let array = state.attribs.get(index as usize).ok_or(glow::INVALID_VALUE)?;
            Ok(array.enabled)
        })
    }

    fn call<T>(&self, operation: &'static str, f: impl FnOnce(&mut State) -> Flag<T>) -> DriverResult<T> {
        let value = {
            let mut state = self.state.borrow_mut();
            state.calls += 1;
            let outcome = match state.faults.remove(operation) {
                Some(code) => Err(code),
                None => f(&mut state),
            };
            outcome.map_err(|code| state.errors.push_back(code)).ok()
        };

        check_error_queue(operation, || {
            self.state
                .borrow_mut()
                .errors
                .pop_front()
                .unwrap_or(glow::NO_ERROR)
        })?;
        value.ok_or(GraphicsApiError {
            operation,
            code: glow::INVALID_OPERATION,
        })
    }
}

impl GraphicsDriver for HeadlessDriver {
    type Shader = HeadlessShader;
    type Program = HeadlessProgram;
    type Buffer = HeadlessBuffer;
    type UniformLocation = HeadlessUniformLocation;

    fn create_shader(&self, stage: ShaderStage) -> DriverResult<Self::Shader> {
        self.call("glCreateShader", |state| {
            let name = state.gen_name();
            state.shaders.insert(
                name,
                ShaderObject {
                    stage,
                    source: String::new(),
                    compiled: None,
                    info_log: String::new(),
                    delete_pending: false,
                },
            );
            Ok(HeadlessShader(name))
        })
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) -> DriverResult<()> {
        self.call("glShaderSource", |state| {
            let object = state.shaders.get_mut(&shader.0).ok_or(glow::INVALID_VALUE)?;
            object.source = source.to_string();
            Ok(())
        })
    }

    fn compile_shader(&self, shader: Self::Shader) -> DriverResult<()> {
        self.call("glCompileShader", |state| {
            let object = state.shaders.get_mut(&shader.0).ok_or(glow::INVALID_VALUE)?;
            match glsl::compile(object.stage, &object.source) {
                Ok(compiled) => {
                    object.compiled = Some(compiled);
                    object.info_log.clear();
                }
                Err(log) => {
                    object.compiled = None;
                    object.info_log = log;
                }
            }
            Ok(())
        })
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> DriverResult<bool> {
        self.call("glGetShaderiv", |state| {
            let object = state.shaders.get(&shader.0).ok_or(glow::INVALID_VALUE)?;
            Ok(object.compiled.is_some())
        })
    }

    fn shader_info_log(&self, shader: Self::Shader) -> DriverResult<String> {
        self.call("glGetShaderInfoLog", |state| {
            let object = state.shaders.get(&shader.0).ok_or(glow::INVALID_VALUE)?;
            Ok(object.info_log.clone())
        })
    }

    fn delete_shader(&self, shader: Self::Shader) -> DriverResult<()> {
        self.call("glDeleteShader", |state| {
            let object = state.shaders.get_mut(&shader.0).ok_or(glow::INVALID_VALUE)?;
            object.delete_pending = true;
            state.release_if_orphaned(shader.0);
            Ok(())
        })
    }

    fn create_program(&self) -> DriverResult<Self::Program> {
        self.call("glCreateProgram", |state| {
            let name = state.gen_name();
            state.programs.insert(name, ProgramObject::default());
            Ok(HeadlessProgram(name))
        })
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) -> DriverResult<()> {
        self.call("glAttachShader", |state| {
            let stage = state
                .shaders
                .get(&shader.0)
                .filter(|object| !object.delete_pending)
                .ok_or(glow::INVALID_VALUE)?
                .stage;
            let same_stage_attached = {
                let object = state.programs.get(&program.0).ok_or(glow::INVALID_VALUE)?;
                object.attached.iter().any(|name| {
                    *name == shader.0
                        || state.shaders.get(name).is_some_and(|s| s.stage == stage)
                })
            };
            if same_stage_attached {
                return Err(glow::INVALID_OPERATION);
            }
            if let Some(object) = state.programs.get_mut(&program.0) {
                object.attached.push(shader.0);
            }
            Ok(())
        })
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) -> DriverResult<()> {
        self.call("glDetachShader", |state| {
            if !state.shaders.contains_key(&shader.0) {
                return Err(glow::INVALID_VALUE);
            }
            let object = state.programs.get_mut(&program.0).ok_or(glow::INVALID_VALUE)?;
            let position = object
                .attached
                .iter()
                .position(|name| *name == shader.0)
                .ok_or(glow::INVALID_OPERATION)?;
            object.attached.remove(position);
            state.release_if_orphaned(shader.0);
            Ok(())
        })
    }

    fn link_program(&self, program: Self::Program) -> DriverResult<()> {
        self.call("glLinkProgram", |state| {
            let object = state.programs.get(&program.0).ok_or(glow::INVALID_VALUE)?;
            let outcome = state.link(object);
            let object = state.programs.get_mut(&program.0).ok_or(glow::INVALID_VALUE)?;
            match outcome {
                Ok(linked) => {
                    object.linked = Some(linked);
                    object.info_log.clear();
                }
                Err(log) => {
                    object.linked = None;
                    object.info_log = log;
                }
            }
            Ok(())
        })
    }

    fn program_link_status(&self, program: Self::Program) -> DriverResult<bool> {
        self.call("glGetProgramiv", |state| {
            let object = state.programs.get(&program.0).ok_or(glow::INVALID_VALUE)?;
            Ok(object.linked.is_some())
        })
    }

    fn program_info_log(&self, program: Self::Program) -> DriverResult<String> {
        self.call("glGetProgramInfoLog", |state| {
            let object = state.programs.get(&program.0).ok_or(glow::INVALID_VALUE)?;
            Ok(object.info_log.clone())
        })
    }

    fn delete_program(&self, program: Self::Program) -> DriverResult<()> {
        self.call("glDeleteProgram", |state| {
            let object = state.programs.remove(&program.0).ok_or(glow::INVALID_VALUE)?;
            if state.current_program == Some(program.0) {
                state.current_program = None;
            }
            for shader in object.attached {
                state.release_if_orphaned(shader);
            }
            Ok(())
        })
    }

    fn attrib_location(&self, program: Self::Program, name: &str) -> DriverResult<Option<u32>> {
        self.call("glGetAttribLocation", |state| {
            let linked = state.linked(program.0)?;
            Ok(linked
                .attributes
                .iter()
                .position(|attribute| attribute == name)
                .map(|location| location as u32))
        })
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> DriverResult<Option<Self::UniformLocation>> {
        self.call("glGetUniformLocation", |state| {
            let linked = state.linked(program.0)?;
            Ok(linked
                .uniforms
                .iter()
                .position(|slot| slot.name == name)
                .map(|location| HeadlessUniformLocation(location as u32)))
        })
    }

    fn use_program(&self, program: Option<Self::Program>) -> DriverResult<()> {
        self.call("glUseProgram", |state| {
            if let Some(program) = program {
                state.linked(program.0)?;
            }
            state.current_program = program.map(|p| p.0);
            Ok(())
        })
    }

    fn create_buffer(&self) -> DriverResult<Self::Buffer> {
        self.call("glGenBuffers", |state| {
            let name = state.gen_name();
            state.buffers.insert(name, Vec::new());
            Ok(HeadlessBuffer(name))
        })
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>) -> DriverResult<()> {
        self.call("glBindBuffer", |state| {
            if let Some(buffer) = buffer {
                if !state.buffers.contains_key(&buffer.0) {
                    return Err(glow::INVALID_OPERATION);
                }
            }
            *state.binding_mut(target) = buffer.map(|b| b.0);
            Ok(())
        })
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) -> DriverResult<()> {
        self.call("glBufferData", |state| {
            let bound = state.binding(target).ok_or(glow::INVALID_OPERATION)?;
            let storage = state.buffers.get_mut(&bound).ok_or(glow::INVALID_OPERATION)?;
            *storage = data.to_vec();
            Ok(())
        })
    }

    fn delete_buffer(&self, buffer: Self::Buffer) -> DriverResult<()> {
        self.call("glDeleteBuffers", |state| {
            // Unknown names are silently ignored by glDeleteBuffers.
            if state.buffers.remove(&buffer.0).is_some() {
                for target in [BufferTarget::Vertex, BufferTarget::Index] {
                    let binding = state.binding_mut(target);
                    if *binding == Some(buffer.0) {
                        *binding = None;
                    }
                }
            }
            Ok(())
        })
    }

    fn enable_vertex_attrib_array(&self, index: u32) -> DriverResult<()> {
        self.call("glEnableVertexAttribArray", |state| {
            let array = state
                .attribs
                .get_mut(index as usize)
                .ok_or(glow::INVALID_VALUE)?;
            array.enabled = true;
            Ok(())
        })
    }

    fn disable_vertex_attrib_array(&self, index: u32) -> DriverResult<()> {
        self.call("glDisableVertexAttribArray", |state| {
            let array = state
                .attribs
                .get_mut(index as usize)
                .ok_or(glow::INVALID_VALUE)?;
            array.enabled = false;
            Ok(())
        })
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        components: i32,
        stride: i32,
        offset: i32,
    ) -> DriverResult<()> {
        self.call("glVertexAttribPointer", |state| {
            if !(1..=4).contains(&components) || stride < 0 || offset < 0 {
                return Err(glow::INVALID_VALUE);
            }
            let buffer = state.array_buffer.ok_or(glow::INVALID_OPERATION)?;
            let array = state
                .attribs
                .get_mut(index as usize)
                .ok_or(glow::INVALID_VALUE)?;
            array.pointer = Some(AttribPointer {
                buffer,
                components: components as usize,
                stride: stride as usize,
                offset: offset as usize,
            });
            Ok(())
        })
    }

    fn uniform_4_f32(&self, location: &Self::UniformLocation, value: &[f32; 4]) -> DriverResult<()> {
        self.call("glUniform4fv", |state| {
            let slot = state.current_uniform(*location, "vec4")?;
            slot.values.copy_from_slice(value);
            Ok(())
        })
    }

    fn uniform_matrix_4_f32(
        &self,
        location: &Self::UniformLocation,
        value: &[f32; 16],
    ) -> DriverResult<()> {
        self.call("glUniformMatrix4fv", |state| {
            let slot = state.current_uniform(*location, "mat4")?;
            slot.values.copy_from_slice(value);
            Ok(())
        })
    }

    fn uniform_values(
        &self,
        program: Self::Program,
        location: &Self::UniformLocation,
        out: &mut [f32],
    ) -> DriverResult<()> {
        self.call("glGetUniformfv", |state| {
            let slot = state
                .linked(program.0)?
                .uniforms
                .get(location.0 as usize)
                .ok_or(glow::INVALID_OPERATION)?;
            let len = out.len().min(slot.values.len());
            out[..len].copy_from_slice(&slot.values[..len]);
            Ok(())
        })
    }

    fn draw_indexed_triangles(&self, count: i32, offset: i32) -> DriverResult<()> {
        self.call("glDrawElements", |state| state.draw(count, offset))
    }
}
