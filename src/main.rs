use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use glow::HasContext;
use glutin::{
    config::ConfigTemplateBuilder,
    display::GetGlDisplay,
    context::{ContextApi, ContextAttributesBuilder, PossiblyCurrentContext},
    prelude::*,
    surface::{Surface, SwapInterval, WindowSurface},
};
use glutin_winit::{DisplayBuilder, GlWindow};
use log::{error, info, warn, LevelFilter};
use raw_window_handle::HasRawWindowHandle;
use simple_logger::SimpleLogger;
use std::{ffi::CString, num::NonZeroU32, rc::Rc, sync::Arc, time::Instant};
use winit::{
    dpi::LogicalSize,
    event::{Event, WindowEvent},
    event_loop::{EventLoop, EventLoopBuilder},
    window::{Window, WindowBuilder},
};

use shaderquad::{primitive_shaders, GlowDriver, MeshData, PrimitiveConfig, PrimitiveRenderable};

/// Fixed camera looking down -Z at the origin.
struct Camera {
    eye: Vec3,
    fov: f32,
    aspect_ratio: f32,
    near: f32,
    far: f32,
}

impl Camera {
    fn new(aspect_ratio: f32) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 1.5),
            fov: 60.0,
            aspect_ratio,
            near: 0.1,
            far: 10.0,
        }
    }

    fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, Vec3::ZERO, Vec3::Y)
    }

    fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov.to_radians(), self.aspect_ratio, self.near, self.far)
    }

    fn mvp(&self, model: Mat4) -> Mat4 {
        self.projection_matrix() * self.view_matrix() * model
    }
}

struct App {
    window: Window,
    gl_context: PossiblyCurrentContext,
    gl_surface: Surface<WindowSurface>,
    gl: Arc<glow::Context>,
    renderable: Option<PrimitiveRenderable<GlowDriver>>,
    camera: Camera,
    started: Instant,
}

impl App {
    fn new(event_loop: &EventLoop<()>, config: PrimitiveConfig) -> Result<Self> {
        let window_builder = WindowBuilder::new()
            .with_title("shaderquad")
            .with_inner_size(LogicalSize::new(800, 600));
        let template = ConfigTemplateBuilder::new().with_alpha_size(8);
        let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));

        let (window, gl_config) = display_builder
            .build(event_loop, template, |configs| {
                configs
                    .reduce(|accum, config| {
                        if config.num_samples() > accum.num_samples() {
                            config
                        } else {
                            accum
                        }
                    })
                    .expect("display offered no GL configs")
            })
            .map_err(|e| anyhow!("Failed to build display: {}", e))?;

        let window = window.context("Display builder did not create a window")?;
        let raw_window_handle = window.raw_window_handle();
        let gl_display = gl_config.display();

        // Desktop GL first, GLES where that is all the platform offers.
        let context_attributes = ContextAttributesBuilder::new().build(Some(raw_window_handle));
        let fallback_attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::Gles(None))
            .build(Some(raw_window_handle));

        let not_current = unsafe {
            gl_display
                .create_context(&gl_config, &context_attributes)
                .or_else(|_| gl_display.create_context(&gl_config, &fallback_attributes))
                .context("Failed to create GL context")?
        };

        let attrs = window.build_surface_attributes(Default::default());
        let gl_surface = unsafe {
            gl_display
                .create_window_surface(&gl_config, &attrs)
                .context("Failed to create GL surface")?
        };
        let gl_context = not_current
            .make_current(&gl_surface)
            .context("Failed to make GL context current")?;

        if let Err(err) =
            gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::MIN))
        {
            warn!("Vsync unavailable: {}", err);
        }

        let gl = Arc::new(unsafe {
            glow::Context::from_loader_function(|symbol| {
                CString::new(symbol)
                    .map_or(std::ptr::null(), |symbol| gl_display.get_proc_address(&symbol))
            })
        });

        let driver = Rc::new(GlowDriver::new(Arc::clone(&gl))?);
        let renderable = PrimitiveRenderable::create(
            driver,
            MeshData::square(),
            primitive_shaders::uniform_color(),
            config,
        )?;

        let size = window.inner_size();
        let camera = Camera::new(size.width.max(1) as f32 / size.height.max(1) as f32);

        Ok(Self {
            window,
            gl_context,
            gl_surface,
            gl,
            renderable: Some(renderable),
            camera,
            started: Instant::now(),
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        let (Some(w), Some(h)) = (NonZeroU32::new(width), NonZeroU32::new(height)) else {
            return;
        };
        self.gl_surface.resize(&self.gl_context, w, h);
        unsafe { self.gl.viewport(0, 0, width as i32, height as i32) };
        self.camera.aspect_ratio = width as f32 / height as f32;
    }

    fn render(&mut self) -> Result<()> {
        unsafe {
            self.gl.clear_color(0.0, 0.0, 0.0, 1.0);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }

        if let Some(renderable) = &self.renderable {
            let model = Mat4::from_rotation_z(self.started.elapsed().as_secs_f32());
            if let Err(err) = renderable.draw(&self.camera.mvp(model)) {
                error!("Skipping primitive this frame: {}", err);
            }
        }

        self.gl_surface.swap_buffers(&self.gl_context)?;
        Ok(())
    }

    /// GL objects must go while the context is still current.
    fn cleanup(&mut self) {
        if self.renderable.take().is_some() {
            info!("Released GL resources");
        }
    }
}

fn load_config() -> Result<PrimitiveConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path))?;
            Ok(PrimitiveConfig::from_toml_str(&content)?)
        }
        None => Ok(PrimitiveConfig::default()),
    }
}

fn main() -> Result<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).env().init()?;
    info!("Initializing application...");

    let config = load_config()?;
    let event_loop = EventLoopBuilder::new().build()?;
    let mut app = App::new(&event_loop, config)?;

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => app.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                if let Err(err) = app.render() {
                    error!("Frame failed: {:#}", err);
                    elwt.exit();
                }
            }
            _ => (),
        },
        Event::AboutToWait => app.window.request_redraw(),
        Event::LoopExiting => app.cleanup(),
        _ => (),
    })?;

    Ok(())
}
