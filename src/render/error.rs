use crate::render::driver::{GraphicsApiError, ShaderStage};
use crate::render::primitive::RenderableState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{stage} shader compilation failed: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("Program linking failed: {log}")]
    ProgramLink { log: String },

    #[error("Graphics API error: {0}")]
    GraphicsApi(#[from] GraphicsApiError),

    #[error("Renderable is not ready to draw (state: {state:?})")]
    NotReady { state: RenderableState },

    #[error("Shader program has no '{name}' binding")]
    MissingBinding { name: String },

    #[error("Vertex layout mismatch: {0}")]
    LayoutMismatch(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
