//! Renderer error type.
//!
//! Construction failures (shaders, framebuffers, context acquisition) are
//! returned to the caller and are fatal for the object being built. Context
//! loss is not an error: it is a lifecycle state, see [`crate::renderer`].

use std::fmt;

use thiserror::Error;

use crate::context::FramebufferStatus;

/// Shader stage a compile diagnostic belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("Vertex"),
            ShaderStage::Fragment => f.write_str("Fragment"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    /// No usable GPU context could be acquired.
    #[error("GPU context unavailable: {0}")]
    ContextUnavailable(String),

    /// A GPU operation was requested while the context is lost.
    #[error("GPU context is lost")]
    ContextLost,

    #[error("Failed to compile {stage} Shader:\n{log}")]
    ShaderCompile {
        stage: ShaderStage,
        /// 1-based source line of the first diagnostic, when known.
        line: Option<u32>,
        log: String,
    },

    #[error("Failed to link program:\n{0}")]
    ProgramLink(String),

    #[error("Framebuffer incomplete. Framebuffer status: {0}")]
    FramebufferIncomplete(FramebufferStatus),

    /// A handle whose resource was already released (or never existed).
    #[error("invalid {0} handle")]
    InvalidHandle(&'static str),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("pixel readback failed: {0}")]
    Readback(String),

    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framebuffer_error_carries_decoded_status() {
        let err = RenderError::FramebufferIncomplete(FramebufferStatus::IncompleteDimensions);
        assert_eq!(
            err.to_string(),
            "Framebuffer incomplete. Framebuffer status: Incomplete Dimensions"
        );
    }

    #[test]
    fn shader_error_names_stage() {
        let err = RenderError::ShaderCompile {
            stage: ShaderStage::Fragment,
            line: Some(3),
            log: "oops".into(),
        };
        assert!(err.to_string().starts_with("Failed to compile Fragment Shader:"));
    }
}
