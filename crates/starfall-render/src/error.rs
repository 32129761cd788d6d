use starfall_test_utils::DeviceError;

use crate::shader_content::ShaderContentError;

/// Resource whose fixed capacity was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityResource {
    Sprites,
    TextureSlots,
    /// 16-bit indices cannot address this many vertices.
    IndexRange,
}

impl std::fmt::Display for CapacityResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityResource::Sprites => write!(f, "sprites"),
            CapacityResource::TextureSlots => write!(f, "texture slots"),
            CapacityResource::IndexRange => write!(f, "16-bit index range"),
        }
    }
}

/// Errors produced by the sprite batch.
#[derive(Debug, Clone, PartialEq)]
pub enum SpriteBatchError {
    /// The graphics device failed to create or update a resource.
    Device(DeviceError),
    /// Shader bytecode could not be loaded.
    ShaderContent(ShaderContentError),
    /// Configuration values are inconsistent.
    InvalidConfig(String),
    /// A frame operation needs a bound render page and none is bound.
    MissingRenderPage,
    /// An operation was called in the wrong lifecycle state.
    InvalidOperation(&'static str),
    /// A fixed-size resource is full.
    CapacityExceeded {
        resource: CapacityResource,
        limit: u32,
    },
    /// `draw_slot` referenced a slot that is not bound in this batch.
    TextureSlotOutOfRange { slot: u32, bound: u32 },
    /// An attachment clears an aspect combination with no clear value shape.
    UnsupportedAttachment {
        attachment: u32,
        aspects: crate::clear::AspectFlags,
    },
}

impl std::fmt::Display for SpriteBatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpriteBatchError::Device(e) => write!(f, "Device error: {}", e),
            SpriteBatchError::ShaderContent(e) => write!(f, "Shader content error: {}", e),
            SpriteBatchError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            SpriteBatchError::MissingRenderPage => write!(f, "No render page is bound"),
            SpriteBatchError::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            SpriteBatchError::CapacityExceeded { resource, limit } => {
                write!(f, "Capacity exceeded: at most {} {}", limit, resource)
            }
            SpriteBatchError::TextureSlotOutOfRange { slot, bound } => {
                write!(f, "Texture slot {} is not bound ({} slots bound)", slot, bound)
            }
            SpriteBatchError::UnsupportedAttachment { attachment, aspects } => write!(
                f,
                "Attachment {} clears unsupported aspects {:?}",
                attachment, aspects
            ),
        }
    }
}

impl std::error::Error for SpriteBatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpriteBatchError::Device(e) => Some(e),
            SpriteBatchError::ShaderContent(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for SpriteBatchError {
    fn from(err: DeviceError) -> Self {
        SpriteBatchError::Device(err)
    }
}

impl From<ShaderContentError> for SpriteBatchError {
    fn from(err: ShaderContentError) -> Self {
        SpriteBatchError::ShaderContent(err)
    }
}
