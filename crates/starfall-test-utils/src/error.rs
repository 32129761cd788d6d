/// Failures reported by a [`RenderContext`](crate::RenderContext).
///
/// Every variant is fatal for the resource being created; callers propagate
/// it and abort the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// A buffer or pool allocation could not be satisfied.
    OutOfMemory { requested: u64 },
    /// Shader bytecode was rejected.
    InvalidShader(String),
    /// Pipeline creation failed validation.
    PipelineCreation(String),
    /// No descriptor set of the requested shape is left in the pool.
    PoolExhausted { max_sets: u32 },
    /// A descriptor write does not match the set layout.
    InvalidDescriptorWrite(String),
    /// The handle belongs to another backend or was already destroyed.
    InvalidHandle(&'static str),
    /// Any other validation error raised by the device.
    Validation(String),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::OutOfMemory { requested } => {
                write!(f, "Out of device memory ({} bytes requested)", requested)
            }
            DeviceError::InvalidShader(msg) => write!(f, "Invalid shader: {}", msg),
            DeviceError::PipelineCreation(msg) => write!(f, "Pipeline creation failed: {}", msg),
            DeviceError::PoolExhausted { max_sets } => {
                write!(f, "Descriptor pool exhausted (max {} sets)", max_sets)
            }
            DeviceError::InvalidDescriptorWrite(msg) => {
                write!(f, "Invalid descriptor write: {}", msg)
            }
            DeviceError::InvalidHandle(what) => write!(f, "Invalid {} handle", what),
            DeviceError::Validation(msg) => write!(f, "Device validation error: {}", msg),
        }
    }
}

impl std::error::Error for DeviceError {}
