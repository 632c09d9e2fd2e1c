use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("Device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("Shader \"{name}\" failed to compile:\n{message}")]
    ShaderCompile { name: String, message: String },

    #[error("GPU error while {context}: {message}")]
    Gpu { context: &'static str, message: String },

    #[error("Buffer \"{label}\" is static and cannot be updated")]
    StaticBufferUpdate { label: &'static str },

    #[error("Buffer \"{label}\" holds {expected} bytes, update has {actual}")]
    BufferSizeMismatch { label: &'static str, expected: u64, actual: u64 },

    #[error("Buffer read-back failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    #[error("Device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("Program \"{program}\" has no attribute named \"{name}\"")]
    MissingAttribute { program: String, name: String },

    #[error("Sprite texture needs {expected} bytes of RGBA8 data, got {actual}")]
    TextureSize { expected: usize, actual: usize },

    #[error("Sort failed: {0}")]
    Sort(#[from] sort::SortError),
}
