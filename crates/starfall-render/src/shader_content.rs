//! Shader bytecode lookup by asset id.
//!
//! Pipelines are built from shaders identified by small integer asset ids.
//! The vertex stage is always [`AssetId::SPRITE_VERTEX`]; the fragment stage
//! depends on the texture slot count and lives at
//! [`AssetId::sprite_fragment`].

use std::path::PathBuf;

use ahash::AHashMap;

/// Identifier of a shader asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub u32);

impl AssetId {
    pub const SPRITE_VERTEX: AssetId = AssetId(1);
    pub const SPRITE_FRAGMENT_BASE: AssetId = AssetId(2);

    /// Fragment shader compiled for `texture_slots` slots.
    pub const fn sprite_fragment(texture_slots: u32) -> AssetId {
        Self::SPRITE_FRAGMENT_BASE.offset(texture_slots)
    }

    pub const fn offset(self, by: u32) -> AssetId {
        AssetId(self.0 + by)
    }
}

impl std::ops::Add<u32> for AssetId {
    type Output = AssetId;

    fn add(self, rhs: u32) -> AssetId {
        self.offset(rhs)
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "asset #{}", self.0)
    }
}

/// Errors from loading shader content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderContentError {
    NotFound(AssetId),
    Io(String),
}

impl std::fmt::Display for ShaderContentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderContentError::NotFound(id) => write!(f, "Shader {} not found", id),
            ShaderContentError::Io(msg) => write!(f, "Failed to read shader: {}", msg),
        }
    }
}

impl std::error::Error for ShaderContentError {}

/// Source of shader bytecode.
///
/// Bytes are either SPIR-V or UTF-8 WGSL; the device tells them apart.
pub trait ShaderContentStreamer: Send + Sync {
    fn load(&self, id: AssetId) -> Result<Vec<u8>, ShaderContentError>;
}

const SPRITE_VERTEX_WGSL: &str = include_str!("shaders/sprite.vert.wgsl");
const SPRITE_ARRAY_FRAGMENT_WGSL: &str = include_str!("shaders/sprite_array.frag.wgsl");
const SPRITE_SINGLE_FRAGMENT_WGSL: &str = include_str!("shaders/sprite_single.frag.wgsl");

/// The built-in WGSL sprite shaders.
///
/// Any slot count is served: the fragment source is generated on request.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedShaderContent;

impl EmbeddedShaderContent {
    pub fn new() -> Self {
        Self
    }

    /// WGSL fragment source for `texture_slots` slots.
    pub fn fragment_source(texture_slots: u32) -> String {
        if texture_slots == 1 {
            SPRITE_SINGLE_FRAGMENT_WGSL.to_string()
        } else {
            SPRITE_ARRAY_FRAGMENT_WGSL.replace("TEXTURE_SLOTS", &texture_slots.to_string())
        }
    }
}

impl ShaderContentStreamer for EmbeddedShaderContent {
    fn load(&self, id: AssetId) -> Result<Vec<u8>, ShaderContentError> {
        if id == AssetId::SPRITE_VERTEX {
            return Ok(SPRITE_VERTEX_WGSL.as_bytes().to_vec());
        }
        match id.0.checked_sub(AssetId::SPRITE_FRAGMENT_BASE.0) {
            Some(slots) if slots > 0 => Ok(Self::fragment_source(slots).into_bytes()),
            _ => Err(ShaderContentError::NotFound(id)),
        }
    }
}

/// Shader content held in memory, e.g. unpacked from an archive.
#[derive(Debug, Clone, Default)]
pub struct ShaderContentMap {
    entries: AHashMap<AssetId, Vec<u8>>,
}

impl ShaderContentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: AssetId, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(id, bytes.into());
    }

    pub fn with(mut self, id: AssetId, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(id, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ShaderContentStreamer for ShaderContentMap {
    fn load(&self, id: AssetId) -> Result<Vec<u8>, ShaderContentError> {
        self.entries
            .get(&id)
            .cloned()
            .ok_or(ShaderContentError::NotFound(id))
    }
}

/// Compiled shaders on disk, one `<id>.<extension>` file per asset.
#[derive(Debug, Clone)]
pub struct DirectoryShaderContent {
    root: PathBuf,
    extension: String,
}

impl DirectoryShaderContent {
    pub fn new(root: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn path_for(&self, id: AssetId) -> PathBuf {
        self.root.join(format!("{}.{}", id.0, self.extension))
    }
}

impl ShaderContentStreamer for DirectoryShaderContent {
    fn load(&self, id: AssetId) -> Result<Vec<u8>, ShaderContentError> {
        let path = self.path_for(id);
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ShaderContentError::NotFound(id),
            _ => ShaderContentError::Io(format!("{}: {}", path.display(), e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_id_follows_slot_count() {
        assert_eq!(AssetId::sprite_fragment(16), AssetId(18));
        assert_eq!(AssetId::SPRITE_FRAGMENT_BASE + 1, AssetId(3));
    }

    #[test]
    fn test_embedded_vertex_entry_point() {
        let bytes = EmbeddedShaderContent.load(AssetId::SPRITE_VERTEX).unwrap();
        let source = String::from_utf8(bytes).unwrap();
        assert!(source.contains("fn vertMain"));
    }

    #[test]
    fn test_embedded_fragment_is_sized() {
        let bytes = EmbeddedShaderContent.load(AssetId::sprite_fragment(16)).unwrap();
        let source = String::from_utf8(bytes).unwrap();
        assert!(source.contains("fn fragMain"));
        assert!(source.contains("binding_array<texture_2d<f32>, 16>"));
        assert!(!source.contains("TEXTURE_SLOTS"));
    }

    #[test]
    fn test_embedded_single_slot_has_no_array() {
        let source = EmbeddedShaderContent::fragment_source(1);
        assert!(!source.contains("binding_array"));
    }

    #[test]
    fn test_embedded_unknown_ids() {
        assert_eq!(
            EmbeddedShaderContent.load(AssetId(0)),
            Err(ShaderContentError::NotFound(AssetId(0)))
        );
        // Base id alone would mean zero slots.
        assert!(EmbeddedShaderContent.load(AssetId::SPRITE_FRAGMENT_BASE).is_err());
    }

    #[test]
    fn test_map_content() {
        let content = ShaderContentMap::new().with(AssetId(1), vec![1, 2, 3]);
        assert_eq!(content.len(), 1);
        assert_eq!(content.load(AssetId(1)).unwrap(), vec![1, 2, 3]);
        assert_eq!(content.load(AssetId(2)), Err(ShaderContentError::NotFound(AssetId(2))));
    }

    #[test]
    fn test_directory_missing_file_is_not_found() {
        let content = DirectoryShaderContent::new("/nonexistent/starfall/shaders", ".spv");
        assert_eq!(
            content.path_for(AssetId(7)),
            PathBuf::from("/nonexistent/starfall/shaders/7.spv")
        );
        assert_eq!(content.load(AssetId(7)), Err(ShaderContentError::NotFound(AssetId(7))));
    }
}
