//! Recording backend
//!
//! A CPU-only [`GraphicsBackend`] that keeps buffer contents in memory and logs
//! every state change and draw. Used by headless tools and by the test suite
//! to inspect exactly what the renderer asked the graphics layer to do.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use slotmap::{Key, KeyData, SlotMap};

use crate::render::backend::{
    BackendResult, BufferDescriptor, BufferHandle, GraphicsBackend, TextureHandle, TextureLoader, TexturedDraw,
    VertexBinding,
};
use crate::render::blend::BlendMode;
use crate::render::RenderError;

slotmap::new_key_type! {
    struct BufferKey;
    struct TextureKey;
}

fn buffer_handle(key: BufferKey) -> BufferHandle {
    BufferHandle(key.data().as_ffi())
}

fn buffer_key(handle: BufferHandle) -> BufferKey {
    BufferKey::from(KeyData::from_ffi(handle.0))
}

/// Commands observed by the recording backend, in call order
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// A buffer was created
    CreateBuffer(BufferHandle),
    /// A buffer was rewritten
    WriteBuffer(BufferHandle),
    /// A buffer was released
    DestroyBuffer(BufferHandle),
    /// The blend state changed
    SetBlendMode(BlendMode),
    /// A draw was issued
    Draw {
        /// Draw parameters
        draw: TexturedDraw,
        /// Bone table for skinned draws
        bone_matrices: Option<Vec<f32>>,
    },
}

#[derive(Debug)]
struct StoredBuffer {
    desc: BufferDescriptor,
    contents: Vec<u8>,
    writes: usize,
}

/// In-memory graphics backend
#[derive(Debug, Default)]
pub struct RecordingBackend {
    buffers: SlotMap<BufferKey, StoredBuffer>,
    textures: SlotMap<TextureKey, PathBuf>,
    commands: Vec<RecordedCommand>,
    buffer_limit: Option<usize>,
    missing_textures: HashSet<PathBuf>,
    reject_draws: bool,
}

impl RecordingBackend {
    /// Create an empty backend with no resource limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail buffer creation once `limit` buffers are alive
    pub fn with_buffer_limit(mut self, limit: usize) -> Self {
        self.buffer_limit = Some(limit);
        self
    }

    /// Fail texture loads for `path`
    pub fn with_missing_texture(mut self, path: impl Into<PathBuf>) -> Self {
        self.missing_textures.insert(path.into());
        self
    }

    /// Make every subsequent draw call fail
    pub fn set_reject_draws(&mut self, reject: bool) {
        self.reject_draws = reject;
    }

    /// All recorded commands
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Forget recorded commands, keeping resources alive
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Recorded draws with their bone tables
    pub fn draws(&self) -> Vec<(&TexturedDraw, Option<&[f32]>)> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::Draw { draw, bone_matrices } => Some((draw, bone_matrices.as_deref())),
                _ => None,
            })
            .collect()
    }

    /// Number of blend state changes received
    pub fn blend_change_count(&self) -> usize {
        self.commands.iter().filter(|cmd| matches!(cmd, RecordedCommand::SetBlendMode(_))).count()
    }

    /// Number of live buffers
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Whether `handle` names a live buffer
    pub fn contains_buffer(&self, handle: BufferHandle) -> bool {
        self.buffers.contains_key(buffer_key(handle))
    }

    /// Creation parameters of a live buffer
    pub fn buffer_descriptor(&self, handle: BufferHandle) -> Option<&BufferDescriptor> {
        self.buffers.get(buffer_key(handle)).map(|b| &b.desc)
    }

    /// Contents of a vertex buffer
    pub fn vertex_data(&self, handle: BufferHandle) -> Option<Vec<f32>> {
        self.buffers.get(buffer_key(handle)).map(|b| bytemuck::pod_collect_to_vec(&b.contents))
    }

    /// Contents of an index buffer
    pub fn index_data(&self, handle: BufferHandle) -> Option<Vec<u16>> {
        self.buffers.get(buffer_key(handle)).map(|b| bytemuck::pod_collect_to_vec(&b.contents))
    }

    /// Number of rewrites a buffer received after creation
    pub fn write_count(&self, handle: BufferHandle) -> usize {
        self.buffers.get(buffer_key(handle)).map_or(0, |b| b.writes)
    }

    /// Paths of every texture loaded so far
    pub fn loaded_textures(&self) -> Vec<&Path> {
        self.textures.values().map(PathBuf::as_path).collect()
    }

    fn check_buffer(&self, handle: BufferHandle) -> BackendResult<()> {
        if self.contains_buffer(handle) {
            Ok(())
        } else {
            Err(RenderError::BackendError(format!("unknown buffer {:?}", handle)))
        }
    }

    fn validate_draw(&self, draw: &TexturedDraw) -> BackendResult<()> {
        if self.reject_draws {
            return Err(RenderError::BackendError("draw rejected".to_string()));
        }
        match draw.vertices {
            VertexBinding::Static { buffer, .. } => self.check_buffer(buffer)?,
            VertexBinding::Deformed { positions, base, .. } => {
                self.check_buffer(positions)?;
                self.check_buffer(base)?;
            }
        }
        self.check_buffer(draw.index_buffer)
    }
}

impl GraphicsBackend for RecordingBackend {
    fn create_buffer(&mut self, desc: &BufferDescriptor, contents: &[u8]) -> BackendResult<BufferHandle> {
        if let Some(limit) = self.buffer_limit {
            if self.buffers.len() >= limit {
                return Err(RenderError::ResourceCreationFailed(format!(
                    "buffer '{}': out of device memory",
                    desc.label
                )));
            }
        }

        let key = self.buffers.insert(StoredBuffer { desc: desc.clone(), contents: contents.to_vec(), writes: 0 });
        let handle = buffer_handle(key);
        self.commands.push(RecordedCommand::CreateBuffer(handle));
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, contents: &[u8]) -> BackendResult<()> {
        let stored = self
            .buffers
            .get_mut(buffer_key(buffer))
            .ok_or_else(|| RenderError::BackendError(format!("write to unknown buffer {:?}", buffer)))?;
        stored.contents.clear();
        stored.contents.extend_from_slice(contents);
        stored.writes += 1;
        self.commands.push(RecordedCommand::WriteBuffer(buffer));
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(buffer_key(buffer)).is_some() {
            self.commands.push(RecordedCommand::DestroyBuffer(buffer));
        }
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.commands.push(RecordedCommand::SetBlendMode(mode));
    }

    fn draw_textured(&mut self, draw: &TexturedDraw) -> BackendResult<()> {
        self.validate_draw(draw)?;
        self.commands.push(RecordedCommand::Draw { draw: draw.clone(), bone_matrices: None });
        Ok(())
    }

    fn draw_textured_skin(&mut self, draw: &TexturedDraw, bone_matrices: &[f32]) -> BackendResult<()> {
        self.validate_draw(draw)?;
        self.commands.push(RecordedCommand::Draw { draw: draw.clone(), bone_matrices: Some(bone_matrices.to_vec()) });
        Ok(())
    }
}

impl TextureLoader for RecordingBackend {
    fn load_texture(&mut self, path: &Path) -> BackendResult<TextureHandle> {
        if self.missing_textures.contains(path) {
            return Err(RenderError::TextureLoadFailed(path.display().to_string()));
        }
        let key = self.textures.insert(path.to_path_buf());
        Ok(TextureHandle(key.data().as_ffi()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{create_buffer_from, write_buffer_from};

    #[test]
    fn test_buffer_round_trip() {
        let mut backend = RecordingBackend::new();
        let handle = create_buffer_from(&mut backend, &BufferDescriptor::vertex("quad"), &[1.0f32, 2.0, 3.0])
            .expect("Should create buffer");

        assert_eq!(backend.vertex_data(handle), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(backend.write_count(handle), 0);

        write_buffer_from(&mut backend, handle, &[4.0f32]).expect("Should write buffer");
        assert_eq!(backend.vertex_data(handle), Some(vec![4.0]));
        assert_eq!(backend.write_count(handle), 1);

        backend.destroy_buffer(handle);
        assert!(!backend.contains_buffer(handle));
        assert!(backend.write_buffer(handle, &[]).is_err());
    }

    #[test]
    fn test_buffer_limit() {
        let mut backend = RecordingBackend::new().with_buffer_limit(1);
        let desc = BufferDescriptor::index("indices");
        assert!(create_buffer_from(&mut backend, &desc, &[0u16, 1, 2]).is_ok());
        assert!(matches!(
            create_buffer_from(&mut backend, &desc, &[0u16, 1, 2]),
            Err(RenderError::ResourceCreationFailed(_))
        ));
    }

    #[test]
    fn test_missing_texture() {
        let mut backend = RecordingBackend::new().with_missing_texture("hero1.png");
        assert!(backend.load_texture(Path::new("hero0.png")).is_ok());
        assert!(matches!(
            backend.load_texture(Path::new("hero1.png")),
            Err(RenderError::TextureLoadFailed(_))
        ));
        assert_eq!(backend.loaded_textures(), vec![Path::new("hero0.png")]);
    }
}
