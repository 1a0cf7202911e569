//! Actor definitions
//!
//! A definition is the immutable template every instance of an actor draws
//! from: its parts, texture table and shared GPU buffers. It is created once,
//! shared through `Arc`, and released explicitly after the last instance.

use std::path::Path;
use std::sync::Arc;

use super::mesh_part::MeshPart;
use super::packer::BufferPacker;
use super::shared::SharedResourceSet;
use super::textures::{actor_base_name, load_textures, texture_paths};
use crate::render::backend::{GraphicsBackend, TextureHandle, TextureLoader};
use crate::render::config::RenderConfig;
use crate::render::{RenderError, RenderResult};

/// Parsed actor content as delivered by the animation file loader
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorData {
    /// Drawable parts in authoring order
    pub parts: Vec<MeshPart>,
    /// Number of textures the actor references
    pub textures_used: usize,
}

/// Immutable template shared by all instances of an actor
#[derive(Debug)]
pub struct ActorDefinition {
    name: String,
    parts: Vec<MeshPart>,
    textures: Vec<TextureHandle>,
    resources: SharedResourceSet,
}

impl ActorDefinition {
    /// Load an actor: pack its parts, load its textures and upload its buffers
    ///
    /// Textures are looked up next to `actor_path` following the actor naming
    /// convention.
    pub fn load<B: GraphicsBackend + ?Sized>(
        actor_path: impl AsRef<Path>,
        data: ActorData,
        config: &RenderConfig,
        textures: &mut dyn TextureLoader,
        backend: &mut B,
    ) -> RenderResult<Arc<Self>> {
        let actor_path = actor_path.as_ref();
        let base = actor_base_name(actor_path);
        let paths = texture_paths(&base, data.textures_used, &config.texture_extension);
        let handles = load_textures(&paths, textures)?;

        Self::with_textures(base.display().to_string(), data.parts, handles, config, backend)
    }

    /// Build a definition from parts and an already loaded texture table
    pub fn with_textures<B: GraphicsBackend + ?Sized>(
        name: impl Into<String>,
        parts: Vec<MeshPart>,
        textures: Vec<TextureHandle>,
        config: &RenderConfig,
        backend: &mut B,
    ) -> RenderResult<Arc<Self>> {
        let name = name.into();
        let layout = BufferPacker::new(config.packing_strategy)
            .with_max_bones(config.max_bones_per_draw)
            .pack(&parts)?;
        let resources = SharedResourceSet::upload(&layout, &name, backend)?;

        log::info!(
            "Loaded actor '{}': {} parts, {} textures, {} shared buffers",
            name,
            parts.len(),
            textures.len(),
            resources.buffer_count()
        );
        Ok(Arc::new(Self { name, parts, textures, resources }))
    }

    /// Actor name (base path without extension)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parts in authoring order
    pub fn parts(&self) -> &[MeshPart] {
        &self.parts
    }

    /// One part
    pub fn part(&self, index: usize) -> Option<&MeshPart> {
        self.parts.get(index)
    }

    /// Resolve a part's texture index, `None` for `-1` or out-of-range indices
    pub fn texture(&self, index: i32) -> Option<TextureHandle> {
        usize::try_from(index).ok().and_then(|i| self.textures.get(i)).copied()
    }

    /// Texture table
    pub fn textures(&self) -> &[TextureHandle] {
        &self.textures
    }

    /// Shared GPU buffers
    pub fn resources(&self) -> &SharedResourceSet {
        &self.resources
    }

    /// Indices of parts that need a per-instance overlay
    pub fn deforming_parts(&self) -> impl Iterator<Item = usize> + '_ {
        self.parts.iter().enumerate().filter(|(_, p)| p.is_deforming()).map(|(i, _)| i)
    }

    /// Release the shared GPU buffers
    ///
    /// Fails with [`RenderError::DefinitionInUse`] while instances still hold
    /// the definition. The caller's handle comes back inside the error so the
    /// release can be retried once the instances are gone.
    pub fn release<B: GraphicsBackend + ?Sized>(self: Arc<Self>, backend: &mut B) -> Result<(), ReleaseError> {
        let mut definition = Arc::try_unwrap(self).map_err(|shared| ReleaseError {
            error: RenderError::DefinitionInUse(shared.name.clone()),
            definition: shared,
        })?;
        definition.resources.release(backend);
        log::info!("Released actor '{}'", definition.name);
        Ok(())
    }
}

/// A refused definition release
#[derive(thiserror::Error, Debug)]
#[error("{error}")]
pub struct ReleaseError {
    /// The handle passed to `release`, still owning its buffers
    pub definition: Arc<ActorDefinition>,
    /// Why the release was refused
    pub error: RenderError,
}

impl ReleaseError {
    /// Take back the definition handle
    pub fn into_definition(self) -> Arc<ActorDefinition> {
        self.definition
    }
}

impl From<ReleaseError> for RenderError {
    fn from(refused: ReleaseError) -> Self {
        refused.error
    }
}
