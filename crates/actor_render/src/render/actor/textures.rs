//! Texture naming convention for actors
//!
//! An actor stored at `path/hero.nima` with one texture uses `path/hero.png`;
//! with several it uses `path/hero0.png`, `path/hero1.png`, ...

use std::path::{Path, PathBuf};

use crate::render::backend::{TextureHandle, TextureLoader};
use crate::render::RenderResult;

/// Actor file path without its extension
pub fn actor_base_name(actor_path: &Path) -> PathBuf {
    actor_path.with_extension("")
}

/// Texture paths for an actor using `count` textures
pub fn texture_paths(base: &Path, count: usize, extension: &str) -> Vec<PathBuf> {
    let file = |suffix: String| {
        let mut name = base.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    };

    match count {
        0 => Vec::new(),
        1 => vec![file(format!(".{}", extension))],
        _ => (0..count).map(|i| file(format!("{}.{}", i, extension))).collect(),
    }
}

/// Load every texture of an actor, in table order
pub fn load_textures(paths: &[PathBuf], loader: &mut dyn TextureLoader) -> RenderResult<Vec<TextureHandle>> {
    paths
        .iter()
        .map(|path| {
            log::debug!("Loading actor texture {}", path.display());
            loader.load_texture(path)
        })
        .collect()
}
