use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::error::TextureLoadError;

/// Decoded RGBA pixels for one texture source, ready for GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Decode-once texture cache. A source path is decoded at most once per
/// scene; every object referencing it shares the same `Arc`, and the GPU
/// upload downstream is keyed off that identity.
#[derive(Default)]
pub struct TextureRegistry {
    loaded: HashMap<PathBuf, Arc<TextureData>>,
}

impl TextureRegistry {
    pub fn new() -> TextureRegistry {
        TextureRegistry {
            loaded: HashMap::new(),
        }
    }

    pub fn load(&mut self, path: &Path) -> Result<Arc<TextureData>, TextureLoadError> {
        if let Some(texture) = self.loaded.get(path) {
            return Ok(texture.clone());
        }

        let image = image::open(path)
            .map_err(|source| TextureLoadError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        let (width, height) = image.dimensions();
        debug!("decoded texture {} ({}x{})", path.display(), width, height);

        let texture = Arc::new(TextureData {
            width,
            height,
            rgba: image.into_raw(),
        });
        self.loaded.insert(path.to_path_buf(), texture.clone());
        Ok(texture)
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn write_test_png(name: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("ember3d_tex_{}_{}.png", name, std::process::id()));
        let image = image::RgbaImage::from_fn(4, 4, |x, y| {
            image::Rgba([(x * 60) as u8, (y * 60) as u8, 128, 255])
        });
        image.save(&path).unwrap();
        path
    }

    #[test]
    fn loading_the_same_path_twice_returns_the_same_handle() {
        let path = write_test_png("idempotent");
        let mut registry = TextureRegistry::new();

        let first = registry.load(&path).unwrap();
        let second = registry.load(&path).unwrap();
        std::fs::remove_file(path).ok();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn decoded_pixels_are_rgba() {
        let path = write_test_png("rgba");
        let mut registry = TextureRegistry::new();

        let texture = registry.load(&path).unwrap();
        std::fs::remove_file(path).ok();

        assert_eq!(texture.width, 4);
        assert_eq!(texture.height, 4);
        assert_eq!(texture.rgba.len(), 4 * 4 * 4);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let mut registry = TextureRegistry::new();
        let result = registry.load(Path::new("/nonexistent/ember3d/missing.png"));
        assert!(matches!(result, Err(TextureLoadError::Decode { .. })));
        assert!(registry.is_empty());
    }
}
