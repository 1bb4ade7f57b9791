use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn an OBJ file into a mesh.
#[derive(Debug, Error)]
pub enum MeshLoadError {
    #[error("could not read mesh file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path} line {line}: {detail}")]
    Parse {
        path: PathBuf,
        line: usize,
        detail: String,
    },
}

/// Failure to decode an image file into RGBA texel data.
#[derive(Debug, Error)]
pub enum TextureLoadError {
    #[error("could not decode texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Fatal failures while building a scene from its descriptor. Texture
/// failures are deliberately absent: they degrade the object instead.
#[derive(Debug, Error)]
pub enum SceneInitError {
    #[error(transparent)]
    MeshLoad(#[from] MeshLoadError),
    #[error("object references unknown mesh {name:?}")]
    UnknownMeshReference { name: String },
}

/// Failures while standing up the graphics stack or its per-frame
/// resources.
#[derive(Debug, Error)]
pub enum GfxError {
    #[error("no suitable graphics device found")]
    NoSuitableDevice,
    #[error("failed to create {what}: {detail}")]
    Creation { what: &'static str, detail: String },
}

impl GfxError {
    pub fn creation(what: &'static str, err: impl std::fmt::Display) -> GfxError {
        GfxError::Creation {
            what,
            detail: err.to_string(),
        }
    }
}

/// Failures while recording a single object's draw commands. The
/// renderer logs these and skips the object rather than aborting the
/// frame.
#[derive(Debug, Error)]
pub enum DrawError {
    #[error("pipeline layout has no descriptor set {index}")]
    MissingSetLayout { index: usize },
    #[error("failed to record {what}: {detail}")]
    Command { what: &'static str, detail: String },
}

impl DrawError {
    pub fn command(what: &'static str, err: impl std::fmt::Display) -> DrawError {
        DrawError::Command {
            what,
            detail: err.to_string(),
        }
    }
}
