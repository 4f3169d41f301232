//! Turning Odoo's `image_1920` blob into a public URL.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use merchant_sync_core::{ImageSettings, SourceId};
use merchant_sync_transform::{image_link, OFFER_ID_PREFIX};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("record has no image data")]
    Missing,

    #[error("image is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("unrecognised image format")]
    UnknownFormat,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Produces the `imageLink` for a record before it is built.
pub trait ImageResolver {
    /// Whether [`resolve`](Self::resolve) needs the base64 blob. When it does
    /// not, the source skips downloading it.
    fn needs_blob(&self) -> bool {
        true
    }

    fn resolve(&mut self, id: SourceId, blob: Option<&str>) -> Result<String, ImageError>;
}

/// Link to Odoo's own image route on the storefront.
pub struct OdooImageLinks {
    base_url: String,
}

impl OdooImageLinks {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl ImageResolver for OdooImageLinks {
    fn needs_blob(&self) -> bool {
        false
    }

    fn resolve(&mut self, id: SourceId, _blob: Option<&str>) -> Result<String, ImageError> {
        Ok(image_link(&self.base_url, id))
    }
}

/// Decode blobs into a directory served under `base_url`.
pub struct ImageDirectory {
    dir: PathBuf,
    base_url: String,
}

impl ImageDirectory {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into(),
        }
    }
}

impl ImageResolver for ImageDirectory {
    fn resolve(&mut self, id: SourceId, blob: Option<&str>) -> Result<String, ImageError> {
        let blob = blob.filter(|b| !b.is_empty()).ok_or(ImageError::Missing)?;
        let compact: String = blob.split_whitespace().collect();
        let bytes = STANDARD.decode(compact)?;
        let ext = sniff_extension(&bytes).ok_or(ImageError::UnknownFormat)?;

        std::fs::create_dir_all(&self.dir).map_err(|source| ImageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let name = format!("{OFFER_ID_PREFIX}{id}.{ext}");
        let path = self.dir.join(&name);
        std::fs::write(&path, &bytes).map_err(|source| ImageError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(format!("{}/{name}", self.base_url.trim_end_matches('/')))
    }
}

pub fn resolver_for(settings: &ImageSettings, site_base_url: &str) -> Box<dyn ImageResolver> {
    match settings {
        ImageSettings::OdooLinks => Box::new(OdooImageLinks::new(site_base_url)),
        ImageSettings::Directory { dir, base_url } => {
            Box::new(ImageDirectory::new(dir.clone(), base_url.clone()))
        }
    }
}

fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("jpg"),
        [b'G', b'I', b'F', b'8', ..] => Some("gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("webp"),
        _ => None,
    }
}
