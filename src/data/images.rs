//! Image folder dataset
//!
//! Layout follows the usual "image folder" convention: the root holds one
//! sub-directory per class and the images live inside those. Class names
//! are irrelevant for MAD-GAN; every image is a real sample.

use std::path::{Path, PathBuf};

use tch::{vision::image, Kind, Tensor};
use tracing::{debug, info, warn};

use crate::error::{MadGanError, Result};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// Images resized to a square and normalized to [-1, 1]
#[derive(Debug)]
pub struct ImageFolder {
    root: PathBuf,
    image_size: i64,
    num_channels: i64,
    paths: Vec<PathBuf>,
}

impl ImageFolder {
    /// Index all images below `root`
    pub fn new(root: impl AsRef<Path>, image_size: i64, num_channels: i64) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(MadGanError::InvalidDataRoot(root));
        }
        if num_channels != 1 && num_channels != 3 {
            return Err(MadGanError::InvalidConfig(format!(
                "image folders support 1 or 3 channels, got {}",
                num_channels
            )));
        }

        let paths = find_images(&root)?;
        if paths.is_empty() {
            return Err(MadGanError::EmptyDataset(format!(
                "no images found below {}",
                root.display()
            )));
        }

        info!("Found {} images below {}", paths.len(), root.display());
        Ok(Self {
            root,
            image_size,
            num_channels,
            paths,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load a single image as (C, H, W) in [-1, 1]
    pub fn load(&self, index: usize) -> Result<Tensor> {
        let path = &self.paths[index];
        debug!("Loading {}", path.display());
        let raw = image::load_and_resize(path, self.image_size, self.image_size)?;
        let scaled = raw.to_kind(Kind::Float) / 255.0;

        let pixels = if self.num_channels == 1 {
            scaled.mean_dim(Some([0i64].as_slice()), true, Kind::Float)
        } else {
            scaled
        };

        Ok((pixels - 0.5) / 0.5)
    }

    /// Load every image into a single (N, C, H, W) tensor
    ///
    /// Files that fail to decode are skipped with a warning.
    pub fn load_all(&self) -> Result<Tensor> {
        let mut images = Vec::with_capacity(self.len());
        for (i, path) in self.paths.iter().enumerate() {
            match self.load(i) {
                Ok(img) => images.push(img),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        if images.is_empty() {
            return Err(MadGanError::EmptyDataset(format!(
                "none of the {} images below {} could be decoded",
                self.len(),
                self.root.display()
            )));
        }
        if images.len() < self.len() {
            warn!("Loaded {} of {} images", images.len(), self.len());
        }
        Ok(Tensor::stack(&images, 0))
    }
}

/// Image files one level below the class directories, sorted by path
fn find_images(root: &Path) -> Result<Vec<PathBuf>> {
    let mut class_dirs: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    class_dirs.sort();

    let mut paths = Vec::new();
    for dir in class_dirs {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && has_image_extension(p))
            .collect();
        files.sort();
        paths.extend(files);
    }

    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
