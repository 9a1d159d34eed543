//! Sample grids for image generators

use std::path::Path;

use tch::{vision::image, Kind, Tensor};

use crate::error::{MadGanError, Result};

/// Tile a batch of (N, C, H, W) images into a single (3, H', W') grid
///
/// Images are min-max normalized to [0, 1] over the whole batch and laid out
/// `nrow` per row with `padding` pixels of zero between them. Grayscale
/// batches are expanded to three channels.
pub fn make_grid(images: &Tensor, nrow: i64, padding: i64) -> Result<Tensor> {
    let size = images.size();
    if size.len() != 4 || size[0] == 0 {
        return Err(MadGanError::InvalidInput(format!(
            "make_grid expects a non-empty (N, C, H, W) batch, got {:?}",
            size
        )));
    }

    let images = tch::no_grad(|| {
        let images = images.to_kind(Kind::Float);
        let images = if size[1] == 1 {
            images.repeat([1, 3, 1, 1])
        } else {
            images
        };
        let lo = images.min().double_value(&[]);
        let hi = images.max().double_value(&[]);
        (images - lo) / (hi - lo).max(1e-5)
    });

    let (n, c, h, w) = (size[0], images.size()[1], size[2], size[3]);
    let xmaps = nrow.max(1).min(n);
    let ymaps = (n + xmaps - 1) / xmaps;
    let cell_h = h + padding;
    let cell_w = w + padding;

    let grid = Tensor::zeros(
        [c, ymaps * cell_h + padding, xmaps * cell_w + padding],
        (Kind::Float, images.device()),
    );
    tch::no_grad(|| {
        for k in 0..n {
            let (y, x) = (k / xmaps, k % xmaps);
            let mut cell = grid
                .narrow(1, y * cell_h + padding, h)
                .narrow(2, x * cell_w + padding, w);
            cell.copy_(&images.get(k));
        }
    });

    Ok(grid)
}

/// Write a batch of images as one PNG grid
pub fn save_grid(images: &Tensor, path: impl AsRef<Path>, nrow: i64) -> Result<()> {
    let grid = make_grid(images, nrow, 2)?;
    let pixels = (grid * 255.0)
        .clamp(0.0, 255.0)
        .to_kind(Kind::Uint8)
        .to_device(tch::Device::Cpu);
    image::save(&pixels, path)?;
    Ok(())
}
