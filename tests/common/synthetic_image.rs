use std::path::Path;

use image::{GrayImage, Luma};

/// A `size`×`size` image with one vertical stroke at `column` (in 28-pixel
/// grid units), light ink on a dark background.
pub fn stroke(size: u32, column: u32) -> GrayImage {
    let scale = size / 28;
    GrayImage::from_fn(size, size, |x, _| {
        if x / scale.max(1) == column {
            Luma([240])
        } else {
            Luma([15])
        }
    })
}

/// Same stroke, dark ink on light paper.
pub fn inverted_stroke(size: u32, column: u32) -> GrayImage {
    let mut img = stroke(size, column);
    image::imageops::invert(&mut img);
    img
}

/// Stroke image whose column encodes a digit label.
pub fn digit_stroke(label: u32) -> GrayImage {
    stroke(28, 4 + 2 * label)
}

pub fn write_png(path: &Path, img: &GrayImage) {
    img.save(path).expect("write png");
}

/// Write `count` stroke images for `label` into `root/<label>/`.
pub fn write_label_dir(root: &Path, label: u32, count: usize) {
    let dir = root.join(label.to_string());
    std::fs::create_dir_all(&dir).expect("create label dir");
    for i in 0..count {
        write_png(&dir.join(format!("{i:03}.png")), &digit_stroke(label));
    }
}
