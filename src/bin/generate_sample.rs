use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Write a synthetic `<out>/<digit>/<n>.png` dataset of seven-segment digits.
#[derive(Parser)]
#[command(name = "generate_sample")]
struct Args {
    /// Output directory
    #[arg(default_value = "sample_digits")]
    out: PathBuf,

    /// Images per digit
    #[arg(default_value_t = 20)]
    per_label: usize,

    /// Dark ink on light paper instead of light ink on dark
    #[arg(long)]
    inverted: bool,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

const SIZE: u32 = 28;

/// Segments lit for each digit, in `a b c d e f g` order:
/// top, upper right, lower right, bottom, lower left, upper left, middle.
const SEGMENTS: [[bool; 7]; 10] = [
    [true, true, true, true, true, true, false],
    [false, true, true, false, false, false, false],
    [true, true, false, true, true, false, true],
    [true, true, true, true, false, false, true],
    [false, true, true, false, false, true, true],
    [true, false, true, true, false, true, true],
    [true, false, true, true, true, true, true],
    [true, true, true, false, false, false, false],
    [true, true, true, true, true, true, true],
    [true, true, true, true, false, true, true],
];

fn fill(img: &mut GrayImage, x0: i32, y0: i32, x1: i32, y1: i32, value: u8) {
    for y in y0.max(0)..=y1.min(SIZE as i32 - 1) {
        for x in x0.max(0)..=x1.min(SIZE as i32 - 1) {
            img.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }
}

fn render_digit(digit: usize, rng: &mut StdRng) -> GrayImage {
    let mut img = GrayImage::from_fn(SIZE, SIZE, |_, _| Luma([rng.random_range(0..=40u8)]));

    let dx = rng.random_range(-2..=2i32);
    let dy = rng.random_range(-2..=2i32);
    let t = rng.random_range(2..=3i32);
    let (left, right) = (9 + dx, 18 + dx);
    let (top, mid, bottom) = (5 + dy, 14 + dy, 23 + dy);
    let ink = rng.random_range(200..=255u8);

    let lit = SEGMENTS[digit];
    let bars = [
        (left, top, right, top + t - 1),
        (right - t + 1, top, right, mid),
        (right - t + 1, mid, right, bottom),
        (left, bottom - t + 1, right, bottom),
        (left, mid, left + t - 1, bottom),
        (left, top, left + t - 1, mid),
        (left, mid - t / 2, right, mid - t / 2 + t - 1),
    ];
    for (on, (x0, y0, x1, y1)) in lit.iter().zip(bars) {
        if *on {
            fill(&mut img, x0, y0, x1, y1, ink);
        }
    }
    img
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    for digit in 0..10 {
        let dir = args.out.join(digit.to_string());
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        for n in 0..args.per_label {
            let mut img = render_digit(digit, &mut rng);
            if args.inverted {
                image::imageops::invert(&mut img);
            }
            let path = dir.join(format!("{n:04}.png"));
            img.save(&path).with_context(|| format!("writing {}", path.display()))?;
        }
    }

    println!(
        "Wrote {} images ({} per digit) to {}",
        10 * args.per_label,
        args.per_label,
        args.out.display()
    );
    Ok(())
}
