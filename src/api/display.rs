//! Display sinks for computed positions

use crate::core::Point2D;
use crate::utils::CanvasConfig;
use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{GrayImage, ImageResult, Luma};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const BACKGROUND: u8 = 255;
const DOT: u8 = 0;

/// Receives the point computed in each round
pub trait DisplaySink {
    fn show(&mut self, point: &Point2D);
}

impl<D: DisplaySink + ?Sized> DisplaySink for Box<D> {
    fn show(&mut self, point: &Point2D) {
        (**self).show(point)
    }
}

/// Headless display that logs each point
#[derive(Debug, Default)]
pub struct LogDisplay {
    shown: u64,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl DisplaySink for LogDisplay {
    fn show(&mut self, point: &Point2D) {
        self.shown += 1;
        log::info!("position ({:.2}, {:.2})", point.x, point.y);
    }
}

/// White canvas that accumulates a black dot per point
///
/// Canvas coordinates are pixels with y growing downward.
#[derive(Debug, Clone)]
pub struct DotCanvas {
    width: u32,
    height: u32,
    dot_size: f64,
    dots: Vec<Point2D>,
}

impl DotCanvas {
    pub fn new(width: u32, height: u32, dot_size: f64) -> Self {
        Self {
            width,
            height,
            dot_size,
            dots: Vec::new(),
        }
    }

    pub fn from_config(config: &CanvasConfig) -> Self {
        Self::new(config.width, config.height, config.dot_size)
    }

    pub fn dots(&self) -> &[Point2D] {
        &self.dots
    }

    pub fn clear(&mut self) {
        self.dots.clear();
    }

    /// Whether any part of a dot at `point` lands on the canvas
    pub fn is_visible(&self, point: &Point2D) -> bool {
        point.x + self.dot_size >= 0.0
            && point.y + self.dot_size >= 0.0
            && point.x - self.dot_size < self.width as f64
            && point.y - self.dot_size < self.height as f64
    }

    /// Grayscale raster, 255 background and 0 for dots
    pub fn render(&self) -> GrayImage {
        let mut image = GrayImage::from_pixel(self.width, self.height, Luma([BACKGROUND]));
        if self.width == 0 || self.height == 0 {
            return image;
        }

        let r = self.dot_size;
        for dot in self.dots.iter().filter(|dot| self.is_visible(dot)) {
            let x_min = (dot.x - r).floor().max(0.0) as u32;
            let y_min = (dot.y - r).floor().max(0.0) as u32;
            let x_max = ((dot.x + r).ceil().max(0.0) as u32).min(self.width - 1);
            let y_max = ((dot.y + r).ceil().max(0.0) as u32).min(self.height - 1);

            for y in y_min..=y_max {
                for x in x_min..=x_max {
                    let dx = x as f64 + 0.5 - dot.x;
                    let dy = y as f64 + 0.5 - dot.y;
                    if dx * dx + dy * dy <= r * r {
                        image.put_pixel(x, y, Luma([DOT]));
                    }
                }
            }
        }
        image
    }

    /// Binary PGM (P5) encoding of the canvas
    pub fn to_pgm(&self) -> ImageResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.render().write_with_encoder(pgm_encoder(&mut bytes))?;
        Ok(bytes)
    }

    pub fn save_pgm<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.render().write_with_encoder(pgm_encoder(&mut writer))?;
        writer.flush()?;
        Ok(())
    }
}

fn pgm_encoder<W: Write>(writer: W) -> PnmEncoder<W> {
    PnmEncoder::new(writer).with_subtype(PnmSubtype::Graymap(SampleEncoding::Binary))
}

impl DisplaySink for DotCanvas {
    fn show(&mut self, point: &Point2D) {
        if !self.is_visible(point) {
            log::debug!("point ({:.2}, {:.2}) is off the canvas", point.x, point.y);
        }
        self.dots.push(*point);
    }
}
