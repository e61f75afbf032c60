use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use shared::Detection;
use std::path::Path;

use crate::config::AnnotationConfig;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const LABEL_GAP: i64 = 4;

/// DejaVu Sans, used when no label font is configured.
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("Cannot read font file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Unable to parse font data from {0}")]
    Invalid(String),
}

/// Pixel-space box for one detection. Corners are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxRect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl BoxRect {
    /// Center/size are truncated to whole pixels before the corners are computed.
    /// Out-of-range coordinates saturate instead of wrapping.
    pub fn from_detection(detection: &Detection) -> Self {
        let cx = detection.x as i64;
        let cy = detection.y as i64;
        let half_w = (detection.width / 2.0) as i64;
        let half_h = (detection.height / 2.0) as i64;
        let (x0, x1) = (cx.saturating_sub(half_w), cx.saturating_add(half_w));
        let (y0, y1) = (cy.saturating_sub(half_h), cy.saturating_add(half_h));
        Self {
            left: x0.min(x1),
            top: y0.min(y1),
            right: x0.max(x1),
            bottom: y0.max(y1),
        }
    }

    /// Limits every corner to the canvas extended by `margin` pixels on each side.
    pub fn clamped(&self, width: u32, height: u32, margin: u32) -> Self {
        let margin = i64::from(margin);
        let clamp_x = |v: i64| v.clamp(-margin, i64::from(width) + margin);
        let clamp_y = |v: i64| v.clamp(-margin, i64::from(height) + margin);
        Self {
            left: clamp_x(self.left),
            top: clamp_y(self.top),
            right: clamp_x(self.right),
            bottom: clamp_y(self.bottom),
        }
    }

    /// Outline `by` pixels outside this box. Expects a clamped box.
    fn grown(&self, by: i64) -> Rect {
        let width = (self.right - self.left + 1 + 2 * by) as u32;
        let height = (self.bottom - self.top + 1 + 2 * by) as u32;
        Rect::at((self.left - by) as i32, (self.top - by) as i32).of_size(width, height)
    }
}

pub fn label_for(detection: &Detection) -> String {
    format!(
        "{} ({}%)",
        detection.class,
        (detection.confidence * 100.0).round() as i32
    )
}

/// Top-left corner of a label drawn just above `rect`, kept on the canvas.
pub fn label_origin(rect: &BoxRect, text_height: u32) -> (i32, i32) {
    let y = rect.top - i64::from(text_height) - LABEL_GAP;
    (rect.left.max(0) as i32, y.max(0) as i32)
}

pub struct AnnotationRenderer {
    font: FontVec,
    font_size: f32,
    box_thickness: u32,
}

impl AnnotationRenderer {
    pub fn new(font: FontVec, font_size: f32, box_thickness: u32) -> Self {
        Self {
            font,
            font_size,
            box_thickness: box_thickness.max(1),
        }
    }

    /// Uses the configured font file, or the bundled DejaVu Sans when none is set.
    pub fn from_config(config: &AnnotationConfig) -> Result<Self, FontError> {
        let font = match &config.font_path {
            Some(path) => load_font(path)?,
            None => FontVec::try_from_vec(BUNDLED_FONT.to_vec())
                .map_err(|_| FontError::Invalid("bundled font".to_string()))?,
        };
        Ok(Self::new(font, config.font_size, config.box_thickness))
    }

    /// Draws every detection in list order on an RGB copy of `image`.
    pub fn render(&self, image: &GrayImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = DynamicImage::ImageLuma8(image.clone()).to_rgb8();
        let (width, height) = canvas.dimensions();
        let scale = PxScale::from(self.font_size);

        for detection in detections {
            let rect =
                BoxRect::from_detection(detection).clamped(width, height, self.box_thickness);
            for i in 0..self.box_thickness {
                draw_hollow_rect_mut(&mut canvas, rect.grown(i64::from(i)), BOX_COLOR);
            }

            let label = label_for(detection);
            let (_, text_height) = text_size(scale, &self.font, &label);
            let (x, y) = label_origin(&rect, text_height);
            draw_text_mut(&mut canvas, TEXT_COLOR, x, y, scale, &self.font, &label);
        }
        canvas
    }
}

fn load_font(path: &Path) -> Result<FontVec, FontError> {
    let data = std::fs::read(path).map_err(|source| FontError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let font = FontVec::try_from_vec(data)
        .map_err(|_| FontError::Invalid(path.display().to_string()))?;
    log::info!("Loaded label font from {}", path.display());
    Ok(font)
}
