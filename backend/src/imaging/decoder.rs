use dicom_dictionary_std::tags;
use dicom_object::{DefaultDicomObject, from_reader};
use dicom_pixeldata::PixelDecoder;
use image::GrayImage;

const PREAMBLE_LEN: usize = 128;
const DICM_MAGIC: &[u8; 4] = b"DICM";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Uploaded file is empty")]
    Empty,
    #[error("Not a DICOM file (missing DICM magic)")]
    NotDicom,
    #[error("Malformed DICOM file: {0}")]
    Malformed(String),
    #[error("DICOM file contains no pixel data")]
    NoPixelData,
    #[error("Pixel grid is empty ({columns}x{rows})")]
    EmptyGrid { columns: u32, rows: u32 },
    #[error("Unsupported pixel data: {0}")]
    Unsupported(String),
}

/// Decodes a DICOM upload into an 8-bit grayscale raster.
///
/// Only the first frame of multi-frame objects is used. Intensities are min-max
/// rescaled to 0..=255; a constant image comes out entirely black.
pub fn decode(raw: &[u8]) -> Result<GrayImage, DecodeError> {
    let obj = read_container(raw)?;
    if obj.get(tags::PIXEL_DATA).is_none() {
        return Err(DecodeError::NoPixelData);
    }

    let pixels = obj
        .decode_pixel_data()
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
    let columns = pixels.columns();
    let rows = pixels.rows();
    let samples = pixels.samples_per_pixel();
    if columns == 0 || rows == 0 {
        return Err(DecodeError::EmptyGrid { columns, rows });
    }
    if samples != 1 && samples != 3 {
        return Err(DecodeError::Unsupported(format!(
            "{} samples per pixel",
            samples
        )));
    }

    let values: Vec<f32> = pixels
        .to_vec_frame(0)
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
    let frame_len = columns as usize * rows as usize * samples as usize;
    if values.len() < frame_len {
        return Err(DecodeError::Malformed(format!(
            "expected {} samples, found {}",
            frame_len,
            values.len()
        )));
    }

    let frame = &values[..frame_len];
    let normalized = if samples == 3 {
        normalize_min_max(&luma(frame))
    } else {
        normalize_min_max(frame)
    };
    log::debug!(
        "Decoded {}x{} DICOM frame with {} sample(s) per pixel",
        columns,
        rows,
        samples
    );
    GrayImage::from_raw(columns, rows, normalized)
        .ok_or_else(|| DecodeError::Malformed("pixel buffer does not match dimensions".into()))
}

fn read_container(raw: &[u8]) -> Result<DefaultDicomObject, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::Empty);
    }
    let body = strip_preamble(raw).ok_or(DecodeError::NotDicom)?;
    from_reader(body).map_err(|e| DecodeError::Malformed(e.to_string()))
}

/// Returns the bytes starting at the `DICM` magic, with or without the 128-byte preamble.
pub fn strip_preamble(raw: &[u8]) -> Option<&[u8]> {
    if raw.len() >= PREAMBLE_LEN + DICM_MAGIC.len()
        && &raw[PREAMBLE_LEN..PREAMBLE_LEN + DICM_MAGIC.len()] == DICM_MAGIC
    {
        Some(&raw[PREAMBLE_LEN..])
    } else if raw.starts_with(DICM_MAGIC) {
        Some(raw)
    } else {
        None
    }
}

/// Linear rescale so the minimum maps to 0 and the maximum to 255.
pub fn normalize_min_max(values: &[f32]) -> Vec<u8> {
    let (min, max) = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    if !(max > min) {
        return vec![0; values.len()];
    }

    let scale = 255.0 / (max as f64 - min as f64);
    values
        .iter()
        .map(|&v| ((v as f64 - min as f64) * scale).round().clamp(0.0, 255.0) as u8)
        .collect()
}

/// Rec. 709 luma of interleaved RGB samples.
pub fn luma(rgb: &[f32]) -> Vec<f32> {
    rgb.chunks_exact(3)
        .map(|p| 0.2126 * p[0] + 0.7152 * p[1] + 0.0722 * p[2])
        .collect()
}
