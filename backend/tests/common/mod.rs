#![allow(dead_code)]

use async_trait::async_trait;
use backend::config::{AnnotationConfig, DetectionFailurePolicy};
use backend::detection::roboflow_service::{DetectionService, DetectionServiceError};
use backend::imaging::annotation::AnnotationRenderer;
use backend::pipeline::pipeline_service::PipelineService;
use backend::report::gemini_service::{ReportGenerationError, TextGenerator};
use backend::report::report_service::ReportGenerator;
use backend::storage::artifact_store::ArtifactStore;
use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
use shared::Detection;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const PUBLIC_BASE: &str = "http://localhost:8000";

/// Encodes a 16-bit MONOCHROME2 image as a DICOM file with preamble.
pub fn make_dicom(columns: u16, rows: u16, pixels: &[u16]) -> Vec<u8> {
    let mut obj = image_object(columns, rows, 1, "MONOCHROME2", 16);
    obj.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OW,
        PrimitiveValue::U16(pixels.iter().copied().collect()),
    ));
    write_dicom(obj)
}

/// Encodes an interleaved 8-bit RGB image as a DICOM file with preamble.
pub fn make_rgb_dicom(columns: u16, rows: u16, pixels: &[u8]) -> Vec<u8> {
    let mut obj = image_object(columns, rows, 3, "RGB", 8);
    obj.put(DataElement::new(
        tags::PLANAR_CONFIGURATION,
        VR::US,
        PrimitiveValue::from(0_u16),
    ));
    obj.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OB,
        PrimitiveValue::U8(pixels.iter().copied().collect()),
    ));
    write_dicom(obj)
}

fn image_object(
    columns: u16,
    rows: u16,
    samples: u16,
    photometric: &str,
    bits: u16,
) -> InMemDicomObject {
    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(
        tags::SOP_CLASS_UID,
        VR::UI,
        PrimitiveValue::from(uids::SECONDARY_CAPTURE_IMAGE_STORAGE),
    ));
    obj.put(DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from("2.25.123456789"),
    ));
    obj.put(DataElement::new(
        tags::SAMPLES_PER_PIXEL,
        VR::US,
        PrimitiveValue::from(samples),
    ));
    obj.put(DataElement::new(
        tags::PHOTOMETRIC_INTERPRETATION,
        VR::CS,
        PrimitiveValue::from(photometric),
    ));
    obj.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(rows)));
    obj.put(DataElement::new(
        tags::COLUMNS,
        VR::US,
        PrimitiveValue::from(columns),
    ));
    obj.put(DataElement::new(
        tags::BITS_ALLOCATED,
        VR::US,
        PrimitiveValue::from(bits),
    ));
    obj.put(DataElement::new(
        tags::BITS_STORED,
        VR::US,
        PrimitiveValue::from(bits),
    ));
    obj.put(DataElement::new(
        tags::HIGH_BIT,
        VR::US,
        PrimitiveValue::from(bits - 1),
    ));
    obj.put(DataElement::new(
        tags::PIXEL_REPRESENTATION,
        VR::US,
        PrimitiveValue::from(0_u16),
    ));
    obj
}

/// A valid DICOM file that carries no pixel data element.
pub fn make_dicom_without_pixels() -> Vec<u8> {
    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(
        tags::SOP_CLASS_UID,
        VR::UI,
        PrimitiveValue::from(uids::SECONDARY_CAPTURE_IMAGE_STORAGE),
    ));
    obj.put(DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from("2.25.987654321"),
    ));
    obj.put(DataElement::new(
        tags::PATIENT_NAME,
        VR::PN,
        PrimitiveValue::from("Doe^Jane"),
    ));
    write_dicom(obj)
}

fn write_dicom(obj: InMemDicomObject) -> Vec<u8> {
    let file = obj
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
                .media_storage_sop_instance_uid("2.25.123456789"),
        )
        .expect("valid file meta");
    let mut bytes = Vec::new();
    file.write_all(&mut bytes).expect("serialize DICOM");
    bytes
}

pub fn constant_gray_dicom(size: u16, value: u16) -> Vec<u8> {
    make_dicom(size, size, &vec![value; size as usize * size as usize])
}

pub fn cavity() -> Detection {
    Detection {
        x: 50.0,
        y: 50.0,
        width: 20.0,
        height: 10.0,
        class: "cavity".to_string(),
        confidence: 0.75,
    }
}

pub struct StubDetector {
    pub calls: AtomicUsize,
    reply: Result<Vec<Detection>, u16>,
}

impl StubDetector {
    pub fn returning(detections: Vec<Detection>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Ok(detections),
        })
    }

    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Err(status),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionService for StubDetector {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, DetectionServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(image.starts_with(b"\x89PNG"), "detector must receive PNG bytes");
        match &self.reply {
            Ok(detections) => Ok(detections.clone()),
            Err(status) => Err(DetectionServiceError::Status {
                status: *status,
                body: "stub failure".to_string(),
            }),
        }
    }
}

pub struct StubGenerator {
    pub calls: AtomicUsize,
    reply: Option<String>,
}

impl StubGenerator {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Some(text.to_string()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: None,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, ReportGenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().ok_or(ReportGenerationError::Status {
            status: 500,
            body: "stub failure".to_string(),
        })
    }
}

pub fn build_pipeline(
    storage_dir: &Path,
    detector: Arc<StubDetector>,
    generator: Arc<StubGenerator>,
    policy: DetectionFailurePolicy,
) -> PipelineService {
    let renderer =
        AnnotationRenderer::from_config(&AnnotationConfig::default()).expect("bundled font");
    PipelineService::new(
        ArtifactStore::new(storage_dir, PUBLIC_BASE),
        detector,
        ReportGenerator::new(generator),
        Arc::new(renderer),
        policy,
    )
}

pub fn files_with_extension(dir: &Path, extension: &str) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read storage dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(extension))
        .collect();
    names.sort();
    names
}

/// Builds a single-file multipart body and its content type.
pub fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> (Vec<u8>, String) {
    let boundary = "----radiograph-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/dicom\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (body, format!("multipart/form-data; boundary={boundary}"))
}
