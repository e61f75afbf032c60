use image::DynamicImage;
use shared::{Detection, ProcessResponse};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::DetectionFailurePolicy;
use crate::detection::roboflow_service::{DetectionService, DetectionServiceError};
use crate::imaging::annotation::AnnotationRenderer;
use crate::imaging::decoder::{self, DecodeError};
use crate::report::report_service::{Report, ReportGenerator};
use crate::storage::artifact_store::{ArtifactKind, ArtifactStore, StorageError, encode_png};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Detection service error: {0}")]
    Detection(#[from] DetectionServiceError),
    #[error("Processing task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Decoded,
    Detected,
    Annotated,
    Reported,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub struct RequestResult {
    pub request_id: Uuid,
    pub original_image_url: String,
    pub annotated_image_url: String,
    pub detections: Vec<Detection>,
    pub report: Report,
}

impl From<RequestResult> for ProcessResponse {
    fn from(result: RequestResult) -> Self {
        Self {
            original_image_url: result.original_image_url,
            annotated_image_url: result.annotated_image_url,
            report: result.report.into_text(),
        }
    }
}

/// Runs one upload through decode, detect, annotate and summarize.
#[derive(Clone)]
pub struct PipelineService {
    store: ArtifactStore,
    detector: Arc<dyn DetectionService>,
    reports: ReportGenerator,
    renderer: Arc<AnnotationRenderer>,
    on_detection_failure: DetectionFailurePolicy,
}

impl PipelineService {
    pub fn new(
        store: ArtifactStore,
        detector: Arc<dyn DetectionService>,
        reports: ReportGenerator,
        renderer: Arc<AnnotationRenderer>,
        on_detection_failure: DetectionFailurePolicy,
    ) -> Self {
        Self {
            store,
            detector,
            reports,
            renderer,
            on_detection_failure,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub async fn process(&self, upload: Vec<u8>) -> Result<RequestResult, PipelineError> {
        let request_id = Uuid::new_v4();
        match self.run(request_id, upload).await {
            Ok(result) => Ok(result),
            Err(e) => {
                log::error!("[{}] Request failed: {}", request_id, e);
                Err(e)
            }
        }
    }

    async fn run(&self, request_id: Uuid, upload: Vec<u8>) -> Result<RequestResult, PipelineError> {
        log::info!(
            "[{}] {}: {} byte upload",
            request_id,
            Stage::Received,
            upload.len()
        );
        self.store
            .put_bytes(request_id, ArtifactKind::Upload, &upload)
            .await?;

        let (raster, encoded) = tokio::task::spawn_blocking(move || {
            let raster = decoder::decode(&upload)?;
            let encoded = encode_png(&DynamicImage::ImageLuma8(raster.clone()))?;
            Ok::<_, PipelineError>((raster, encoded))
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;
        let original = self
            .store
            .put_bytes(request_id, ArtifactKind::Original, &encoded)
            .await?;
        log::info!(
            "[{}] {}: {}x{} raster",
            request_id,
            Stage::Decoded,
            raster.width(),
            raster.height()
        );

        let detections = match self.detector.detect(&encoded).await {
            Ok(detections) => detections,
            Err(e) => match self.on_detection_failure {
                DetectionFailurePolicy::Fail => return Err(e.into()),
                DetectionFailurePolicy::Degrade => {
                    log::warn!(
                        "[{}] Detection failed, continuing without predictions: {}",
                        request_id,
                        e
                    );
                    Vec::new()
                }
            },
        };
        log::info!(
            "[{}] {}: {} detection(s)",
            request_id,
            Stage::Detected,
            detections.len()
        );

        let renderer = self.renderer.clone();
        let to_draw = detections.clone();
        let annotated = tokio::task::spawn_blocking(move || renderer.render(&raster, &to_draw))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?;
        let annotated = self
            .store
            .put_png(
                request_id,
                ArtifactKind::Annotated,
                DynamicImage::ImageRgb8(annotated),
            )
            .await?;
        log::info!("[{}] {}", request_id, Stage::Annotated);

        let report = self.reports.summarize(&detections).await;
        if report.is_degraded() {
            log::warn!("[{}] {} with fallback text", request_id, Stage::Reported);
        } else {
            log::info!("[{}] {}", request_id, Stage::Reported);
        }

        log::info!("[{}] {}", request_id, Stage::Completed);
        Ok(RequestResult {
            request_id,
            original_image_url: original.url,
            annotated_image_url: annotated.url,
            detections,
            report,
        })
    }
}
