use serde::Deserialize;
use shared::Detection;

/// Body returned by the hosted detection model. `predictions` may be absent or null.
#[derive(Debug, Deserialize)]
pub struct DetectionResponse {
    #[serde(default)]
    pub predictions: Option<Vec<Detection>>,
}

impl DetectionResponse {
    pub fn into_detections(self) -> Vec<Detection> {
        self.predictions.unwrap_or_default()
    }
}

pub fn parse_detection_response(body: &str) -> Result<Vec<Detection>, serde_json::Error> {
    let response: DetectionResponse = serde_json::from_str(body)?;
    Ok(response.into_detections())
}
