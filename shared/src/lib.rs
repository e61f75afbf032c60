use serde::{Deserialize, Serialize};

/// One bounding box as reported by the detection service. `x`/`y` are the box center.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub class: String,
    pub confidence: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProcessResponse {
    pub original_image_url: String,
    pub annotated_image_url: String,
    pub report: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
