use shared::Detection;
use std::sync::Arc;

use super::gemini_service::TextGenerator;

pub const NO_FINDINGS: &str = "No pathologies detected.";
pub const REPORT_FALLBACK: &str = "Error generating report.";

const PROMPT_PREAMBLE: &str = "You are a dental radiologist. Based on the following image annotations, \
generate a clinical diagnostic report summarizing findings and suggesting next steps.\n\n";

/// Outcome of report generation. Only `Generated` carries model output.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    NoFindings,
    Generated(String),
    Degraded { reason: String },
}

impl Report {
    pub fn text(&self) -> &str {
        match self {
            Report::NoFindings => NO_FINDINGS,
            Report::Generated(text) => text,
            Report::Degraded { .. } => REPORT_FALLBACK,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Report::Degraded { .. })
    }

    pub fn into_text(self) -> String {
        match self {
            Report::Generated(text) => text,
            other => other.text().to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ReportGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl ReportGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn build_prompt(detections: &[Detection]) -> String {
        let annotations = serde_json::to_string(detections)
            .unwrap_or_else(|_| format!("{:?}", detections));
        format!("{}Annotations: {}", PROMPT_PREAMBLE, annotations)
    }

    /// Never fails: remote errors are logged and turned into `Report::Degraded`.
    pub async fn summarize(&self, detections: &[Detection]) -> Report {
        if detections.is_empty() {
            return Report::NoFindings;
        }

        let prompt = Self::build_prompt(detections);
        match self.generator.generate(&prompt).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    log::error!("Report generation returned empty text");
                    Report::Degraded {
                        reason: "empty output".to_string(),
                    }
                } else {
                    Report::Generated(text.to_string())
                }
            }
            Err(e) => {
                log::error!("Report generation failed: {}", e);
                Report::Degraded {
                    reason: e.to_string(),
                }
            }
        }
    }
}
