pub mod gemini_service;
pub mod report_service;
