pub mod models;
pub mod roboflow_service;
