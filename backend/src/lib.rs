pub mod config;
pub mod detection;
pub mod imaging;
pub mod pipeline;
pub mod report;
pub mod routes;
pub mod storage;
