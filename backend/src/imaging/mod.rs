pub mod annotation;
pub mod decoder;
