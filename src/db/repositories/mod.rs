pub mod content;
pub mod subscription;
pub mod token;
