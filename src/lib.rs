pub mod config;
pub mod content;
pub mod docx;
pub mod error;
pub mod export;
pub mod fields;
pub mod pipeline;
pub mod progress;
pub mod textutil;
