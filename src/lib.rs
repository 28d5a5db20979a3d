// This file exposes the modules as public modules in the crate

pub mod app_config;
pub mod deck_theme;
pub mod errors;
pub mod fallback_content;
pub mod image_handler;
pub mod llm_handler;
pub mod models;
pub mod pptx_writer;
pub mod presentation_handlers;
pub mod slide_normalizer;
