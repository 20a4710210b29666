//! Ingestion pipeline services

pub mod analyzer;
pub mod decoder;
pub mod extractor;
pub mod orchestrator;
pub mod parser;
pub mod synthesizer;
