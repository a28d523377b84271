pub mod batch;
pub mod canonical;
pub mod classify;
pub mod db;
pub mod export;
pub mod extract;
pub mod ingest;
pub mod ollama;
pub mod settings;
