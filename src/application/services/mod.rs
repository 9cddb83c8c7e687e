pub mod broadcast;
pub mod ingestion_service;
