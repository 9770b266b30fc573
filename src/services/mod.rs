pub mod csv_parser;
pub mod ingestion;
pub mod staging;
pub mod storage;
