pub mod booking;
pub mod config;
pub mod error;
pub mod models;
pub mod ocr;
pub mod portal;
pub mod session;
pub mod token_store;
