//! Error types for the HTTP server

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP server error: {0}")]
    HttpServer(String),
}

pub type Result<T> = std::result::Result<T, ServeError>;
