//! Serde-deserializable types matching the server's auxiliary responses.
//!
//! Church records themselves stay opaque; only the small envelope
//! responses get a shape.

use serde::Deserialize;

/// Body of `GET /ping`.
#[derive(Debug, Default, Deserialize)]
pub struct PingResponse {
  pub message: Option<String>,
}

/// Body of `GET /tabelas`.
#[derive(Debug, Deserialize)]
pub struct TablesResponse {
  #[serde(default)]
  pub tabelas: Vec<String>,
}
