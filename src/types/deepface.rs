//! Wire types of the DeepFace REST API (`/represent`, `/verify`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct RepresentRequest<'a> {
    pub img: &'a str,
    pub model_name: &'a str,
    pub detector_backend: &'a str,
    pub enforce_detection: bool,
}

/// One entry per detected face; only the count matters here.
#[derive(Debug, Deserialize)]
pub struct RepresentResponse {
    #[serde(default)]
    pub results: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct VerifyRequest<'a> {
    pub img1: &'a str,
    pub img2: &'a str,
    pub model_name: &'a str,
    pub detector_backend: &'a str,
    pub enforce_detection: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerifyResponse {
    pub verified: bool,
    pub distance: f64,
}

#[derive(Debug, Deserialize)]
pub struct ServiceErrorBody {
    pub error: String,
}
