use crate::config::RecognitionConfig;
use crate::error::RecognitionError;
use crate::service::recognizer::{FaceRecognizer, Verification};
use crate::types::deepface::{
    RepresentRequest, RepresentResponse, ServiceErrorBody, VerifyRequest, VerifyResponse,
};
use backon::{ExponentialBuilder, Retryable};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::BoxFuture;
use reqwest::StatusCode;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

/// Client for a DeepFace REST server.
///
/// Images are read from disk and sent inline as base64 data URIs.
pub struct DeepFaceClient {
    client: reqwest::Client,
    represent_url: Url,
    verify_url: Url,
    model_name: String,
    detector_backend: String,
    retry_policy: ExponentialBuilder,
}

impl DeepFaceClient {
    pub fn new(cfg: &RecognitionConfig) -> Result<Self, RecognitionError> {
        let client = reqwest::Client::builder()
            .user_agent("rollcall/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(cfg.timeout())
            .build()?;
        Self::with_client(client, cfg)
    }

    pub fn with_client(
        client: reqwest::Client,
        cfg: &RecognitionConfig,
    ) -> Result<Self, RecognitionError> {
        let base = with_trailing_slash(cfg.service_url.clone());
        Ok(Self {
            client,
            represent_url: base.join("represent")?,
            verify_url: base.join("verify")?,
            model_name: cfg.model_name.clone(),
            detector_backend: cfg.detector_backend.clone(),
            retry_policy: ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(3))
                .with_max_times(cfg.max_retries)
                .with_jitter(),
        })
    }

    pub fn represent_url(&self) -> &Url {
        &self.represent_url
    }

    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    /// POST `body` as JSON, retrying transport errors and 5xx responses.
    async fn post_json<T>(&self, url: &Url, body: &T) -> Result<reqwest::Response, reqwest::Error>
    where
        T: Serialize,
    {
        (|| async {
            let resp = self.client.post(url.clone()).json(body).send().await?;
            if resp.status().is_server_error() {
                let status = resp.status();
                let err = resp.error_for_status().unwrap_err();
                error!(%url, %status, "recognition service server error (will retry)");
                return Err(err);
            }
            Ok(resp)
        })
        .retry(self.retry_policy)
        .await
    }

    async fn count_faces(&self, image: &Path) -> Result<usize, RecognitionError> {
        let img = encode_image(image).await?;
        let request = RepresentRequest {
            img: &img,
            model_name: &self.model_name,
            detector_backend: &self.detector_backend,
            enforce_detection: true,
        };
        let resp = self.post_json(&self.represent_url, &request).await?;
        let status = resp.status();
        if !status.is_success() {
            let message = error_message(resp).await;
            debug!(path = %image.display(), %status, %message, "face detection refused");
            return represent_failure(status, message);
        }
        let parsed: RepresentResponse = resp.json().await?;
        Ok(parsed.results.len())
    }

    async fn verify_pair(
        &self,
        probe: &Path,
        reference: &Path,
    ) -> Result<Verification, RecognitionError> {
        let img1 = encode_image(probe).await?;
        let img2 = encode_image(reference).await?;
        let request = VerifyRequest {
            img1: &img1,
            img2: &img2,
            model_name: &self.model_name,
            detector_backend: &self.detector_backend,
            enforce_detection: false,
        };
        let resp = self.post_json(&self.verify_url, &request).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(reply_error(status, error_message(resp).await));
        }
        let parsed: VerifyResponse = resp.json().await?;
        Ok(Verification {
            verified: parsed.verified,
            distance: parsed.distance,
        })
    }
}

impl FaceRecognizer for DeepFaceClient {
    fn detect_face_count<'a>(
        &'a self,
        image: &'a Path,
    ) -> BoxFuture<'a, Result<usize, RecognitionError>> {
        Box::pin(self.count_faces(image))
    }

    fn verify<'a>(
        &'a self,
        probe: &'a Path,
        reference: &'a Path,
    ) -> BoxFuture<'a, Result<Verification, RecognitionError>> {
        Box::pin(self.verify_pair(probe, reference))
    }
}

async fn encode_image(path: &Path) -> Result<String, RecognitionError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
}

async fn error_message(resp: reqwest::Response) -> String {
    let text = resp.text().await.unwrap_or_default();
    serde_json::from_str::<ServiceErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text)
}

/// Strict detection reports "no face" as a 400. Any other 4xx means the image
/// itself was refused.
fn represent_failure(status: StatusCode, message: String) -> Result<usize, RecognitionError> {
    if status == StatusCode::BAD_REQUEST && is_no_face_message(&message) {
        return Ok(0);
    }
    Err(reply_error(status, message))
}

fn reply_error(status: StatusCode, message: String) -> RecognitionError {
    if status.is_client_error() {
        RecognitionError::Rejected { message }
    } else {
        RecognitionError::Service {
            status: status.as_u16(),
            message,
        }
    }
}

fn is_no_face_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("could not be detected")
}

/// `Url::join` replaces the last segment unless the base ends with `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
