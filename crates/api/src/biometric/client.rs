//! HTTP client for the biometric service.

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use attendance_core::{Embedding, UserId};

use crate::config::BiometricConfig;
use crate::models::SubmittedImage;

use super::error::{ServiceErrorBody, VerificationError};
use super::types::{RegisterFaceResponse, VerifyFaceResponse};
use super::{FaceMatch, FaceVerifier};

const REGISTER_FACE_PATH: &str = "register-face";
const VERIFY_FACE_PATH: &str = "verify-face";

/// Biometric service client.
///
/// Every call is bounded by the configured timeout and is never retried.
#[derive(Clone)]
pub struct BiometricClient {
    inner: Arc<BiometricClientInner>,
}

struct BiometricClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl BiometricClient {
    /// Create a new biometric client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &BiometricConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(BiometricClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, VerificationError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| VerificationError::Transport(format!("invalid endpoint {path}: {e}")))
    }

    fn image_part(image: &SubmittedImage, file_name: String) -> Result<Part, VerificationError> {
        Part::bytes(image.bytes.to_vec())
            .file_name(file_name)
            .mime_str(image.image_content_type())
            .map_err(|e| VerificationError::Transport(format!("invalid image part: {e}")))
    }

    /// Send a multipart form and decode the JSON response.
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, VerificationError> {
        let url = self.endpoint(path)?;

        let response = self.inner.client.post(url).multipart(form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(path, status = status.as_u16(), bytes = body.len(), "Biometric service responded");

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| {
                VerificationError::InvalidResponse(format!("{path}: {e}"))
            });
        }

        let reason = serde_json::from_slice::<ServiceErrorBody>(&body)
            .ok()
            .and_then(|b| b.reason());

        if status.is_server_error() {
            let reason = reason.unwrap_or_else(|| "no error detail".to_string());
            warn!(path, status = status.as_u16(), %reason, "Biometric service failed");
            return Err(VerificationError::Unavailable {
                status: status.as_u16(),
                reason,
            });
        }

        match reason {
            Some(reason) => {
                warn!(path, status = status.as_u16(), %reason, "Biometric service rejected request");
                Err(VerificationError::Rejected {
                    status: status.as_u16(),
                    reason,
                })
            }
            None => Err(VerificationError::InvalidResponse(format!(
                "{path}: status {status} without error detail"
            ))),
        }
    }
}

impl FaceVerifier for BiometricClient {
    #[instrument(skip(self, image), fields(user_id = %user_id, bytes = image.bytes.len()))]
    async fn enroll_face(
        &self,
        user_id: UserId,
        image: &SubmittedImage,
    ) -> Result<Embedding, VerificationError> {
        let part = Self::image_part(image, format!("user_{user_id}_register.jpg"))?;
        let form = Form::new().part("image", part);

        let response: RegisterFaceResponse = self.post_form(REGISTER_FACE_PATH, form).await?;
        Embedding::try_from(response)
    }

    #[instrument(skip(self, image, stored), fields(bytes = image.bytes.len(), dims = stored.len()))]
    async fn match_face(
        &self,
        image: &SubmittedImage,
        stored: &Embedding,
    ) -> Result<FaceMatch, VerificationError> {
        let file_name = image
            .file_name
            .clone()
            .unwrap_or_else(|| "checkin.jpg".to_string());
        let part = Self::image_part(image, file_name)?;
        let embedding = stored.to_json().map_err(|e| {
            VerificationError::Transport(format!("invalid embedding field: {e}"))
        })?;
        let form = Form::new().part("image", part).text("embedding", embedding);

        let response: VerifyFaceResponse = self.post_form(VERIFY_FACE_PATH, form).await?;
        FaceMatch::try_from(response)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::parse_base_url;

    fn client(base: &str) -> BiometricClient {
        BiometricClient::new(&BiometricConfig {
            base_url: parse_base_url(base).unwrap(),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoints_resolve_under_base_path() {
        let client = client("http://ai.internal:8000/api");
        assert_eq!(
            client.endpoint(REGISTER_FACE_PATH).unwrap().as_str(),
            "http://ai.internal:8000/api/register-face"
        );
        assert_eq!(
            client.endpoint(VERIFY_FACE_PATH).unwrap().as_str(),
            "http://ai.internal:8000/api/verify-face"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) is closed on loopback in test environments.
        let client = client("http://127.0.0.1:9");
        let image = SubmittedImage::from_bytes(vec![1_u8, 2, 3]);
        let err = client.enroll_face(UserId::new(1), &image).await.unwrap_err();
        assert!(matches!(
            err,
            VerificationError::Transport(_) | VerificationError::Timeout
        ));
    }
}
