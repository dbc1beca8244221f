//! Multipart form reading shared by the upload routes.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

use crate::error::AppError;
use crate::models::SubmittedImage;

/// Field name of the uploaded face image.
pub const IMAGE_FIELD: &str = "image";

/// A multipart form split into its image and text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    /// The `image` file part, if present.
    pub image: Option<SubmittedImage>,
    /// All other named fields as text. Later duplicates win.
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// Read every part of a multipart body.
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` if the body exceeds the upload limit and
    /// `BadRequest` if it is not valid multipart or a text field is not UTF-8.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if name == IMAGE_FIELD {
                let file_name = field.file_name().map(str::to_owned);
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.image = Some(SubmittedImage {
                    bytes,
                    file_name,
                    content_type,
                });
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Remove and return a text field.
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge(err.body_text());
    }
    AppError::BadRequest(format!("Invalid form data: {}", err.body_text()))
}
