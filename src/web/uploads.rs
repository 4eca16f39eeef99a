use std::path::Path;

use axum::extract::Multipart;
use thiserror::Error;

use crate::validation::ImageMeta;

/// Error returned when a multipart form cannot be read at all. Field-level
/// problems (bad extension, oversize image) are the validator's job.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UploadError {
    message: String,
}

impl UploadError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An image file received from a multipart form, buffered in memory up to
/// the configured cap.
pub struct ImageUpload {
    pub original_name: String,
    pub extension: String,
    pub content_type: Option<String>,
    pub byte_len: u64,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn meta(&self) -> ImageMeta<'_> {
        ImageMeta {
            extension: &self.extension,
            content_type: self.content_type.as_deref(),
            byte_len: self.byte_len,
        }
    }
}

/// The piece form as submitted: text fields plus an optional image file.
#[derive(Default)]
pub struct PieceForm {
    pub title: String,
    pub description: String,
    pub image: Option<ImageUpload>,
}

/// Parse the gallery piece form. Text fields are collected as-is; the image
/// field is buffered up to `byte_cap` bytes — past the cap the stream is
/// drained and only counted, so the validator still sees the true size.
pub async fn read_piece_form(
    mut multipart: Multipart,
    byte_cap: u64,
) -> Result<PieceForm, UploadError> {
    let mut form = PieceForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::new(format!("failed to parse upload form: {err}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field.file_name().is_none() {
            let value = field
                .text()
                .await
                .map_err(|err| UploadError::new(format!("failed to read field `{field_name}`: {err}")))?;
            match field_name.as_str() {
                "title" => form.title = value,
                "description" => form.description = value,
                _ => {}
            }
            continue;
        }

        if field_name != "image" {
            return Err(UploadError::new(format!(
                "unsupported file field `{field_name}`"
            )));
        }

        let file_name = field.file_name().unwrap_or("").to_string();
        if file_name.is_empty() {
            // Browsers submit an empty file part when no file was chosen.
            continue;
        }

        let sanitized = sanitize_filename::sanitize(&file_name);
        let extension = image_extension(&sanitized);
        let content_type = field.content_type().map(|mime| mime.to_string());

        let mut bytes: Vec<u8> = Vec::new();
        let mut byte_len: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| UploadError::new(format!("failed to read upload data: {err}")))?
        {
            byte_len += chunk.len() as u64;
            if bytes.len() as u64 <= byte_cap {
                bytes.extend_from_slice(&chunk);
            }
        }

        form.image = Some(ImageUpload {
            original_name: file_name,
            extension,
            content_type,
            byte_len,
            bytes,
        });
    }

    Ok(form)
}

/// Lowercased filename extension, empty when there is none.
pub fn image_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(image_extension("Photo.JPG"), "jpg");
        assert_eq!(image_extension("scan.jpeg"), "jpeg");
    }

    #[test]
    fn missing_extension_is_empty() {
        assert_eq!(image_extension("photo"), "");
        assert_eq!(image_extension(""), "");
    }

    #[test]
    fn extension_comes_from_last_component() {
        assert_eq!(image_extension("archive.tar.png"), "png");
    }

    #[test]
    fn upload_meta_mirrors_fields() {
        let upload = ImageUpload {
            original_name: "photo.jpg".to_string(),
            extension: "jpg".to_string(),
            content_type: Some("image/jpeg".to_string()),
            byte_len: 42,
            bytes: vec![0; 42],
        };
        let meta = upload.meta();
        assert_eq!(meta.extension, "jpg");
        assert_eq!(meta.content_type, Some("image/jpeg"));
        assert_eq!(meta.byte_len, 42);
    }
}
