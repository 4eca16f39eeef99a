use thiserror::Error;

/// Maximum title length for a gallery piece, in characters.
pub const PIECE_TITLE_MAX: usize = 500;
/// Maximum title length for an exhibition, in characters.
pub const EXHIBITION_TITLE_MAX: usize = 200;
/// Maximum description length for both pieces and exhibitions.
pub const DESCRIPTION_MAX: usize = 1000;

pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Field-level validation failures surfaced to the submitting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must be at most {max} characters")]
    TitleTooLong { max: usize },
    #[error("description must be at most {max} characters")]
    DescriptionTooLong { max: usize },
    #[error("image must be a jpg/jpeg file")]
    InvalidImageType,
    #[error("image must be at most {max} bytes")]
    ImageTooLarge { max: u64 },
}

/// Everything the validator needs to know about an uploaded image. Derived
/// from the multipart field metadata, never from the filesystem.
#[derive(Debug, Clone, Copy)]
pub struct ImageMeta<'a> {
    /// Lowercased filename extension, empty when the filename had none.
    pub extension: &'a str,
    /// Content type declared by the client, if any.
    pub content_type: Option<&'a str>,
    pub byte_len: u64,
}

pub fn validate_piece(
    title: &str,
    description: &str,
    image: Option<&ImageMeta<'_>>,
    max_image_bytes: u64,
) -> Result<(), ValidationError> {
    check_length(title, PIECE_TITLE_MAX, LengthField::Title)?;
    check_length(description, DESCRIPTION_MAX, LengthField::Description)?;

    if let Some(image) = image {
        validate_image(image, max_image_bytes)?;
    }

    Ok(())
}

pub fn validate_exhibition(title: &str, description: &str) -> Result<(), ValidationError> {
    check_length(title, EXHIBITION_TITLE_MAX, LengthField::Title)?;
    check_length(description, DESCRIPTION_MAX, LengthField::Description)
}

enum LengthField {
    Title,
    Description,
}

// Limits count Unicode scalar values, not bytes.
fn check_length(value: &str, max: usize, field: LengthField) -> Result<(), ValidationError> {
    if value.chars().count() <= max {
        return Ok(());
    }

    Err(match field {
        LengthField::Title => ValidationError::TitleTooLong { max },
        LengthField::Description => ValidationError::DescriptionTooLong { max },
    })
}

fn validate_image(image: &ImageMeta<'_>, max_image_bytes: u64) -> Result<(), ValidationError> {
    if !ALLOWED_IMAGE_EXTENSIONS.contains(&image.extension) {
        return Err(ValidationError::InvalidImageType);
    }

    if let Some(content_type) = image.content_type {
        if content_type != mime::IMAGE_JPEG.as_ref() {
            return Err(ValidationError::InvalidImageType);
        }
    }

    if image.byte_len > max_image_bytes {
        return Err(ValidationError::ImageTooLarge {
            max: max_image_bytes,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(byte_len: u64) -> ImageMeta<'static> {
        ImageMeta {
            extension: "jpg",
            content_type: Some("image/jpeg"),
            byte_len,
        }
    }

    #[test]
    fn piece_title_boundary() {
        let at_max = "x".repeat(PIECE_TITLE_MAX);
        let over = "x".repeat(PIECE_TITLE_MAX + 1);

        assert!(validate_piece(&at_max, "ok", Some(&jpeg(10)), 1024).is_ok());
        assert_eq!(
            validate_piece(&over, "ok", Some(&jpeg(10)), 1024),
            Err(ValidationError::TitleTooLong {
                max: PIECE_TITLE_MAX
            })
        );
    }

    #[test]
    fn piece_description_boundary() {
        let at_max = "d".repeat(DESCRIPTION_MAX);
        let over = "d".repeat(DESCRIPTION_MAX + 1);

        assert!(validate_piece("t", &at_max, Some(&jpeg(10)), 1024).is_ok());
        assert_eq!(
            validate_piece("t", &over, Some(&jpeg(10)), 1024),
            Err(ValidationError::DescriptionTooLong {
                max: DESCRIPTION_MAX
            })
        );
    }

    #[test]
    fn exhibition_title_boundary() {
        let at_max = "x".repeat(EXHIBITION_TITLE_MAX);
        let over = "x".repeat(EXHIBITION_TITLE_MAX + 1);

        assert!(validate_exhibition(&at_max, "ok").is_ok());
        assert_eq!(
            validate_exhibition(&over, "ok"),
            Err(ValidationError::TitleTooLong {
                max: EXHIBITION_TITLE_MAX
            })
        );
    }

    #[test]
    fn exhibition_description_boundary() {
        let over = "d".repeat(DESCRIPTION_MAX + 1);
        assert_eq!(
            validate_exhibition("t", &over),
            Err(ValidationError::DescriptionTooLong {
                max: DESCRIPTION_MAX
            })
        );
    }

    #[test]
    fn limits_count_characters_not_bytes() {
        // 500 three-byte characters exceed the max in bytes but not in chars.
        let multibyte = "画".repeat(PIECE_TITLE_MAX);
        assert!(validate_piece(&multibyte, "ok", Some(&jpeg(10)), 1024).is_ok());
    }

    #[test]
    fn rejects_non_jpeg_extensions() {
        for extension in ["png", "gif", "exe", ""] {
            let image = ImageMeta {
                extension,
                content_type: None,
                byte_len: 10,
            };
            assert_eq!(
                validate_piece("t", "d", Some(&image), 1024),
                Err(ValidationError::InvalidImageType),
                "extension {extension:?} should be rejected"
            );
        }
    }

    #[test]
    fn accepts_both_jpeg_extensions() {
        for extension in ["jpg", "jpeg"] {
            let image = ImageMeta {
                extension,
                content_type: Some("image/jpeg"),
                byte_len: 10,
            };
            assert!(validate_piece("t", "d", Some(&image), 1024).is_ok());
        }
    }

    #[test]
    fn rejects_mismatched_content_type() {
        let image = ImageMeta {
            extension: "jpg",
            content_type: Some("image/png"),
            byte_len: 10,
        };
        assert_eq!(
            validate_piece("t", "d", Some(&image), 1024),
            Err(ValidationError::InvalidImageType)
        );
    }

    #[test]
    fn image_size_boundary() {
        assert!(validate_piece("t", "d", Some(&jpeg(1024)), 1024).is_ok());
        assert_eq!(
            validate_piece("t", "d", Some(&jpeg(1025)), 1024),
            Err(ValidationError::ImageTooLarge { max: 1024 })
        );
    }

    #[test]
    fn title_checked_before_image() {
        let over = "x".repeat(PIECE_TITLE_MAX + 1);
        let bad_image = ImageMeta {
            extension: "png",
            content_type: None,
            byte_len: 10,
        };
        assert_eq!(
            validate_piece(&over, "d", Some(&bad_image), 1024),
            Err(ValidationError::TitleTooLong {
                max: PIECE_TITLE_MAX
            })
        );
    }
}
