use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat};

/// JPEG and PNG pictures above this size are shrunk before storage; GIFs are refused.
pub const MAX_PHOTO_BYTES: usize = 15 * 1024 * 1024;

/// Hard ceiling on a received picture, resizable or not.
pub const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Longest side of a shrunk picture.
pub const RESIZED_MAX_DIMENSION: u32 = 400;

const RESIZED_JPEG_QUALITY: u8 = 80;

/// Key prefix shared by stored files and their public URLs.
pub const PHOTO_PREFIX: &str = "profile-pictures";

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// A profile picture as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoFormat {
    Jpeg,
    Png,
    Gif,
}

impl PhotoFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            PhotoFormat::Jpeg => "jpg",
            PhotoFormat::Png => "png",
            PhotoFormat::Gif => "gif",
        }
    }

    pub fn mime(self) -> mime::Mime {
        match self {
            PhotoFormat::Jpeg => mime::IMAGE_JPEG,
            PhotoFormat::Png => mime::IMAGE_PNG,
            PhotoFormat::Gif => mime::IMAGE_GIF,
        }
    }

    fn resizable(self) -> bool {
        matches!(self, PhotoFormat::Jpeg | PhotoFormat::Png)
    }

    fn from_mime(mime: &mime::Mime) -> Option<Self> {
        if mime.type_() != mime::IMAGE {
            return None;
        }
        match mime.subtype().as_str() {
            "jpeg" | "jpg" | "pjpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }
}

impl PhotoUpload {
    /// Check size and type before anything is stored. The declared content type wins;
    /// without one the type is guessed from the file name.
    pub fn inspect(&self) -> Result<PhotoFormat, StorageError> {
        if self.bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        let extension = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        if let Some(ext) = &extension {
            if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
                return Err(StorageError::UnsupportedType);
            }
        }

        let declared = self
            .content_type
            .as_deref()
            .and_then(|raw| raw.parse::<mime::Mime>().ok());
        let mime = match declared {
            Some(mime) => mime,
            None => self
                .file_name
                .as_deref()
                .map(|name| mime_guess::from_path(name).first_or_octet_stream())
                .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        };

        let format = PhotoFormat::from_mime(&mime).ok_or(StorageError::UnsupportedType)?;
        let size = self.bytes.len();
        if size > MAX_UPLOAD_BYTES || (size > MAX_PHOTO_BYTES && !format.resizable()) {
            return Err(StorageError::TooLarge { size });
        }
        Ok(format)
    }

    /// Shrink an oversized JPEG or PNG so its longest side is at most
    /// [`RESIZED_MAX_DIMENSION`], re-encoding in the same format. Smaller pictures
    /// pass through untouched.
    pub fn shrink_oversized(self) -> Result<Self, StorageError> {
        let format = self.inspect()?;
        if self.bytes.len() <= MAX_PHOTO_BYTES {
            return Ok(self);
        }

        let original = self.bytes.len();
        let bytes = resize_to_fit(&self.bytes, format)?;
        tracing::info!(original, resized = bytes.len(), "resized large profile picture");
        Ok(Self {
            file_name: self.file_name,
            content_type: Some(format.mime().to_string()),
            bytes,
        })
    }
}

fn resize_to_fit(bytes: &[u8], format: PhotoFormat) -> Result<Vec<u8>, StorageError> {
    let (input, output) = match format {
        PhotoFormat::Jpeg => (
            ImageFormat::Jpeg,
            ImageOutputFormat::Jpeg(RESIZED_JPEG_QUALITY),
        ),
        PhotoFormat::Png => (ImageFormat::Png, ImageOutputFormat::Png),
        PhotoFormat::Gif => return Ok(bytes.to_vec()),
    };
    let decoded = image::load_from_memory_with_format(bytes, input)
        .map_err(|err| StorageError::Processing(err.to_string()))?;

    let (width, height) = decoded.dimensions();
    let resized = if width > RESIZED_MAX_DIMENSION || height > RESIZED_MAX_DIMENSION {
        decoded.resize(RESIZED_MAX_DIMENSION, RESIZED_MAX_DIMENSION, FilterType::Triangle)
    } else {
        decoded
    };
    // The JPEG encoder takes no alpha channel.
    let resized = match format {
        PhotoFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
        _ => resized,
    };

    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, output)
        .map_err(|err| StorageError::Processing(err.to_string()))?;
    Ok(out.into_inner())
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid file type. Only jpg, jpeg, png, and gif are allowed.")]
    UnsupportedType,
    #[error("Image is too large ({size} bytes).")]
    TooLarge { size: usize },
    #[error("Failed to process image: {0}")]
    Processing(String),
    #[error("Uploaded file is empty.")]
    Empty,
    #[error("Failed to store profile picture.")]
    Io(#[from] std::io::Error),
    #[error("Photo storage rejected the upload: {0}")]
    Rejected(String),
}

/// Object storage for profile pictures. Returns the public URL of the stored file.
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    async fn upload(&self, photo: PhotoUpload) -> Result<String, StorageError>;
}

/// Stores pictures on local disk under `<root>/profile-pictures/` and hands out URLs
/// the API serves back from `/uploads/profile-pictures/<file>`.
#[derive(Debug, Clone)]
pub struct FilesystemPhotoStorage {
    root: PathBuf,
    public_url: String,
}

impl FilesystemPhotoStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        let public_url = public_url.into();
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a stored picture back. Names that could escape the picture directory
    /// resolve to `None`.
    pub async fn read(
        &self,
        file_name: &str,
    ) -> Result<Option<(Vec<u8>, mime::Mime)>, StorageError> {
        if !is_plain_file_name(file_name) {
            return Ok(None);
        }

        let path = self.root.join(PHOTO_PREFIX).join(file_name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let mime = mime_guess::from_path(&path).first_or_octet_stream();
                Ok(Some((bytes, mime)))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

#[async_trait]
impl PhotoStorage for FilesystemPhotoStorage {
    async fn upload(&self, photo: PhotoUpload) -> Result<String, StorageError> {
        let format = photo.inspect()?;
        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), format.extension());

        let directory = self.root.join(PHOTO_PREFIX);
        tokio::fs::create_dir_all(&directory).await?;
        tokio::fs::write(directory.join(&file_name), &photo.bytes).await?;

        let url = format!("{}/uploads/{}/{}", self.public_url, PHOTO_PREFIX, file_name);
        tracing::info!(url = %url, size = photo.bytes.len(), "profile picture stored");
        Ok(url)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' || ch == '_')
}
