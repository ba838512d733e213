use std::fs;
use std::path::Path;

/// A file that arrived with the current request and has not been stored yet.
///
/// The bytes are held only until the aggregate is saved; after that the entity
/// keeps just the stored file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub original_name: String,
    /// MIME type sniffed from the content, not taken from the client.
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime_type = sniff_mime(&bytes).to_string();
        Self {
            original_name: original_name.into(),
            mime_type,
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = fs::read(path)?;
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(original_name, bytes))
    }

    pub fn is_jpeg(&self) -> bool {
        self.mime_type == "image/jpeg"
    }

    /// File extension matching the sniffed MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

/// A previously stored image, reloaded by file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_name: String,
}

/// The thumbnail handle attached to a project during one save cycle.
///
/// Only `Uploaded` introduces a new image; `Stored` is what a load produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailFile {
    Uploaded(UploadedFile),
    Stored(StoredFile),
}

impl ThumbnailFile {
    pub fn is_new_upload(&self) -> bool {
        matches!(self, Self::Uploaded(_))
    }
}

/// Identify an image by its magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => "image/png",
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}
