//! Upload parameters shared by every backend.

use derive_more::Display;

/// Who may read an uploaded object.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Anyone holding the URL (S3 canned ACL `public-read`).
    #[default]
    #[display("public-read")]
    Public,
    /// Bucket owner only.
    #[display("private")]
    Private,
}

/// Per-object upload options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOptions {
    /// MIME type stored with the object, e.g. `image/jpeg`.
    pub content_type: String,
    pub visibility: Visibility,
}
impl UploadOptions {
    /// Publicly readable object with the given content type.
    pub fn public(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            visibility: Visibility::Public,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}
