use std::{collections::HashSet, sync::LazyLock};

/// Content types whose bodies travel base64-encoded through the gateway.
pub static BINARY_TYPES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "application/octet-stream",
        // docs
        "application/epub+zip",
        "application/msword",
        "application/pdf",
        "application/rtf",
        "application/vnd.amazon.ebook",
        "application/vnd.ms-excel",
        "application/vnd.ms-powerpoint",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        // fonts
        "font/otf",
        "font/woff",
        "font/woff2",
        // images
        "image/avif",
        "image/bmp",
        "image/gif",
        "image/jpeg",
        "image/png",
        "image/tiff",
        "image/vnd.microsoft.icon",
        "image/webp",
        // audio
        "audio/3gpp",
        "audio/aac",
        "audio/basic",
        "audio/mpeg",
        "audio/ogg",
        "audio/wav",
        "audio/webm",
        "audio/x-aiff",
        "audio/x-midi",
        "audio/x-wav",
        // video
        "video/3gpp",
        "video/mp2t",
        "video/mpeg",
        "video/ogg",
        "video/quicktime",
        "video/webm",
        "video/x-msvideo",
        // archives
        "application/java-archive",
        "application/vnd.apple.installer+xml",
        "application/x-7z-compressed",
        "application/x-apple-diskimage",
        "application/x-bzip",
        "application/x-bzip2",
        "application/x-gzip",
        "application/x-java-archive",
        "application/x-rar-compressed",
        "application/x-tar",
        "application/x-zip",
        "application/zip",
    ])
});

/// Looks up the media type (everything before the first `;`) in [`BINARY_TYPES`].
///
/// The match is exact: no trimming, no case folding.
pub fn is_binary_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type.filter(|value| !value.is_empty()) else {
        return false;
    };
    let media_type = content_type.split(';').next().unwrap_or_default();
    BINARY_TYPES.contains(media_type)
}
