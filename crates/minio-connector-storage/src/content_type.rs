//! Content-Type guessing from object names

use crate::names::split_extension;

/// Guess the Content-Type of an object from the extension of its name
///
/// Returns `None` for unknown or missing extensions; the object is then stored without
/// a Content-Type and the server applies its default.
///
/// Compression suffixes are encodings, not types: `backup.tar.gz` is `application/x-tar`
/// and a bare `dump.gz` has no type.
pub fn guess_content_type(name: &str) -> Option<&'static str> {
    let (stem, ext) = split_extension(name);
    let extension = ext.strip_prefix('.')?.to_lowercase();

    if is_encoding(&extension) {
        return guess_content_type(stem);
    }

    let content_type = match extension.as_str() {
        // Images
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/vnd.microsoft.icon",
        "tif" | "tiff" => "image/tiff",
        // Videos
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "m4v" => "video/x-m4v",
        "mpeg" | "mpg" => "video/mpeg",
        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/x-wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        // Documents
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "rtf" => "application/rtf",
        // Text and web
        "txt" | "text" | "log" => "text/plain",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "wasm" => "application/wasm",
        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        // Archives
        "zip" => "application/zip",
        "tar" | "tgz" | "tbz2" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        _ => return None,
    };

    Some(content_type)
}

fn is_encoding(extension: &str) -> bool {
    matches!(extension, "gz" | "bz2" | "xz" | "br" | "z")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(guess_content_type("test_file.txt"), Some("text/plain"));
        assert_eq!(guess_content_type("photos/Cat.JPG"), Some("image/jpeg"));
        assert_eq!(guess_content_type("backup.tgz"), Some("application/x-tar"));
        assert_eq!(guess_content_type("site/index.html"), Some("text/html"));
    }

    #[test]
    fn unknown_or_missing_extensions() {
        assert_eq!(guess_content_type("README"), None);
        assert_eq!(guess_content_type(".env"), None);
        assert_eq!(guess_content_type("data.unknownext"), None);
        assert_eq!(guess_content_type("trailing."), None);
    }

    #[test]
    fn compression_suffixes_are_encodings() {
        assert_eq!(guess_content_type("backup.tar.gz"), Some("application/x-tar"));
        assert_eq!(guess_content_type("logs/app.log.bz2"), Some("text/plain"));
        assert_eq!(guess_content_type("dump.gz"), None);
        assert_eq!(guess_content_type("archive.GZ"), None);
    }
}
