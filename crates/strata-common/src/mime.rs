//! MIME types for file entries
//!
//! Folders get [`FOLDER_MIME_TYPE`]; files are guessed from the extension of
//! their base name.

use crate::types::{FileInfo, base_name};

/// MIME type reported for folders
pub const FOLDER_MIME_TYPE: &str = "clawio/folder";

/// Fallback for files with no or an unknown extension
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// MIME type of an entry
#[must_use]
pub fn mime_type(info: &FileInfo) -> &'static str {
    if info.folder {
        FOLDER_MIME_TYPE
    } else {
        mime_type_for_path(&info.path)
    }
}

/// MIME type guessed from a path's extension
#[must_use]
pub fn mime_type_for_path(path: &str) -> &'static str {
    let name = base_name(path);
    // dotfiles such as `.bashrc` have no extension
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return DEFAULT_MIME_TYPE;
    };
    if stem.is_empty() {
        return DEFAULT_MIME_TYPE;
    }
    match ext.to_ascii_lowercase().as_str() {
        "txt" | "text" | "log" => "text/plain; charset=utf-8",
        "md" | "markdown" => "text/markdown; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "htm" | "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "xml" => "text/xml; charset=utf-8",
        "json" => "application/json",
        "toml" => "application/toml",
        "yaml" | "yml" => "application/yaml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => DEFAULT_MIME_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, folder: bool) -> FileInfo {
        FileInfo {
            path: path.to_string(),
            folder,
            size: 0,
            modified: 0,
            checksum: String::new(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_folders_ignore_extension() {
        assert_eq!(mime_type(&entry("/photos.png", true)), FOLDER_MIME_TYPE);
        assert_eq!(mime_type(&entry("/", true)), "clawio/folder");
    }

    #[test]
    fn test_files_by_extension() {
        assert_eq!(mime_type(&entry("/docs/a.txt", false)), "text/plain; charset=utf-8");
        assert_eq!(mime_type(&entry("/IMG_01.JPG", false)), "image/jpeg");
        assert_eq!(mime_type(&entry("/backup.tar.gz", false)), "application/gzip");
        assert_eq!(mime_type_for_path("/v1.2/report.pdf"), "application/pdf");
    }

    #[test]
    fn test_unknown_files_fall_back() {
        for path in ["/Makefile", "/.bashrc", "/a.unknownext", "/trailing."] {
            assert_eq!(mime_type(&entry(path, false)), DEFAULT_MIME_TYPE, "{path}");
        }
    }
}
