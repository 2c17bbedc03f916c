/// Folder under each patient directory that holds binary files.
pub const FILES_FOLDER_NAME: &str = "files";

/// MIME prefix a sniffed photo must carry.
pub const IMAGE_MIME_PREFIX: &str = "image/";

/// Default upper bound on photo size (10 MiB).
pub const DEFAULT_MAX_PHOTO_BYTES: u64 = 10 * 1024 * 1024;
