pub mod archive;
pub mod walker;
pub mod image_folder;

pub use archive::{extract_archive, unzip_data, unzip_data_to, ArchiveKind, ExtractionSummary};
pub use walker::{summarize_dir, walk_through_dir, DirSummary};
pub use image_folder::ImageFolder;
