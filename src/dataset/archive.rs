//! データセットアーカイブの展開
//!
//! zip形式と tar / tar.gz形式に対応します。

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;

use crate::error::HelperError;

/// 展開結果
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSummary {
    /// 展開先ディレクトリ
    pub destination: PathBuf,
    /// アーカイブ内のエントリ数
    pub entries: usize,
}

/// アーカイブの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    Tar,
}

impl ArchiveKind {
    /// ファイル名の拡張子から判定
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else {
            None
        }
    }
}

/// zipファイルをカレントディレクトリに展開
pub fn unzip_data<P: AsRef<Path>>(filename: P) -> Result<ExtractionSummary> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    unzip_data_to(filename, cwd)
}

/// zipファイルを指定ディレクトリに展開
pub fn unzip_data_to<P: AsRef<Path>, Q: AsRef<Path>>(
    filename: P,
    destination: Q,
) -> Result<ExtractionSummary> {
    let filename = filename.as_ref();
    let destination = destination.as_ref();

    let file = File::open(filename)
        .with_context(|| format!("Failed to open zip file: {:?}", filename))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip archive: {:?}", filename))?;
    let entries = archive.len();

    std::fs::create_dir_all(destination)
        .with_context(|| format!("Failed to create destination directory: {:?}", destination))?;
    archive
        .extract(destination)
        .with_context(|| format!("Failed to extract {:?} into {:?}", filename, destination))?;

    log::info!(
        "Extracted {} entries from {} into {}",
        entries,
        filename.display(),
        destination.display()
    );

    Ok(ExtractionSummary {
        destination: destination.to_path_buf(),
        entries,
    })
}

/// 拡張子に応じてアーカイブを展開
pub fn extract_archive<P: AsRef<Path>, Q: AsRef<Path>>(
    filename: P,
    destination: Q,
) -> Result<ExtractionSummary> {
    let filename = filename.as_ref();
    let kind = ArchiveKind::from_path(filename)
        .ok_or_else(|| HelperError::UnsupportedArchive(filename.to_path_buf()))?;

    match kind {
        ArchiveKind::Zip => unzip_data_to(filename, destination),
        ArchiveKind::TarGz => {
            let file = File::open(filename)
                .with_context(|| format!("Failed to open tar.gz file: {:?}", filename))?;
            untar(GzDecoder::new(file), filename, destination.as_ref())
        }
        ArchiveKind::Tar => {
            let file = File::open(filename)
                .with_context(|| format!("Failed to open tar file: {:?}", filename))?;
            untar(file, filename, destination.as_ref())
        }
    }
}

fn untar<R: Read>(reader: R, filename: &Path, destination: &Path) -> Result<ExtractionSummary> {
    std::fs::create_dir_all(destination)
        .with_context(|| format!("Failed to create destination directory: {:?}", destination))?;

    let mut archive = Archive::new(reader);
    let mut entries = 0;

    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read tar archive: {:?}", filename))?
    {
        let mut entry = entry?;
        // unpack_inは展開先の外に出るパスを無視する
        entry
            .unpack_in(destination)
            .with_context(|| format!("Failed to unpack entry from {:?}", filename))?;
        entries += 1;
    }

    log::info!(
        "Extracted {} entries from {} into {}",
        entries,
        filename.display(),
        destination.display()
    );

    Ok(ExtractionSummary {
        destination: destination.to_path_buf(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_zip(path: &Path) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        writer.add_directory("pizza_steak/train/", options).unwrap();
        writer.start_file("pizza_steak/train/pizza.txt", options).unwrap();
        writer.write_all(b"pizza").unwrap();
        writer.start_file("pizza_steak/readme.txt", options).unwrap();
        writer.write_all(b"hello").unwrap();
        writer.finish().unwrap();
    }

    fn write_tar_gz(path: &Path) {
        let file = File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let data = b"steak";
        let mut header = tar::Header::new_gnu();
        header.set_path("data/steak.txt").unwrap();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &data[..]).unwrap();

        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_archive_kind() {
        assert_eq!(ArchiveKind::from_path(Path::new("a/b.ZIP")), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_path(Path::new("b.tar.gz")), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_path(Path::new("b.tgz")), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_path(Path::new("b.tar")), Some(ArchiveKind::Tar));
        assert_eq!(ArchiveKind::from_path(Path::new("b.rar")), None);
    }

    #[test]
    fn test_unzip_data_to() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("pizza_steak.zip");
        write_zip(&zip_path);

        let out = dir.path().join("out");
        let summary = unzip_data_to(&zip_path, &out).unwrap();

        assert_eq!(summary.entries, 3);
        assert_eq!(summary.destination, out);
        let content = std::fs::read_to_string(out.join("pizza_steak/train/pizza.txt")).unwrap();
        assert_eq!(content, "pizza");
        assert!(out.join("pizza_steak/readme.txt").is_file());
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("data.tar.gz");
        write_tar_gz(&tar_path);

        let out = dir.path().join("out");
        let summary = extract_archive(&tar_path, &out).unwrap();

        assert_eq!(summary.entries, 1);
        assert_eq!(std::fs::read_to_string(out.join("data/steak.txt")).unwrap(), "steak");
    }

    #[test]
    fn test_missing_and_malformed_archives() {
        let dir = tempfile::tempdir().unwrap();
        assert!(unzip_data_to(dir.path().join("missing.zip"), dir.path()).is_err());

        let bogus = dir.path().join("bogus.zip");
        std::fs::write(&bogus, b"not a zip").unwrap();
        assert!(unzip_data_to(&bogus, dir.path().join("out")).is_err());
    }

    #[test]
    fn test_unsupported_archive() {
        let err = extract_archive("dataset.rar", ".").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HelperError>(),
            Some(HelperError::UnsupportedArchive(_))
        ));
    }
}
