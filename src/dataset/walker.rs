//! 画像分類データセットのディレクトリ走査

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 1ディレクトリ分の集計
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirSummary {
    pub path: PathBuf,
    /// 直下のサブディレクトリ数
    pub num_dirs: usize,
    /// 直下のファイル数
    pub num_files: usize,
}

impl std::fmt::Display for DirSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "There are {} directories and {} images in '{}'",
            self.num_dirs,
            self.num_files,
            self.path.display()
        )
    }
}

/// ディレクトリを上から順に走査し、各ディレクトリの直下の件数を表示する
///
/// 表示と同じ内容を訪問順に返します。
pub fn walk_through_dir<P: AsRef<Path>>(dir_path: P) -> Result<Vec<DirSummary>> {
    let summaries = summarize_dir(dir_path)?;
    for summary in &summaries {
        println!("{}", summary);
    }
    Ok(summaries)
}

/// 表示せずに集計のみ行う
pub fn summarize_dir<P: AsRef<Path>>(dir_path: P) -> Result<Vec<DirSummary>> {
    let root = dir_path.as_ref();
    let mut summaries = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk directory: {:?}", root))?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let mut num_dirs = 0;
        let mut num_files = 0;
        for child in std::fs::read_dir(entry.path())
            .with_context(|| format!("Failed to read directory: {:?}", entry.path()))?
        {
            let child = child?;
            // ディレクトリへのシンボリックリンクもディレクトリとして数える
            if child.path().is_dir() {
                num_dirs += 1;
            } else {
                num_files += 1;
            }
        }

        summaries.push(DirSummary {
            path: entry.path().to_path_buf(),
            num_dirs,
            num_files,
        });
    }

    log::debug!("Walked {} directories under {}", summaries.len(), root.display());
    Ok(summaries)
}
