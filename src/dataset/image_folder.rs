//! クラス別ディレクトリ構成の画像データセット
//!
//! `root/<class_name>/<image>` の構成を前提に、画像パスとクラスIDの組を保持します。

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

/// 画像ファイルとして扱う拡張子
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// 画像データセット（パスのリストのみ保持）
#[derive(Debug, Clone)]
pub struct ImageFolder {
    samples: Vec<(PathBuf, usize)>, // (画像パス, クラスID)
    class_names: Vec<String>,
}

pub(crate) fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

impl ImageFolder {
    /// ディレクトリから読み込む
    ///
    /// 直下のサブディレクトリ名をクラス名とし、名前順にクラスIDを割り当てます。
    pub fn from_directory<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();

        let mut class_dirs = Vec::new();
        for entry in std::fs::read_dir(root)
            .with_context(|| format!("Failed to read dataset directory: {:?}", root))?
        {
            let path = entry?.path();
            if path.is_dir() {
                class_dirs.push(path);
            }
        }
        class_dirs.sort();

        let mut samples = Vec::new();
        let mut class_names = Vec::with_capacity(class_dirs.len());

        for (class_id, class_dir) in class_dirs.iter().enumerate() {
            let class_name = class_dir
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow::anyhow!("Invalid directory name: {:?}", class_dir))?
                .to_string();
            class_names.push(class_name);

            let mut images = Vec::new();
            for entry in std::fs::read_dir(class_dir)? {
                let path = entry?.path();
                if path.is_file() && is_image_file(&path) {
                    images.push(path);
                }
            }
            images.sort();
            samples.extend(images.into_iter().map(|p| (p, class_id)));
        }

        if samples.is_empty() {
            anyhow::bail!("No image samples found in {}", root.display());
        }

        log::info!(
            "Loaded {} samples from {} classes",
            samples.len(),
            class_names.len()
        );

        Ok(Self {
            samples,
            class_names,
        })
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn samples(&self) -> &[(PathBuf, usize)] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// クラスごとのサンプル数（クラスID順）
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.class_names.len()];
        for (_, class_id) in &self.samples {
            counts[*class_id] += 1;
        }
        counts
    }

    /// データセットを学習用と検証用に分割
    ///
    /// 同じ`seed`なら同じ分割になります。
    pub fn split(self, train_ratio: f32, seed: u64) -> (Self, Self) {
        let mut samples = self.samples;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        samples.shuffle(&mut rng);

        let ratio = train_ratio.clamp(0.0, 1.0);
        let train_len = (samples.len() as f32 * ratio) as usize;
        let val_samples = samples.split_off(train_len);

        let train = Self {
            samples,
            class_names: self.class_names.clone(),
        };
        let val = Self {
            samples: val_samples,
            class_names: self.class_names,
        };
        (train, val)
    }
}
