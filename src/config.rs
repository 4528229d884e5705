//! ヘルパー設定管理モジュール
//!
//! 画像前処理やグラフ描画の既定値をJSON形式で保存・読み込みします。

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ml::DEFAULT_IMAGE_SIZE;

/// 画像前処理設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageSettings {
    /// リサイズ後の一辺のピクセル数（正方形）
    pub img_shape: u32,
    /// 画素値を0〜1に縮尺するか
    pub scale: bool,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            img_shape: DEFAULT_IMAGE_SIZE,
            scale: true,
        }
    }
}

/// グラフ描画設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlotSettings {
    /// 画像幅（ピクセル）
    pub width: u32,
    /// 画像高さ（ピクセル）
    pub height: u32,
    /// 混同行列のセル・目盛りの文字サイズ
    pub text_size: u32,
    /// グラフの出力ディレクトリ
    pub output_dir: String,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1000,
            text_size: 15,
            output_dir: "plots".to_string(),
        }
    }
}

/// 実験ログ設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentSettings {
    /// ログのルートディレクトリ
    pub log_root: String,
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        Self {
            log_root: "logs".to_string(),
        }
    }
}

/// ヘルパー全体の設定
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HelperConfig {
    #[serde(default)]
    pub image: ImageSettings,
    #[serde(default)]
    pub plot: PlotSettings,
    #[serde(default)]
    pub experiment: ExperimentSettings,
}

impl HelperConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("vision_helpers.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: HelperConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// デフォルトパスから設定を読み込む、存在しない場合はデフォルト設定を返す
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(Self::default_path())
    }

    /// 指定パスから設定を読み込む、失敗した場合はデフォルト設定を返す
    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded config file: {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Failed to load config file ({}): {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create parent directory: {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// 設定情報を表示
    pub fn display(&self) {
        println!("=== Helper settings ===");
        println!("Image size: {}x{}", self.image.img_shape, self.image.img_shape);
        println!("Scale to [0, 1]: {}", self.image.scale);
        println!("Plot size: {}x{}", self.plot.width, self.plot.height);
        println!("Text size: {}", self.plot.text_size);
        println!("Plot output dir: {}", self.plot.output_dir);
        println!("Experiment log root: {}", self.experiment.log_root);
        println!("=======================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HelperConfig::default();
        assert_eq!(config.image.img_shape, 224);
        assert!(config.image.scale);
        assert_eq!(config.plot.text_size, 15);
        assert_eq!(config.experiment.log_root, "logs");
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut config = HelperConfig::default();
        config.image.img_shape = 128;
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: HelperConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: HelperConfig =
            serde_json::from_str(r#"{"image": {"img_shape": 64, "scale": false}}"#).unwrap();
        assert_eq!(config.image.img_shape, 64);
        assert!(!config.image.scale);
        assert_eq!(config.plot, PlotSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = HelperConfig::default();
        config.plot.output_dir = "out".to_string();
        config.save(&path).unwrap();

        let loaded = HelperConfig::load(&path).unwrap();
        assert_eq!(loaded.plot.output_dir, "out");
    }

    #[test]
    fn test_load_or_default_on_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(HelperConfig::load_or_default_from(&path), HelperConfig::default());
    }
}
