use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// ログレベル
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// adb 設定
    #[serde(default)]
    pub adb: AdbConfig,
    /// ログキャプチャ設定
    #[serde(default)]
    pub capture: CaptureConfig,
    /// キーワードビュー設定
    #[serde(default)]
    pub views: ViewConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            adb: AdbConfig::default(),
            capture: CaptureConfig::default(),
            views: ViewConfig::default(),
        }
    }
}

/// adb 実行設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdbConfig {
    /// adb 実行ファイル（PATH 上の名前または絶対パス）
    #[serde(default = "default_adb_program")]
    pub program: PathBuf,
    /// `adb devices` のタイムアウト（秒）
    #[serde(default = "default_devices_timeout")]
    pub devices_timeout_secs: u64,
}

fn default_adb_program() -> PathBuf {
    PathBuf::from("adb")
}

fn default_devices_timeout() -> u64 {
    5
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            program: default_adb_program(),
            devices_timeout_secs: default_devices_timeout(),
        }
    }
}

/// ログキャプチャ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// 常駐キャプチャで保持する最大行数
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// 単発キャプチャの締め切り（ミリ秒）
    #[serde(default = "default_bounded_timeout")]
    pub bounded_timeout_ms: u64,
    /// バッファに最初の行が入るまで待つ上限（ミリ秒）
    #[serde(default = "default_wait_for_data")]
    pub wait_for_data_ms: u64,
    /// 単発キャプチャで `logcat -d`（ダンプして終了）を使うか
    #[serde(default = "default_dump_on_bounded")]
    pub dump_on_bounded: bool,
    /// SDK のログタグ（プロセス特定と常駐キャプチャのフィルタに使用）
    #[serde(default = "default_sdk_tag")]
    pub sdk_tag: String,
}

fn default_buffer_capacity() -> usize {
    10_000
}

fn default_bounded_timeout() -> u64 {
    2_000
}

fn default_wait_for_data() -> u64 {
    1_500
}

fn default_dump_on_bounded() -> bool {
    true
}

fn default_sdk_tag() -> String {
    "AppsFlyer".to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            bounded_timeout_ms: default_bounded_timeout(),
            wait_for_data_ms: default_wait_for_data(),
            dump_on_bounded: default_dump_on_bounded(),
            sdk_tag: default_sdk_tag(),
        }
    }
}

/// キーワードビュー設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// ビューごとに保持する最新マッチ数
    #[serde(default = "default_match_cap")]
    pub match_cap: usize,
    /// 生ログ抜粋で返す最大行数
    #[serde(default = "default_record_line_count")]
    pub record_line_count: usize,
    /// エラービューのキーワード
    #[serde(default = "default_error_tokens")]
    pub error_tokens: Vec<String>,
}

fn default_match_cap() -> usize {
    700
}

fn default_record_line_count() -> usize {
    1_000
}

fn default_error_tokens() -> Vec<String> {
    ["ERROR", "Exception", "FAILURE", "E/"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            match_cap: default_match_cap(),
            record_line_count: default_record_line_count(),
            error_tokens: default_error_tokens(),
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み（存在しない場合はデフォルト）
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// 指定パスの設定ファイルを読み込み
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
        Ok(config)
    }

    /// 設定ファイルパスを取得
    pub fn config_path() -> Result<PathBuf> {
        // ~/.config/logscope/config.toml を使用
        let base_dirs = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))?;
        Ok(base_dirs.home_dir().join(".config/logscope/config.toml"))
    }
}
