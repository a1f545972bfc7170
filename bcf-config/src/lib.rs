use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV: &str = "BCF_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 自动发现配置文件：优先读取环境变量 `BCF_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 加载流程的显式配置，由调用方传入加载入口。
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// 允许读取的 BCF 版本号，完全匹配 `bcf.version` 中的 `VersionId`。
    #[serde(default = "LoaderConfig::default_supported_versions")]
    pub supported_versions: Vec<String>,
    /// XSD 所在目录；缺省时只使用内建的 schema 名称。
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,
    /// 解压目录的父目录；缺省时使用系统临时目录。
    #[serde(default)]
    pub extraction_root: Option<PathBuf>,
}

impl LoaderConfig {
    fn default_supported_versions() -> Vec<String> {
        vec!["2.1".to_string()]
    }

    pub fn supports(&self, version: &str) -> bool {
        self.supported_versions.iter().any(|v| v == version)
    }

    /// 给定 schema 文件名，拼出完整路径。
    pub fn schema_path(&self, file_name: &str) -> PathBuf {
        match &self.schema_dir {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            supported_versions: Self::default_supported_versions(),
            schema_dir: None,
            extraction_root: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        if env::var_os(CONFIG_ENV).is_some() {
            return;
        }
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.loader.supported_versions, vec!["2.1".to_string()]);
        assert!(cfg.loader.schema_dir.is_none());
        assert!(cfg.loader.extraction_root.is_none());
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [loader]
            supported_versions = ["2.0", "2.1"]
            schema_dir = "../schemas"
            extraction_root = "/tmp/bcf"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.loader.supports("2.0"));
        assert!(cfg.loader.supports("2.1"));
        assert!(!cfg.loader.supports("3.0"));
        assert_eq!(
            cfg.loader.schema_path("markup.xsd"),
            PathBuf::from("../schemas").join("markup.xsd")
        );
        assert_eq!(
            cfg.loader.extraction_root.as_deref(),
            Some(Path::new("/tmp/bcf"))
        );
    }

    #[test]
    fn partial_loader_section_keeps_defaults() {
        let cfg = AppConfig::from_toml("[loader]\nschema_dir = \"xsd\"\n").expect("parse");
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.loader.supports("2.1"));
        assert_eq!(cfg.loader.schema_path("version.xsd"), PathBuf::from("xsd/version.xsd"));
    }

    #[test]
    fn schema_path_without_dir_is_bare_name() {
        let cfg = LoaderConfig::default();
        assert_eq!(cfg.schema_path("visinfo.xsd"), PathBuf::from("visinfo.xsd"));
    }

    #[test]
    fn parse_error_reports_path() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[loader\nbroken").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
