use std::path::{Path, PathBuf};

use bcf_core::document::Project;
use thiserror::Error;

pub mod archive;
pub mod builders;
pub mod decode;
pub mod loader;
pub mod notice;
pub mod record;
pub mod resolve;
pub mod validator;

pub use archive::ExtractedArchive;
pub use decode::DecodeError;
pub use loader::{BcfFacade, LoadStage, LoadedProject};
pub use notice::{LoadNotice, NoticeKind};
pub use record::{Record, Value};
pub use validator::{Diagnostic, SchemaValidator, Validated, XmlSchemaValidator};

/// 结构性错误：出现时整个加载中止，不返回部分结果。
#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open archive {path:?}: {message}")]
    Archive { path: PathBuf, message: String },
    #[error("archive {path:?} has no bcf.version file")]
    MissingVersion { path: PathBuf },
    #[error("BCF version {version} is not supported (supported: {supported:?})")]
    UnsupportedVersion {
        version: String,
        supported: Vec<String>,
    },
    #[error("invalid document {path:?}: {message}")]
    InvalidDocument { path: PathBuf, message: String },
    #[error("failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<LoadedProject, IoError>;
}

/// 写出端边界：只有非 `Original` 状态的节点需要写回。
pub trait DocumentSaver {
    fn save(&self, project: &Project, path: &Path) -> Result<(), IoError>;
}
