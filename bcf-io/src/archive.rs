//! 归档解压。解压目录由 [`ExtractedArchive`] 持有，随其析构一起删除。

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::IoError;

/// 已解压到临时目录的 BCF 归档。
///
/// `topic_dirs` 按各议题目录在归档中首次出现的顺序排列。
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
    source: PathBuf,
    topic_dirs: Vec<String>,
}

impl ExtractedArchive {
    /// 解压 `archive` 到 `root`（缺省为系统临时目录）下的新目录。
    pub fn extract(archive: &Path, root: Option<&Path>) -> Result<Self, IoError> {
        let file = File::open(archive).map_err(|source| IoError::ReadError {
            path: archive.to_path_buf(),
            source,
        })?;
        let mut zip = ZipArchive::new(file).map_err(|err| IoError::Archive {
            path: archive.to_path_buf(),
            message: err.to_string(),
        })?;

        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root).map_err(|source| IoError::WriteError {
                    path: root.to_path_buf(),
                    source,
                })?;
                tempfile::Builder::new().prefix("bcf-").tempdir_in(root)
            }
            None => tempfile::Builder::new().prefix("bcf-").tempdir(),
        }
        .map_err(|source| IoError::WriteError {
            path: root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
            source,
        })?;

        let mut topic_dirs: Vec<String> = Vec::new();
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).map_err(|err| IoError::Archive {
                path: archive.to_path_buf(),
                message: err.to_string(),
            })?;
            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                warn!(entry = entry.name(), "跳过越界的归档条目");
                continue;
            };

            if let Some(topic) = topic_component(&relative, entry.is_dir()) {
                if !topic_dirs.iter().any(|known| *known == topic) {
                    topic_dirs.push(topic);
                }
            }

            let target = dir.path().join(&relative);
            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(|source| IoError::WriteError {
                    path: target.clone(),
                    source,
                })?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|source| IoError::WriteError {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            let mut out = File::create(&target).map_err(|source| IoError::WriteError {
                path: target.clone(),
                source,
            })?;
            io::copy(&mut entry, &mut out).map_err(|source| IoError::WriteError {
                path: target.clone(),
                source,
            })?;
        }

        debug!(
            archive = %archive.display(),
            dir = %dir.path().display(),
            topics = topic_dirs.len(),
            "归档已解压"
        );
        Ok(Self {
            dir,
            source: archive.to_path_buf(),
            topic_dirs,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[inline]
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn topic_dirs(&self) -> &[String] {
        &self.topic_dirs
    }

    /// 归档根目录下的文件；不存在时返回 `None`。
    pub fn file(&self, name: &str) -> Option<PathBuf> {
        let path = self.dir.path().join(name);
        path.is_file().then_some(path)
    }

    pub fn topic_path(&self, topic: &str) -> PathBuf {
        self.dir.path().join(topic)
    }

    /// 议题目录内由标记文件引用的文件。定位符必须是相对路径且不能向上越出议题目录，
    /// 否则返回 `None`；文件是否存在由调用方判断。
    pub fn topic_file(&self, topic: &str, locator: &str) -> Option<PathBuf> {
        let locator = Path::new(locator);
        let contained = locator.components().all(|part| {
            matches!(part, Component::Normal(_) | Component::CurDir)
        });
        (contained && locator.components().next().is_some())
            .then(|| self.topic_path(topic).join(locator))
    }
}

/// 条目所属的议题目录名：路径至少两段（`<topic>/<file>`），或本身就是顶层目录条目。
fn topic_component(relative: &Path, is_dir: bool) -> Option<String> {
    let mut components = relative.components();
    let first = components.next()?.as_os_str().to_str()?.to_string();
    if components.next().is_some() || is_dir {
        Some(first)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).expect("create zip");
        let mut writer = zip::ZipWriter::new(file);
        for (name, body) in entries {
            if name.ends_with('/') {
                writer
                    .add_directory(*name, FileOptions::default())
                    .expect("add dir");
            } else {
                writer
                    .start_file(*name, FileOptions::default())
                    .expect("start file");
                writer.write_all(body.as_bytes()).expect("write entry");
            }
        }
        writer.finish().expect("finish zip");
    }

    #[test]
    fn topics_follow_archive_order() {
        let scratch = tempfile::tempdir().expect("scratch dir");
        let archive = scratch.path().join("sample.bcfzip");
        write_zip(
            &archive,
            &[
                ("bcf.version", "<Version/>"),
                ("zeta/markup.bcf", "<Markup/>"),
                ("alpha/", ""),
                ("alpha/markup.bcf", "<Markup/>"),
                ("zeta/viewpoint.bcfv", "<VisualizationInfo/>"),
            ],
        );

        let extracted = ExtractedArchive::extract(&archive, Some(scratch.path())).expect("extract");
        assert_eq!(extracted.topic_dirs(), ["zeta", "alpha"]);
        assert!(extracted.file("bcf.version").is_some());
        assert!(extracted.file("project.bcfp").is_none());
        assert!(extracted.topic_path("zeta").join("viewpoint.bcfv").is_file());
        assert!(extracted.path().starts_with(scratch.path()));
    }

    #[test]
    fn topic_files_stay_inside_the_topic() {
        let scratch = tempfile::tempdir().expect("scratch dir");
        let archive = scratch.path().join("sample.bcfzip");
        write_zip(&archive, &[("alpha/markup.bcf", "<Markup/>")]);
        let extracted = ExtractedArchive::extract(&archive, Some(scratch.path())).expect("extract");

        let inside = extracted.topic_file("alpha", "./viewpoint.bcfv").expect("relative locator");
        assert!(inside.starts_with(extracted.topic_path("alpha")));
        assert!(extracted.topic_file("alpha", "../beta/viewpoint.bcfv").is_none());
        assert!(extracted.topic_file("alpha", "nested/../../x.bcfv").is_none());
        assert!(extracted.topic_file("alpha", "/tmp/viewpoint.bcfv").is_none());
        assert!(extracted.topic_file("alpha", "").is_none());
    }

    #[test]
    fn extraction_dir_is_removed_on_drop() {
        let scratch = tempfile::tempdir().expect("scratch dir");
        let archive = scratch.path().join("sample.bcfzip");
        write_zip(&archive, &[("bcf.version", "<Version/>")]);

        let extracted = ExtractedArchive::extract(&archive, Some(scratch.path())).expect("extract");
        let dir = extracted.path().to_path_buf();
        assert!(dir.is_dir());
        drop(extracted);
        assert!(!dir.exists());
    }

    #[test]
    fn non_zip_input_is_an_archive_error() {
        let scratch = tempfile::tempdir().expect("scratch dir");
        let bogus = scratch.path().join("bogus.bcfzip");
        fs::write(&bogus, b"not a zip").expect("write bogus");
        let err = ExtractedArchive::extract(&bogus, None).unwrap_err();
        assert!(matches!(err, IoError::Archive { .. }));
    }
}
