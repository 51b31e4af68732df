//! Folder writer.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use docgraph_model::Graph;
use docgraph_xml::{WriteSession, XmlError};

use crate::error::{FolderError, Result};
use crate::options::FolderOptions;
use crate::plan::plan;

/// Writes a graph as a tree of folders, one document per anchor.
#[derive(Debug, Clone, Default)]
pub struct FolderWriter {
    options: FolderOptions,
}

impl FolderWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FolderOptions) -> Self {
        Self { options }
    }

    /// Write `graph` below `path`.
    ///
    /// The directory is created when missing and must be empty otherwise. All documents
    /// share one identity store: a discovery pass over every document runs before any
    /// of them is written, so references between documents carry identifiers.
    pub fn write(&self, path: &Path, graph: &Graph) -> Result<()> {
        let root = graph.root().ok_or(XmlError::NoRoot)?;
        prepare_target(path)?;

        let layout = plan(graph, root, &self.options);
        let mut session = WriteSession::new(graph, self.options.writer.clone());
        for document in &layout.documents {
            session.pin(document.entity);
            for leaf in &document.leaves {
                session.skip_field(document.entity, leaf.slot);
            }
        }

        session.begin_discovery();
        for document in &layout.documents {
            session.write_document(io::sink(), document.entity)?;
        }

        session.begin_write();
        for document in &layout.documents {
            let dir = path.join(&document.dir);
            fs::create_dir_all(&dir).map_err(FolderError::filesystem("create directory", &dir))?;

            let mut buffer = Vec::new();
            session.write_document(&mut buffer, document.entity)?;
            write_atomic(&dir.join(document.file_name()), &buffer)?;

            for leaf in &document.leaves {
                write_atomic(&dir.join(&leaf.file_name), leaf.contents)?;
            }
        }

        tracing::info!(
            documents = layout.documents.len(),
            "Saved graph to {}",
            path.display()
        );
        Ok(())
    }
}

/// Write a graph to a folder with default options.
pub fn write_folder(path: &Path, graph: &Graph) -> Result<()> {
    FolderWriter::new().write(path, graph)
}

pub fn write_folder_with_options(path: &Path, graph: &Graph, options: &FolderOptions) -> Result<()> {
    FolderWriter::with_options(options.clone()).write(path, graph)
}

fn prepare_target(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(metadata) if !metadata.is_dir() => Err(FolderError::NotADirectory {
            path: path.to_path_buf(),
        }),
        Ok(_) => {
            let mut entries =
                fs::read_dir(path).map_err(FolderError::filesystem("read directory", path))?;
            if entries.next().is_some() {
                return Err(FolderError::InvalidTarget {
                    path: path.to_path_buf(),
                    reason: "directory is not empty".to_string(),
                });
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path).map_err(FolderError::filesystem("create directory", path))
        }
        Err(e) => Err(FolderError::filesystem("read metadata", path)(e)),
    }
}

/// Write to a temp file first, then rename it over the target.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    let mut file =
        File::create(&temp_path).map_err(FolderError::filesystem("create", &temp_path))?;
    file.write_all(contents)
        .map_err(FolderError::filesystem("write", &temp_path))?;
    file.sync_all()
        .map_err(FolderError::filesystem("sync", &temp_path))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|source| FolderError::AtomicWriteFailed {
        temp_path: temp_path.clone(),
        target_path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("wrote {}", path.display());
    Ok(())
}
