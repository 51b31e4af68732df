//! Folder reader.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docgraph_model::{EntityId, FieldKind, Graph, Scalar, Schema, Value};
use docgraph_xml::{ReadSession, XmlDocument};

use crate::error::{FolderError, Result};
use crate::options::FolderOptions;

/// Reads a graph written by [`FolderWriter`](crate::FolderWriter).
#[derive(Debug, Clone, Default)]
pub struct FolderReader {
    options: FolderOptions,
}

impl FolderReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FolderOptions) -> Self {
        Self { options }
    }

    pub fn read(&self, path: &Path, schema: Arc<Schema>) -> Result<Graph> {
        Ok(self.read_document(path, schema)?.graph)
    }

    /// Read the folder tree below `path`, keeping the identifiers and header.
    ///
    /// Object folders are visited breadth-first. References between documents are
    /// resolved through one session and checked once the whole tree has been read.
    pub fn read_document(&self, path: &Path, schema: Arc<Schema>) -> Result<XmlDocument> {
        let metadata = fs::metadata(path).map_err(FolderError::filesystem("open folder", path))?;
        if !metadata.is_dir() {
            return Err(FolderError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        let mut session = ReadSession::new(schema, self.options.reader.clone());
        let mut folders = VecDeque::from([(path.to_path_buf(), None)]);
        let mut count = 0usize;
        while let Some((dir, parent)) = folders.pop_front() {
            let children = self.read_object(&mut session, &dir, parent)?;
            folders.extend(children);
            count += 1;
        }

        let document = session.finish()?;
        tracing::info!(
            documents = count,
            entities = document.graph.len(),
            "Loaded graph from {}",
            path.display()
        );
        Ok(document)
    }

    /// Read one object folder and return the object folders below it, each with the
    /// field that refers to its entity.
    fn read_object(
        &self,
        session: &mut ReadSession,
        dir: &Path,
        parent: Option<(EntityId, usize)>,
    ) -> Result<Vec<(PathBuf, Option<(EntityId, usize)>)>> {
        let listing = Listing::scan(dir)?;
        let documents: Vec<&PathBuf> = listing
            .files
            .iter()
            .filter(|file| has_extension(file, "xml"))
            .collect();
        let document = match documents.as_slice() {
            [document] => *document,
            [] => {
                return Err(FolderError::MissingDocument {
                    path: dir.to_path_buf(),
                });
            }
            _ => {
                return Err(FolderError::MultipleDocuments {
                    path: dir.to_path_buf(),
                    count: documents.len(),
                });
            }
        };

        let file = File::open(document).map_err(FolderError::filesystem("open", document))?;
        let entity = session.read_document(BufReader::new(file))?;
        if let Some((owner, slot)) = parent
            && !refers_to(session.graph(), owner, slot, entity)
        {
            tracing::debug!(
                "attaching unreferenced document {}",
                dir.display()
            );
            session.attach(owner, slot, entity)?;
        }

        for file in &listing.files {
            self.read_leaf(session, entity, file)?;
        }

        let schema = Arc::clone(session.graph().schema());
        let entity_type = schema.entity_type(session.graph().type_of(entity));
        let mut children = Vec::new();
        for sub in &listing.dirs {
            let field = file_name(sub)
                .and_then(|name| entity_type.find_field(name))
                .and_then(|slot| entity_type.field_at(slot).map(|field| (slot, &field.kind)));
            let slot = match field {
                Some((slot, FieldKind::Entity(_))) => {
                    children.push((sub.clone(), Some((entity, slot))));
                    continue;
                }
                Some((slot, FieldKind::EntityList(_))) => slot,
                _ => {
                    tracing::warn!("ignoring folder without entity field: {}", sub.display());
                    continue;
                }
            };

            for entry in Listing::scan(sub)?.dirs {
                if contains_document(&entry)? {
                    children.push((entry, Some((entity, slot))));
                } else {
                    for grouped in Listing::scan(&entry)?.dirs {
                        children.push((grouped, Some((entity, slot))));
                    }
                }
            }
        }
        Ok(children)
    }

    /// Set a field from a sibling `.txt`, `.html` or `.bin` file.
    fn read_leaf(&self, session: &mut ReadSession, entity: EntityId, file: &Path) -> Result<()> {
        let binary = if has_extension(file, "bin") {
            true
        } else if has_extension(file, "txt") || has_extension(file, "html") {
            false
        } else {
            return Ok(());
        };
        let graph = session.graph();
        let slot = file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| {
                graph
                    .schema()
                    .entity_type(graph.type_of(entity))
                    .find_field(stem)
            });
        let Some(slot) = slot else {
            tracing::warn!("ignoring file without matching field: {}", file.display());
            return Ok(());
        };

        let bytes = fs::read(file).map_err(FolderError::filesystem("read", file))?;
        let scalar = if binary {
            Scalar::Binary(bytes)
        } else {
            let text = String::from_utf8(bytes).map_err(|e| {
                FolderError::filesystem("read", file)(io::Error::new(io::ErrorKind::InvalidData, e))
            })?;
            Scalar::String(text)
        };

        match session.graph_mut().set_at(entity, slot, Value::Scalar(scalar)) {
            Ok(()) => Ok(()),
            Err(err) if err.is_mismatch() && !self.options.reader.strict => {
                tracing::warn!("skipping {}: {err}", file.display());
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Read a graph from a folder with default options.
pub fn read_folder(path: &Path, schema: Arc<Schema>) -> Result<Graph> {
    FolderReader::new().read(path, schema)
}

pub fn read_folder_with_options(path: &Path, schema: Arc<Schema>, options: &FolderOptions) -> Result<Graph> {
    FolderReader::with_options(options.clone()).read(path, schema)
}

/// Files and subdirectories of a directory, sorted by name.
struct Listing {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl Listing {
    fn scan(dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir).map_err(FolderError::filesystem("read directory", dir))?;
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(FolderError::filesystem("read directory", dir))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(FolderError::filesystem("read metadata", &path))?;
            if file_type.is_dir() {
                dirs.push(path);
            } else {
                files.push(path);
            }
        }
        files.sort();
        dirs.sort();
        Ok(Self { files, dirs })
    }
}

/// Whether the field already holds `entity`, through a reference in the owner's document.
fn refers_to(graph: &Graph, owner: EntityId, slot: usize, entity: EntityId) -> bool {
    match graph.value_at(owner, slot) {
        Some(Value::Entity(current)) => *current == entity,
        Some(Value::Entities(members)) => members.contains(&entity),
        _ => false,
    }
}

fn contains_document(dir: &Path) -> Result<bool> {
    Ok(Listing::scan(dir)?
        .files
        .iter()
        .any(|file| has_extension(file, "xml")))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.xml", "a.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        for name in ["z", "m"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let listing = Listing::scan(dir.path()).unwrap();
        let names = |paths: &[PathBuf]| -> Vec<String> {
            paths.iter().map(|p| file_name(p).unwrap().to_string()).collect()
        };
        assert_eq!(names(&listing.files), ["a.txt", "b.xml"]);
        assert_eq!(names(&listing.dirs), ["m", "z"]);
        assert!(contains_document(dir.path()).unwrap());
        assert!(!contains_document(&dir.path().join("m")).unwrap());
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("a/Doc.XML"), "xml"));
        assert!(!has_extension(Path::new("a/Doc.xml.tmp"), "xml"));
        assert!(!has_extension(Path::new("a/xml"), "xml"));
    }
}
