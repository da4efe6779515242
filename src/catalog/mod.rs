use ahash::AHashMap;
use chumsky::{prelude::*, text::ascii::ident};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::file::{DbFile, FileCatalog, FileError, FileId, FileResult, PageCategory, PageId, PagedFile};
use crate::record::{RecordError, TupleDesc, Type};

/// Name of the metadata file written into the data directory
pub const CATALOG_FILE: &str = "catalog.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Name {0} is already in use")]
    TableExists(String),

    #[error("Invalid catalog entry on line {line_no} ({reason}): {line}")]
    InvalidSchemaLine {
        line_no: usize,
        line: String,
        reason: String,
    },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// A storage file registered in the catalog, tagged by kind.
///
/// Page ids are checked against the kind once here, so the buffer pool can
/// treat every file the same way.
#[derive(Debug)]
pub enum StorageFile {
    Heap {
        id: FileId,
        file: PagedFile,
    },
    Index {
        id: FileId,
        file: PagedFile,
        bucket_count: usize,
    },
}

impl StorageFile {
    pub fn path(&self) -> &Path {
        match self {
            StorageFile::Heap { file, .. } | StorageFile::Index { file, .. } => file.path(),
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, StorageFile::Index { .. })
    }

    fn paged_file(&mut self) -> &mut PagedFile {
        match self {
            StorageFile::Heap { file, .. } | StorageFile::Index { file, .. } => file,
        }
    }

    fn check_page(&self, page: PageId) -> FileResult<()> {
        if page.file_id != self.id() {
            return Err(FileError::UnknownFile(page.file_id));
        }

        let expected = match self {
            StorageFile::Heap { .. } => PageCategory::Heap,
            StorageFile::Index { bucket_count, .. } if page.page_no < *bucket_count => {
                PageCategory::Bucket
            }
            StorageFile::Index { .. } => PageCategory::Overflow,
        };

        if page.category != expected {
            return Err(FileError::WrongCategory {
                page,
                found: page.category,
                expected: match expected {
                    PageCategory::Heap => "heap",
                    PageCategory::Bucket => "bucket",
                    PageCategory::Overflow => "overflow",
                },
            });
        }
        Ok(())
    }
}

impl DbFile for StorageFile {
    fn id(&self) -> FileId {
        match self {
            StorageFile::Heap { id, .. } | StorageFile::Index { id, .. } => *id,
        }
    }

    fn read_page(&mut self, page: PageId, buffer: &mut [u8]) -> FileResult<()> {
        self.check_page(page)?;
        self.paged_file().read_page(page, buffer)
    }

    fn write_page(&mut self, page: PageId, data: &[u8]) -> FileResult<()> {
        self.check_page(page)?;
        self.paged_file().write_page(page, data)
    }

    fn page_count(&self) -> FileResult<usize> {
        match self {
            StorageFile::Heap { file, .. } | StorageFile::Index { file, .. } => file.page_count(),
        }
    }

    fn sync(&mut self) -> FileResult<()> {
        self.paged_file().sync()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub id: FileId,
    pub path: PathBuf,
    pub desc: Arc<TupleDesc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub id: FileId,
    pub path: PathBuf,
    /// Heap file the index is built on
    pub table_id: FileId,
    pub key_field: usize,
    pub key_type: Type,
    pub bucket_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogMetadata {
    next_id: u32,
    tables: Vec<TableDef>,
    indexes: Vec<IndexDef>,
}

/// Registry of heap tables and hash indexes, and owner of their open files.
///
/// Tables and indexes share one name space and one id sequence.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: AHashMap<FileId, TableDef>,
    indexes: AHashMap<FileId, IndexDef>,
    names: AHashMap<String, FileId>,
    files: AHashMap<FileId, StorageFile>,
    next_id: u32,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a heap table backed by `path`, creating the file if needed
    pub fn add_heap<P: AsRef<Path>>(
        &mut self,
        name: &str,
        path: P,
        desc: TupleDesc,
    ) -> CatalogResult<FileId> {
        self.check_name_free(name)?;
        let file = PagedFile::open_or_create(path.as_ref())?;
        let id = self.allocate_id();

        self.files.insert(id, StorageFile::Heap { id, file });
        self.names.insert(name.to_string(), id);
        info!("added table {} {} as {}", name, desc, id);
        self.tables.insert(
            id,
            TableDef {
                name: name.to_string(),
                id,
                path: path.as_ref().to_path_buf(),
                desc: Arc::new(desc),
            },
        );
        Ok(id)
    }

    /// Register a hash index on field `key_field` of `table_id`, creating an
    /// empty index file at `path`
    pub fn add_index<P: AsRef<Path>>(
        &mut self,
        name: &str,
        path: P,
        table_id: FileId,
        key_field: usize,
        bucket_count: usize,
    ) -> CatalogResult<FileId> {
        self.check_name_free(name)?;
        let key_type = self.table_def(table_id)?.desc.field_type(key_field)?;
        let file = PagedFile::create(path.as_ref())?;
        let id = self.allocate_id();
        let bucket_count = bucket_count.max(1);

        self.files.insert(
            id,
            StorageFile::Index {
                id,
                file,
                bucket_count,
            },
        );
        self.names.insert(name.to_string(), id);
        info!("added index {} on {} field {} as {}", name, table_id, key_field, id);
        self.indexes.insert(
            id,
            IndexDef {
                name: name.to_string(),
                id,
                path: path.as_ref().to_path_buf(),
                table_id,
                key_field,
                key_type,
                bucket_count,
            },
        );
        Ok(id)
    }

    /// Id of the table called `name`
    pub fn table_id(&self, name: &str) -> CatalogResult<FileId> {
        self.names
            .get(name)
            .copied()
            .filter(|id| self.tables.contains_key(id))
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    /// Definition of the index called `name`, if there is one
    pub fn index_by_name(&self, name: &str) -> Option<&IndexDef> {
        self.names.get(name).and_then(|id| self.indexes.get(id))
    }

    pub fn schema_for(&self, id: FileId) -> CatalogResult<Arc<TupleDesc>> {
        Ok(self.table_def(id)?.desc.clone())
    }

    pub fn table_def(&self, id: FileId) -> CatalogResult<&TableDef> {
        self.tables
            .get(&id)
            .ok_or(CatalogError::File(FileError::UnknownFile(id)))
    }

    pub fn index_def(&self, id: FileId) -> CatalogResult<&IndexDef> {
        self.indexes
            .get(&id)
            .ok_or(CatalogError::File(FileError::UnknownFile(id)))
    }

    /// Indexes built on `table_id`, in creation order
    pub fn indexes_on(&self, table_id: FileId) -> Vec<&IndexDef> {
        let mut defs: Vec<&IndexDef> = self
            .indexes
            .values()
            .filter(|def| def.table_id == table_id)
            .collect();
        defs.sort_by_key(|def| def.id);
        defs
    }

    /// Table names in alphabetical order
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.values().map(|def| def.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Index definitions in creation order
    pub fn index_defs(&self) -> Vec<&IndexDef> {
        let mut defs: Vec<&IndexDef> = self.indexes.values().collect();
        defs.sort_by_key(|def| def.id);
        defs
    }

    /// Load table definitions from a text schema, one table per line:
    /// `name (field type, field type, ...)` with types `int` or `string`.
    /// Each table is stored in `<data_dir>/<name>.dat`.
    pub fn load_schema<P: AsRef<Path>, D: AsRef<Path>>(
        &mut self,
        path: P,
        data_dir: D,
    ) -> CatalogResult<Vec<FileId>> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut ids = Vec::new();

        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (name, desc) =
                parse_schema_line(line).map_err(|reason| CatalogError::InvalidSchemaLine {
                    line_no: i + 1,
                    line: line.to_string(),
                    reason,
                })?;
            let file_path = data_dir.as_ref().join(format!("{}.dat", name));
            ids.push(self.add_heap(&name, file_path, desc)?);
        }

        info!(
            "loaded {} tables from {}",
            ids.len(),
            path.as_ref().display()
        );
        Ok(ids)
    }

    /// Write table and index definitions to `<dir>/catalog.json`
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> CatalogResult<()> {
        let mut tables: Vec<TableDef> = self.tables.values().cloned().collect();
        tables.sort_by_key(|def| def.id);
        let metadata = CatalogMetadata {
            next_id: self.next_id,
            tables,
            indexes: self.index_defs().into_iter().cloned().collect(),
        };

        fs::create_dir_all(dir.as_ref())?;
        let content = serde_json::to_string_pretty(&metadata)?;
        fs::write(dir.as_ref().join(CATALOG_FILE), content)?;
        Ok(())
    }

    /// Read `<dir>/catalog.json` and reopen every file it names
    pub fn load<P: AsRef<Path>>(dir: P) -> CatalogResult<Self> {
        let content = fs::read_to_string(dir.as_ref().join(CATALOG_FILE))?;
        let metadata: CatalogMetadata = serde_json::from_str(&content)?;
        let mut catalog = Self {
            next_id: metadata.next_id,
            ..Self::default()
        };

        for def in metadata.tables {
            let file = PagedFile::open(&def.path)?;
            catalog.files.insert(def.id, StorageFile::Heap { id: def.id, file });
            catalog.names.insert(def.name.clone(), def.id);
            catalog.tables.insert(def.id, def);
        }

        for def in metadata.indexes {
            let file = PagedFile::open(&def.path)?;
            catalog.files.insert(
                def.id,
                StorageFile::Index {
                    id: def.id,
                    file,
                    bucket_count: def.bucket_count,
                },
            );
            catalog.names.insert(def.name.clone(), def.id);
            catalog.indexes.insert(def.id, def);
        }

        info!(
            "loaded catalog from {}: {} tables, {} indexes",
            dir.as_ref().display(),
            catalog.tables.len(),
            catalog.indexes.len()
        );
        Ok(catalog)
    }

    /// Whether `dir` holds a saved catalog
    pub fn exists<P: AsRef<Path>>(dir: P) -> bool {
        dir.as_ref().join(CATALOG_FILE).exists()
    }

    fn check_name_free(&self, name: &str) -> CatalogResult<()> {
        if self.names.contains_key(name) {
            return Err(CatalogError::TableExists(name.to_string()));
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> FileId {
        let id = FileId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl FileCatalog for Catalog {
    fn db_file(&mut self, id: FileId) -> FileResult<&mut dyn DbFile> {
        self.files
            .get_mut(&id)
            .map(|file| file as &mut dyn DbFile)
            .ok_or(FileError::UnknownFile(id))
    }

    fn sync_all(&mut self) -> FileResult<()> {
        for file in self.files.values_mut() {
            file.sync()?;
        }
        Ok(())
    }
}

/// Grammar of one schema line: `name (field type, ...)`
fn schema_line<'a>()
-> impl Parser<'a, &'a str, (&'a str, Vec<(Type, &'a str)>), extra::Err<Rich<'a, char>>> {
    let field_type = ident().try_map(|ty: &str, span| {
        ty.parse::<Type>().map_err(|reason| Rich::custom(span, reason))
    });

    let field = ident()
        .padded()
        .then(field_type.padded())
        .map(|(name, ty): (&str, Type)| (ty, name));

    ident()
        .padded()
        .then(
            field
                .separated_by(just(',').padded())
                .at_least(1)
                .collect()
                .delimited_by(just('(').padded(), just(')').padded()),
        )
        .then_ignore(end())
}

fn parse_schema_line(line: &str) -> Result<(String, TupleDesc), String> {
    let (name, fields) = schema_line().parse(line).into_result().map_err(|errs| {
        errs.iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    })?;

    let desc = TupleDesc::with_names(fields).map_err(|e| e.to_string())?;
    Ok((name.to_string(), desc))
}
