use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Cursor, Read},
    path::PathBuf,
    sync::{Arc, RwLock},
};

use crate::{
    error::{SplatError, SplatResult},
    io::splat::SPLAT_RECORD_SIZE,
};


/// An opened source. `content_length` is the transport's declared byte length, if any.
pub struct ByteStream {
    pub reader: Box<dyn Read + Send>,
    pub content_length: Option<u64>,
}

impl ByteStream {
    pub fn new(reader: impl Read + Send + 'static, content_length: Option<u64>) -> Self {
        Self {
            reader: Box::new(reader),
            content_length,
        }
    }

    pub fn declared_count(&self) -> Option<usize> {
        self.content_length
            .map(|length| length as usize / SPLAT_RECORD_SIZE)
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}


/// Resolves a source key to a byte stream. HTTP and other transports implement this
/// outside the crate.
pub trait SplatFetcher: Send + Sync + 'static {
    fn request(&self, key: &str) -> SplatResult<ByteStream>;
}


/// Reads sources from files below `root`.
#[derive(Clone, Debug)]
pub struct FileFetcher {
    pub root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for FileFetcher {
    fn default() -> Self {
        Self::new("assets")
    }
}

impl SplatFetcher for FileFetcher {
    fn request(&self, key: &str) -> SplatResult<ByteStream> {
        let path = self.root.join(key);
        let file = File::open(&path)
            .map_err(|err| SplatError::Network(format!("{}: {err}", path.display())))?;
        let content_length = file.metadata().ok().map(|metadata| metadata.len());

        Ok(ByteStream::new(BufReader::new(file), content_length))
    }
}


/// In-memory sources keyed by name.
#[derive(Clone, Debug, Default)]
pub struct MemoryFetcher {
    sources: Arc<RwLock<HashMap<String, Arc<[u8]>>>>,
}

impl MemoryFetcher {
    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        if let Ok(mut sources) = self.sources.write() {
            sources.insert(key.into(), bytes.into());
        }
    }

    pub fn with_source(self, key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(key, bytes);
        self
    }
}

impl SplatFetcher for MemoryFetcher {
    fn request(&self, key: &str) -> SplatResult<ByteStream> {
        let sources = self.sources
            .read()
            .map_err(|_| SplatError::Network("memory source lock poisoned".into()))?;
        let bytes = sources
            .get(key)
            .cloned()
            .ok_or_else(|| SplatError::Network(format!("source `{key}` not found")))?;

        let content_length = Some(bytes.len() as u64);
        Ok(ByteStream::new(Cursor::new(bytes), content_length))
    }
}
