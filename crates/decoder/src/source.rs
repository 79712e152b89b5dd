//! GIF byte sources and their dispatch onto the engine's load paths.
//!
//! [`GifSource`] is what callers hand to the session manager. Asset and
//! resource sources are resolved to a readable stream through a provider,
//! so the engine only ever sees three inputs: a path, a buffer, or a stream.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Readable byte stream handed to the engine.
pub type GifStream = Box<dyn Read + Send>;

/// Opens named GIF assets (e.g. files bundled next to the application).
pub trait AssetProvider: Send + Sync {
    fn open(&self, name: &str) -> io::Result<GifStream>;
}

/// Opens GIF resources by numeric id.
pub trait ResourceProvider: Send + Sync {
    fn open_raw(&self, id: u32) -> io::Result<GifStream>;
}

/// Where the bytes of a GIF come from.
pub enum GifSource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
    /// Consumed exactly once; dropped (closed) right after the engine reads it.
    Stream(GifStream),
    Asset {
        provider: Arc<dyn AssetProvider>,
        name: String,
    },
    Resource {
        provider: Arc<dyn ResourceProvider>,
        id: u32,
    },
}

impl GifSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn bytes(data: impl Into<Arc<[u8]>>) -> Self {
        Self::Bytes(data.into())
    }

    pub fn stream(stream: impl Read + Send + 'static) -> Self {
        Self::Stream(Box::new(stream))
    }

    pub fn asset(provider: Arc<dyn AssetProvider>, name: impl Into<String>) -> Self {
        Self::Asset {
            provider,
            name: name.into(),
        }
    }

    pub fn resource(provider: Arc<dyn ResourceProvider>, id: u32) -> Self {
        Self::Resource { provider, id }
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Bytes(_) => "bytes",
            Self::Stream(_) => "stream",
            Self::Asset { .. } => "asset",
            Self::Resource { .. } => "resource",
        }
    }

    /// Duplicate a source that can be opened again. Streams cannot.
    pub fn try_clone(&self) -> Option<Self> {
        match self {
            Self::Path(p) => Some(Self::Path(p.clone())),
            Self::Bytes(b) => Some(Self::Bytes(Arc::clone(b))),
            Self::Stream(_) => None,
            Self::Asset { provider, name } => Some(Self::Asset {
                provider: Arc::clone(provider),
                name: name.clone(),
            }),
            Self::Resource { provider, id } => Some(Self::Resource {
                provider: Arc::clone(provider),
                id: *id,
            }),
        }
    }

    /// Resolve to one of the engine's three load inputs.
    ///
    /// Provider I/O happens here, outside the engine lock.
    pub fn open(self) -> io::Result<LoadInput> {
        match self {
            Self::Path(p) => Ok(LoadInput::Path(p)),
            Self::Bytes(b) => Ok(LoadInput::Bytes(b)),
            Self::Stream(s) => Ok(LoadInput::Stream(s)),
            Self::Asset { provider, name } => provider.open(&name).map(LoadInput::Stream),
            Self::Resource { provider, id } => provider.open_raw(id).map(LoadInput::Stream),
        }
    }
}

impl fmt::Debug for GifSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Asset { name, .. } => f.debug_struct("Asset").field("name", name).finish(),
            Self::Resource { id, .. } => f.debug_struct("Resource").field("id", id).finish(),
        }
    }
}

/// A source resolved to something the engine can read directly.
pub enum LoadInput {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
    Stream(GifStream),
}

/// Asset provider that opens files relative to a root directory.
#[derive(Clone, Debug)]
pub struct DirAssetProvider {
    root: PathBuf,
}

impl DirAssetProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("asset name must be a relative path inside the root: {name:?}"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl AssetProvider for DirAssetProvider {
    fn open(&self, name: &str) -> io::Result<GifStream> {
        let file = File::open(self.resolve(name)?)?;
        Ok(Box::new(file))
    }
}

/// Resource provider over GIFs held in memory, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct BundledResources {
    entries: HashMap<u32, Arc<[u8]>>,
}

impl BundledResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u32, data: impl Into<Arc<[u8]>>) {
        self.entries.insert(id, data.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResourceProvider for BundledResources {
    fn open_raw(&self, id: u32) -> io::Result<GifStream> {
        let data = self.entries.get(&id).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no GIF resource with id {id}"))
        })?;
        Ok(Box::new(Cursor::new(Arc::clone(data))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn read_all(input: LoadInput) -> Vec<u8> {
        match input {
            LoadInput::Stream(mut s) => {
                let mut buf = Vec::new();
                s.read_to_end(&mut buf).unwrap();
                buf
            }
            LoadInput::Bytes(b) => b.to_vec(),
            LoadInput::Path(p) => std::fs::read(p).unwrap(),
        }
    }

    #[test]
    fn kinds() {
        assert_eq!(GifSource::path("a.gif").kind(), "path");
        assert_eq!(GifSource::bytes(vec![1u8]).kind(), "bytes");
        assert_eq!(GifSource::stream(Cursor::new(vec![1u8])).kind(), "stream");
    }

    #[test]
    fn streams_cannot_be_cloned() {
        assert!(GifSource::stream(Cursor::new(vec![0u8])).try_clone().is_none());
        assert!(GifSource::bytes(vec![0u8]).try_clone().is_some());
        assert!(GifSource::path("x.gif").try_clone().is_some());
    }

    #[test]
    fn bytes_clone_shares_buffer() {
        let source = GifSource::bytes(vec![1u8, 2, 3]);
        let copy = source.try_clone().unwrap();
        match (source, copy) {
            (GifSource::Bytes(a), GifSource::Bytes(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected byte sources"),
        }
    }

    #[test]
    fn dir_asset_provider_opens_relative_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::create(dir.path().join("spinner.gif")).unwrap();
        file.write_all(b"GIF89a").unwrap();

        let provider = Arc::new(DirAssetProvider::new(dir.path()));
        let input = GifSource::asset(provider, "spinner.gif").open().unwrap();
        assert_eq!(read_all(input), b"GIF89a");
    }

    #[test]
    fn dir_asset_provider_rejects_escapes() {
        let provider = DirAssetProvider::new("/tmp");
        assert!(provider.open("../etc/passwd").is_err());
        assert!(provider.open("/etc/passwd").is_err());
        assert!(provider.open("").is_err());
    }

    #[test]
    fn bundled_resources_lookup() {
        let mut resources = BundledResources::new();
        resources.insert(7, vec![9u8, 8, 7]);
        assert_eq!(resources.len(), 1);

        let provider: Arc<dyn ResourceProvider> = Arc::new(resources);
        let input = GifSource::resource(Arc::clone(&provider), 7).open().unwrap();
        assert_eq!(read_all(input), vec![9, 8, 7]);

        let missing = GifSource::resource(provider, 8).open();
        assert_eq!(missing.err().unwrap().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn debug_hides_stream_contents() {
        let dbg = format!("{:?}", GifSource::bytes(vec![0u8; 16]));
        assert_eq!(dbg, "Bytes(16)");
        let dbg = format!("{:?}", GifSource::stream(Cursor::new(vec![0u8])));
        assert_eq!(dbg, "Stream(..)");
    }
}
