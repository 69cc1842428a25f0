use chrono::Utc;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

const NAME_PREFIX: &str = "admin";
const NAME_HEX_LEN: usize = 15;
const MAX_NAME_ATTEMPTS: usize = 8;

/// Extensions accepted on upload, matched case-insensitively against the
/// client-side file name.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpe", "jpeg", "png", "gif", "bmp"];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),
    #[error("No free file name after {0} attempts")]
    NameExhausted(usize),
}

/// Flat directory of uploaded images. Writes never replace an existing file;
/// everything else races freely with concurrent requests.
#[derive(Clone)]
pub struct UploadStore {
    root: PathBuf,
    names: Arc<dyn Fn() -> String + Send + Sync>,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            names: Arc::new(Self::generate_name),
        }
    }

    /// Replaces the generator consulted for each new file name.
    pub fn with_name_source(mut self, names: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.names = Arc::new(names);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// `<15 hex chars>.`, derived from a timestamp and a random nonce.
    pub fn generate_name() -> String {
        let nonce: [u8; 16] = rand::random();
        let mut hasher = Sha256::new();
        hasher.update(NAME_PREFIX.as_bytes());
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        hasher.update(nanos.to_string().as_bytes());
        hasher.update(nonce);
        let digest = hex::encode(hasher.finalize());
        format!("{}.", &digest[..NAME_HEX_LEN])
    }

    pub fn is_allowed_image(file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                ALLOWED_EXTENSIONS
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            })
            .unwrap_or(false)
    }

    /// Rejects anything that is not a single plain path component.
    pub fn validate_name(name: &str) -> Result<(), StorageError> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    pub fn path(&self, name: &str) -> Result<PathBuf, StorageError> {
        Self::validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Stores `data` under a fresh generated name and returns that name.
    pub async fn save(&self, data: &[u8]) -> Result<String, StorageError> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = (self.names)();
            let path = self.root.join(&name);
            let file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    log::warn!("Generated name {} already taken, retrying", name);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            write_or_remove(file, &path, data).await?;
            return Ok(name);
        }
        Err(StorageError::NameExhausted(MAX_NAME_ATTEMPTS))
    }

    /// Stores every item or none of them: a failure removes the files this
    /// call already wrote.
    pub async fn save_batch(&self, items: &[&[u8]]) -> Result<Vec<String>, StorageError> {
        let mut saved = Vec::with_capacity(items.len());
        for data in items {
            match self.save(data).await {
                Ok(name) => saved.push(name),
                Err(e) => {
                    for name in &saved {
                        if let Err(cleanup) = fs::remove_file(self.root.join(name)).await {
                            log::warn!("Failed to roll back upload {}: {}", name, cleanup);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(saved)
    }

    /// Directory entries as returned by the OS, unsorted and unfiltered.
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path(name)?;
        Ok(fs::read(path).await?)
    }

    pub async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path(name)?;
        fs::remove_file(path).await?;
        Ok(())
    }
}

/// A partially written upload is deleted so it never shows up in listings.
async fn write_or_remove<W>(mut file: W, path: &Path, data: &[u8]) -> Result<(), StorageError>
where
    W: AsyncWrite + Unpin,
{
    let written = match file.write_all(data).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path).await {
            log::warn!("Failed to remove partial upload {}: {}", path.display(), cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn is_stored_name(name: &str) -> bool {
    name.len() == NAME_HEX_LEN + 1
        && name.ends_with('.')
        && name[..NAME_HEX_LEN]
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    const TAKEN: &str = "aaaaaaaaaaaaaaa.";
    const FREE: &str = "bbbbbbbbbbbbbbb.";

    /// Yields `names` in order, then repeats the last one.
    fn scripted_names(names: &'static [&'static str]) -> impl Fn() -> String + Send + Sync {
        let calls = AtomicUsize::new(0);
        move || {
            let i = calls.fetch_add(1, Ordering::SeqCst).min(names.len() - 1);
            names[i].to_string()
        }
    }

    struct BrokenDisk;

    impl AsyncWrite for BrokenDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::other("disk full")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn generated_names_have_fixed_shape() {
        let a = UploadStore::generate_name();
        let b = UploadStore::generate_name();
        assert!(is_stored_name(&a), "{}", a);
        assert!(is_stored_name(&b), "{}", b);
        assert_ne!(a, b);
    }

    #[test]
    fn allowed_image_extensions() {
        assert!(UploadStore::is_allowed_image("car.jpg"));
        assert!(UploadStore::is_allowed_image("CAR.JPEG"));
        assert!(UploadStore::is_allowed_image("dent.bmp"));
        assert!(!UploadStore::is_allowed_image("notes.txt"));
        assert!(!UploadStore::is_allowed_image("jpg"));
        assert!(!UploadStore::is_allowed_image(""));
    }

    #[test]
    fn names_must_be_single_components() {
        assert!(UploadStore::validate_name("0123456789abcde.").is_ok());
        for bad in ["", ".", "..", "../etc/passwd", "a/b", "a\\b"] {
            assert!(UploadStore::validate_name(bad).is_err(), "{}", bad);
        }
    }

    #[actix_web::test]
    async fn save_list_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));
        store.ensure_root().await.unwrap();

        let name = store.save(b"pixels").await.unwrap();
        assert!(is_stored_name(&name));
        assert_eq!(store.list().await.unwrap(), vec![name.clone()]);
        assert_eq!(store.read(&name).await.unwrap(), b"pixels");

        store.delete(&name).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn missing_files_surface_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        assert!(matches!(
            store.delete("0123456789abcde.").await,
            Err(StorageError::Io(e)) if e.kind() == ErrorKind::NotFound
        ));
        assert!(matches!(store.read("nothing.").await, Err(StorageError::Io(_))));
    }

    #[actix_web::test]
    async fn listing_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"x").unwrap();
        let store = UploadStore::new(dir.path());
        store.save(b"img").await.unwrap();

        let mut names = store.list().await.unwrap();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"stray.txt".to_string()));
    }

    #[actix_web::test]
    async fn colliding_name_is_retried_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TAKEN), b"original").unwrap();
        let store = UploadStore::new(dir.path()).with_name_source(scripted_names(&[TAKEN, FREE]));

        let name = store.save(b"new upload").await.unwrap();
        assert_eq!(name, FREE);
        assert_eq!(std::fs::read(dir.path().join(TAKEN)).unwrap(), b"original");
        assert_eq!(std::fs::read(dir.path().join(FREE)).unwrap(), b"new upload");
    }

    #[actix_web::test]
    async fn persistent_collisions_exhaust_attempts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TAKEN), b"original").unwrap();
        let store = UploadStore::new(dir.path()).with_name_source(|| TAKEN.to_string());

        let err = store.save(b"new upload").await.unwrap_err();
        assert!(matches!(err, StorageError::NameExhausted(MAX_NAME_ATTEMPTS)));
        assert_eq!(std::fs::read(dir.path().join(TAKEN)).unwrap(), b"original");
        assert_eq!(store.list().await.unwrap(), vec![TAKEN.to_string()]);
    }

    #[actix_web::test]
    async fn failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FREE);
        std::fs::write(&path, b"").unwrap();

        let err = write_or_remove(BrokenDisk, &path, b"pixels").await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(!path.exists());
    }

    #[actix_web::test]
    async fn failed_batch_rolls_back_earlier_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"x").unwrap();
        // The second item keeps drawing the name the first one just took.
        let store = UploadStore::new(dir.path()).with_name_source(scripted_names(&[FREE]));

        let err = store
            .save_batch(&[&b"first"[..], &b"second"[..]])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NameExhausted(_)));
        assert_eq!(store.list().await.unwrap(), vec!["stray.txt".to_string()]);
    }

    #[actix_web::test]
    async fn batch_stores_every_item() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let names = store
            .save_batch(&[&b"first"[..], &b"second"[..]])
            .await
            .unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(store.read(&names[1]).await.unwrap(), b"second");
    }
}
