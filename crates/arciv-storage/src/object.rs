use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::{GlacierJobParameters, RestoreRequest, Tier};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::buffered::BufWriter;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectMeta, ObjectStore, PutPayload};
use tokio::io::AsyncWriteExt;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::{Backend, StorageError, TIMELINE_KEY};

/// Submits retrieval requests for objects stored in an archive tier.
///
/// `object_store` has no call for this, so the object backend takes the
/// requester as a separate collaborator.
pub trait Thaw: Send + Sync {
    fn request(&self, key: &str, valid_days: u32) -> Result<(), StorageError>;
}

/// Requests S3 restores with `RestoreObject`, using the bulk retrieval tier.
///
/// Owns a runtime of its own, since requests arrive from synchronous code.
pub struct S3Thaw {
    client: Client,
    bucket: String,
    runtime: Runtime,
}

impl fmt::Debug for S3Thaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Thaw")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl S3Thaw {
    /// Credentials come from the default AWS provider chain.
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.into()))
                .load(),
        );
        Ok(Self {
            client: Client::new(&config),
            bucket: bucket.into(),
            runtime,
        })
    }
}

/// A bulk-tier restore keeping the object readable for `valid_days`.
fn bulk_restore(valid_days: u32) -> Result<RestoreRequest, String> {
    let days = i32::try_from(valid_days).map_err(|e| e.to_string())?;
    let job = GlacierJobParameters::builder()
        .tier(Tier::Bulk)
        .build()
        .map_err(|e| e.to_string())?;
    Ok(RestoreRequest::builder()
        .days(days)
        .glacier_job_parameters(job)
        .build())
}

impl Thaw for S3Thaw {
    fn request(&self, key: &str, valid_days: u32) -> Result<(), StorageError> {
        let failed = |reason: String| StorageError::Thaw {
            key: key.to_string(),
            reason,
        };

        let restore = bulk_restore(valid_days).map_err(failed)?;
        self.runtime
            .block_on(
                self.client
                    .restore_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .restore_request(restore)
                    .send(),
            )
            .map_err(|e| failed(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

/// A repository stored in an object store bucket.
///
/// Calls block on a private current-thread runtime.
pub struct ObjectBackend {
    store: Arc<dyn ObjectStore>,
    prefix: ObjectPath,
    storage_class: Option<String>,
    thaw: Option<Box<dyn Thaw>>,
    runtime: Runtime,
}

impl fmt::Debug for ObjectBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBackend")
            .field("store", &self.store.to_string())
            .field("prefix", &self.prefix)
            .field("storage_class", &self.storage_class)
            .field("thaw", &self.thaw.is_some())
            .finish()
    }
}

impl ObjectBackend {
    /// Wrap any object store. Keys are placed at the root of the store.
    pub fn new(store: Arc<dyn ObjectStore>) -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            store,
            prefix: ObjectPath::default(),
            storage_class: None,
            thaw: None,
            runtime,
        })
    }

    /// Connect to an S3 bucket. Credentials are taken from the environment.
    pub fn s3(bucket: &str, region: &str) -> Result<Self, StorageError> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region)
            .build()?;
        info!(bucket, region, "Opened S3 bucket");
        let thaw = S3Thaw::new(bucket, region)?;
        Ok(Self::new(Arc::new(store))?.with_thaw(Box::new(thaw)))
    }

    /// Place all keys under `prefix` inside the store.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = ObjectPath::from(prefix);
        self
    }

    /// Storage class attached to uploaded blobs, e.g. `DEEP_ARCHIVE`.
    pub fn with_storage_class(mut self, class: impl Into<String>) -> Self {
        self.storage_class = Some(class.into());
        self
    }

    pub fn with_thaw(mut self, thaw: Box<dyn Thaw>) -> Self {
        self.thaw = Some(thaw);
        self
    }

    pub fn storage_class(&self) -> Option<&str> {
        self.storage_class.as_deref()
    }

    fn location(&self, key: &str) -> ObjectPath {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.prefix.clone(), |path, part| path.child(part))
    }

    fn blob_attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        if let Some(class) = &self.storage_class {
            attributes.insert(Attribute::StorageClass, class.clone().into());
        }
        attributes
    }

    async fn upload(&self, from: &Path, location: ObjectPath) -> Result<(), StorageError> {
        let mut file = tokio::fs::File::open(from).await?;
        let mut writer =
            BufWriter::new(Arc::clone(&self.store), location).with_attributes(self.blob_attributes());

        match tokio::io::copy(&mut file, &mut writer).await {
            Ok(_) => {
                writer.shutdown().await?;
                Ok(())
            }
            Err(e) => {
                let _ = writer.abort().await;
                Err(e.into())
            }
        }
    }
}

impl Backend for ObjectBackend {
    fn init(&self) -> Result<(), StorageError> {
        // Prefixes do not exist on their own in an object store; only the
        // timeline record has to be created.
        let timeline = self.location(TIMELINE_KEY);
        match self.runtime.block_on(self.store.head(&timeline)) {
            Ok(_) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                self.write_lines(TIMELINE_KEY, &[])?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn load_lines(&self, key: &str) -> Result<Vec<String>, StorageError> {
        let location = self.location(key);
        let bytes = self.runtime.block_on(async {
            let result = self.store.get(&location).await?;
            result.bytes().await
        })?;
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| StorageError::InvalidData(format!("{key}: {e}")))?;
        Ok(text.lines().map(String::from).collect())
    }

    fn write_lines(&self, key: &str, lines: &[String]) -> Result<(), StorageError> {
        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        let location = self.location(key);
        let payload = PutPayload::from(Bytes::from(text));
        self.runtime
            .block_on(self.store.put(&location, payload))?;
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let prefix = self.location(prefix);
        let metas: Vec<ObjectMeta> = self
            .runtime
            .block_on(self.store.list(Some(&prefix)).try_collect())?;

        let names = metas
            .iter()
            .filter_map(|meta| {
                let mut parts = meta.location.prefix_match(&prefix)?;
                let name = parts.next()?;
                parts.next().is_none().then(|| name.as_ref().to_string())
            })
            .collect();
        Ok(names)
    }

    fn put_file(&self, from: &Path, key: &str) -> Result<(), StorageError> {
        let location = self.location(key);
        self.runtime.block_on(self.upload(from, location.clone()))?;
        debug!(?from, %location, storage_class = ?self.storage_class, "Uploaded file");
        Ok(())
    }

    fn get_file(&self, key: &str, to: &Path) -> Result<(), StorageError> {
        let parent = to.parent().ok_or_else(|| {
            StorageError::InvalidData(format!("download target {to:?} has no parent"))
        })?;
        std::fs::create_dir_all(parent)?;

        let location = self.location(key);
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        self.runtime.block_on(async {
            let mut stream = self.store.get(&location).await?.into_stream();
            while let Some(chunk) = stream.next().await {
                temp.write_all(&chunk?)?;
            }
            Ok::<_, StorageError>(())
        })?;
        temp.flush()?;
        temp.persist(to).map_err(|e| e.error)?;
        debug!(%location, ?to, "Downloaded file");
        Ok(())
    }

    fn request_thaw(&self, key: &str, valid_days: u32) -> Result<(), StorageError> {
        let Some(thaw) = &self.thaw else {
            return Err(StorageError::Unsupported("thaw requests without a requester"));
        };
        let location = self.location(key);
        thaw.request(location.as_ref(), valid_days)?;
        debug!(%location, valid_days, "Requested thaw");
        Ok(())
    }
}
