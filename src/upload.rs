//! File uploads into vaults.
//!
//! Small files go up in one PUT to the object's pre-signed URL. Files larger
//! than the multipart threshold are split into fixed-size parts:
//!
//! 1. initiate: the server hands out an upload id and one URL per part
//! 2. every part is PUT in order with its own `Content-MD5`
//! 3. complete: the server assembles the parts and checks the whole-file MD5
//!
//! Once an upload id has been issued, any failure aborts the multipart upload
//! and force-deletes the half-created object before the error is returned.
//! A server without multipart support gets a single-part upload instead.

use crate::{
    client::QuartzBioClient,
    error::{QuartzBioError, QuartzBioResult, UploadFailure, UploadPhase},
    models::{
        CompletedPart, MultipartAbortRequest, MultipartCompleteRequest, MultipartCompleteResponse,
        MultipartInitRequest, MultipartInitResponse, ObjectCreateRequest, ObjectRecord,
    },
};
use base64::{engine::general_purpose, Engine};
use bytes::Bytes;
use log::{debug, info, warn};
use md5::{Digest, Md5};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

pub const MULTIPART_THRESHOLD: u64 = 64 * 1024 * 1024;
pub const MULTIPART_CHUNKSIZE: u64 = 64 * 1024 * 1024;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const CONTENT_MD5: &str = "content-md5";
const READ_BUFFER_SIZE: u64 = 8 * 1024 * 1024;

/// Options for [`crate::ObjectApi::upload_file`]
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    /// Files strictly larger than this use multipart upload. `None` or `Some(0)`
    /// disables multipart upload.
    pub multipart_threshold: Option<u64>,
    pub multipart_chunksize: u64,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub archive_folder: Option<String>,
    pub storage_class: Option<String>,
    /// Defaults to `application/octet-stream`
    pub content_type: Option<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            multipart_threshold: Some(MULTIPART_THRESHOLD),
            multipart_chunksize: MULTIPART_CHUNKSIZE,
            description: None,
            tags: Vec::new(),
            archive_folder: None,
            storage_class: None,
            content_type: None,
        }
    }
}

impl UploadOptions {
    fn mimetype(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// How a file of a given size will be uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPlan {
    SinglePart,
    Multipart { block_count: u64 },
}

/// Pick single-part or multipart upload for a file of `size` bytes
pub fn plan_upload(
    size: u64,
    threshold: Option<u64>,
    chunksize: u64,
) -> QuartzBioResult<UploadPlan> {
    match threshold {
        Some(threshold) if threshold > 0 && size > threshold => {
            if chunksize == 0 {
                return Err(QuartzBioError::invalid_param(
                    "'multipart_chunksize' must be greater than 0",
                ));
            }
            Ok(UploadPlan::Multipart {
                block_count: size.div_ceil(chunksize),
            })
        }
        _ => Ok(UploadPlan::SinglePart),
    }
}

/// Whole-file MD5 of a local file and its split into parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Lowercase hex MD5 of the whole file
    pub md5: String,
    pub md5_bytes: [u8; 16],
    pub size: u64,
    pub chunksize: u64,
    pub block_count: u64,
}

impl FileDigest {
    /// Byte range `(offset, length)` of the 0-based block `index`
    pub fn block_range(&self, index: u64) -> (u64, u64) {
        let offset = index * self.chunksize;
        (offset, self.chunksize.min(self.size.saturating_sub(offset)))
    }

    /// Whole-file digest as sent in `Content-MD5`
    pub fn content_md5(&self) -> String {
        general_purpose::STANDARD.encode(self.md5_bytes)
    }
}

/// Base64 of the binary MD5, as sent in `Content-MD5`
pub fn content_md5(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(Md5::digest(data))
}

/// Compute the MD5 of a file incrementally, counting `chunksize` blocks.
/// An empty file has zero blocks and the MD5 of empty input.
pub async fn md5sum(path: &Path, chunksize: u64) -> QuartzBioResult<FileDigest> {
    if chunksize == 0 {
        return Err(QuartzBioError::invalid_param(
            "'multipart_chunksize' must be greater than 0",
        ));
    }

    let mut file = File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; chunksize.min(READ_BUFFER_SIZE) as usize];
    let mut size = 0u64;

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size += read as u64;
    }

    let mut md5_bytes = [0u8; 16];
    md5_bytes.copy_from_slice(&hasher.finalize());

    Ok(FileDigest {
        md5: md5_bytes.iter().map(|b| format!("{:02x}", b)).collect(),
        md5_bytes,
        size,
        chunksize,
        block_count: size.div_ceil(chunksize),
    })
}

fn header_value(value: &str) -> QuartzBioResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| QuartzBioError::invalid_param(format!("Invalid header value '{}': {}", value, e)))
}

/// Outcome of asking the server for a multipart upload
enum Initiated {
    Started(MultipartInitResponse, String),
    Unsupported,
}

/// Drives uploads for one client. Parts go up strictly one at a time.
pub(crate) struct Uploader<'a> {
    client: &'a QuartzBioClient,
}

impl<'a> Uploader<'a> {
    pub(crate) fn new(client: &'a QuartzBioClient) -> Self {
        Self { client }
    }

    fn object_path(object: &ObjectRecord) -> String {
        format!("/v2/objects/{}", urlencoding::encode(&object.id))
    }

    fn multipart_path(object: &ObjectRecord) -> String {
        format!("{}/multipart-upload", Self::object_path(object))
    }

    /// Create the object record and upload the file's contents
    pub(crate) async fn upload_file(
        &self,
        local_path: &Path,
        vault_id: &str,
        parent_path: &str,
        options: &UploadOptions,
    ) -> QuartzBioResult<ObjectRecord> {
        let filename = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                QuartzBioError::invalid_param(format!(
                    "'{}' does not name a file",
                    local_path.display()
                ))
            })?;

        let size = tokio::fs::metadata(local_path).await?.len();
        let plan = plan_upload(size, options.multipart_threshold, options.multipart_chunksize)?;
        let chunksize = match options.multipart_chunksize {
            0 => MULTIPART_CHUNKSIZE,
            c => c,
        };
        let digest = md5sum(local_path, chunksize).await?;

        let request = ObjectCreateRequest {
            vault_id: vault_id.to_string(),
            parent_path: parent_path.to_string(),
            filename: filename.to_string(),
            object_type: "file".to_string(),
            size: Some(digest.size),
            md5: Some(digest.md5.clone()),
            mimetype: Some(options.mimetype().to_string()),
            description: options.description.clone(),
            tags: options.tags.clone(),
            archive_folder: options.archive_folder.clone(),
            storage_class: options.storage_class.clone(),
        };
        let object: ObjectRecord = self.client.post("/v2/objects", &request).await?;

        match plan {
            UploadPlan::SinglePart => {
                self.upload_single_part(&object, local_path, &digest, options).await
            }
            UploadPlan::Multipart { block_count } => {
                info!(
                    "Using multipart upload for large file: {} ({} bytes, {} parts)",
                    filename, digest.size, block_count
                );
                self.upload_multipart(&object, local_path, &digest, options).await
            }
        }
    }

    /// PUT the whole file to the object's pre-signed upload URL
    pub(crate) async fn upload_single_part(
        &self,
        object: &ObjectRecord,
        local_path: &Path,
        digest: &FileDigest,
        options: &UploadOptions,
    ) -> QuartzBioResult<ObjectRecord> {
        let result = self.put_whole_file(object, local_path, digest, options).await;
        if result.is_err() {
            self.delete_object(object).await;
        }
        result.map(|_| object.clone())
    }

    async fn put_whole_file(
        &self,
        object: &ObjectRecord,
        local_path: &Path,
        digest: &FileDigest,
        options: &UploadOptions,
    ) -> QuartzBioResult<()> {
        let failed = |message: String| UploadFailure::new(UploadPhase::SinglePart, message);

        let upload_url = object
            .upload_url
            .as_deref()
            .ok_or_else(|| failed("object has no upload URL".to_string()))?;

        let body = Bytes::from(tokio::fs::read(local_path).await?);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_MD5, header_value(&digest.content_md5())?);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len() as u64));
        headers.insert(CONTENT_TYPE, header_value(options.mimetype())?);

        debug!("Uploading {} bytes in a single part", body.len());
        let response = self
            .client
            .put_presigned(upload_url, headers, body)
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.is_success() {
            return Err(failed(format!("{} {}", response.status, response.text())).into());
        }
        Ok(())
    }

    /// Upload in parts. Falls back to [`Self::upload_single_part`] when the
    /// server has no multipart support or hands out no upload id.
    pub(crate) async fn upload_multipart(
        &self,
        object: &ObjectRecord,
        local_path: &Path,
        digest: &FileDigest,
        options: &UploadOptions,
    ) -> QuartzBioResult<ObjectRecord> {
        let (init, upload_id) = match self.initiate(object, digest.block_count).await? {
            Initiated::Started(init, upload_id) => (init, upload_id),
            Initiated::Unsupported => {
                return self
                    .upload_single_part(object, local_path, digest, options)
                    .await
            }
        };

        match self.run_session(object, local_path, digest, &init, &upload_id).await {
            Ok(()) => {
                info!("Multipart upload completed for object {}", object.id);
                Ok(object.clone())
            }
            Err(err) => {
                warn!("Multipart upload of object {} failed: {}", object.id, err);
                self.cleanup(object, &upload_id).await;
                Err(err)
            }
        }
    }

    async fn initiate(&self, object: &ObjectRecord, block_count: u64) -> QuartzBioResult<Initiated> {
        let request = MultipartInitRequest { parts: block_count };
        let response: MultipartInitResponse =
            match self.client.post(&Self::multipart_path(object), &request).await {
                Ok(response) => response,
                Err(e) if e.is_not_found() => {
                    warn!("Multipart upload not supported, falling back to single-part upload");
                    return Ok(Initiated::Unsupported);
                }
                Err(e) => {
                    self.delete_object(object).await;
                    return Err(UploadFailure::new(UploadPhase::Initiate, e.to_string()).into());
                }
            };

        match response.upload_id.clone().filter(|id| !id.is_empty()) {
            Some(upload_id) => {
                debug!(
                    "Multipart upload {} started with {} part URLs",
                    upload_id,
                    response.part_urls.len()
                );
                Ok(Initiated::Started(response, upload_id))
            }
            None => {
                warn!("Multipart upload was not initiated, falling back to single-part upload");
                Ok(Initiated::Unsupported)
            }
        }
    }

    async fn run_session(
        &self,
        object: &ObjectRecord,
        local_path: &Path,
        digest: &FileDigest,
        init: &MultipartInitResponse,
        upload_id: &str,
    ) -> QuartzBioResult<()> {
        if init.part_urls.len() as u64 != digest.block_count {
            return Err(UploadFailure::new(
                UploadPhase::Initiate,
                format!(
                    "expected {} part URLs, got {}",
                    digest.block_count,
                    init.part_urls.len()
                ),
            )
            .into());
        }

        let parts = self.upload_parts(local_path, digest, &init.part_urls).await?;
        self.complete(object, digest, upload_id, parts).await
    }

    async fn upload_parts(
        &self,
        local_path: &Path,
        digest: &FileDigest,
        part_urls: &[String],
    ) -> QuartzBioResult<Vec<CompletedPart>> {
        let mut completed = Vec::with_capacity(part_urls.len());
        if part_urls.is_empty() {
            return Ok(completed);
        }

        let mut file = File::open(local_path)
            .await
            .map_err(|e| UploadFailure::part(1, format!("I/O error: {}", e)))?;

        for (index, url) in part_urls.iter().enumerate() {
            let part_number = index + 1;
            let (offset, length) = digest.block_range(index as u64);

            let data = read_block(&mut file, offset, length)
                .await
                .map_err(|e| UploadFailure::part(part_number, format!("I/O error: {}", e)))?;

            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_MD5, header_value(&content_md5(&data))?);
            headers.insert(CONTENT_LENGTH, HeaderValue::from(length));

            debug!("Uploading part {}/{} ({} bytes)", part_number, part_urls.len(), length);
            let response = self
                .client
                .put_presigned(url, headers, data)
                .await
                .map_err(|e| UploadFailure::part(part_number, e.to_string()))?;

            if !response.is_success() {
                return Err(UploadFailure::part(part_number, response.text()).into());
            }

            let etag = response
                .etag()
                .ok_or_else(|| UploadFailure::part(part_number, "response has no ETag header"))?;
            completed.push(CompletedPart {
                part_number: part_number as u64,
                etag,
            });
        }

        Ok(completed)
    }

    async fn complete(
        &self,
        object: &ObjectRecord,
        digest: &FileDigest,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> QuartzBioResult<()> {
        let failed = |message: String| UploadFailure::new(UploadPhase::Complete, message);
        let request = MultipartCompleteRequest {
            upload_id: upload_id.to_string(),
            md5: digest.md5.clone(),
            parts,
        };

        let path = format!("{}/complete", Self::multipart_path(object));
        let response: MultipartCompleteResponse = self
            .client
            .post(&path, &request)
            .await
            .map_err(|e| failed(e.to_string()))?;

        match response.status.as_deref() {
            Some("completed") => Ok(()),
            status => Err(failed(
                response
                    .error
                    .unwrap_or_else(|| format!("unexpected status {:?}", status)),
            )
            .into()),
        }
    }

    /// Abort the multipart upload and drop the object. Failures are only logged.
    async fn cleanup(&self, object: &ObjectRecord, upload_id: &str) {
        let abort = MultipartAbortRequest {
            upload_id: upload_id.to_string(),
        };
        if let Err(e) = self
            .client
            .delete::<serde_json::Value, _>(&Self::multipart_path(object), Some(&abort))
            .await
        {
            warn!("Failed to abort multipart upload {}: {}", upload_id, e);
        }
        self.delete_object(object).await;
    }

    async fn delete_object(&self, object: &ObjectRecord) {
        if let Err(e) = self.client.objects().delete(&object.id, true).await {
            warn!("Failed to delete object {}: {}", object.id, e);
        }
    }
}

async fn read_block(file: &mut File, offset: u64, length: u64) -> std::io::Result<Bytes> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut data = vec![0u8; length as usize];
    file.read_exact(&mut data).await?;
    Ok(Bytes::from(data))
}
