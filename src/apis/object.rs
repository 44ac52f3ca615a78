use crate::{
    client::QuartzBioClient,
    error::QuartzBioResult,
    models::{ObjectCreateRequest, ObjectRecord},
    upload::{md5sum, UploadOptions, Uploader},
};
use std::path::Path;

/// Vault object API operations
pub struct ObjectApi<'a> {
    client: &'a QuartzBioClient,
}

impl<'a> ObjectApi<'a> {
    pub fn new(client: &'a QuartzBioClient) -> Self {
        Self { client }
    }

    /// Create an Object record. For files the response carries a pre-signed
    /// `upload_url` for the contents.
    ///
    /// # Arguments
    /// * `request` - Object creation parameters
    pub async fn create(&self, request: &ObjectCreateRequest) -> QuartzBioResult<ObjectRecord> {
        self.client.post("/v2/objects", request).await
    }

    /// Get information about an Object
    ///
    /// # Arguments
    /// * `object_id` - Id of the object
    pub async fn get(&self, object_id: &str) -> QuartzBioResult<ObjectRecord> {
        let path = format!("/v2/objects/{}", urlencoding::encode(object_id));
        self.client.get(&path).await
    }

    /// Delete an Object
    ///
    /// # Arguments
    /// * `object_id` - Id of the object
    /// * `force` - Delete immediately instead of moving to the trash
    pub async fn delete(&self, object_id: &str, force: bool) -> QuartzBioResult<serde_json::Value> {
        let mut path = format!("/v2/objects/{}", urlencoding::encode(object_id));
        if force {
            path.push_str("?force=true");
        }
        self.client.delete::<_, ()>(&path, None).await
    }

    /// Upload a local file into a vault folder.
    ///
    /// Files above `options.multipart_threshold` are uploaded in parts. On
    /// failure the partially created object is removed again.
    ///
    /// # Arguments
    /// * `local_path` - File to upload; its name becomes the object's filename
    /// * `vault_id` - Id of the destination vault
    /// * `parent_path` - Destination folder within the vault, `/` for the root
    /// * `options` - Multipart settings and object metadata
    pub async fn upload_file(
        &self,
        local_path: impl AsRef<Path>,
        vault_id: &str,
        parent_path: &str,
        options: &UploadOptions,
    ) -> QuartzBioResult<ObjectRecord> {
        Uploader::new(self.client)
            .upload_file(local_path.as_ref(), vault_id, parent_path, options)
            .await
    }

    /// Upload the contents of an existing Object in parts, whatever its size.
    /// Falls back to a single-part upload when the server has no multipart
    /// support.
    ///
    /// # Arguments
    /// * `object` - Object created for this file, with its `upload_url`
    /// * `local_path` - File to upload
    /// * `options` - Part size and content type
    pub async fn upload_multipart(
        &self,
        object: &ObjectRecord,
        local_path: impl AsRef<Path>,
        options: &UploadOptions,
    ) -> QuartzBioResult<ObjectRecord> {
        let local_path = local_path.as_ref();
        let digest = md5sum(local_path, options.multipart_chunksize).await?;
        Uploader::new(self.client)
            .upload_multipart(object, local_path, &digest, options)
            .await
    }

    /// Upload the contents of an existing Object in one request
    ///
    /// # Arguments
    /// * `object` - Object created for this file, with its `upload_url`
    /// * `local_path` - File to upload
    /// * `options` - Content type
    pub async fn upload_single_part(
        &self,
        object: &ObjectRecord,
        local_path: impl AsRef<Path>,
        options: &UploadOptions,
    ) -> QuartzBioResult<ObjectRecord> {
        let local_path = local_path.as_ref();
        let digest = md5sum(local_path, options.multipart_chunksize.max(1)).await?;
        Uploader::new(self.client)
            .upload_single_part(object, local_path, &digest, options)
            .await
    }
}
