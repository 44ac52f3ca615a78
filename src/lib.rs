/*
 * QuartzBio client - query datasets and upload files to vaults
 */

// Internal modules
mod client;
pub mod models;
mod apis;
mod error;
mod auth;
mod config;
pub mod filter;
mod genomic;
pub mod query;
pub mod upload;

// Re-export public types and interfaces
pub use client::{PresignedResponse, QuartzBioClient};
pub use models::*;
pub use apis::*;
pub use error::{QuartzBioError, QuartzBioResult, UploadFailure, UploadPhase};
pub use auth::{Authentication, BearerAuth, NoAuth, TokenAuth};
pub use config::{validate_api_host_url, ClientConfig, RetryPolicy};
pub use filter::{Clause, Connector, Filter, Operator};
pub use genomic::GenomicFilter;
pub use query::{
    BatchQuery, DatasetTarget, GlobalSearch, Query, QueryCursor, QueryTarget, SearchTarget,
    Window, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use upload::{
    md5sum, plan_upload, FileDigest, UploadOptions, UploadPlan, MULTIPART_CHUNKSIZE,
    MULTIPART_THRESHOLD,
};

// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        QuartzBioClient, ClientConfig, RetryPolicy,
        TokenAuth, BearerAuth, NoAuth,
        QuartzBioError, QuartzBioResult,
        Filter, GenomicFilter,
        Query, GlobalSearch, BatchQuery,
        UploadOptions,
        // Common model types
        Dataset, ObjectRecord, QueryResponse,
    };
}
