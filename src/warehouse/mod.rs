//! Warehouse access: the session, SQL rendering and the uploader.
//!
//! Talks to the Snowflake session REST endpoints directly with a blocking HTTP client. One
//! [`Session`] is opened per load and released on every exit path (see [`with_session`]).

pub mod config;
pub mod protocol;
pub mod session;
pub mod sql;
pub mod upload;

pub use config::ConnectionParams;
pub use session::{QueryResult, Session, with_session};
pub use sql::TableType;
pub use upload::{
    DEFAULT_CHUNK_SIZE, UploadMetadata, UploadOptions, UploadPlan, UploadResult, plan_upload,
    write_dataset,
};
