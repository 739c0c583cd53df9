use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("{0}")]
    Model(#[from] keepsake_model::ModelError),

    #[error("document store error: {0}")]
    DocStore(#[from] keepsake_docstore::DocStoreError),

    #[error("media store error: {0}")]
    Store(#[from] keepsake_store::StoreError),

    #[error("media error: {0}")]
    Resolve(#[from] keepsake_resolver::ResolveError),

    #[error("{0}")]
    Export(#[from] keepsake_export::ExportError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unsupported media: {0}")]
    InvalidMedia(String),

    #[error("invalid backup: {0}")]
    InvalidBackup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
