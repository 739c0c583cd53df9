use async_trait::async_trait;
use keepsake_store::MediaBlob;
use keepsake_types::MediaRef;

use crate::error::{ResolveError, ResolveResult};
use crate::resolved::ResolvedMedia;

/// Read side of media resolution, as consumed by rendering and export.
///
/// [`crate::ReferenceResolver`] is the production implementation; tests wrap
/// it to count or fail calls.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Resolve a reference to bytes or a literal.
    async fn resolve(&self, media: &MediaRef) -> ResolveResult<ResolvedMedia>;

    /// Best-effort size estimate without reading payloads. Unknown sizes
    /// count as zero.
    async fn estimate_size(&self, media: &MediaRef) -> u64;

    /// Read a bundled asset (a relative path literal) as bytes.
    async fn load_asset(&self, path: &str) -> ResolveResult<MediaBlob> {
        Err(ResolveError::AssetUnavailable {
            path: path.to_string(),
            reason: "no asset root configured".to_string(),
        })
    }

    /// Whether [`MediaSource::load_asset`] can succeed at all.
    fn has_assets(&self) -> bool {
        false
    }
}
