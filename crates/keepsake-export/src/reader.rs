//! Reads the bundle back out of a written artifact.

use std::path::Path;

use crate::bundle::ExportBundle;
use crate::error::{ExportError, ExportResult};
use crate::writer::data_block_open;

/// Extract and verify the bundle embedded in `html`.
pub fn read_bundle(html: &str) -> ExportResult<ExportBundle> {
    let open = data_block_open();
    let start = html.find(&open).ok_or(ExportError::MissingDataBlock)? + open.len();
    let len = html[start..]
        .find("</script>")
        .ok_or(ExportError::MissingDataBlock)?;
    let bundle: ExportBundle = serde_json::from_str(&html[start..start + len])?;
    bundle.verify()?;
    Ok(bundle)
}

/// Read an artifact file from disk.
pub async fn read_artifact(path: &Path) -> ExportResult<ExportBundle> {
    let html = tokio::fs::read_to_string(path).await?;
    read_bundle(&html)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use keepsake_render::PreloadManifest;

    use super::*;
    use crate::bundle::BundleContent;
    use crate::writer::ArtifactWriter;

    fn bundle() -> ExportBundle {
        let mut doc = keepsake_model::clone_default_document();
        doc.ending.message = "see you </soon>".into();
        let mut preload = PreloadManifest::new();
        preload.insert("avatar_a", "data:image/png;base64,AA==");
        let content = BundleContent {
            timeline: doc.nodes,
            standalone_blocks: doc.standalone,
            ending: doc.ending,
            music: None,
            avatars: Vec::new(),
            preload,
        };
        ExportBundle::seal(content, Utc::now()).unwrap()
    }

    #[test]
    fn written_bundle_reads_back_verified() {
        let original = bundle();
        let html = ArtifactWriter::default().write(&original).unwrap();
        let read = read_bundle(&html).unwrap();
        assert_eq!(read, original);
        assert_eq!(read.content.ending.message, "see you </soon>");
    }

    #[test]
    fn page_without_data_block_is_rejected() {
        let err = read_bundle("<html><body></body></html>").unwrap_err();
        assert!(matches!(err, ExportError::MissingDataBlock));
    }

    #[test]
    fn edited_artifact_fails_digest() {
        let html = ArtifactWriter::default().write(&bundle()).unwrap();
        let edited = html.replacen("see you", "see ya", 1);
        let err = read_bundle(&edited).unwrap_err();
        assert!(matches!(err, ExportError::DigestMismatch { .. }));
    }

    #[tokio::test]
    async fn reads_artifact_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.html");
        let original = bundle();
        tokio::fs::write(&path, ArtifactWriter::default().write(&original).unwrap())
            .await
            .unwrap();
        assert_eq!(read_artifact(&path).await.unwrap(), original);
    }
}
