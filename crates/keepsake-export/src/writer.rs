//! Assembles the single-file HTML artifact.

use keepsake_render::escape_html;

use crate::assets::{combined_styles, VIEWER_SCRIPT};
use crate::bundle::ExportBundle;
use crate::error::ExportResult;

/// `id` of the embedded data block.
pub const DATA_BLOCK_ID: &str = "keepsake-data";

pub(crate) fn data_block_open() -> String {
    format!("<script type=\"application/json\" id=\"{DATA_BLOCK_ID}\">")
}

/// Serialize `bundle` for embedding inside a `<script>` element.
///
/// `</` is written as `<\/`, which JSON reads back as the same string.
pub fn embed_json(bundle: &ExportBundle) -> ExportResult<String> {
    let json = serde_json::to_string(bundle)?;
    Ok(json.replace("</", "<\\/"))
}

/// Builds artifacts with a fixed page title.
#[derive(Clone, Debug)]
pub struct ArtifactWriter {
    title: String,
}

impl ArtifactWriter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Produce the complete document. It references nothing outside itself.
    pub fn write(&self, bundle: &ExportBundle) -> ExportResult<String> {
        let styles = combined_styles()?;
        let data = embed_json(bundle)?;
        let title = escape_html(&self.title);
        let mut html = String::with_capacity(data.len() + styles.len() + VIEWER_SCRIPT.len() + 1024);
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        html.push_str(&format!(
            "<meta name=\"generator\" content=\"keepsake-export {}\">\n",
            bundle.metadata.format_version
        ));
        html.push_str(&format!("<title>{title}</title>\n"));
        html.push_str("<style>\n");
        html.push_str(&styles);
        html.push_str("\n</style>\n</head>\n<body>\n");
        html.push_str(&format!(
            "<header class=\"page-header\"><h1>{title}</h1></header>\n<main id=\"story\"></main>\n"
        ));
        html.push_str("<noscript><p class=\"page-header\">This story needs JavaScript to display.</p></noscript>\n");
        html.push_str(&data_block_open());
        html.push_str(&data);
        html.push_str("</script>\n<script>\n");
        html.push_str(VIEWER_SCRIPT);
        html.push_str("\n</script>\n</body>\n</html>\n");
        Ok(html)
    }
}

impl Default for ArtifactWriter {
    fn default() -> Self {
        Self::new("Our Story")
    }
}
