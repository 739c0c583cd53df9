//! Static styles and the viewer script bundled into every artifact.

use regex::Regex;

use crate::error::{ExportError, ExportResult};

/// Stylesheets in cascade order.
pub const STYLESHEETS: &[(&str, &str)] = &[
    ("base.css", include_str!("../assets/base.css")),
    ("timeline.css", include_str!("../assets/timeline.css")),
];

/// Read-only viewer. Reads the embedded data block and nothing else.
pub const VIEWER_SCRIPT: &str = include_str!("../assets/viewer.js");

/// Rules that only make sense inside the editor.
const EDITOR_RULES: &[&str] = &[
    r"/\*\s*=+\s*Editor[\s\S]*?\*+/",
    r"\.editor-[\w-]+[^{]*\{[^}]*\}",
    r"#editor-[\w-]+[^{]*\{[^}]*\}",
    r"\.btn-editor-toggle[^{]*\{[^}]*\}",
    r"\.editable[^{]*\{[^}]*\}",
    r"\.content-block-card[^{]*\{[^}]*\}",
    r"\.add-content-block[^{]*\{[^}]*\}",
    r"\.block-type-menu[^{]*\{[^}]*\}",
    r"\.music-upload-section[^{]*\{[^}]*\}",
];

/// Remove editor-only rules from `css`.
pub fn strip_editor_rules(css: &str) -> ExportResult<String> {
    let mut cleaned = css.to_string();
    for pattern in EDITOR_RULES {
        let re = Regex::new(pattern).map_err(|e| ExportError::Stylesheet(e.to_string()))?;
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    Ok(cleaned)
}

/// All bundled stylesheets, joined and stripped of editor rules.
pub fn combined_styles() -> ExportResult<String> {
    let joined = STYLESHEETS
        .iter()
        .map(|(name, css)| format!("/* {name} */\n{css}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    strip_editor_rules(&joined)
}
