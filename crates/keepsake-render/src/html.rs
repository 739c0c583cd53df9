//! Static markup for a [`DisplayTree`].
//!
//! Used by the exporter for the no-script fallback and by `keepsake render`.
//! Class names match the viewer stylesheet.

use crate::tree::{BlockContent, BlockView, DisplayItem, DisplayTree, EndingView, MediaSlot, NodeView};

/// Escape text for use in element content and double-quoted attributes.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn placeholder(slot: &MediaSlot, key: &str) -> Option<String> {
    match slot {
        MediaSlot::Ready { .. } => None,
        MediaSlot::Pending { .. } => Some(format!(
            "<div class=\"media-placeholder loading\" data-key=\"{}\"></div>",
            escape_html(key)
        )),
        MediaSlot::Failed { reason } => Some(format!(
            "<div class=\"media-placeholder failed\" data-key=\"{}\" title=\"{}\">Failed to load</div>",
            escape_html(key),
            escape_html(reason)
        )),
    }
}

fn image_html(block: &BlockView, slot: &MediaSlot, alt: &str, caption: Option<&str>, standalone: bool) -> String {
    let img_class = if standalone { "standalone-image" } else { "timeline-image" };
    let mut out = String::new();
    match slot {
        MediaSlot::Ready { src } => out.push_str(&format!(
            "<img class=\"{img_class}\" src=\"{}\" alt=\"{}\" loading=\"lazy\">",
            escape_html(src),
            escape_html(alt)
        )),
        other => out.extend(placeholder(other, &block.key)),
    }
    if let Some(caption) = caption {
        let class = if standalone { "standalone-caption" } else { "timeline-caption" };
        out.push_str(&format!("<p class=\"{class}\">{}</p>", escape_html(caption)));
    }
    out
}

fn video_html(block: &BlockView, slot: &MediaSlot, poster: Option<&str>) -> String {
    let MediaSlot::Ready { src } = slot else {
        return placeholder(slot, &block.key).unwrap_or_default();
    };
    let poster = poster
        .map(|p| format!(" poster=\"{}\"", escape_html(p)))
        .unwrap_or_default();
    format!(
        "<div class=\"video-wrapper\"><video class=\"timeline-video\" src=\"{}\"{poster} preload=\"metadata\" playsinline></video>\
         <div class=\"video-play-overlay\"><span class=\"play-icon\">&#9654;</span></div></div>",
        escape_html(src)
    )
}

fn block_html(block: &BlockView, standalone: bool) -> String {
    match &block.content {
        BlockContent::Text { content } => {
            let class = if standalone { "standalone-text" } else { "timeline-text-block" };
            format!("<p class=\"{class}\">{}</p>", escape_html(content))
        }
        BlockContent::Image { slot, alt, caption } => {
            let inner = image_html(block, slot, alt, caption.as_deref(), standalone);
            if standalone {
                format!("<div class=\"standalone-media\">{inner}</div>")
            } else {
                inner
            }
        }
        BlockContent::Video { slot, poster } => {
            let inner = video_html(block, slot, poster.as_deref());
            if standalone {
                format!("<div class=\"standalone-media\">{inner}</div>")
            } else {
                inner
            }
        }
    }
}

fn node_html(node: &NodeView) -> String {
    let class = if node.is_highlight {
        "timeline-node highlight"
    } else {
        "timeline-node"
    };
    let mut out = format!(
        "<article class=\"{class}\" data-node-id=\"{}\" data-index=\"{}\">\n",
        node.id, node.index
    );
    out.push_str(&format!(
        "  <div class=\"timeline-date\">{}</div>\n  <div class=\"timeline-content\">\n",
        escape_html(&node.date)
    ));
    if let Some(title) = &node.title {
        out.push_str(&format!("    <h3 class=\"timeline-title\">{}</h3>\n", escape_html(title)));
    }
    for block in &node.blocks {
        out.push_str("    ");
        out.push_str(&block_html(block, false));
        out.push('\n');
    }
    out.push_str("  </div>\n</article>\n");
    out
}

fn ending_html(ending: &EndingView) -> String {
    format!(
        "<section class=\"timeline-ending\">\n  <div class=\"ending-content\">\n    \
         <p class=\"ending-message\">{}</p>\n    \
         <p class=\"ending-signature\">{}</p>\n    \
         <p class=\"ending-name\">{}</p>\n    \
         <p class=\"ending-date\">{}</p>\n  </div>\n</section>\n",
        escape_html(&ending.message),
        escape_html(&ending.signature),
        escape_html(&ending.name),
        escape_html(&ending.date)
    )
}

/// Render the whole tree as an HTML fragment.
pub fn to_html(tree: &DisplayTree) -> String {
    let mut out = String::from("<div class=\"timeline\">\n");
    for item in &tree.items {
        match item {
            DisplayItem::Node(node) => out.push_str(&node_html(node)),
            DisplayItem::Standalone { id, block } => out.push_str(&format!(
                "<div class=\"standalone-block\" data-block-id=\"{}\">{}</div>\n",
                escape_html(id.as_str()),
                block_html(block, true)
            )),
        }
    }
    out.push_str("</div>\n");
    out.push_str(&ending_html(&tree.ending));
    out
}
