use std::collections::HashSet;

use keepsake_types::{ContentId, NodeId};
use serde::{Deserialize, Serialize};

use crate::block::{BlockBody, ContentBlock};
use crate::error::{ModelError, ModelResult};

/// One dated timeline entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryNode {
    pub id: NodeId,
    /// Free-text label; never parsed as a calendar date.
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub is_highlight: bool,
    #[serde(default)]
    pub contents: Vec<ContentBlock>,
    /// Creation counter backing [`ContentId`]s. Only ever grows.
    #[serde(default)]
    pub next_content_seq: u32,
}

impl StoryNode {
    /// A node with placeholder labels and no content.
    pub fn blank(id: NodeId) -> Self {
        Self {
            id,
            date: "New date".to_string(),
            title: Some("New title".to_string()),
            is_highlight: false,
            contents: Vec::new(),
            next_content_seq: 0,
        }
    }

    /// Append a block, minting its content id.
    pub fn push_block(&mut self, body: BlockBody) -> ContentId {
        let seq = match self.next_content_seq.checked_add(1) {
            Some(next) => std::mem::replace(&mut self.next_content_seq, next),
            None => self.lowest_free_seq(),
        };
        let content_id = ContentId::derive(self.id, seq);
        self.contents.push(ContentBlock {
            content_id: content_id.clone(),
            body,
        });
        content_id
    }

    fn existing_seqs(&self) -> impl Iterator<Item = u32> + '_ {
        let prefix = format!("c_{}_", self.id);
        self.contents
            .iter()
            .filter_map(move |block| block.content_id.as_str().strip_prefix(&prefix)?.parse::<u32>().ok())
    }

    /// Used once the counter is exhausted.
    fn lowest_free_seq(&self) -> u32 {
        let used: HashSet<u32> = self.existing_seqs().collect();
        (0..=u32::MAX).find(|seq| !used.contains(seq)).unwrap_or(u32::MAX)
    }

    /// Make sure the counter is past every existing block, so ids minted
    /// later cannot clash with ids loaded from storage.
    pub(crate) fn repair_content_seq(&mut self) {
        let floor = self
            .existing_seqs()
            .map(|seq| seq.saturating_add(1))
            .max()
            .unwrap_or(0)
            .max(self.contents.len() as u32);
        self.next_content_seq = self.next_content_seq.max(floor);
    }

    pub fn apply(&mut self, field: NodeField) {
        match field {
            NodeField::Date(date) => self.date = date,
            NodeField::Title(title) => self.title = title,
            NodeField::IsHighlight(flag) => self.is_highlight = flag,
        }
    }
}

/// An editable node field with its new value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeField {
    Date(String),
    Title(Option<String>),
    IsHighlight(bool),
}

impl NodeField {
    pub fn parse(name: &str, value: &str) -> ModelResult<Self> {
        match name {
            "date" => Ok(NodeField::Date(value.to_string())),
            "title" => Ok(NodeField::Title((!value.is_empty()).then(|| value.to_string()))),
            "highlight" | "isHighlight" | "is_highlight" => value
                .parse::<bool>()
                .map(NodeField::IsHighlight)
                .map_err(|e| ModelError::InvalidValue {
                    field: name.to_string(),
                    reason: e.to_string(),
                }),
            other => Err(ModelError::UnknownField(other.to_string())),
        }
    }
}
