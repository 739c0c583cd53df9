//! Ending, music and avatar settings that live beside the timeline.

use std::collections::{BTreeMap, BTreeSet};

use keepsake_types::MediaRef;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Text shown on the closing page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndingConfig {
    pub message: String,
    pub signature: String,
    pub name: String,
    pub date: String,
}

impl Default for EndingConfig {
    fn default() -> Self {
        Self {
            message: "The road is long, but I will always be by your side!".to_string(),
            signature: "Forever yours".to_string(),
            name: "[Your name]".to_string(),
            date: "[A day to remember]".to_string(),
        }
    }
}

impl EndingConfig {
    pub fn apply(&mut self, field: EndingField) {
        match field {
            EndingField::Message(v) => self.message = v,
            EndingField::Signature(v) => self.signature = v,
            EndingField::Name(v) => self.name = v,
            EndingField::Date(v) => self.date = v,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndingField {
    Message(String),
    Signature(String),
    Name(String),
    Date(String),
}

impl EndingField {
    pub fn parse(name: &str, value: &str) -> ModelResult<Self> {
        let value = value.to_string();
        match name {
            "message" => Ok(EndingField::Message(value)),
            "signature" => Ok(EndingField::Signature(value)),
            "name" => Ok(EndingField::Name(value)),
            "date" => Ok(EndingField::Date(value)),
            other => Err(ModelError::UnknownField(other.to_string())),
        }
    }
}

/// Background music track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicConfig {
    pub name: String,
    /// Display label such as `3.6 MB`.
    pub size_label: String,
    pub data: MediaRef,
}

impl MusicConfig {
    pub const DEFAULT_ASSET: &'static str = "assets/music/bg-music.mp3";

    /// `true` once the user has uploaded a track (it is carried inline).
    pub fn is_custom(&self) -> bool {
        self.data.is_self_contained()
    }
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            name: "One Summer's Day.mp3".to_string(),
            size_label: "3.6 MB".to_string(),
            data: MediaRef::Inline(Self::DEFAULT_ASSET.to_string()),
        }
    }
}

/// Placement of a photo inside its avatar frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageOffset {
    pub x: f64,
    pub y: f64,
}

/// One avatar of the landing mini-game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Avatar {
    pub id: String,
    pub name: String,
    pub photo: Option<MediaRef>,
    pub image_offset: ImageOffset,
    pub image_scale: f64,
}

/// The mini-game's persisted avatar state, assembled from its per-field maps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AvatarRoster {
    pub avatars: Vec<Avatar>,
}

impl AvatarRoster {
    /// Join the four keyed maps into one avatar per id seen in any of them.
    pub fn from_parts(
        photos: BTreeMap<String, MediaRef>,
        names: BTreeMap<String, String>,
        offsets: BTreeMap<String, ImageOffset>,
        scales: BTreeMap<String, f64>,
    ) -> Self {
        let ids: BTreeSet<&String> = photos
            .keys()
            .chain(names.keys())
            .chain(offsets.keys())
            .chain(scales.keys())
            .collect();
        let avatars = ids
            .into_iter()
            .map(|id| Avatar {
                id: id.clone(),
                name: names.get(id).cloned().unwrap_or_default(),
                photo: photos.get(id).cloned(),
                image_offset: offsets.get(id).copied().unwrap_or_default(),
                image_scale: scales.get(id).copied().unwrap_or(1.0),
            })
            .collect();
        Self { avatars }
    }

    pub fn is_empty(&self) -> bool {
        self.avatars.is_empty()
    }

    pub fn photos(&self) -> impl Iterator<Item = (&str, &MediaRef)> {
        self.avatars
            .iter()
            .filter_map(|a| a.photo.as_ref().map(|p| (a.id.as_str(), p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ending_partial_json_fills_defaults() {
        let ending: EndingConfig = serde_json::from_str(r#"{"name":"Sam"}"#).unwrap();
        assert_eq!(ending.name, "Sam");
        assert_eq!(ending.signature, EndingConfig::default().signature);
    }

    #[test]
    fn ending_field_update() {
        let mut ending = EndingConfig::default();
        ending.apply(EndingField::parse("date", "June 1").unwrap());
        assert_eq!(ending.date, "June 1");
        assert!(EndingField::parse("colour", "x").is_err());
    }

    #[test]
    fn default_music_is_asset_path() {
        let music = MusicConfig::default();
        assert!(!music.is_custom());
        assert_eq!(music.data, MediaRef::Inline("assets/music/bg-music.mp3".into()));
    }

    #[test]
    fn roster_joins_maps_by_id() {
        let mut names = BTreeMap::new();
        names.insert("a".to_string(), "Alex".to_string());
        names.insert("b".to_string(), "Blair".to_string());
        let mut photos = BTreeMap::new();
        photos.insert("b".to_string(), MediaRef::Inline("data:image/png;base64,AA==".into()));
        let mut scales = BTreeMap::new();
        scales.insert("c".to_string(), 1.5);

        let roster = AvatarRoster::from_parts(photos, names, BTreeMap::new(), scales);
        assert_eq!(roster.avatars.len(), 3);
        assert_eq!(roster.avatars[0].name, "Alex");
        assert_eq!(roster.avatars[0].image_scale, 1.0);
        assert_eq!(roster.avatars[2].image_scale, 1.5);
        assert_eq!(roster.photos().count(), 1);
    }
}
