use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

static LAST_NODE_ID: AtomicU64 = AtomicU64::new(0);

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

fn validate(raw: &str) -> Result<(), TypeError> {
    if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        return Err(TypeError::InvalidId(raw.to_string()));
    }
    Ok(())
}

/// Media ids double as file names, so only ASCII letters, digits, `_` and
/// `-` are allowed.
fn validate_key(raw: &str) -> Result<(), TypeError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
    if raw.is_empty() || !raw.chars().all(allowed) {
        return Err(TypeError::InvalidId(raw.to_string()));
    }
    Ok(())
}

/// Key of a record in the binary object store.
///
/// Generated as `img_<unix millis>_<9 random base36 chars>`, so ids created in
/// the same millisecond still differ with overwhelming probability. Stores
/// additionally reject a colliding id and regenerate.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MediaId(String);

impl TryFrom<String> for MediaId {
    type Error = TypeError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        validate_key(&raw)?;
        Ok(Self(raw))
    }
}

impl From<MediaId> for String {
    fn from(id: MediaId) -> Self {
        id.0
    }
}

impl MediaId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(format!("img_{}_{}", now_millis(), random_suffix()))
    }

    /// Parse an id read from persisted data.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        Self::try_from(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaId({})", self.0)
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a story node.
///
/// Node ids are millisecond timestamps bumped past every id already in the
/// document, so an id is never handed out twice within one timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Allocate an id greater than every id in `existing` and every id
    /// this process has allocated before.
    pub fn allocate<'a>(existing: impl IntoIterator<Item = &'a NodeId>) -> Self {
        let floor = existing.into_iter().map(|id| id.0 + 1).max().unwrap_or(1);
        let candidate = now_millis().max(floor);
        let previous = LAST_NODE_ID
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last + 1))
            })
            .unwrap_or(0);
        Self(candidate.max(previous + 1))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a content block inside a node: `c_<node id>_<creation seq>`.
///
/// The sequence number is a per-node creation counter, not a position, so
/// the id survives any reordering of sibling blocks.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn derive(node: NodeId, seq: u32) -> Self {
        Self(format!("c_{node}_{seq}"))
    }

    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        validate(raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a standalone block.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn generate() -> Self {
        Self(format!("standalone_{}_{}", now_millis(), random_suffix()))
    }

    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        validate(raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one editing session.
///
/// Transient media handles are scoped to the session that minted them; a
/// handle carrying any other session id is stale.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// The nil session. No live session ever has this id, so handles bound to
    /// it (for example handles decoded from legacy `blob:` URLs) are always stale.
    pub const fn nil() -> Self {
        Self(uuid::Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.short_id())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
