//! Evaluation contexts.
//!
//! A [`Context`] is the immutable environment threaded through every
//! computation: the current scene path, the current tile origin, the
//! current frame. The same plug can hold different values "simultaneously"
//! under different contexts, so the context participates in every cache
//! key. Contexts are cheap to fork: `with` shares nothing mutable and
//! recomputes the content hash once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use xxhash_rust::xxh3::Xxh3;

use crate::errors::{Result, StrataError};
use crate::graph::value::Value;
use crate::scene::path::ScenePath;

/// Standard context variable names.
pub mod vars {
    /// Current scene location, as a slash-separated path string.
    pub const SCENE_PATH: &str = "scene:path";
    /// Current image tile origin ([`Value::Coord`](crate::graph::value::Value)).
    pub const TILE_ORIGIN: &str = "image:tileOrigin";
    /// Current image channel name.
    pub const CHANNEL_NAME: &str = "image:channelName";
    /// Current frame number.
    pub const FRAME: &str = "frame";
}

/// Cooperative cancellation token.
///
/// Shared between the owner of a query and the computes it spawns. A
/// cancelled compute unwinds with [`StrataError::Cancelled`]; the value
/// cache guarantees its partial entry is never published.
#[derive(Debug, Clone, Default)]
pub struct Canceller(Arc<AtomicBool>);

impl Canceller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Immutable variable environment for one evaluation.
///
/// Two contexts are equal iff all entries compare equal; the attached
/// canceller takes no part in equality or hashing.
#[derive(Debug, Clone, Default)]
pub struct Context {
    // Sorted by name, so hashing and narrowing are order-independent.
    entries: Arc<Vec<(Arc<str>, Value)>>,
    hash: u64,
    canceller: Option<Canceller>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fork of this context with `name` set to `value`.
    #[must_use]
    pub fn with(&self, name: &str, value: Value) -> Self {
        let mut entries: Vec<(Arc<str>, Value)> = (*self.entries).clone();
        match entries.binary_search_by(|(n, _)| n.as_ref().cmp(name)) {
            Ok(i) => entries[i].1 = value,
            Err(i) => entries.insert(i, (Arc::from(name), value)),
        }
        let hash = hash_entries(entries.iter());
        Self {
            entries: Arc::new(entries),
            hash,
            canceller: self.canceller.clone(),
        }
    }

    /// A fork with the standard scene-path variable set.
    #[must_use]
    pub fn with_path(&self, path: &ScenePath) -> Self {
        self.with(vars::SCENE_PATH, Value::string(&path.to_string()))
    }

    /// A fork carrying a cancellation token.
    #[must_use]
    pub fn with_canceller(&self, canceller: Canceller) -> Self {
        let mut ctx = self.clone();
        ctx.canceller = Some(canceller);
        ctx
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .binary_search_by(|(n, _)| n.as_ref().cmp(name))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    /// The scene path variable, parsed. Errors if unset.
    pub fn scene_path(&self) -> Result<ScenePath> {
        match self.get(vars::SCENE_PATH) {
            Some(value) => Ok(ScenePath::parse(&value.expect_string(vars::SCENE_PATH)?)),
            None => Err(StrataError::PathNotFound(
                "no scene:path in context".to_owned(),
            )),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_ref(), v))
    }

    /// Content hash over every entry.
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Content hash over only the named entries.
    ///
    /// This is the narrowing step of cache-key derivation: a node that
    /// declares some context variables irrelevant to a plug shares cache
    /// entries across queries that differ only in those variables.
    #[must_use]
    pub fn narrowed_hash(&self, names: &[&str]) -> u64 {
        hash_entries(
            self.entries
                .iter()
                .filter(|(n, _)| names.contains(&n.as_ref())),
        )
    }

    #[must_use]
    pub fn canceller(&self) -> Option<&Canceller> {
        self.canceller.as_ref()
    }

    /// Errors with [`StrataError::Cancelled`] if the owning query was
    /// abandoned. Long computes should call this at convenient points.
    pub fn check_cancelled(&self) -> Result<()> {
        match &self.canceller {
            Some(c) if c.is_cancelled() => Err(StrataError::Cancelled),
            _ => Ok(()),
        }
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && *self.entries == *other.entries
    }
}

fn hash_entries<'a>(entries: impl Iterator<Item = &'a (Arc<str>, Value)>) -> u64 {
    let mut hasher = Xxh3::new();
    for (name, value) in entries {
        hasher.update(name.as_bytes());
        hasher.update(&[0xfe]);
        value.feed_hash(&mut hasher);
    }
    hasher.digest()
}
