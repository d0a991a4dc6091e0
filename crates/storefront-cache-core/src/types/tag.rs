//! Invalidation tags

use std::borrow::Cow;
use std::fmt;

/// Conventional instance id for "the list of this kind"
pub const LIST_ID: &str = "LIST";

/// Invalidation scope attached to cached query results
///
/// `Type` names a whole collection (`Brand`), `Id` a single instance
/// (`Brand:17`). Queries provide tags, mutations invalidate them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    /// Every entry of a kind
    Type(Cow<'static, str>),
    /// One instance of a kind
    Id {
        kind: Cow<'static, str>,
        id: String,
    },
}

impl Tag {
    /// Collection-level tag
    pub fn ty(kind: impl Into<Cow<'static, str>>) -> Self {
        Tag::Type(kind.into())
    }

    /// Instance-level tag
    pub fn id(kind: impl Into<Cow<'static, str>>, id: impl fmt::Display) -> Self {
        Tag::Id {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    /// The `LIST` instance of a kind, provided by list queries
    pub fn list(kind: impl Into<Cow<'static, str>>) -> Self {
        Self::id(kind, LIST_ID)
    }

    /// Kind shared by both variants
    pub fn kind(&self) -> &str {
        match self {
            Tag::Type(kind) => kind,
            Tag::Id { kind, .. } => kind,
        }
    }

    /// Whether invalidating `self` hits an entry that provides `provided`
    ///
    /// Equal tags match. A `Type` tag also matches every tag of its kind.
    pub fn matches(&self, provided: &Tag) -> bool {
        match self {
            Tag::Type(kind) => provided.kind() == kind,
            Tag::Id { .. } => self == provided,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Type(kind) => write!(f, "{kind}"),
            Tag::Id { kind, id } => write!(f, "{kind}:{id}"),
        }
    }
}
