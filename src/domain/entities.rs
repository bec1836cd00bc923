//! Domain entities: node contract, identifiers and placement vocabulary

use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Column type of a tree field.
///
/// Drives tree identifier generation and the column/index description of a table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    UnsignedInteger,
    UnsignedBigInteger,
    Integer,
    BigInteger,
    Uuid,
    Ulid,
    String,
}

impl FieldType {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::UnsignedInteger | Self::UnsignedBigInteger | Self::Integer | Self::BigInteger
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnsignedInteger => "unsigned_integer",
            Self::UnsignedBigInteger => "unsigned_big_integer",
            Self::Integer => "integer",
            Self::BigInteger => "big_integer",
            Self::Uuid => "uuid",
            Self::Ulid => "ulid",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// Identifier of one tree in multi-tree mode.
///
/// Rows sharing a tree id form one interval namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeId {
    Int(u64),
    Uuid(Uuid),
    /// 32 lowercase hex digits
    Hex(String),
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Uuid(id) => write!(f, "{id}"),
            Self::Hex(id) => f.write_str(id),
        }
    }
}

impl From<u64> for TreeId {
    fn from(id: u64) -> Self {
        Self::Int(id)
    }
}

impl From<Uuid> for TreeId {
    fn from(id: Uuid) -> Self {
        Self::Uuid(id)
    }
}

/// Structural operation being performed; used in errors and log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    MakeRoot,
    PrependTo,
    AppendTo,
    InsertBefore,
    InsertAfter,
    MoveTo,
    Delete,
    ForceDelete,
    Purge,
    Restore,
    Query,
    Rebuild,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MakeRoot => "make root",
            Self::PrependTo => "prepend to",
            Self::AppendTo => "append to",
            Self::InsertBefore => "insert before",
            Self::InsertAfter => "insert after",
            Self::MoveTo => "move to",
            Self::Delete => "delete",
            Self::ForceDelete => "force delete",
            Self::Purge => "purge",
            Self::Restore => "restore",
            Self::Query => "query",
            Self::Rebuild => "rebuild",
        };
        f.write_str(name)
    }
}

/// Where a node lands relative to a target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Leftmost child of the target
    Prepend,
    /// Rightmost child of the target
    Append,
    /// Sibling immediately left of the target
    Before,
    /// Sibling immediately right of the target
    After,
}

impl Placement {
    pub fn operation(self) -> Operation {
        match self {
            Self::Prepend => Operation::PrependTo,
            Self::Append => Operation::AppendTo,
            Self::Before => Operation::InsertBefore,
            Self::After => Operation::InsertAfter,
        }
    }
}

/// Accessor contract for one row of hierarchical data.
///
/// The engine reads and writes nodes only through this trait, so any row type of the
/// embedding application can take part. A node without a key has not been persisted.
pub trait NestedNode: Clone + fmt::Debug {
    type Key: Clone + Eq + Ord + Hash + fmt::Debug + fmt::Display;

    fn key(&self) -> Option<&Self::Key>;
    fn set_key(&mut self, key: Self::Key);

    fn left(&self) -> i64;
    fn set_left(&mut self, left: i64);

    fn right(&self) -> i64;
    fn set_right(&mut self, right: i64);

    fn level(&self) -> i64;
    fn set_level(&mut self, level: i64);

    fn parent(&self) -> Option<&Self::Key>;
    fn set_parent(&mut self, parent: Option<Self::Key>);

    fn tree_id(&self) -> Option<&TreeId>;
    fn set_tree_id(&mut self, tree_id: Option<TreeId>);

    fn deleted_at(&self) -> Option<DateTime<Utc>>;
    fn set_deleted_at(&mut self, deleted_at: Option<DateTime<Utc>>);

    fn is_persisted(&self) -> bool {
        self.key().is_some()
    }

    fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    fn is_trashed(&self) -> bool {
        self.deleted_at().is_some()
    }

    /// Number of bound values covered by the subtree, `2 * subtree size`.
    fn width(&self) -> i64 {
        self.right() - self.left() + 1
    }

    /// Count of nodes within the interval, inclusive.
    fn subtree_size(&self) -> i64 {
        self.width() / 2
    }

    /// True when `other` lies strictly inside this node's interval in the same tree.
    fn contains(&self, other: &Self) -> bool {
        self.tree_id() == other.tree_id()
            && self.left() < other.left()
            && other.right() < self.right()
    }

    /// True when this node is a strict descendant of `other`.
    fn is_child_of(&self, other: &Self) -> bool {
        other.contains(self)
    }

    fn display_key(&self) -> String {
        self.key()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "<unsaved>".to_string())
    }
}

/// General purpose node row keyed by `u64`, carrying a text label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: Option<u64>,
    pub label: String,
    pub left: i64,
    pub right: i64,
    pub level: i64,
    pub parent_id: Option<u64>,
    pub tree_id: Option<TreeId>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Row {
    /// Unsaved row; bounds are assigned on insertion.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            left: 0,
            right: 0,
            level: 0,
            parent_id: None,
            tree_id: None,
            deleted_at: None,
        }
    }

    /// Unsaved row pinned to a tree.
    pub fn in_tree(label: impl Into<String>, tree_id: impl Into<TreeId>) -> Self {
        Self {
            tree_id: Some(tree_id.into()),
            ..Self::new(label)
        }
    }

    pub fn bounds(&self) -> (i64, i64) {
        (self.left, self.right)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {}]", self.label, self.left, self.right)?;
        if self.deleted_at.is_some() {
            write!(f, " (trashed)")?;
        }
        Ok(())
    }
}

impl NestedNode for Row {
    type Key = u64;

    fn key(&self) -> Option<&u64> {
        self.id.as_ref()
    }

    fn set_key(&mut self, key: u64) {
        self.id = Some(key);
    }

    fn left(&self) -> i64 {
        self.left
    }

    fn set_left(&mut self, left: i64) {
        self.left = left;
    }

    fn right(&self) -> i64 {
        self.right
    }

    fn set_right(&mut self, right: i64) {
        self.right = right;
    }

    fn level(&self) -> i64 {
        self.level
    }

    fn set_level(&mut self, level: i64) {
        self.level = level;
    }

    fn parent(&self) -> Option<&u64> {
        self.parent_id.as_ref()
    }

    fn set_parent(&mut self, parent: Option<u64>) {
        self.parent_id = parent;
    }

    fn tree_id(&self) -> Option<&TreeId> {
        self.tree_id.as_ref()
    }

    fn set_tree_id(&mut self, tree_id: Option<TreeId>) {
        self.tree_id = tree_id;
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, deleted_at: Option<DateTime<Utc>>) {
        self.deleted_at = deleted_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(left: i64, right: i64) -> Row {
        Row {
            left,
            right,
            ..Row::new("n")
        }
    }

    #[test]
    fn given_nested_intervals_when_testing_containment_then_only_strict_inner_matches() {
        let outer = row(1, 8);
        let inner = row(4, 5);

        assert!(outer.contains(&inner));
        assert!(inner.is_child_of(&outer));
        assert!(!inner.contains(&outer));
        assert!(!outer.contains(&outer));
    }

    #[test]
    fn given_different_trees_when_testing_containment_then_not_contained() {
        let outer = Row {
            tree_id: Some(TreeId::Int(1)),
            ..row(1, 8)
        };
        let inner = Row {
            tree_id: Some(TreeId::Int(2)),
            ..row(4, 5)
        };

        assert!(!outer.contains(&inner));
    }

    #[test]
    fn given_subtree_when_measuring_then_width_is_twice_size() {
        let node = row(2, 7);
        assert_eq!(node.width(), 6);
        assert_eq!(node.subtree_size(), 3);
    }

    #[test]
    fn given_field_types_when_classifying_then_integers_detected() {
        assert!(FieldType::UnsignedBigInteger.is_integer());
        assert!(FieldType::Integer.is_integer());
        assert!(!FieldType::Uuid.is_integer());
        assert!(!FieldType::Ulid.is_integer());
    }
}
