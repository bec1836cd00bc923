//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults (single tree, no soft delete, cascade delete)
//! 2. Config file: a TOML file given by the embedding application
//! 3. Environment variables: `NESTEDSET_*` prefix
//!
//! The loaded value is immutable; services share it as `Arc<TreeConfig>`.

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::FieldType;

/// What happens to the children of a deleted node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStrategy {
    /// Remove the node together with its whole subtree
    #[default]
    Cascade,
    /// Hand the direct children over to the node's parent, remove only the node
    Reparent,
    /// Refuse to delete nodes that still have children
    Forbid,
}

/// What a restore brings back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStrategy {
    #[default]
    SelfOnly,
    /// The node and every trashed descendant
    Cascade,
}

/// Tree engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreeConfig {
    /// Tree id column type; setting it turns on multi-tree mode
    pub tree_id: Option<FieldType>,
    /// Primary key type, mirrored by the parent reference column
    pub key_type: FieldType,
    /// Deletes are logical (tombstones) unless forced
    pub soft_delete: bool,
    /// Allow more than one root per tree scope
    pub allow_multiple_roots: bool,
    pub delete_strategy: DeleteStrategy,
    pub restore_strategy: RestoreStrategy,
    /// Trashed children still make their parent a non-leaf and count as descendants
    pub count_trashed_children: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            tree_id: None,
            key_type: FieldType::UnsignedBigInteger,
            soft_delete: false,
            allow_multiple_roots: false,
            delete_strategy: DeleteStrategy::default(),
            restore_strategy: RestoreStrategy::default(),
            count_trashed_children: false,
        }
    }
}

/// Column of the tree contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
    pub comment: &'static str,
}

/// Composite index over tree columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub columns: Vec<&'static str>,
}

impl TreeConfig {
    /// Multi-tree configuration with the given tree id column type.
    pub fn multi_tree(tree_id: FieldType) -> Self {
        Self {
            tree_id: Some(tree_id),
            ..Self::default()
        }
    }

    pub fn with_soft_delete(mut self, soft_delete: bool) -> Self {
        self.soft_delete = soft_delete;
        self
    }

    pub fn with_delete_strategy(mut self, strategy: DeleteStrategy) -> Self {
        self.delete_strategy = strategy;
        self
    }

    pub fn with_restore_strategy(mut self, strategy: RestoreStrategy) -> Self {
        self.restore_strategy = strategy;
        self
    }

    pub fn with_multiple_roots(mut self, allow: bool) -> Self {
        self.allow_multiple_roots = allow;
        self
    }

    pub fn with_count_trashed_children(mut self, count: bool) -> Self {
        self.count_trashed_children = count;
        self
    }

    pub fn is_multi_tree(&self) -> bool {
        self.tree_id.is_some()
    }

    /// Tree columns and their types for the configured mode.
    pub fn columns(&self) -> Vec<ColumnSpec> {
        let mut columns = vec![
            ColumnSpec {
                name: "left",
                field_type: FieldType::UnsignedInteger,
                nullable: false,
                comment: "left bound of the node",
            },
            ColumnSpec {
                name: "right",
                field_type: FieldType::UnsignedInteger,
                nullable: false,
                comment: "right bound of the node",
            },
            ColumnSpec {
                name: "level",
                field_type: FieldType::UnsignedInteger,
                nullable: false,
                comment: "depth of the node, root is 0",
            },
            ColumnSpec {
                name: "parent_id",
                field_type: self.key_type,
                nullable: true,
                comment: "parent node, null for roots",
            },
        ];
        if let Some(tree_id) = self.tree_id {
            columns.push(ColumnSpec {
                name: "tree_id",
                field_type: tree_id,
                nullable: false,
                comment: "tree the node belongs to",
            });
        }
        columns
    }

    /// Composite indexes; multi-tree mode prefixes each with the tree id.
    pub fn indexes(&self) -> Vec<IndexSpec> {
        let prefix: Vec<&'static str> = if self.is_multi_tree() {
            vec!["tree_id"]
        } else {
            vec![]
        };
        vec![
            IndexSpec {
                name: "bounds",
                columns: [prefix.as_slice(), &["left", "right"][..]].concat(),
            },
            IndexSpec {
                name: "parent",
                columns: [prefix.as_slice(), &["parent_id"][..]].concat(),
            },
        ]
    }

    /// Load the configuration with layered precedence.
    ///
    /// # Arguments
    /// * `path` - Optional TOML file; it must exist when given
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. The TOML file
    /// 3. Environment variables: `NESTEDSET_SOFT_DELETE=true`, `NESTEDSET_TREE_ID=uuid`, ...
    pub fn load(path: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("NESTEDSET")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;
        config.try_deserialize().map_err(config_err)
    }

    /// Parse a TOML document on top of the compiled defaults.
    pub fn from_toml(content: &str) -> Result<Self, ApplicationError> {
        toml::from_str(content).map_err(|e| ApplicationError::Config {
            message: format!("parse tree config: {e}"),
        })
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# nestedset configuration
#
# Environment variables override file values: NESTEDSET_<KEY>, e.g.
#   NESTEDSET_SOFT_DELETE=true
#   NESTEDSET_DELETE_STRATEGY=reparent

# Tree id column type. Setting it enables multi-tree mode.
# One of: unsigned_integer, unsigned_big_integer, integer, big_integer, uuid, ulid
# tree_id = "uuid"

# Primary key type (also the parent reference type)
# key_type = "unsigned_big_integer"

# Deletes leave a tombstone and keep the node's bounds until purged
# soft_delete = false

# Allow more than one root per tree
# allow_multiple_roots = false

# Children of a deleted node: cascade | reparent | forbid
# delete_strategy = "cascade"

# Restore: self_only | cascade
# restore_strategy = "self_only"

# Trashed children keep their parent from being a leaf
# count_trashed_children = false
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_created_then_single_tree_with_cascade() {
        let config = TreeConfig::default();
        assert!(!config.is_multi_tree());
        assert!(!config.soft_delete);
        assert_eq!(config.delete_strategy, DeleteStrategy::Cascade);
        assert_eq!(config.restore_strategy, RestoreStrategy::SelfOnly);
    }

    #[test]
    fn given_single_tree_when_listing_indexes_then_no_tree_prefix() {
        let indexes = TreeConfig::default().indexes();
        assert_eq!(indexes[0].columns, vec!["left", "right"]);
        assert_eq!(indexes[1].columns, vec!["parent_id"]);
    }

    #[test]
    fn given_multi_tree_when_listing_indexes_then_tree_id_leads() {
        let config = TreeConfig::multi_tree(FieldType::Uuid);
        let indexes = config.indexes();
        assert_eq!(indexes[0].columns, vec!["tree_id", "left", "right"]);
        assert_eq!(indexes[1].columns, vec!["tree_id", "parent_id"]);
        assert!(config.columns().iter().any(|c| c.name == "tree_id"));
    }

    #[test]
    fn given_partial_toml_when_parsing_then_missing_keys_use_defaults() {
        let config = TreeConfig::from_toml(
            r#"
soft_delete = true
delete_strategy = "reparent"
"#,
        )
        .expect("parse config");

        assert!(config.soft_delete);
        assert_eq!(config.delete_strategy, DeleteStrategy::Reparent);
        assert_eq!(config.key_type, FieldType::UnsignedBigInteger);
        assert!(!config.allow_multiple_roots);
    }

    #[test]
    fn given_config_when_rendering_toml_then_round_trips() {
        let config = TreeConfig::multi_tree(FieldType::Ulid).with_soft_delete(true);
        let rendered = config.to_toml().expect("render");
        let parsed = TreeConfig::from_toml(&rendered).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn given_template_when_parsing_then_equals_defaults() {
        let parsed = TreeConfig::from_toml(&TreeConfig::template()).expect("parse template");
        assert_eq!(parsed, TreeConfig::default());
    }
}
