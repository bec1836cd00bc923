//! Service container for dependency injection
//!
//! Wires up all services around one immutable configuration.

use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use tracing::instrument;

use crate::application::services::{
    BoundsMutator, DeletionCoordinator, IntegrityService, QueryPlanner,
};
use crate::application::ApplicationResult;
use crate::config::TreeConfig;
use crate::domain::{TreeArena, TreeId};
use crate::infrastructure::traits::RowStore;
use crate::tree_traits::TreeNodeConvert;

/// Container holding all tree services.
pub struct ServiceContainer {
    /// Tree configuration, shared by every service
    pub config: Arc<TreeConfig>,

    pub mutator: BoundsMutator,
    pub planner: QueryPlanner,
    pub deletion: DeletionCoordinator,
    pub integrity: IntegrityService,
}

impl ServiceContainer {
    /// Create the services for `config`.
    ///
    /// Fails when the configured tree id type cannot be generated.
    pub fn new(config: TreeConfig) -> ApplicationResult<Self> {
        let config = Arc::new(config);

        Ok(Self {
            mutator: BoundsMutator::new(Arc::clone(&config))?,
            planner: QueryPlanner::new(Arc::clone(&config)),
            deletion: DeletionCoordinator::new(Arc::clone(&config)),
            integrity: IntegrityService::new(Arc::clone(&config)),
            config,
        })
    }

    /// Create the services from layered configuration (see [`TreeConfig::load`]).
    pub fn load(path: Option<&Path>) -> ApplicationResult<Self> {
        Self::new(TreeConfig::load(path)?)
    }

    /// Text rendering of one tree, visible rows only.
    #[instrument(level = "debug", skip(self, store))]
    pub fn render<S>(&self, store: &S, tree_id: Option<&TreeId>) -> ApplicationResult<String>
    where
        S: RowStore,
        S::Node: Display,
    {
        let rows = self.planner.tree(store, tree_id)?;
        Ok(TreeArena::from_intervals(rows).to_tree_string().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldType, Row, TreeError};
    use crate::infrastructure::MemoryStore;

    #[test]
    fn given_default_config_when_creating_container_then_services_share_it() {
        let container = ServiceContainer::new(TreeConfig::default()).unwrap();
        assert_eq!(Arc::strong_count(&container.config), 5);
        assert!(std::ptr::eq(container.mutator.config(), container.config.as_ref()));
    }

    #[test]
    fn given_string_tree_id_when_creating_container_then_unsupported() {
        let result = ServiceContainer::new(TreeConfig::multi_tree(FieldType::String));
        match result {
            Err(e) => assert_eq!(
                e.tree_error(),
                Some(&TreeError::UnsupportedFieldType(FieldType::String))
            ),
            Ok(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn given_tree_when_rendering_then_nested_text() {
        let container = ServiceContainer::new(TreeConfig::default()).unwrap();
        let mut store = MemoryStore::<Row>::new();
        let root = container.mutator.make_root(&mut store, Row::new("root")).unwrap();
        container
            .mutator
            .append_to(&mut store, &root, Row::new("child"))
            .unwrap();

        let rendered = container.render(&store, None).unwrap();
        assert_eq!(rendered.lines().next(), Some("root [1, 4]"));
        assert!(rendered.contains("child [2, 3]"));
    }
}
