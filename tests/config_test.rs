//! Tests for layered configuration loading

use std::path::PathBuf;

use tempfile::TempDir;

use nestedset::domain::FieldType;
use nestedset::util::testing;
use nestedset::{DeleteStrategy, RestoreStrategy, ServiceContainer, TreeConfig};

/// Helper to write a config file into a temp dir
fn create_config_file(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("nestedset.toml");
    std::fs::write(&path, content).expect("write config file");
    path
}

#[test]
fn given_config_file_when_loading_then_file_values_override_defaults() {
    // Arrange
    testing::init_test_setup();
    let temp = TempDir::new().unwrap();
    let path = create_config_file(
        &temp,
        r#"
tree_id = "uuid"
soft_delete = true
delete_strategy = "forbid"
restore_strategy = "cascade"
"#,
    );

    // Act
    let config = TreeConfig::load(Some(&path)).unwrap();

    // Assert
    assert_eq!(config.tree_id, Some(FieldType::Uuid));
    assert!(config.is_multi_tree());
    assert!(config.soft_delete);
    assert_eq!(config.delete_strategy, DeleteStrategy::Forbid);
    assert_eq!(config.restore_strategy, RestoreStrategy::Cascade);
    assert_eq!(config.key_type, FieldType::UnsignedBigInteger);
}

#[test]
fn given_missing_config_file_when_loading_then_config_error() {
    testing::init_test_setup();
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("absent.toml");

    let result = TreeConfig::load(Some(&missing));

    assert!(matches!(
        result,
        Err(nestedset::ApplicationError::Config { .. })
    ));
}

#[test]
fn given_env_variable_when_loading_then_env_overrides_file() {
    // Arrange
    testing::init_test_setup();
    let temp = TempDir::new().unwrap();
    let path = create_config_file(&temp, "count_trashed_children = false\n");
    std::env::set_var("NESTEDSET_COUNT_TRASHED_CHILDREN", "true");

    // Act
    let config = TreeConfig::load(Some(&path));
    std::env::remove_var("NESTEDSET_COUNT_TRASHED_CHILDREN");

    // Assert
    assert!(config.unwrap().count_trashed_children);
}

#[test]
fn given_unsupported_tree_id_in_file_when_creating_services_then_rejected() {
    testing::init_test_setup();
    let temp = TempDir::new().unwrap();
    let path = create_config_file(&temp, "tree_id = \"string\"\n");

    let result = ServiceContainer::load(Some(&path));

    match result {
        Err(e) => assert!(e.to_string().contains("unsupported field type")),
        Ok(_) => panic!("string tree ids cannot be generated"),
    }
}

#[test]
fn given_template_when_written_and_loaded_then_defaults() {
    testing::init_test_setup();
    let temp = TempDir::new().unwrap();
    let path = create_config_file(&temp, &TreeConfig::template());

    let config = TreeConfig::load(Some(&path)).unwrap();

    assert_eq!(config.tree_id, None);
    assert_eq!(config.delete_strategy, DeleteStrategy::Cascade);
    assert_eq!(config.indexes().len(), 2);
}
