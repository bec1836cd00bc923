//! Randomized structural edits: interval invariants hold after every operation

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use nestedset::application::services::AncestorOrder;
use nestedset::domain::{Placement, Row, TreeError};
use nestedset::infrastructure::{MemoryStore, RowStore};
use nestedset::util::testing;
use nestedset::{DeleteStrategy, ServiceContainer, TreeConfig};
use rstest::rstest;

const PLACEMENTS: [Placement; 4] = [
    Placement::Prepend,
    Placement::Append,
    Placement::Before,
    Placement::After,
];

fn get(store: &MemoryStore<Row>, id: u64) -> Row {
    store.find(&id).unwrap().expect("row exists")
}

fn assert_invariants(services: &ServiceContainer, store: &MemoryStore<Row>) {
    let report = services.integrity.check(store, None).unwrap();
    assert!(report.is_clean(), "integrity violated: {report:?}");

    for node in store.rows() {
        assert!(node.left < node.right, "{node} has inverted bounds");

        let mut walk = Vec::new();
        let mut current = node.parent_id;
        while let Some(id) = current {
            walk.push(id);
            current = get(store, id).parent_id;
        }
        walk.reverse();

        let by_containment: Vec<u64> = services
            .planner
            .ancestors_of(store, node, AncestorOrder::RootFirst)
            .unwrap()
            .into_iter()
            .filter_map(|n| n.id)
            .collect();
        assert_eq!(by_containment, walk, "ancestors of {node}");
        assert_eq!(node.level as usize, walk.len(), "level of {node}");
    }
}

fn pick(rng: &mut StdRng, store: &MemoryStore<Row>) -> Row {
    let ids: Vec<u64> = store.rows().filter_map(|r| r.id).collect();
    get(store, ids[rng.gen_range(0..ids.len())])
}

#[rstest]
#[case(7)]
#[case(42)]
#[case(1234)]
fn given_random_edits_when_applied_then_invariants_hold(#[case] seed: u64) {
    // Arrange
    testing::init_test_setup();
    let cascade = ServiceContainer::new(TreeConfig::default()).unwrap();
    let reparent = ServiceContainer::new(
        TreeConfig::default().with_delete_strategy(DeleteStrategy::Reparent),
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut store = MemoryStore::<Row>::new();
    cascade.mutator.make_root(&mut store, Row::new("root")).unwrap();

    // Act / Assert
    for step in 0..200 {
        let placement = PLACEMENTS[rng.gen_range(0..PLACEMENTS.len())];
        let result = match rng.gen_range(0..10) {
            0..=4 => {
                let target = pick(&mut rng, &store);
                cascade
                    .mutator
                    .place(&mut store, &target, Row::new(format!("n{step}")), placement)
                    .map(|_| ())
            }
            5..=7 => {
                let node = pick(&mut rng, &store);
                let target = pick(&mut rng, &store);
                cascade
                    .mutator
                    .move_to(&mut store, &node, &target, placement)
                    .map(|_| ())
            }
            _ if store.len() > 3 => {
                let node = pick(&mut rng, &store);
                let services = if rng.gen_bool(0.5) { &cascade } else { &reparent };
                services.deletion.delete(&mut store, &node).map(|_| ())
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            assert!(
                matches!(
                    e.tree_error(),
                    Some(TreeError::Cycle { .. })
                        | Some(TreeError::UniqueRoot { .. })
                        | Some(TreeError::RootDeletion(_))
                ),
                "step {step}: unexpected failure {e}"
            );
        }
        assert_invariants(&cascade, &store);
    }
    assert!(!store.is_empty());
}

#[test]
fn given_scrambled_bounds_when_rebuilding_then_parent_references_are_kept() {
    // Arrange
    testing::init_test_setup();
    let services = ServiceContainer::new(TreeConfig::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(99);
    let mut store = MemoryStore::<Row>::new();
    services.mutator.make_root(&mut store, Row::new("root")).unwrap();
    for step in 0..40 {
        let target = pick(&mut rng, &store);
        services
            .mutator
            .append_to(&mut store, &target, Row::new(format!("n{step}")))
            .unwrap();
    }
    let parents: Vec<(Option<u64>, Option<u64>)> =
        store.rows().map(|r| (r.id, r.parent_id)).collect();

    for id in 1..=store.len() as u64 {
        let mut row = get(&store, id);
        row.left = rng.gen_range(0..1000);
        row.right = rng.gen_range(0..1000);
        row.level = rng.gen_range(0..10);
        store.update(&row).unwrap();
    }
    assert!(!services.integrity.check(&store, None).unwrap().is_clean());

    // Act
    services.integrity.rebuild(&mut store, None).unwrap();

    // Assert
    let rebuilt: Vec<(Option<u64>, Option<u64>)> =
        store.rows().map(|r| (r.id, r.parent_id)).collect();
    assert_eq!(rebuilt, parents);
    assert_invariants(&services, &store);
}
