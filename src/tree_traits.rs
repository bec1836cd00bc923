/*
Workaround for error: https://doc.rust-lang.org/error_codes/E0116.html
Cannot define inherent `impl` for a type outside of the crate where the type is defined

define a trait that has the desired associated functions/types/constants and implement the trait for the type in question
 */
use std::fmt::Display;

use generational_arena::Index;
use termtree::Tree;
use tracing::instrument;

use crate::domain::{NestedNode, TreeArena};

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

impl<N: NestedNode + Display> TreeNodeConvert for TreeArena<N> {
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        fn build_tree<N: NestedNode + Display>(arena: &TreeArena<N>, node_idx: Index) -> Tree<String> {
            let Some(node) = arena.get_node(node_idx) else {
                return Tree::new(String::new());
            };
            let leaves: Vec<_> = node
                .children
                .iter()
                .map(|&child_idx| build_tree(arena, child_idx))
                .collect();
            Tree::new(node.data.to_string()).with_leaves(leaves)
        }

        match self.roots() {
            [] => Tree::new("Empty tree".to_string()),
            [root_idx] => build_tree(self, *root_idx),
            roots => {
                // forest: hang every root under a synthetic node
                let leaves: Vec<_> = roots.iter().map(|&r| build_tree(self, r)).collect();
                Tree::new(format!("{} roots", roots.len())).with_leaves(leaves)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Row;

    fn row(id: u64, label: &str, left: i64, right: i64) -> Row {
        Row {
            id: Some(id),
            left,
            right,
            ..Row::new(label)
        }
    }

    #[test]
    fn given_empty_arena_when_rendering_then_placeholder() {
        let arena = TreeArena::<Row>::new();
        assert_eq!(arena.to_tree_string().to_string().trim_end(), "Empty tree");
    }

    #[test]
    fn given_nested_rows_when_rendering_then_children_indented() {
        let arena = TreeArena::from_intervals(vec![
            row(1, "root", 1, 6),
            row(2, "a", 2, 3),
            row(3, "b", 4, 5),
        ]);
        let rendered = arena.to_tree_string().to_string();

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "root [1, 6]");
        assert!(lines[1].ends_with("a [2, 3]"));
        assert!(lines[2].ends_with("b [4, 5]"));
    }

    #[test]
    fn given_two_roots_when_rendering_then_synthetic_top() {
        let arena = TreeArena::from_intervals(vec![row(1, "x", 1, 2), row(2, "y", 3, 4)]);
        let rendered = arena.to_tree_string().to_string();
        assert_eq!(rendered.lines().next(), Some("2 roots"));
        assert_eq!(rendered.lines().count(), 3);
    }
}
