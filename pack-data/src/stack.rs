use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A stack a buildpack or buildpackage declares support for.
///
/// A stack is a compatibility namespace (the `id`) plus the set of optional
/// features ("mixins") required on images of that stack.
#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Stack {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<String>,
}

impl Stack {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mixins: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_mixins(id: impl Into<String>, mixins: impl IntoIterator<Item = String>) -> Self {
        Self {
            id: id.into(),
            mixins: mixins.into_iter().collect(),
        }
    }
}

/// Merges two stack sequences into the stacks compatible with both.
///
/// A stack is kept when its ID appears in both `a` and `b`. Each kept stack
/// carries the union of the mixins declared for that ID on either side, so
/// that the result requires everything any participant requires. The order
/// of `a` is preserved. An empty result means the two sides share no stack,
/// which callers must surface as an error rather than swallow.
///
/// Duplicate IDs within a single input sequence are a caller-side
/// configuration error and are not detected here.
#[must_use]
pub fn merge_compatible(a: &[Stack], b: &[Stack]) -> Vec<Stack> {
    let mut merged = Vec::new();

    for stack_a in a {
        if let Some(stack_b) = b.iter().find(|stack_b| stack_b.id == stack_a.id) {
            let mixins: BTreeSet<String> = stack_a
                .mixins
                .iter()
                .chain(stack_b.mixins.iter())
                .cloned()
                .collect();

            merged.push(Stack {
                id: stack_a.id.clone(),
                mixins: mixins.into_iter().collect(),
            });
        }
    }

    merged
}
