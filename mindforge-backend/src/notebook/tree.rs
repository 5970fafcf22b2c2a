//! Arena-backed topic hierarchy built from flat `(id, parent_id)` rows.
//!
//! Nodes live in one `Vec` and refer to each other by index, so there are no
//! owning parent/child pointers. Rows whose parent is missing are treated as
//! roots. The tree is rebuilt from storage for every query that needs it.

use std::collections::HashMap;

use crate::models::Topic;

struct TopicNode {
    topic: Topic,
    children: Vec<usize>,
}

pub struct TopicTree {
    nodes: Vec<TopicNode>,
    index: HashMap<i64, usize>,
    roots: Vec<usize>,
}

impl TopicTree {
    /// Build the tree from flat topics (their `children` are ignored).
    ///
    /// Siblings are ordered by case-insensitive name, then by id. Topics
    /// whose parent chain loops back to themselves are treated as roots.
    pub fn from_flat(topics: Vec<Topic>) -> Self {
        let mut nodes: Vec<TopicNode> = topics
            .into_iter()
            .map(|mut topic| {
                topic.children.clear();
                TopicNode {
                    topic,
                    children: Vec::new(),
                }
            })
            .collect();

        let index: HashMap<i64, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.topic.id, i))
            .collect();

        let mut roots = Vec::new();
        for i in 0..nodes.len() {
            let parent = nodes[i]
                .topic
                .parent_id
                .and_then(|pid| index.get(&pid).copied())
                .filter(|&p| !reaches(&nodes, &index, p, i));
            match parent {
                Some(p) => nodes[p].children.push(i),
                None => roots.push(i),
            }
        }

        let sort_key = |nodes: &[TopicNode], i: usize| sibling_order(&nodes[i].topic);
        roots.sort_by_key(|&i| sort_key(&nodes, i));
        for i in 0..nodes.len() {
            let mut children = std::mem::take(&mut nodes[i].children);
            children.sort_by_key(|&c| sort_key(&nodes, c));
            nodes[i].children = children;
        }

        Self { nodes, index, roots }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<&Topic> {
        self.index.get(&id).map(|&i| &self.nodes[i].topic)
    }

    /// `id` followed by all of its descendants, breadth first.
    /// Empty when `id` is unknown.
    pub fn subtree_ids(&self, id: i64) -> Vec<i64> {
        let Some(&start) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut queue = std::collections::VecDeque::from([start]);
        while let Some(i) = queue.pop_front() {
            out.push(self.nodes[i].topic.id);
            queue.extend(self.nodes[i].children.iter().copied());
        }
        out
    }

    /// Whether `ancestor` is `id` itself or lies on the path from `id` to its root
    pub fn is_self_or_ancestor(&self, ancestor: i64, id: i64) -> bool {
        match (self.index.get(&ancestor), self.index.get(&id)) {
            (Some(&a), Some(&i)) => reaches(&self.nodes, &self.index, i, a),
            _ => false,
        }
    }

    /// Materialise the nested forest, consuming the arena
    pub fn into_forest(self) -> Vec<Topic> {
        let mut slots: Vec<Option<TopicNode>> = self.nodes.into_iter().map(Some).collect();
        self.roots
            .iter()
            .filter_map(|&r| assemble(&mut slots, r))
            .collect()
    }
}

/// Sort key for topics shown side by side: Unicode-lowercased name, then id
pub(crate) fn sibling_order(topic: &Topic) -> (String, i64) {
    (topic.name.to_lowercase(), topic.id)
}

/// Walk parent links upward from `from`; true if `target` is met.
/// Stops on an unknown parent or a repeated node.
fn reaches(nodes: &[TopicNode], index: &HashMap<i64, usize>, from: usize, target: usize) -> bool {
    let mut seen = vec![false; nodes.len()];
    let mut current = Some(from);
    while let Some(i) = current {
        if i == target {
            return true;
        }
        if seen[i] {
            return false;
        }
        seen[i] = true;
        current = nodes[i].topic.parent_id.and_then(|pid| index.get(&pid).copied());
    }
    false
}

fn assemble(slots: &mut [Option<TopicNode>], i: usize) -> Option<Topic> {
    let node = slots[i].take()?;
    let mut topic = node.topic;
    topic.children = node
        .children
        .iter()
        .filter_map(|&c| assemble(slots, c))
        .collect();
    Some(topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn topic(id: i64, name: &str, parent_id: Option<i64>) -> Topic {
        let now = Utc::now();
        Topic {
            id,
            name: name.to_string(),
            parent_id,
            children: vec![],
            note_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample() -> TopicTree {
        TopicTree::from_flat(vec![
            topic(1, "Work", None),
            topic(2, "projects", Some(1)),
            topic(3, "Archive", Some(1)),
            topic(4, "Alpha", Some(2)),
            topic(5, "Home", None),
        ])
    }

    #[test]
    fn test_forest_is_nested_and_sorted_by_name() {
        let forest = sample().into_forest();
        let roots: Vec<&str> = forest.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(roots, vec!["Home", "Work"]);

        let work = &forest[1];
        let children: Vec<&str> = work.children.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(children, vec!["Archive", "projects"]);
        assert_eq!(work.children[1].children[0].name, "Alpha");
        assert_eq!(work.subtree_len(), 4);
    }

    #[test]
    fn test_subtree_ids() {
        let tree = sample();
        let mut ids = tree.subtree_ids(1);
        assert_eq!(ids[0], 1);
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(tree.subtree_ids(5), vec![5]);
        assert!(tree.subtree_ids(99).is_empty());
        assert!(tree.contains(4));
        assert!(!tree.contains(99));
        assert_eq!(tree.get(2).map(|t| t.name.as_str()), Some("projects"));
        assert!(!tree.is_empty());
    }

    #[test]
    fn test_ancestor_checks() {
        let tree = sample();
        assert!(tree.is_self_or_ancestor(1, 4));
        assert!(tree.is_self_or_ancestor(2, 4));
        assert!(tree.is_self_or_ancestor(4, 4));
        assert!(!tree.is_self_or_ancestor(4, 1));
        assert!(!tree.is_self_or_ancestor(5, 4));
        assert!(!tree.is_self_or_ancestor(99, 4));
    }

    #[test]
    fn test_orphans_become_roots() {
        let tree = TopicTree::from_flat(vec![topic(1, "Lost", Some(42)), topic(2, "Found", None)]);
        let forest = tree.into_forest();
        assert_eq!(forest.len(), 2);
    }

    #[test]
    fn test_cycle_in_rows_is_cut() {
        let tree = TopicTree::from_flat(vec![topic(1, "A", Some(2)), topic(2, "B", Some(1))]);
        assert_eq!(tree.len(), 2);
        let forest = tree.into_forest();
        let total: usize = forest.iter().map(Topic::subtree_len).sum();
        assert_eq!(total, 2);
        assert_eq!(forest.len(), 2);
    }
}
