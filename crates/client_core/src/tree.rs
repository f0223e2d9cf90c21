use shared::domain::{DocumentId, NavigationNode};

/// Finds the first node, in pre-order, whose url ends with `slug`.
///
/// Walks with an explicit stack so deeply nested shared trees cannot
/// exhaust the call stack. An empty slug never matches.
pub fn find_document_id(tree: &NavigationNode, slug: &str) -> Option<DocumentId> {
    if slug.is_empty() {
        return None;
    }

    let mut stack = vec![tree];
    while let Some(node) = stack.pop() {
        if node.url.ends_with(slug) {
            return Some(node.id.clone());
        }
        // reversed so the leftmost child is visited first
        stack.extend(node.children.iter().rev());
    }
    None
}
