//! ASCII rendering of a mind-map snapshot.

use crate::models::Node;
use crate::tree::Tree;

/// Render a tree as ASCII art.
///
/// Collapsed nodes show how many direct children are hidden instead of
/// rendering them.
///
/// Example output:
/// ```text
/// My Goals
/// ├── Health
/// │   ├── Sleep earlier
/// │   └── Run twice a week
/// └── Memory drills [+3]
/// ```
pub fn render_tree(tree: &Tree) -> String {
    let mut output = String::new();
    render_node(&mut output, &tree.root, "", true, true);
    output
}

/// Recursively render a node and its children.
fn render_node(output: &mut String, node: &Node, prefix: &str, is_last: bool, is_root: bool) {
    if is_root {
        // Root: just the content (no branch characters).
        output.push_str(&node.content);
    } else {
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
        output.push_str(&node.content);
    }
    if !node.expanded && !node.children.is_empty() {
        output.push_str(&format!(" [+{}]", node.children.len()));
    }
    output.push('\n');

    if !node.expanded {
        return;
    }

    // Calculate prefix for children
    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    for (i, child) in node.children.iter().enumerate() {
        let child_is_last = i == node.children.len() - 1;
        render_node(output, child, &child_prefix, child_is_last, false);
    }
}
