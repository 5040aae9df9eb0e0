use std::cmp::Ordering;

use crate::models::GitFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Folder {
        name: String,
        path: String,
        file_count: usize,
        children: Vec<TreeNode>,
    },
    File {
        name: String,
        path: String,
        file: GitFile,
    },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Folder { name, .. } | TreeNode::File { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            TreeNode::Folder { path, .. } | TreeNode::File { path, .. } => path,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, TreeNode::Folder { .. })
    }
}

fn insert(nodes: &mut Vec<TreeNode>, parts: &[&str], prefix: &str, file: &GitFile) {
    let Some((head, rest)) = parts.split_first() else {
        return;
    };
    let path = if prefix.is_empty() {
        head.to_string()
    } else {
        format!("{}/{}", prefix, head)
    };

    if rest.is_empty() {
        if !nodes.iter().any(|n| n.name() == *head && !n.is_folder()) {
            nodes.push(TreeNode::File {
                name: head.to_string(),
                path,
                file: file.clone(),
            });
        }
        return;
    }

    let idx = match nodes.iter().position(|n| n.is_folder() && n.name() == *head) {
        Some(idx) => idx,
        None => {
            nodes.push(TreeNode::Folder {
                name: head.to_string(),
                path: path.clone(),
                file_count: 0,
                children: Vec::new(),
            });
            nodes.len() - 1
        }
    };

    if let TreeNode::Folder {
        file_count,
        children,
        ..
    } = &mut nodes[idx]
    {
        *file_count += 1;
        insert(children, rest, &path, file);
    }
}

fn compare(a: &TreeNode, b: &TreeNode) -> Ordering {
    match (a.is_folder(), b.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .name()
            .to_lowercase()
            .cmp(&b.name().to_lowercase())
            .then_with(|| a.name().cmp(b.name())),
    }
}

fn sort(nodes: &mut [TreeNode]) {
    nodes.sort_by(compare);
    for node in nodes.iter_mut() {
        if let TreeNode::Folder { children, .. } = node {
            sort(children);
        }
    }
}

/// Group changed files into folders; folders first, then files, each alphabetical.
pub fn build_file_tree(files: &[GitFile]) -> Vec<TreeNode> {
    let mut root = Vec::new();
    for file in files {
        let parts: Vec<&str> = file.path.split('/').filter(|p| !p.is_empty()).collect();
        insert(&mut root, &parts, "", file);
    }
    sort(&mut root);
    root
}

/// Depth-first listing with nesting depth, for line-oriented rendering.
pub fn flatten_tree(nodes: &[TreeNode]) -> Vec<(usize, &TreeNode)> {
    fn walk<'a>(nodes: &'a [TreeNode], depth: usize, out: &mut Vec<(usize, &'a TreeNode)>) {
        for node in nodes {
            out.push((depth, node));
            if let TreeNode::Folder { children, .. } = node {
                walk(children, depth + 1, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(nodes, 0, &mut out);
    out
}
