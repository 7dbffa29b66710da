//! Prefix tree: folds a flat key listing into directories with aggregated
//! file counts and byte totals.
use std::collections::BTreeMap;
use std::io;

use futures_core::Stream;
use futures_util::TryStreamExt;

use crate::error::{Error, Result};
use crate::types::ObjectRecord;
use crate::utils::human_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// One path segment of the tree.
///
/// For a directory, `file_count` and `total_bytes` are the sums over its
/// subtree; for a file they are `1` and the object size.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    name: String,
    kind: NodeKind,
    children: BTreeMap<String, TreeNode>,
    file_count: u64,
    total_bytes: u64,
}

impl TreeNode {
    fn new<T: Into<String>>(name: T, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: BTreeMap::new(),
            file_count: 0,
            total_bytes: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn file_count(&self) -> u64 {
        self.file_count
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Children keyed by segment name, in byte order.
    pub fn children(&self) -> &BTreeMap<String, TreeNode> {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children.get(name)
    }

    /// Descendant at a `/`-separated path relative to this node.
    pub fn get(&self, path: &str) -> Option<&TreeNode> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, part| node.children.get(part))
    }

    /// Directories first, then files; each group ordered case-insensitively.
    pub fn sorted_children(&self) -> Vec<&TreeNode> {
        let mut kids: Vec<&TreeNode> = self.children.values().collect();
        kids.sort_by(|a, b| {
            b.is_dir()
                .cmp(&a.is_dir())
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                .then_with(|| a.name.cmp(&b.name))
        });
        kids
    }

    fn bump(&mut self, files: u64, grow: u64, shrink: u64) {
        self.file_count += files;
        self.total_bytes = self.total_bytes + grow - shrink;
    }
}

/// Incremental tree builder. Aggregates are correct after every insert.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    scope: String,
    root: TreeNode,
}

impl TreeBuilder {
    /// `scope` is the listing prefix; it is stripped from every key and
    /// names the root node.
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            root: TreeNode::new(scope.trim_end_matches('/'), NodeKind::Directory),
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Fold one record into the tree.
    ///
    /// Re-inserting a key replaces its size without counting it twice. A key
    /// that equals the scope, or only consists of separators, is ignored.
    pub fn insert(&mut self, record: &ObjectRecord) -> Result<()> {
        let rel = record.key.strip_prefix(self.scope.as_str()).unwrap_or(&record.key);
        let parts: Vec<&str> = rel.split('/').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return Ok(());
        }

        let (files, grow, shrink) = match self.existing_size(&parts)? {
            None => (1, record.size, 0),
            Some(old) => (0, record.size.saturating_sub(old), old.saturating_sub(record.size)),
        };

        let last = parts.len() - 1;
        let mut node = &mut self.root;
        node.bump(files, grow, shrink);
        for (i, part) in parts.iter().enumerate() {
            let kind = if i == last { NodeKind::File } else { NodeKind::Directory };
            node = node
                .children
                .entry(part.to_string())
                .or_insert_with(|| TreeNode::new(*part, kind));
            node.bump(files, grow, shrink);
        }
        Ok(())
    }

    /// Size of an already inserted file at `parts`, or a conflict when the
    /// path crosses a node of the other kind. Does not modify the tree.
    fn existing_size(&self, parts: &[&str]) -> Result<Option<u64>> {
        let last = parts.len() - 1;
        let mut node = &self.root;
        for (i, part) in parts.iter().enumerate() {
            let child = match node.children.get(*part) {
                Some(child) => child,
                None => return Ok(None),
            };
            match (child.kind, i == last) {
                (NodeKind::Directory, false) => node = child,
                (NodeKind::File, true) => return Ok(Some(child.total_bytes)),
                _ => {
                    return Err(Error::StructuralConflict {
                        path: format!("{}{}", self.scope, parts[..=i].join("/")),
                    })
                }
            }
        }
        Ok(None)
    }

    pub fn finish(self) -> TreeNode {
        self.root
    }
}

/// Build a tree from in-memory records.
pub fn build<'a, I>(records: I, scope: &str) -> Result<TreeNode>
where
    I: IntoIterator<Item = &'a ObjectRecord>,
{
    let mut builder = TreeBuilder::new(scope);
    for record in records {
        builder.insert(record)?;
    }
    Ok(builder.finish())
}

/// Build a tree while consuming a listing stream; the first listing error or
/// conflict aborts the build.
pub async fn build_tree<S>(records: S, scope: &str) -> Result<TreeNode>
where
    S: Stream<Item = Result<ObjectRecord>>,
{
    let mut builder = TreeBuilder::new(scope);
    let mut records = std::pin::pin!(records);
    while let Some(record) = records.try_next().await? {
        builder.insert(&record)?;
    }
    Ok(builder.finish())
}

/// Line-drawing characters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyphs {
    pub branch_mid: &'static str,
    pub branch_last: &'static str,
    pub trunk: &'static str,
    pub indent: &'static str,
}

impl Glyphs {
    pub const UNICODE: Glyphs = Glyphs {
        branch_mid: "├── ",
        branch_last: "└── ",
        trunk: "│   ",
        indent: "    ",
    };

    pub const ASCII: Glyphs = Glyphs {
        branch_mid: "+-- ",
        branch_last: "+-- ",
        trunk: "|   ",
        indent: "    ",
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub glyphs: Glyphs,
    /// Draw file leaves too; by default only directories are drawn.
    pub show_files: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            glyphs: Glyphs::UNICODE,
            show_files: false,
        }
    }
}

fn summary(node: &TreeNode) -> String {
    let size = if node.file_count > 0 {
        human_bytes(node.total_bytes)
    } else {
        "0 B".to_string()
    };
    format!("[{} files, {}]", node.file_count, size)
}

/// Draw `root` as an indented tree, one directory per line:
/// `name/  [N files, SIZE]`.
pub fn render_tree<W: io::Write>(root: &TreeNode, label: &str, options: &RenderOptions, out: &mut W) -> io::Result<()> {
    writeln!(out, "{}/  {}", label, summary(root))?;
    render_children(root, "", options, out)
}

fn render_children<W: io::Write>(node: &TreeNode, prefix: &str, options: &RenderOptions, out: &mut W) -> io::Result<()> {
    let kids: Vec<&TreeNode> = node
        .sorted_children()
        .into_iter()
        .filter(|k| options.show_files || k.is_dir())
        .collect();
    let g = &options.glyphs;
    for (i, child) in kids.iter().enumerate() {
        let is_last = i + 1 == kids.len();
        let branch = if is_last { g.branch_last } else { g.branch_mid };
        if child.is_dir() {
            writeln!(out, "{}{}{}/  {}", prefix, branch, child.name, summary(child))?;
            let next = format!("{}{}", prefix, if is_last { g.indent } else { g.trunk });
            render_children(child, &next, options, out)?;
        } else {
            writeln!(out, "{}{}{}  ({})", prefix, branch, child.name, human_bytes(child.total_bytes))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn rec(key: &str, size: u64) -> ObjectRecord {
        ObjectRecord::new(key, size)
    }

    /// Every directory equals the sum of its children; every file counts one.
    fn assert_consistent(node: &TreeNode) -> (u64, u64) {
        match node.kind() {
            NodeKind::File => {
                assert!(node.children().is_empty());
                assert_eq!(node.file_count(), 1);
                (1, node.total_bytes())
            }
            NodeKind::Directory => {
                let (files, bytes) = node
                    .children()
                    .values()
                    .map(assert_consistent)
                    .fold((0, 0), |acc, x| (acc.0 + x.0, acc.1 + x.1));
                assert_eq!(node.file_count(), files, "count at {}", node.name());
                assert_eq!(node.total_bytes(), bytes, "bytes at {}", node.name());
                (files, bytes)
            }
        }
    }

    #[test]
    fn test_aggregates_hold_after_every_insert() {
        let records = [
            rec("SDC3/image/a.fits", 100),
            rec("SDC3/image/b.fits", 200),
            rec("SDC3/uv/ms/part0", 5),
            rec("SDC3/uv/ms/part1", 7),
            rec("README", 1),
            rec("SDC3/image/deep/er/x", 0),
        ];
        let mut builder = TreeBuilder::new("");
        for (n, r) in records.iter().enumerate() {
            builder.insert(r).unwrap();
            let (files, _) = assert_consistent(builder.root());
            assert_eq!(files, n as u64 + 1);
        }
        let root = builder.finish();
        assert_eq!(root.file_count(), 6);
        assert_eq!(root.total_bytes(), 313);
        assert_eq!(root.get("SDC3/image").unwrap().file_count(), 3);
        assert_eq!(root.get("SDC3/image").unwrap().total_bytes(), 300);
        assert_eq!(root.get("SDC3/uv/ms").unwrap().total_bytes(), 12);
        assert_eq!(root.get("README").unwrap().kind(), NodeKind::File);
    }

    #[test]
    fn test_scope_is_stripped() {
        let records = [rec("SDC3/image/a", 100), rec("SDC3/image/b", 200), rec("SDC3/image/c/d", 300)];
        let root = build(records.iter(), "SDC3/image/").unwrap();
        assert_eq!(root.name(), "SDC3/image");
        assert_eq!(root.file_count(), 3);
        assert_eq!(root.total_bytes(), 600);
        assert!(root.child("a").is_some());
        assert!(root.child("c").unwrap().is_dir());
    }

    #[test]
    fn test_reinsert_reconciles_size() {
        let mut builder = TreeBuilder::new("");
        builder.insert(&rec("a/b", 10)).unwrap();
        builder.insert(&rec("a/b", 10)).unwrap();
        assert_eq!(builder.root().file_count(), 1);
        assert_eq!(builder.root().total_bytes(), 10);
        builder.insert(&rec("a/b", 4)).unwrap();
        assert_eq!(builder.root().get("a").unwrap().total_bytes(), 4);
        builder.insert(&rec("a/b", 40)).unwrap();
        assert_eq!(builder.root().total_bytes(), 40);
        assert_consistent(builder.root());
    }

    #[test]
    fn test_file_then_directory_conflicts() {
        let mut builder = TreeBuilder::new("");
        builder.insert(&rec("a/b", 1)).unwrap();
        match builder.insert(&rec("a/b/c", 1)) {
            Err(Error::StructuralConflict { path }) => assert_eq!(path, "a/b"),
            other => panic!("unexpected {:?}", other),
        }
        // the failed insert left no trace
        assert_eq!(builder.root().file_count(), 1);
        assert_consistent(builder.root());
    }

    #[test]
    fn test_directory_then_file_conflicts() {
        let records = [rec("x/a/b/c", 1), rec("x/a/b", 1)];
        match build(records.iter(), "x/") {
            Err(Error::StructuralConflict { path }) => assert_eq!(path, "x/a/b"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_and_marker_keys_ignored() {
        let records = [rec("SDC3/", 0), rec("SDC3//a", 3), rec("SDC3", 0)];
        let root = build(records.iter(), "SDC3/").unwrap();
        assert_eq!(root.file_count(), 2);
        assert_eq!(root.total_bytes(), 3);
        // "SDC3" does not start with the scope, so it is kept as-is
        assert!(root.child("SDC3").is_some());
    }

    #[test]
    fn test_sorted_children_dirs_first() {
        let records = [rec("b.txt", 1), rec("Zeta/x", 1), rec("alpha/x", 1), rec("A.txt", 1)];
        let root = build(records.iter(), "").unwrap();
        let names: Vec<_> = root.sorted_children().iter().map(|n| n.name().to_string()).collect();
        assert_eq!(names, vec!["alpha", "Zeta", "A.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_build_tree_from_stream() {
        let items = vec![Ok(rec("a/1", 1)), Ok(rec("a/2", 2))];
        let root = build_tree(stream::iter(items), "").await.unwrap();
        assert_eq!(root.total_bytes(), 3);

        let failing = vec![Ok(rec("a/1", 1)), Err(Error::TransientError("503".into()))];
        assert!(build_tree(stream::iter(failing), "").await.is_err());
    }

    #[test]
    fn test_render_ascii() {
        let records = [
            rec("image/a", 1024),
            rec("image/b", 1024),
            rec("uv/ms/p", 10),
            rec("top.txt", 5),
        ];
        let root = build(records.iter(), "").unwrap();
        let options = RenderOptions {
            glyphs: Glyphs::ASCII,
            show_files: false,
        };
        let mut out = Vec::new();
        render_tree(&root, "ska:sdc3-simdata", &options, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "ska:sdc3-simdata/  [4 files, 2.01 KB]\n\
             +-- image/  [2 files, 2.00 KB]\n\
             +-- uv/  [1 files, 10.00 B]\n\
             \x20   +-- ms/  [1 files, 10.00 B]\n"
        );
    }

    #[test]
    fn test_render_unicode_with_files() {
        let records = [rec("d/x", 1), rec("d/e/y", 2), rec("f", 3)];
        let root = build(records.iter(), "").unwrap();
        let options = RenderOptions {
            show_files: true,
            ..RenderOptions::default()
        };
        let mut out = Vec::new();
        render_tree(&root, "b", &options, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "b/  [3 files, 6.00 B]",
                "├── d/  [2 files, 3.00 B]",
                "│   ├── e/  [1 files, 2.00 B]",
                "│   │   └── y  (2.00 B)",
                "│   └── x  (1.00 B)",
                "└── f  (3.00 B)",
            ]
        );
    }

    #[test]
    fn test_render_empty_tree() {
        let root = TreeBuilder::new("SDC3/").finish();
        let mut out = Vec::new();
        render_tree(&root, "ska:sdc3-simdata/SDC3", &RenderOptions::default(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "ska:sdc3-simdata/SDC3/  [0 files, 0 B]\n");
    }
}
