//! # Tree Command Implementation
//!
//! This module implements the `tree` subcommand, which displays a lockfile
//! as the hierarchy of references it records.
//!
//! ## Functionality
//!
//! - **Reference Tree Visualization**: Each record is shown below the
//!   nearest record whose form contains it.
//! - **Depth Control**: Supports `--depth` to limit tree depth.
//! - **Upgrade Display**: Upgraded references show the edition they asked
//!   for next to the one they got.
//!
//! This command is a safe, read-only operation that does not modify any files.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ptree::{print_tree, TreeItem};

use form_resolver::manifest::{self, ResolutionRecord};
use form_resolver::path::Path;

/// Display a lockfile as a tree of resolved references
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Lockfile written by `compose --lockfile`, or `-` for stdin.
    #[arg(value_name = "LOCKFILE")]
    pub lockfile: PathBuf,

    /// Maximum depth to display in the tree.
    ///
    /// If not specified, displays the full tree.
    /// Use 0 to show only the root level, 1 to show top-level references, etc.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,
}

/// Execute the `tree` command.
pub fn execute(args: TreeArgs) -> Result<()> {
    let content = super::read_input(&args.lockfile)?;
    let records = manifest::parse(&content)
        .with_context(|| format!("Failed to parse lockfile {}", args.lockfile.display()))?;

    let tree_root = build_tree(
        args.lockfile.display().to_string(),
        &records,
        args.depth.unwrap_or(usize::MAX),
    );
    print_tree(&tree_root).context("Failed to display tree")?;
    Ok(())
}

/// Nest records under the nearest enclosing record.
fn build_tree(label: String, records: &[ResolutionRecord], max_depth: usize) -> TreeNode {
    let known: HashMap<&Path, usize> = records
        .iter()
        .enumerate()
        .map(|(index, record)| (&record.path, index))
        .collect();

    let mut children: HashMap<Option<usize>, Vec<usize>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        let mut parent = record.path.parent_reference();
        let parent_index = loop {
            match parent {
                Some(path) => match known.get(&path) {
                    Some(index) => break Some(*index),
                    None => parent = path.parent_reference(),
                },
                None => break None,
            }
        };
        children.entry(parent_index).or_default().push(index);
    }

    TreeNode {
        label,
        children: build_children(None, records, &children, max_depth, 0),
    }
}

fn build_children(
    parent: Option<usize>,
    records: &[ResolutionRecord],
    children: &HashMap<Option<usize>, Vec<usize>>,
    max_depth: usize,
    current_depth: usize,
) -> Vec<TreeNode> {
    if current_depth >= max_depth {
        return Vec::new();
    }
    children
        .get(&parent)
        .map(|indexes| {
            indexes
                .iter()
                .map(|index| TreeNode {
                    label: record_label(&records[*index]),
                    children: build_children(
                        Some(*index),
                        records,
                        children,
                        max_depth,
                        current_depth + 1,
                    ),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn record_label(record: &ResolutionRecord) -> String {
    let mut label = format!("{} @ {}", record.target, record.edition);
    if record.upgraded() {
        if let Some(specified) = &record.specified {
            label.push_str(&format!(" (upgraded from {})", specified));
        }
    }
    label
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
