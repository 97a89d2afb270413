//! Sequential asynchronous pre-order tree traversal.
//!
//! The walk visits a node, asks its [`Visitor`] what to do, and only
//! then moves on: no sibling or child runs while a visitor call is in
//! flight. That strict ordering is what makes in-place replacement of
//! the current node safe while the traversal is running.

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;

/// A node in the traversed tree.
///
/// Leaf-kind nodes return `None` from both accessors; parent-kind nodes
/// expose their ordered child sequence. An empty child vector behaves
/// the same as a leaf.
pub trait TreeNode: Sized + Send {
    /// The current children of this node, if it is a parent-kind node
    fn children(&self) -> Option<&[Self]>;

    /// Mutable access to the child sequence, for parent-kind nodes
    fn children_mut(&mut self) -> Option<&mut Vec<Self>>;
}

/// What the traversal should do after visiting a node
#[derive(Debug)]
pub enum VisitFlow<N> {
    /// Visit the node's children in order, left to right
    Descend,

    /// Do not descend into the node's children
    SkipChildren,

    /// Swap the node for the carried replacement in its parent's child
    /// list and do not descend. Returning this for the root fails the
    /// traversal, since the root has no parent to splice into.
    Replace(N),
}

/// Content generated to stand in for a visited node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated<N> {
    /// Raw markup to be wrapped into a node by the caller
    Markup(String),

    /// An already-built replacement node
    Node(N),
}

impl<N> Generated<N> {
    /// Resolve to a node, wrapping the markup arm with `wrap`
    pub fn into_node(self, wrap: impl FnOnce(String) -> N) -> N {
        match self {
            Generated::Markup(markup) => wrap(markup),
            Generated::Node(node) => node,
        }
    }
}

/// Decides, per node, whether the traversal descends, skips, or
/// replaces.
///
/// `parent` is `None` exactly when `node` is the traversal root. Any
/// error returned here aborts the whole traversal.
#[async_trait]
pub trait Visitor<N: TreeNode>: Send {
    async fn visit(&mut self, node: &N, parent: Option<&N>) -> Result<VisitFlow<N>>;
}

#[async_trait]
impl<N, F> Visitor<N> for F
where
    N: TreeNode + Sync,
    F: FnMut(&N, Option<&N>) -> Result<VisitFlow<N>> + Send,
{
    async fn visit(&mut self, node: &N, parent: Option<&N>) -> Result<VisitFlow<N>> {
        self(node, parent)
    }
}

/// Walk `root` depth-first in pre-order, driving `visitor` at each node.
///
/// A node's visitor call completes, including all of its side effects,
/// before any child or sibling is visited. When the visitor returns
/// [`VisitFlow::Replace`], the traversal itself splices the replacement
/// into the parent's child list and continues with the next sibling;
/// the child list length is re-read after every visitor call, so a
/// replacement never skips or revisits a sibling.
pub async fn visit<N, V>(root: &mut N, visitor: &mut V) -> Result<()>
where
    N: TreeNode + Sync,
    V: Visitor<N> + ?Sized,
{
    match visitor.visit(root, None).await? {
        VisitFlow::Descend => visit_children(root, visitor).await,
        VisitFlow::SkipChildren => Ok(()),
        VisitFlow::Replace(_) => bail!("the root node has no parent and cannot be replaced"),
    }
}

fn visit_children<'a, N, V>(parent: &'a mut N, visitor: &'a mut V) -> BoxFuture<'a, Result<()>>
where
    N: TreeNode + Sync,
    V: Visitor<N> + ?Sized,
{
    Box::pin(async move {
        let mut index = 0;
        loop {
            // Re-read the child sequence on every iteration; the
            // visitor may have changed its length.
            let child_count = parent.children().map_or(0, |c| c.len());
            if index >= child_count {
                return Ok(());
            }

            let flow = {
                let children = match parent.children() {
                    Some(children) => children,
                    None => return Ok(()),
                };
                visitor.visit(&children[index], Some(parent)).await?
            };

            match flow {
                VisitFlow::Descend => {
                    if let Some(child) = parent
                        .children_mut()
                        .and_then(|children| children.get_mut(index))
                    {
                        visit_children(child, visitor).await?;
                    }
                }
                VisitFlow::SkipChildren => {}
                VisitFlow::Replace(replacement) => {
                    if let Some(children) = parent.children_mut() {
                        if index < children.len() {
                            children[index] = replacement;
                        }
                    }
                }
            }
            index += 1;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TestNode {
        Leaf(String),
        Parent(String, Vec<TestNode>),
    }

    impl TestNode {
        fn name(&self) -> &str {
            match self {
                TestNode::Leaf(name) => name,
                TestNode::Parent(name, _) => name,
            }
        }
    }

    impl TreeNode for TestNode {
        fn children(&self) -> Option<&[Self]> {
            match self {
                TestNode::Leaf(_) => None,
                TestNode::Parent(_, children) => Some(children),
            }
        }

        fn children_mut(&mut self) -> Option<&mut Vec<Self>> {
            match self {
                TestNode::Leaf(_) => None,
                TestNode::Parent(_, children) => Some(children),
            }
        }
    }

    fn sample_tree() -> TestNode {
        TestNode::Parent(
            "root".into(),
            vec![
                TestNode::Parent("heading".into(), vec![TestNode::Leaf("heading-text".into())]),
                TestNode::Parent("paragraph".into(), vec![TestNode::Leaf("link".into())]),
            ],
        )
    }

    #[tokio::test]
    async fn test_preorder_left_to_right() {
        let mut root = sample_tree();
        let mut seen = Vec::new();

        let mut visitor = |node: &TestNode, _parent: Option<&TestNode>| -> Result<VisitFlow<TestNode>> {
            seen.push(node.name().to_string());
            Ok(VisitFlow::Descend)
        };
        visit(&mut root, &mut visitor).await.unwrap();

        assert_eq!(
            seen,
            vec!["root", "heading", "heading-text", "paragraph", "link"]
        );
    }

    #[tokio::test]
    async fn test_root_has_no_parent() {
        let mut root = sample_tree();
        let mut parents = Vec::new();

        let mut visitor = |_node: &TestNode, parent: Option<&TestNode>| -> Result<VisitFlow<TestNode>> {
            parents.push(parent.map(|p| p.name().to_string()));
            Ok(VisitFlow::Descend)
        };
        visit(&mut root, &mut visitor).await.unwrap();

        assert_eq!(parents[0], None);
        assert!(parents[1..].iter().all(|p| p.is_some()));
    }

    #[tokio::test]
    async fn test_empty_children_is_a_noop() {
        let mut root = TestNode::Parent("root".into(), Vec::new());
        let mut seen = Vec::new();

        let mut visitor = |node: &TestNode, _parent: Option<&TestNode>| -> Result<VisitFlow<TestNode>> {
            seen.push(node.name().to_string());
            Ok(VisitFlow::Descend)
        };
        visit(&mut root, &mut visitor).await.unwrap();

        assert_eq!(seen, vec!["root"]);
    }

    #[tokio::test]
    async fn test_replace_root_fails() {
        let mut root = sample_tree();

        let mut visitor = |_node: &TestNode, _parent: Option<&TestNode>| -> Result<VisitFlow<TestNode>> {
            Ok(VisitFlow::Replace(TestNode::Leaf("other".into())))
        };
        assert!(visit(&mut root, &mut visitor).await.is_err());
    }

    #[tokio::test]
    async fn test_generated_into_node() {
        let markup: Generated<TestNode> = Generated::Markup("<p>hi</p>".into());
        let node = markup.into_node(TestNode::Leaf);
        assert_eq!(node, TestNode::Leaf("<p>hi</p>".into()));

        let ready = Generated::Node(TestNode::Leaf("done".into()));
        let node = ready.into_node(|_| unreachable!());
        assert_eq!(node, TestNode::Leaf("done".into()));
    }
}
