//! Policy tree construction.
//!
//! The tokenizer and tree-builder intentionally do not implement operator
//! precedence the way a conventional boolean-expression grammar would —
//! they replay the single-pass, paren-driven construction the system this
//! crate reimplements uses: `(` descends into a new child of whatever node
//! is current, `)` ascends back to the parent, an attribute token fills
//! the next free child slot of the current node, and `AND`/`OR` set the
//! current node's operator. A flat list with no parentheses at all is
//! treated as a single bare attribute.
//!
//! Nodes live in a flat arena (`Vec<Node>`) addressed by index, with a
//! `parent` index on each node, rather than `Rc<RefCell<..>>` parent/child
//! pointers — the traversal the original construction needs (descend on
//! `(`, ascend on `)`) only ever needs an index, and an arena keeps the
//! whole tree `Send`/`Sync` and trivially cloneable.
use std::collections::HashMap;

use crate::error::{AbeError, AbeResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Val {
    Unset,
    And,
    Or,
    Attr(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub val: Val,
    pub dup_label: u32,
    pub parent: usize,
    pub left: Option<usize>,
    pub right: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct PolicyTree {
    nodes: Vec<Node>,
    root: usize,
}

fn tokenize(policy: &str) -> Vec<String> {
    let spaced = policy.to_uppercase().replace('(', " ( ").replace(')', " ) ");
    spaced.split_whitespace().map(str::to_string).collect()
}

fn is_lpar(tok: &str) -> bool {
    tok == "("
}
fn is_rpar(tok: &str) -> bool {
    tok == ")"
}
fn is_and(tok: &str) -> bool {
    tok == "AND"
}
fn is_or(tok: &str) -> bool {
    tok == "OR"
}
fn is_attr(tok: &str) -> bool {
    !(is_lpar(tok) || is_rpar(tok) || is_and(tok) || is_or(tok)) && !tok.is_empty()
}

impl PolicyTree {
    pub fn parse(policy: &str) -> AbeResult<Self> {
        let tokens = tokenize(policy);
        if tokens.is_empty() {
            return Err(AbeError::BadRequest("empty policy string".into()));
        }
        let mut nodes = vec![Node {
            val: Val::Unset,
            dup_label: 0,
            parent: 0,
            left: None,
            right: None,
        }];
        let mut current = 0usize;

        for tok in &tokens {
            if is_lpar(tok) {
                let child = nodes.len();
                nodes.push(Node {
                    val: Val::Unset,
                    dup_label: 0,
                    parent: current,
                    left: None,
                    right: None,
                });
                attach_child(&mut nodes, current, child)?;
                current = child;
            } else if is_rpar(tok) {
                if current == 0 {
                    return Err(AbeError::BadRequest("unbalanced parentheses in policy".into()));
                }
                current = nodes[current].parent;
            } else if is_and(tok) {
                set_op(&mut nodes, current, Val::And)?;
            } else if is_or(tok) {
                set_op(&mut nodes, current, Val::Or)?;
            } else if is_attr(tok) {
                let leaf = nodes.len();
                nodes.push(Node {
                    val: Val::Attr(tok.clone()),
                    dup_label: 0,
                    parent: current,
                    left: None,
                    right: None,
                });
                attach_child(&mut nodes, current, leaf)?;
            } else {
                return Err(AbeError::BadRequest(format!("unrecognized policy token {:?}", tok)));
            }
        }
        if current != 0 {
            return Err(AbeError::BadRequest("unbalanced parentheses in policy".into()));
        }

        let root = collapse_single_child_chain(&nodes, 0);
        validate(&nodes, root)?;

        let mut tree = PolicyTree { nodes, root };
        tree.label_duplicates();
        Ok(tree)
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// The name a leaf contributes to shares/coefficients/ciphertext maps:
    /// the bare attribute name, or `NAME_k` for the `k`-th (0-indexed)
    /// occurrence when the same attribute appears more than once.
    pub fn labeled_name(&self, idx: usize) -> String {
        match &self.nodes[idx].val {
            Val::Attr(name) if self.nodes[idx].dup_label > 0 => {
                format!("{}_{}", name, self.nodes[idx].dup_label - 1)
            }
            Val::Attr(name) => name.clone(),
            _ => unreachable!("labeled_name called on a non-leaf node"),
        }
    }

    /// The bare attribute name a leaf was parsed from, ignoring any
    /// duplicate-occurrence label. This is what must be checked against a
    /// GID's held attributes — a GID holding `A` satisfies every leaf
    /// labeled `A_0`, `A_1`, etc.
    pub fn base_name(&self, idx: usize) -> &str {
        match &self.nodes[idx].val {
            Val::Attr(name) => name.as_str(),
            _ => unreachable!("base_name called on a non-leaf node"),
        }
    }

    fn label_duplicates(&mut self) {
        let mut counts: HashMap<String, u32> = HashMap::new();
        count_leaves(&self.nodes, self.root, &mut counts);
        let mut next_label: HashMap<String, u32> = counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(name, _)| (name, 1))
            .collect();
        assign_labels(&mut self.nodes, self.root, &mut next_label);
    }
}

fn attach_child(nodes: &mut [Node], parent: usize, child: usize) -> AbeResult<()> {
    if nodes[parent].left.is_none() {
        nodes[parent].left = Some(child);
    } else if nodes[parent].right.is_none() {
        nodes[parent].right = Some(child);
    } else {
        return Err(AbeError::BadRequest(
            "policy node already has two children".into(),
        ));
    }
    Ok(())
}

fn set_op(nodes: &mut [Node], idx: usize, op: Val) -> AbeResult<()> {
    if nodes[idx].val != Val::Unset {
        return Err(AbeError::BadRequest(
            "policy node already has an operator".into(),
        ));
    }
    nodes[idx].val = op;
    Ok(())
}

/// Collapses a chain of operator-less single-child nodes down to the real
/// root — the case where the whole policy (or a fully-parenthesized
/// sub-policy) is a single bare attribute.
fn collapse_single_child_chain(nodes: &[Node], mut idx: usize) -> usize {
    while nodes[idx].val == Val::Unset && nodes[idx].right.is_none() {
        match nodes[idx].left {
            Some(child) => idx = child,
            None => break,
        }
    }
    idx
}

fn validate(nodes: &[Node], idx: usize) -> AbeResult<()> {
    match &nodes[idx].val {
        Val::Attr(_) => {
            if nodes[idx].left.is_some() || nodes[idx].right.is_some() {
                return Err(AbeError::BadRequest("attribute leaf has children".into()));
            }
            Ok(())
        }
        Val::And | Val::Or => {
            let (Some(l), Some(r)) = (nodes[idx].left, nodes[idx].right) else {
                return Err(AbeError::BadRequest(
                    "AND/OR node does not have exactly two operands".into(),
                ));
            };
            validate(nodes, l)?;
            validate(nodes, r)
        }
        Val::Unset => Err(AbeError::BadRequest("policy node missing an operator".into())),
    }
}

fn count_leaves(nodes: &[Node], idx: usize, counts: &mut HashMap<String, u32>) {
    match &nodes[idx].val {
        Val::Attr(name) => {
            *counts.entry(name.clone()).or_insert(0) += 1;
        }
        _ => {
            if let Some(l) = nodes[idx].left {
                count_leaves(nodes, l, counts);
            }
            if let Some(r) = nodes[idx].right {
                count_leaves(nodes, r, counts);
            }
        }
    }
}

fn assign_labels(nodes: &mut [Node], idx: usize, next_label: &mut HashMap<String, u32>) {
    let is_leaf = matches!(nodes[idx].val, Val::Attr(_));
    if is_leaf {
        let name = match &nodes[idx].val {
            Val::Attr(name) => name.clone(),
            _ => unreachable!(),
        };
        if let Some(label) = next_label.get_mut(&name) {
            nodes[idx].dup_label = *label;
            *label += 1;
        }
        return;
    }
    if let Some(l) = nodes[idx].left {
        assign_labels(nodes, l, next_label);
    }
    if let Some(r) = nodes[idx].right {
        assign_labels(nodes, r, next_label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_attribute() {
        let t = PolicyTree::parse("A").unwrap();
        assert_eq!(t.labeled_name(t.root()), "A");
    }

    #[test]
    fn parenthesized_single_attribute() {
        let t = PolicyTree::parse("(A)").unwrap();
        assert_eq!(t.labeled_name(t.root()), "A");
    }

    #[test]
    fn and_of_two() {
        let t = PolicyTree::parse("(ACME AND ENG)").unwrap();
        let root = t.node(t.root());
        assert_eq!(root.val, Val::And);
    }

    #[test]
    fn duplicate_attribute_gets_labels() {
        let t = PolicyTree::parse("((A AND B) OR (A AND C))").unwrap();
        let mut labels = Vec::new();
        fn walk(t: &PolicyTree, idx: usize, out: &mut Vec<String>) {
            match t.node(idx).val {
                Val::Attr(_) => out.push(t.labeled_name(idx)),
                _ => {
                    if let Some(l) = t.node(idx).left {
                        walk(t, l, out);
                    }
                    if let Some(r) = t.node(idx).right {
                        walk(t, r, out);
                    }
                }
            }
        }
        walk(&t, t.root(), &mut labels);
        assert_eq!(labels, vec!["A_0", "B", "A_1", "C"]);
    }

    #[test]
    fn unbalanced_parens_is_bad_request() {
        assert!(PolicyTree::parse("(A AND B").is_err());
    }

    #[test]
    fn three_children_is_bad_request() {
        assert!(PolicyTree::parse("(A AND B AND C)").is_err());
    }
}
