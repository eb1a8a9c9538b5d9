//! Linear secret sharing over the AND/OR tree, and its inverse: pruning
//! and Lagrange coefficient recovery.
//!
//! An `OR` node hands the same share to both children (threshold 1 of 2);
//! an `AND` node splits the share via a degree-1 polynomial
//! `P(x) = s + a1*x` evaluated at `x=1` and `x=2` (threshold 2 of 2).
//! Reconstruction walks the same tree multiplicatively: an `OR` multiplies
//! by the trivial Lagrange coefficient `1` (a one-point basis), an `AND`
//! multiplies by the two-point basis `L_1({1,2})=2`, `L_2({1,2})=-1`.
use std::collections::{HashMap, HashSet};

use rabe_bn::Fr;
use rand::Rng;

use super::tree::{PolicyTree, Val};

fn fr_from_u64(n: u64) -> Fr {
    let mut acc = Fr::zero();
    let one = Fr::one();
    for _ in 0..n {
        acc = acc + one;
    }
    acc
}

fn fr_from_i64(n: i64) -> Fr {
    if n >= 0 {
        fr_from_u64(n as u64)
    } else {
        Fr::zero() - fr_from_u64((-n) as u64)
    }
}

/// `P(1), P(2)` for a degree-`k-1` polynomial with constant term `s`.
/// `k=1` (OR) gives the same value at both points; `k=2` (AND) samples one
/// random coefficient and gives the two-point evaluation of a line.
fn genshares<R: Rng>(s: Fr, k: u32, rng: &mut R) -> (Fr, Fr) {
    let a1 = if k > 1 { Fr::random(rng) } else { Fr::zero() };
    let at = |x: u64| s + a1 * fr_from_u64(x);
    (at(1), at(2))
}

/// Splits `secret` down the tree, returning one share per leaf label.
pub fn compute_shares<R: Rng>(tree: &PolicyTree, secret: Fr, rng: &mut R) -> HashMap<String, Fr> {
    let mut out = HashMap::new();
    compute_shares_node(tree, tree.root(), secret, rng, &mut out);
    out
}

fn compute_shares_node<R: Rng>(
    tree: &PolicyTree,
    idx: usize,
    s: Fr,
    rng: &mut R,
    out: &mut HashMap<String, Fr>,
) {
    match &tree.node(idx).val {
        Val::Attr(_) => {
            out.insert(tree.labeled_name(idx), s);
        }
        Val::And => {
            let (l, r) = (tree.node(idx).left.unwrap(), tree.node(idx).right.unwrap());
            let (share_l, share_r) = genshares(s, 2, rng);
            compute_shares_node(tree, l, share_l, rng, out);
            compute_shares_node(tree, r, share_r, rng, out);
        }
        Val::Or => {
            let (l, r) = (tree.node(idx).left.unwrap(), tree.node(idx).right.unwrap());
            let (share_l, share_r) = genshares(s, 1, rng);
            compute_shares_node(tree, l, share_l, rng, out);
            compute_shares_node(tree, r, share_r, rng, out);
        }
        Val::Unset => unreachable!("validated trees have no Unset nodes"),
    }
}

/// Lagrange basis polynomial `L_i(0)` for interpolation points `points`.
fn lagrange_at_zero(points: &[i64], i: i64) -> Fr {
    let mut num = Fr::one();
    let mut den = Fr::one();
    for &j in points {
        if j == i {
            continue;
        }
        num = num * fr_from_i64(-j);
        den = den * fr_from_i64(i - j);
    }
    num * den.inverse().expect("interpolation points are distinct")
}

/// Coefficients to multiply each leaf's recovered pairing term by during
/// reconstruction, given a starting coefficient of `1` at the root.
pub fn coefficients(tree: &PolicyTree) -> HashMap<String, Fr> {
    let mut out = HashMap::new();
    coefficients_node(tree, tree.root(), Fr::one(), &mut out);
    out
}

fn coefficients_node(tree: &PolicyTree, idx: usize, coeff: Fr, out: &mut HashMap<String, Fr>) {
    match &tree.node(idx).val {
        Val::Attr(_) => {
            out.insert(tree.labeled_name(idx), coeff);
        }
        Val::And => {
            let (l, r) = (tree.node(idx).left.unwrap(), tree.node(idx).right.unwrap());
            let l1 = lagrange_at_zero(&[1, 2], 1);
            let l2 = lagrange_at_zero(&[1, 2], 2);
            coefficients_node(tree, l, coeff * l1, out);
            coefficients_node(tree, r, coeff * l2, out);
        }
        Val::Or => {
            let (l, r) = (tree.node(idx).left.unwrap(), tree.node(idx).right.unwrap());
            let l1 = lagrange_at_zero(&[1], 1);
            coefficients_node(tree, l, coeff * l1, out);
            coefficients_node(tree, r, coeff * l1, out);
        }
        Val::Unset => unreachable!("validated trees have no Unset nodes"),
    }
}

/// One leaf: the label its shares/coefficients/ciphertext entries are
/// keyed by (carries a `_k` suffix for the `k`-th occurrence of a repeated
/// attribute), and the base attribute name to resolve against storage and
/// a GID's held keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeEntry {
    pub label: String,
    pub base_name: String,
}

/// All leaves in left-to-right order, regardless of availability — used
/// when encrypting, since every leaf needs a ciphertext share.
pub fn attribute_entries(tree: &PolicyTree) -> Vec<AttributeEntry> {
    let mut out = Vec::new();
    attribute_entries_node(tree, tree.root(), &mut out);
    out
}

fn attribute_entries_node(tree: &PolicyTree, idx: usize, out: &mut Vec<AttributeEntry>) {
    match &tree.node(idx).val {
        Val::Attr(_) => out.push(AttributeEntry {
            label: tree.labeled_name(idx),
            base_name: tree.base_name(idx).to_string(),
        }),
        _ => {
            if let Some(l) = tree.node(idx).left {
                attribute_entries_node(tree, l, out);
            }
            if let Some(r) = tree.node(idx).right {
                attribute_entries_node(tree, r, out);
            }
        }
    }
}

/// The minimal set of leaves that, if satisfied, satisfy the whole tree —
/// `None` if `available` (a GID's held attribute names) does not satisfy
/// it. `OR` takes its left branch whenever it is satisfiable, trying the
/// right only otherwise; a caller holding attributes that would satisfy
/// both branches still only needs the left one reconstructed.
pub fn prune(tree: &PolicyTree, available: &HashSet<String>) -> Option<Vec<AttributeEntry>> {
    prune_node(tree, tree.root(), available)
}

fn prune_node(tree: &PolicyTree, idx: usize, available: &HashSet<String>) -> Option<Vec<AttributeEntry>> {
    match &tree.node(idx).val {
        Val::Attr(_) => {
            if available.contains(tree.base_name(idx)) {
                Some(vec![AttributeEntry {
                    label: tree.labeled_name(idx),
                    base_name: tree.base_name(idx).to_string(),
                }])
            } else {
                None
            }
        }
        Val::Or => {
            let l = tree.node(idx).left.unwrap();
            let r = tree.node(idx).right.unwrap();
            prune_node(tree, l, available).or_else(|| prune_node(tree, r, available))
        }
        Val::And => {
            let l = tree.node(idx).left.unwrap();
            let r = tree.node(idx).right.unwrap();
            match (prune_node(tree, l, available), prune_node(tree, r, available)) {
                (Some(mut left), Some(right)) => {
                    left.extend(right);
                    Some(left)
                }
                _ => None,
            }
        }
        Val::Unset => unreachable!("validated trees have no Unset nodes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn or_shares_are_equal() {
        let t = PolicyTree::parse("(A OR B)").unwrap();
        let s = Fr::random(&mut thread_rng());
        let shares = compute_shares(&t, s, &mut thread_rng());
        assert_eq!(shares["A"], s);
        assert_eq!(shares["B"], s);
    }

    #[test]
    fn and_shares_reconstruct() {
        let t = PolicyTree::parse("(A AND B)").unwrap();
        let s = Fr::random(&mut thread_rng());
        let shares = compute_shares(&t, s, &mut thread_rng());
        let coeffs = coefficients(&t);
        let reconstructed = shares["A"] * coeffs["A"] + shares["B"] * coeffs["B"];
        assert_eq!(reconstructed, s);
    }

    #[test]
    fn nested_policy_reconstructs() {
        let t = PolicyTree::parse("((ACME AND ENG) OR (ACME AND EMP))").unwrap();
        let s = Fr::random(&mut thread_rng());
        let shares = compute_shares(&t, s, &mut thread_rng());
        let coeffs = coefficients(&t);

        let mut available = HashSet::new();
        available.insert("ACME".to_string());
        available.insert("ENG".to_string());
        let required = prune(&t, &available).expect("should satisfy");
        let reconstructed: Fr = required
            .iter()
            .map(|entry| shares[&entry.label] * coeffs[&entry.label])
            .fold(Fr::zero(), |acc, x| acc + x);
        assert_eq!(reconstructed, s);
    }

    #[test]
    fn unsatisfied_policy_prunes_to_none() {
        let t = PolicyTree::parse("(ACME AND ENG)").unwrap();
        let mut available = HashSet::new();
        available.insert("ACME".to_string());
        assert!(prune(&t, &available).is_none());
    }

    #[test]
    fn duplicate_attribute_labels_both_satisfiable() {
        let t = PolicyTree::parse("((A AND B) OR (A AND C))").unwrap();
        let mut available = HashSet::new();
        available.insert("A".to_string());
        available.insert("C".to_string());
        let required = prune(&t, &available).expect("should satisfy via right branch");
        let labels: Vec<String> = required.into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["A_1".to_string(), "C".to_string()]);
    }
}
