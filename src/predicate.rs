//! CNF predicate model and the comparison engine (§4.1). A predicate is
//! an AND of ORs of atomic comparisons between two operands, each either
//! a literal or an attribute reference already resolved to an index.
//!
//! The source (`Comparison.h`) stores literal operands inside a private
//! single-attribute record so comparison code can stay generic over
//! "value living in a record". Rust's `Value` enum gives us that
//! genericity directly, so `Operand::Literal` just holds a `Value` —
//! same behavior, without the pointer-arithmetic trick.

use crate::record::{compare_values, Record};
use crate::types::Value;
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Gt,
    Eq,
}

/// Which record an `Operand::Attribute` reaches into. Selection
/// predicates only ever use `Left`; join predicates use both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Attribute { side: Side, index: usize },
    Literal(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub op: CompareOp,
    pub left: Operand,
    pub right: Operand,
}

/// A disjunction of atomic comparisons.
pub type OrList = Vec<Comparison>;
/// A conjunction of disjunctions — conjunctive normal form.
pub type AndList = Vec<OrList>;

fn eval_operand(op: &Operand, left: &Record, right: Option<&Record>) -> Value {
    match op {
        Operand::Literal(v) => v.clone(),
        Operand::Attribute { side: Side::Left, index } => {
            left.get(*index).expect("resolved attribute index out of range")
        }
        Operand::Attribute { side: Side::Right, index } => right
            .expect("comparison references right side with no right record")
            .get(*index)
            .expect("resolved attribute index out of range"),
    }
}

fn eval_comparison(c: &Comparison, left: &Record, right: Option<&Record>) -> bool {
    let l = eval_operand(&c.left, left, right);
    let r = eval_operand(&c.right, left, right);
    match compare_values(&l, &r) {
        Ordering::Less => c.op == CompareOp::Lt,
        Ordering::Greater => c.op == CompareOp::Gt,
        Ordering::Equal => c.op == CompareOp::Eq,
    }
}

/// Evaluates a CNF predicate against a single record (selection) or a
/// pair of records (join): true iff every conjunct has at least one
/// satisfied disjunct.
pub fn evaluate(pred: &AndList, left: &Record, right: Option<&Record>) -> bool {
    pred.iter().all(|or| or.iter().any(|c| eval_comparison(c, left, right)))
}

/// Lexicographically compares two records under two (possibly distinct)
/// attribute-index orders, for sort-merge join and TPMMS.
pub fn order_compare(left: &Record, left_order: &[usize], right: &Record, right_order: &[usize]) -> Ordering {
    for (&li, &ri) in left_order.iter().zip(right_order.iter()) {
        let lv = left.get(li).expect("order index out of range");
        let rv = right.get(ri).expect("order index out of range");
        let o = compare_values(&lv, &rv);
        if o != Ordering::Equal {
            return o;
        }
    }
    Ordering::Equal
}

/// Compares a single record against itself under one order spec, for
/// TPMMS's in-memory run sort.
pub fn self_compare(a: &Record, b: &Record, order: &[usize]) -> Ordering {
    order_compare(a, order, b, order)
}

/// Derives `(left_order, right_order)` iff every conjunct is a
/// disjunction-free equijoin of one left attribute to one right
/// attribute (§4.1). Returns `None` if any conjunct fails that shape —
/// callers fall back to block-nested-loop.
pub fn derive_join_order(pred: &AndList) -> Option<(Vec<usize>, Vec<usize>)> {
    let mut left_order = vec![];
    let mut right_order = vec![];
    for or in pred {
        if or.len() != 1 {
            return None;
        }
        let c = &or[0];
        if c.op != CompareOp::Eq {
            return None;
        }
        match (&c.left, &c.right) {
            (Operand::Attribute { side: Side::Left, index: li }, Operand::Attribute { side: Side::Right, index: ri }) => {
                left_order.push(*li);
                right_order.push(*ri);
            }
            (Operand::Attribute { side: Side::Right, index: ri }, Operand::Attribute { side: Side::Left, index: li }) => {
                left_order.push(*li);
                right_order.push(*ri);
            }
            _ => return None,
        }
    }
    Some((left_order, right_order))
}

/// Selection pushdown for sorted scans (§4.1): given a sorted table's
/// order spec and a single-relation selection predicate, returns the
/// leading run of sort attributes that have an equality conjunct, paired
/// with that conjunct's literal. Stops at the first sort attribute with
/// no equality conjunct — an index can only be probed on a matching
/// prefix, the same reason a composite B-tree index can't skip a column.
/// An empty result (no leading attribute matched) means the binary probe
/// degenerates to a full linear scan; see `table::sorted`.
pub fn derive_query_order(sort_order: &[usize], pred: &AndList) -> Vec<(usize, Value)> {
    let mut result = vec![];
    for &attr in sort_order {
        let literal = pred.iter().find_map(|or| {
            if or.len() != 1 {
                return None;
            }
            let c = &or[0];
            if c.op != CompareOp::Eq {
                return None;
            }
            match (&c.left, &c.right) {
                (Operand::Attribute { side: Side::Left, index }, Operand::Literal(v)) if *index == attr => {
                    Some(v.clone())
                }
                (Operand::Literal(v), Operand::Attribute { side: Side::Left, index }) if *index == attr => {
                    Some(v.clone())
                }
                _ => None,
            }
        });
        match literal {
            Some(v) => result.push((attr, v)),
            None => break,
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value::*;

    fn rec(vals: &[crate::types::Value]) -> Record {
        Record::new(vals, 4096).unwrap()
    }

    fn eq_attr_literal(idx: usize, v: crate::types::Value) -> OrList {
        vec![Comparison { op: CompareOp::Eq, left: Operand::Attribute { side: Side::Left, index: idx }, right: Operand::Literal(v) }]
    }

    #[test]
    fn selection_and_of_or_semantics() {
        // WHERE a = 1 OR a = 3 AND b = 10
        let pred: AndList = vec![
            vec![
                Comparison { op: CompareOp::Eq, left: Operand::Attribute { side: Side::Left, index: 0 }, right: Operand::Literal(Int(1)) },
                Comparison { op: CompareOp::Eq, left: Operand::Attribute { side: Side::Left, index: 0 }, right: Operand::Literal(Int(3)) },
            ],
            eq_attr_literal(1, Int(10)),
        ];
        assert!(evaluate(&pred, &rec(&[Int(1), Int(10)]), None));
        assert!(evaluate(&pred, &rec(&[Int(3), Int(10)]), None));
        assert!(!evaluate(&pred, &rec(&[Int(2), Int(10)]), None));
        assert!(!evaluate(&pred, &rec(&[Int(1), Int(11)]), None));
    }

    #[test]
    fn join_order_derivation_succeeds_for_pure_equijoin() {
        let pred: AndList = vec![vec![Comparison {
            op: CompareOp::Eq,
            left: Operand::Attribute { side: Side::Left, index: 0 },
            right: Operand::Attribute { side: Side::Right, index: 1 },
        }]];
        let (l, r) = derive_join_order(&pred).unwrap();
        assert_eq!(l, vec![0]);
        assert_eq!(r, vec![1]);
    }

    #[test]
    fn join_order_derivation_fails_on_inequality() {
        let pred: AndList = vec![vec![Comparison {
            op: CompareOp::Lt,
            left: Operand::Attribute { side: Side::Left, index: 0 },
            right: Operand::Attribute { side: Side::Right, index: 0 },
        }]];
        assert!(derive_join_order(&pred).is_none());
    }

    #[test]
    fn query_order_stops_at_first_unmatched_sort_attribute() {
        let sort_order = vec![0, 1, 2];
        let pred: AndList = vec![eq_attr_literal(0, Int(5)), eq_attr_literal(2, Int(9))];
        let qo = derive_query_order(&sort_order, &pred);
        // attribute 1 has no equality conjunct, so probing stops there.
        assert_eq!(qo, vec![(0, Int(5))]);
    }

    #[test]
    fn order_compare_lexicographic() {
        let a = rec(&[Int(1), Int(5)]);
        let b = rec(&[Int(1), Int(9)]);
        assert_eq!(order_compare(&a, &[0, 1], &b, &[0, 1]), Ordering::Less);
    }
}
