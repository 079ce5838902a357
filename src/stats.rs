//! Cardinality and distinct-value statistics (§4.8), consulted by the
//! planner before attribute indices are resolved, so conjuncts here are
//! expressed over relation-qualified attribute *names* rather than the
//! index-resolved operands `predicate::Comparison` uses post-planning.
//! Grounded on the source's `Statistics.cc`/`Statistics.h`.

use crate::predicate::CompareOp;
use crate::types::Value;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read statistics file {0}: {1}")]
    Read(std::path::PathBuf, std::io::Error),
    #[error("failed to write statistics file {0}: {1}")]
    Write(std::path::PathBuf, std::io::Error),
    #[error("malformed statistics line: {0}")]
    Malformed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum StatOperand {
    Attribute(String),
    Literal(Value),
}

#[derive(Clone, Debug)]
pub struct StatComparison {
    pub op: CompareOp,
    pub left: StatOperand,
    pub right: StatOperand,
}

pub type StatOrList = Vec<StatComparison>;
pub type StatAndList = Vec<StatOrList>;

#[derive(Clone, Debug, Default)]
struct RelationStats {
    tuple_count: f64,
    distinct: HashMap<String, f64>,
}

/// `{rel -> (tuple_count, {attr -> distinct_count})}`, an alias map from
/// committed equijoins, and the range-selectivity heuristic (the
/// source's hardcoded 1/3, made configurable per `Config`).
#[derive(Clone, Debug)]
pub struct Statistics {
    relations: HashMap<String, RelationStats>,
    aliases: HashMap<String, String>,
    range_selectivity: f64,
}

fn split_qualified(s: &str) -> Option<(&str, &str)> {
    s.split_once('.')
}

impl Statistics {
    pub fn new(range_selectivity: f64) -> Self {
        Statistics { relations: HashMap::new(), aliases: HashMap::new(), range_selectivity }
    }

    pub fn set_relation(&mut self, name: impl Into<String>, tuple_count: f64, distinct: HashMap<String, f64>) {
        self.relations.insert(name.into(), RelationStats { tuple_count, distinct });
    }

    /// Clones `src`'s tuple count and distinct-value map under a new
    /// relation name, so a query's FROM-clause aliases get their own
    /// statistics entry pointing at the same underlying counts (§4.7
    /// step 1, "apply table aliases by cloning statistics entries").
    /// A no-op if `src` has no recorded statistics yet.
    pub fn clone_relation_as(&mut self, src: &str, alias: impl Into<String>) {
        if let Some(stats) = self.relations.get(src).cloned() {
            self.relations.insert(alias.into(), stats);
        }
    }

    pub fn tuple_count(&self, rel: &str) -> Option<f64> {
        self.relations.get(rel).map(|r| r.tuple_count)
    }

    pub fn distinct_count(&self, rel: &str, attr: &str) -> Option<f64> {
        self.relations.get(rel).and_then(|r| r.distinct.get(attr)).copied()
    }

    /// Chases the alias map transitively: after `L.x = R.y` is
    /// committed, `R.y` (and anything previously pointing at `R.y`)
    /// resolves to `L.x`.
    pub fn canonical(&self, qualified: &str) -> String {
        let mut cur = qualified.to_string();
        let mut seen = std::collections::HashSet::new();
        while let Some(next) = self.aliases.get(&cur) {
            if !seen.insert(cur.clone()) {
                break; // cycle guard; aliasing is a DAG by construction but don't trust it blindly.
            }
            cur = next.clone();
        }
        cur
    }

    /// Returns the cardinality `apply(predicate)` would produce, without
    /// mutating this `Statistics` — by applying to a scratch copy.
    pub fn estimate(&self, pred: &StatAndList) -> f64 {
        self.clone().apply(pred)
    }

    /// Applies every conjunct of `pred` to this `Statistics`, mutating
    /// tuple counts and distinct counts in place, and returns the
    /// resulting cardinality.
    pub fn apply(&mut self, pred: &StatAndList) -> f64 {
        let mut and_cache: HashMap<String, Value> = HashMap::new();
        let mut result = 1.0;
        for or in pred {
            if or.len() == 1 && self.is_equijoin(&or[0]) {
                result = self.apply_equijoin(&or[0]);
                continue;
            }
            let mut or_cache: Vec<(String, Value)> = vec![];
            let mut collapsed = false;
            let mut acc = 0.0;
            let mut affected_rel = String::new();
            for c in or {
                let (rel, attr, op, literal) = match self.as_selection(c) {
                    Some(v) => v,
                    None => continue, // a stray equijoin inside a larger OR; not a shape this planner derives, skip defensively.
                };
                affected_rel = rel.clone();
                let canon = self.canonical(&format!("{rel}.{attr}"));

                if op == CompareOp::Eq {
                    // Only a true singleton OR-list is an AND conjunct in
                    // disguise; and_cache must never see same-attribute
                    // literals contributed by a real multi-disjunct OR,
                    // or a disjunction like `a=1 OR a=2` collapses as if
                    // it meant `a=1 AND a=2`.
                    if or.len() == 1 {
                        if let Some(prior) = and_cache.get(&canon) {
                            if *prior != literal {
                                collapsed = true;
                                break;
                            }
                            continue; // same attribute, same literal: a no-op duplicate.
                        }
                        and_cache.insert(canon.clone(), literal.clone());
                    }

                    if let Some(dup) = or_cache.iter().find(|(a, _)| *a == canon) {
                        if dup.1 == literal {
                            continue; // same-attribute, same-literal re-appearance: no-op.
                        }
                        // same attribute, different literal: disjoint events, plain sum.
                        let est = self.estimate_selection(&rel, &attr, op, &literal);
                        acc += est;
                        or_cache.push((canon, literal));
                        continue;
                    }
                    let est = self.estimate_selection(&rel, &attr, op, &literal);
                    acc = acc + est - acc * est / self.tuple_count(&rel).unwrap_or(1.0);
                    or_cache.push((canon, literal));
                } else {
                    let est = self.estimate_selection(&rel, &attr, op, &literal);
                    acc = acc + est - acc * est / self.tuple_count(&rel).unwrap_or(1.0);
                }
            }
            if collapsed {
                result = 0.0;
                if let Some(rel) = self.relations.get_mut(&affected_rel) {
                    rel.tuple_count = 0.0;
                }
                break;
            }
            if !affected_rel.is_empty() {
                self.commit_selection(&affected_rel, or);
                result = self.tuple_count(&affected_rel).unwrap_or(0.0);
            }
        }
        result
    }

    fn as_selection<'a>(&self, c: &'a StatComparison) -> Option<(String, String, CompareOp, Value)> {
        match (&c.left, &c.right) {
            (StatOperand::Attribute(a), StatOperand::Literal(v)) => {
                let (rel, attr) = split_qualified(a)?;
                Some((rel.to_string(), attr.to_string(), c.op, v.clone()))
            }
            (StatOperand::Literal(v), StatOperand::Attribute(a)) => {
                let (rel, attr) = split_qualified(a)?;
                Some((rel.to_string(), attr.to_string(), flip(c.op), v.clone()))
            }
            _ => None,
        }
    }

    fn is_equijoin(&self, c: &StatComparison) -> bool {
        matches!((&c.left, &c.right), (StatOperand::Attribute(_), StatOperand::Attribute(_))) && c.op == CompareOp::Eq
    }

    fn estimate_selection(&self, rel: &str, attr: &str, op: CompareOp, _literal: &Value) -> f64 {
        let t = self.tuple_count(rel).unwrap_or(0.0);
        let v = self.distinct_count(rel, attr).unwrap_or(1.0).max(1.0);
        match op {
            CompareOp::Eq => t / v,
            // Range selection (`<`/`>`): the one-third heuristic (§4.8).
            CompareOp::Lt | CompareOp::Gt => t * self.range_selectivity,
        }
    }

    /// Applies the first conjunct's relation/attribute as the one whose
    /// statistics get mutated — all conjuncts within one OR reference
    /// the same single relation by construction (a disjunction is never
    /// split across relations in this predicate model).
    fn commit_selection(&mut self, rel: &str, or: &StatOrList) {
        for c in or {
            if let Some((rel2, attr, op, _)) = self.as_selection(c) {
                if rel2 != rel {
                    continue;
                }
                if let Some(stats) = self.relations.get_mut(&rel2) {
                    let v = stats.distinct.get(&attr).copied().unwrap_or(1.0).max(1.0);
                    match op {
                        CompareOp::Eq => {
                            stats.tuple_count /= v;
                            stats.distinct.insert(attr, 1.0);
                        }
                        CompareOp::Lt | CompareOp::Gt => {
                            stats.tuple_count *= self.range_selectivity;
                            let entry = stats.distinct.entry(attr).or_insert(1.0);
                            *entry *= self.range_selectivity;
                        }
                    }
                }
            }
        }
    }

    /// Equi-join `L.x = R.y`: `T_L * T_R / max(V(L,x), V(R,y))`. Merges
    /// R's distinct counts into L (skipping the join attribute), removes
    /// R from the relation map, and records the alias `R.y -> L.x`.
    fn apply_equijoin(&mut self, c: &StatComparison) -> f64 {
        let (left, right) = match (&c.left, &c.right) {
            (StatOperand::Attribute(l), StatOperand::Attribute(r)) => (l.clone(), r.clone()),
            _ => unreachable!("is_equijoin already validated both sides are attributes"),
        };
        let (lrel, lattr) = split_qualified(&left).expect("qualified attribute name");
        let (rrel, rattr) = split_qualified(&right).expect("qualified attribute name");
        let (lrel, lattr, rrel, rattr) = (lrel.to_string(), lattr.to_string(), rrel.to_string(), rattr.to_string());

        let t_l = self.tuple_count(&lrel).unwrap_or(0.0);
        let t_r = self.tuple_count(&rrel).unwrap_or(0.0);
        let v_l = self.distinct_count(&lrel, &lattr).unwrap_or(1.0).max(1.0);
        let v_r = self.distinct_count(&rrel, &rattr).unwrap_or(1.0).max(1.0);
        let est = t_l * t_r / v_l.max(v_r);

        if let Some(r_stats) = self.relations.remove(&rrel) {
            let l_stats = self.relations.entry(lrel.clone()).or_default();
            l_stats.tuple_count = est;
            for (attr, count) in r_stats.distinct {
                if attr != rattr {
                    l_stats.distinct.insert(attr, count);
                }
            }
        }
        self.aliases.insert(format!("{rrel}.{rattr}"), format!("{lrel}.{lattr}"));
        est
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Statistics, Error> {
        let path = path.as_ref();
        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Statistics::new(1.0 / 3.0)),
            Err(e) => return Err(Error::Read(path.to_path_buf(), e)),
        };
        let mut stats = Statistics::new(1.0 / 3.0);
        for line in std::io::BufReader::new(file).lines() {
            let line = line.map_err(|e| Error::Read(path.to_path_buf(), e))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(body) = line.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
                let parts: Vec<&str> = body.split(':').map(str::trim).collect();
                if parts.len() != 3 {
                    return Err(Error::Malformed(line.to_string()));
                }
                let count: f64 = parts[2].parse().map_err(|_| Error::Malformed(line.to_string()))?;
                stats.relations.entry(parts[0].to_string()).or_default().distinct.insert(parts[1].to_string(), count);
            } else {
                let parts: Vec<&str> = line.split(':').map(str::trim).collect();
                if parts.len() < 2 {
                    return Err(Error::Malformed(line.to_string()));
                }
                let count: f64 = parts[1].parse().map_err(|_| Error::Malformed(line.to_string()))?;
                stats.relations.entry(parts[0].to_string()).or_default().tuple_count = count;
            }
        }
        Ok(stats)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let mut f = std::fs::File::create(path).map_err(|e| Error::Write(path.to_path_buf(), e))?;
        let mut names: Vec<&String> = self.relations.keys().collect();
        names.sort();
        for name in names {
            let rel = &self.relations[name];
            writeln!(f, "{} : {} :", name, rel.tuple_count).map_err(|e| Error::Write(path.to_path_buf(), e))?;
            let mut attrs: Vec<&String> = rel.distinct.keys().collect();
            attrs.sort();
            for attr in attrs {
                writeln!(f, "( {} : {} : {} )", name, attr, rel.distinct[attr]).map_err(|e| Error::Write(path.to_path_buf(), e))?;
            }
        }
        Ok(())
    }
}

fn flip(op: CompareOp) -> CompareOp {
    match op {
        CompareOp::Lt => CompareOp::Gt,
        CompareOp::Gt => CompareOp::Lt,
        CompareOp::Eq => CompareOp::Eq,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value::Int;

    fn sample() -> Statistics {
        let mut s = Statistics::new(1.0 / 3.0);
        let mut r = HashMap::new();
        r.insert("a".to_string(), 10.0);
        s.set_relation("r", 100.0, r);
        let mut t = HashMap::new();
        t.insert("b".to_string(), 20.0);
        s.set_relation("s", 200.0, t);
        s
    }

    fn eq_attr_literal(rel_attr: &str, v: Value) -> StatComparison {
        StatComparison { op: CompareOp::Eq, left: StatOperand::Attribute(rel_attr.to_string()), right: StatOperand::Literal(v) }
    }

    #[test]
    fn equality_selection_formula() {
        let mut s = sample();
        let pred: StatAndList = vec![vec![eq_attr_literal("r.a", Int(1))]];
        let est = s.apply(&pred);
        assert_eq!(est, 10.0); // 100 / 10
        assert_eq!(s.distinct_count("r", "a"), Some(1.0));
        assert_eq!(s.tuple_count("r"), Some(10.0));
    }

    #[test]
    fn range_selection_uses_one_third_heuristic() {
        let mut s = sample();
        let pred: StatAndList = vec![vec![StatComparison {
            op: CompareOp::Lt,
            left: StatOperand::Attribute("r.a".to_string()),
            right: StatOperand::Literal(Int(5)),
        }]];
        let est = s.apply(&pred);
        assert!((est - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn equijoin_formula_and_alias_commit() {
        let mut s = sample();
        let pred: StatAndList = vec![vec![StatComparison {
            op: CompareOp::Eq,
            left: StatOperand::Attribute("r.a".to_string()),
            right: StatOperand::Attribute("s.b".to_string()),
        }]];
        let est = s.apply(&pred);
        assert_eq!(est, 100.0 * 200.0 / 20.0); // max(10,20) = 20
        assert_eq!(s.tuple_count("s"), None); // merged away
        assert_eq!(s.canonical("s.b"), "r.a");
    }

    #[test]
    fn and_cache_collapses_conflicting_equality_to_zero() {
        let mut s = sample();
        let pred: StatAndList = vec![vec![eq_attr_literal("r.a", Int(1))], vec![eq_attr_literal("r.a", Int(2))]];
        let est = s.apply(&pred);
        assert_eq!(est, 0.0);
    }

    #[test]
    fn and_cache_noop_on_duplicate_literal() {
        let mut s = sample();
        let pred: StatAndList = vec![vec![eq_attr_literal("r.a", Int(1))], vec![eq_attr_literal("r.a", Int(1))]];
        let est = s.apply(&pred);
        assert_eq!(est, 10.0);
    }

    #[test]
    fn or_cache_sums_disjoint_literals_without_subtraction() {
        let mut s = sample();
        let pred: StatAndList = vec![vec![eq_attr_literal("r.a", Int(1)), eq_attr_literal("r.a", Int(2))]];
        let est = s.apply(&pred);
        // 100/10 + 100/10, no a+b-ab correction for disjoint equality literals.
        assert_eq!(est, 20.0);
    }

    #[test]
    fn estimate_does_not_mutate() {
        let s = sample();
        let pred: StatAndList = vec![vec![eq_attr_literal("r.a", Int(1))]];
        let est = s.estimate(&pred);
        assert_eq!(est, 10.0);
        assert_eq!(s.tuple_count("r"), Some(100.0)); // unchanged
    }

    #[test]
    fn clone_relation_as_copies_counts_under_alias() {
        let mut s = sample();
        s.clone_relation_as("r", "r1");
        assert_eq!(s.tuple_count("r1"), Some(100.0));
        assert_eq!(s.distinct_count("r1", "a"), Some(10.0));
    }

    #[test]
    fn persistence_roundtrip_and_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.txt");
        let s = sample();
        s.save(&path).unwrap();
        let loaded = Statistics::load(&path).unwrap();
        assert_eq!(loaded.tuple_count("r"), Some(100.0));
        assert_eq!(loaded.distinct_count("s", "b"), Some(20.0));

        let missing = Statistics::load(dir.path().join("nope.txt")).unwrap();
        assert_eq!(missing.tuple_count("r"), None);
    }
}
