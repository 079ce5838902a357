//! Greedy cost-based planner (§4.7): turns a parsed `SELECT` query into a
//! plan tree rooted in a Project/Sum/GroupBy (optionally topped with a
//! Distinct), then instantiates and wires the actual operators for it.
//! Grounded on the source's `a4-2utils.h` (`operation_node`/attribute
//! naming) for the candidate-pool, pick-minimum-cardinality algorithm.

use crate::catalog::Catalog;
use crate::config::Config;
use crate::operators::distinct::Distinct;
use crate::operators::group_by::GroupBy;
use crate::operators::join::Join;
use crate::operators::project::Project;
use crate::operators::scan::Scan;
use crate::operators::select_pipe::SelectPipe;
use crate::operators::sum::Sum;
use crate::operators::{self, Expr};
use crate::parse::{RawExpr, SelectItem, SelectQuery};
use crate::pipe::Pipe;
use crate::predicate::{self, AndList, CompareOp, Side};
use crate::record::Record;
use crate::schema::{Attribute, Schema};
use crate::stats::{StatAndList, StatComparison, StatOperand, StatOrList, Statistics};
use crate::table::Table;
use crate::types::Type;
use std::collections::HashMap;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] crate::catalog::Error),
    #[error(transparent)]
    Table(#[from] crate::table::Error),
    #[error(transparent)]
    Operator(#[from] operators::Error),
    #[error("unknown relation {0} in FROM clause")]
    UnknownRelation(String),
    #[error("unknown attribute {0}")]
    UnknownAttribute(String),
    #[error("attribute {0} is ambiguous across the FROM clause")]
    AmbiguousAttribute(String),
    #[error("SELECT list has no SUM(...) expression to aggregate")]
    MissingAggregate,
}

/// The logical plan tree: every predicate and attribute name has already
/// been resolved to indices against `schema`, so execution is purely
/// mechanical operator wiring. `origins[i]` is the FROM-clause key column
/// `i` of `schema` came from, carried alongside the schema so a qualified
/// reference (`T.k`) can still be told apart from a same-named column
/// from another joined relation (`S.k`) after `Schema::merge` has already
/// flattened both into one attribute list with no provenance of its own.
pub struct Plan {
    pub node: PlanNode,
    pub schema: Schema,
    pub origins: Vec<String>,
}

pub enum PlanNode {
    Scan { table_name: String, pred: AndList },
    SelectPipe { input: Box<Plan>, pred: AndList },
    Join { left: Box<Plan>, right: Box<Plan>, pred: AndList },
    Project { input: Box<Plan>, indices: Vec<usize> },
    Sum { input: Box<Plan>, expr: Expr },
    GroupBy { input: Box<Plan>, group_order: Vec<usize>, expr: Expr },
    Distinct { input: Box<Plan> },
}

struct FromInfo {
    /// FROM-clause key (alias, or bare table name if unaliased) -> real
    /// catalog table name.
    table_of: HashMap<String, String>,
    /// FROM-clause key -> that table's schema, renamed to the key so
    /// attribute resolution can proceed before the subtree is realized.
    schemas: HashMap<String, Schema>,
    /// FROM-clause keys in the order they were written, for deterministic
    /// leftover cross-join folding.
    order: Vec<String>,
}

fn build_from_info(query: &SelectQuery, catalog: &Catalog, stats: &mut Statistics) -> Result<FromInfo, Error> {
    let mut table_of = HashMap::new();
    let mut schemas = HashMap::new();
    let mut order = vec![];
    for t in &query.from {
        let key = t.alias.clone().unwrap_or_else(|| t.name.clone());
        if !catalog.contains(&t.name) {
            return Err(Error::UnknownRelation(t.name.clone()));
        }
        let mut schema = catalog.schema(&t.name)?.clone();
        schema.name = key.clone();
        stats.clone_relation_as(&t.name, key.clone());
        table_of.insert(key.clone(), t.name.clone());
        schemas.insert(key.clone(), schema);
        order.push(key);
    }
    Ok(FromInfo { table_of, schemas, order })
}

fn resolve_relation_key(name: &str, from: &FromInfo) -> Result<(String, String), Error> {
    if let Some((rel, attr)) = name.split_once('.') {
        if from.table_of.contains_key(rel) {
            return Ok((rel.to_string(), attr.to_string()));
        }
        return Err(Error::UnknownRelation(rel.to_string()));
    }
    if from.order.len() == 1 {
        return Ok((from.order[0].clone(), name.to_string()));
    }
    let matches: Vec<&String> = from.order.iter().filter(|k| schema_has(&from.schemas[*k], name)).collect();
    match matches.len() {
        1 => Ok((matches[0].clone(), name.to_string())),
        0 => Err(Error::UnknownAttribute(name.to_string())),
        _ => Err(Error::AmbiguousAttribute(name.to_string())),
    }
}

fn schema_has(schema: &Schema, bare_name: &str) -> bool {
    schema.attributes.iter().any(|a| a.name == bare_name)
}

/// Resolves `name` to a column index in `schema`. If `name` is qualified
/// (`rel.attr`) and `origins` has an entry matching `rel` at the same
/// bare attribute name, that entry wins; otherwise falls back to the
/// first column with a matching bare name (covers the common case of no
/// duplicate names, and unqualified names, where `origins` can't help).
fn resolve_attr_index(schema: &Schema, origins: &[String], name: &str) -> Result<usize, Error> {
    if let Some((rel, attr)) = name.split_once('.') {
        if let Some(i) = schema.attributes.iter().zip(origins).position(|(a, o)| a.name == attr && o == rel) {
            return Ok(i);
        }
    }
    let bare = name.rsplit('.').next().unwrap_or(name);
    schema.attributes.iter().position(|a| a.name == bare).ok_or_else(|| Error::UnknownAttribute(name.to_string()))
}

enum Classification {
    Selection(String),
    Join { rel_a: String, attr_a: String, rel_b: String, attr_b: String },
}

fn classify(or: &StatOrList, from: &FromInfo) -> Result<Classification, Error> {
    if or.len() == 1 {
        if let (StatOperand::Attribute(a), StatOperand::Attribute(b)) = (&or[0].left, &or[0].right) {
            let (rel_a, attr_a) = resolve_relation_key(a, from)?;
            let (rel_b, attr_b) = resolve_relation_key(b, from)?;
            if rel_a != rel_b {
                return Ok(Classification::Join { rel_a, attr_a, rel_b, attr_b });
            }
        }
    }
    for c in or {
        for op in [&c.left, &c.right] {
            if let StatOperand::Attribute(name) = op {
                let (rel, _) = resolve_relation_key(name, from)?;
                return Ok(Classification::Selection(rel));
            }
        }
    }
    Err(Error::UnknownAttribute("<predicate references no attribute>".to_string()))
}

fn to_operand(op: &StatOperand, side: Side, schema: &Schema, origins: &[String]) -> Result<predicate::Operand, Error> {
    match op {
        StatOperand::Literal(v) => Ok(predicate::Operand::Literal(v.clone())),
        StatOperand::Attribute(name) => Ok(predicate::Operand::Attribute { side, index: resolve_attr_index(schema, origins, name)? }),
    }
}

fn resolve_selection_or(or: &StatOrList, schema: &Schema, origins: &[String]) -> Result<predicate::OrList, Error> {
    or.iter()
        .map(|c| {
            Ok(predicate::Comparison {
                op: c.op,
                left: to_operand(&c.left, Side::Left, schema, origins)?,
                right: to_operand(&c.right, Side::Left, schema, origins)?,
            })
        })
        .collect()
}

fn current_schema_and_origins<'a>(
    key: &str,
    home: &HashMap<String, String>,
    realized: &'a HashMap<String, Plan>,
    from: &'a FromInfo,
) -> (&'a Schema, Vec<String>) {
    let top = home.get(key).map(String::as_str).unwrap_or(key);
    match realized.get(top) {
        Some(p) => (&p.schema, p.origins.clone()),
        None => {
            let schema = &from.schemas[key];
            (schema, vec![key.to_string(); schema.len()])
        }
    }
}

fn ensure_realized(realized: &mut HashMap<String, Plan>, home: &HashMap<String, String>, from: &FromInfo, rel: &str) {
    let key = home[rel].clone();
    realized.entry(key).or_insert_with(|| {
        let schema = from.schemas[rel].clone();
        let origins = vec![rel.to_string(); schema.len()];
        Plan { node: PlanNode::Scan { table_name: from.table_of[rel].clone(), pred: vec![] }, schema, origins }
    });
}

fn infer_expr_type(e: &Expr, schema: &Schema) -> Type {
    match e {
        Expr::IntLiteral(_) => Type::Int,
        Expr::DoubleLiteral(_) => Type::Double,
        Expr::Attribute(i) => schema.attributes[*i].r#type,
        Expr::Add(l, r) | Expr::Sub(l, r) | Expr::Mul(l, r) => {
            if infer_expr_type(l, schema) == Type::Double || infer_expr_type(r, schema) == Type::Double {
                Type::Double
            } else {
                Type::Int
            }
        }
    }
}

fn resolve_expr(e: &RawExpr, schema: &Schema, origins: &[String]) -> Result<Expr, Error> {
    Ok(match e {
        RawExpr::IntLiteral(x) => Expr::IntLiteral(*x),
        RawExpr::DoubleLiteral(x) => Expr::DoubleLiteral(*x),
        RawExpr::Attribute(name) => Expr::Attribute(resolve_attr_index(schema, origins, name)?),
        RawExpr::Add(l, r) => Expr::Add(Box::new(resolve_expr(l, schema, origins)?), Box::new(resolve_expr(r, schema, origins)?)),
        RawExpr::Sub(l, r) => Expr::Sub(Box::new(resolve_expr(l, schema, origins)?), Box::new(resolve_expr(r, schema, origins)?)),
        RawExpr::Mul(l, r) => Expr::Mul(Box::new(resolve_expr(l, schema, origins)?), Box::new(resolve_expr(r, schema, origins)?)),
    })
}

/// Builds the full logical plan for a parsed `SELECT` query (§4.7): the
/// greedy candidate-pool loop over the WHERE clause, followed by folding
/// any relations the predicate never tied together into a cross join,
/// topped with the query's Project/Sum/GroupBy and optional Distinct.
pub fn plan_select(query: &SelectQuery, catalog: &Catalog, stats: &mut Statistics) -> Result<Plan, Error> {
    let from = build_from_info(query, catalog, stats)?;
    let mut home: HashMap<String, String> = from.order.iter().map(|k| (k.clone(), k.clone())).collect();
    let mut realized: HashMap<String, Plan> = HashMap::new();
    let mut pool: Vec<StatOrList> = query.where_.clone();

    while !pool.is_empty() {
        let mut best = 0;
        let mut best_est = f64::INFINITY;
        for (i, or) in pool.iter().enumerate() {
            let est = stats.estimate(&vec![or.clone()]);
            if est < best_est {
                best_est = est;
                best = i;
            }
        }
        let or = pool.remove(best);
        let classification = classify(&or, &from)?;

        let pre_apply_counts = if let Classification::Join { rel_a, rel_b, .. } = &classification {
            Some((stats.tuple_count(rel_a).unwrap_or(1.0), stats.tuple_count(rel_b).unwrap_or(1.0)))
        } else {
            None
        };
        stats.apply(&vec![or.clone()]);

        match classification {
            Classification::Selection(rel) => {
                let key = home[&rel].clone();
                let (schema, origins) = current_schema_and_origins(&key, &home, &realized, &from);
                let schema = schema.clone();
                let resolved_or = resolve_selection_or(&or, &schema, &origins)?;
                match realized.remove(&key) {
                    Some(existing) => {
                        let new_schema = existing.schema.clone();
                        let new_origins = existing.origins.clone();
                        realized.insert(
                            key,
                            Plan { node: PlanNode::SelectPipe { input: Box::new(existing), pred: vec![resolved_or] }, schema: new_schema, origins: new_origins },
                        );
                    }
                    None => {
                        let table_name = from.table_of[&rel].clone();
                        realized.insert(key, Plan { node: PlanNode::Scan { table_name, pred: vec![resolved_or] }, schema, origins });
                    }
                }
            }
            Classification::Join { rel_a, attr_a, rel_b, attr_b } => {
                ensure_realized(&mut realized, &home, &from, &rel_a);
                ensure_realized(&mut realized, &home, &from, &rel_b);
                let key_a = home[&rel_a].clone();
                let key_b = home[&rel_b].clone();

                if key_a == key_b {
                    // Already merged by a prior equijoin; this conjunct
                    // only narrows the existing subtree further.
                    let schema = realized[&key_a].schema.clone();
                    let origins = realized[&key_a].origins.clone();
                    let resolved_or = resolve_selection_or(&or, &schema, &origins)?;
                    let existing = realized.remove(&key_a).expect("ensure_realized guarantees this key exists");
                    realized.insert(key_a, Plan { node: PlanNode::SelectPipe { input: Box::new(existing), pred: vec![resolved_or] }, schema, origins });
                    continue;
                }

                let (card_a, card_b) = pre_apply_counts.expect("Join classification always computes pre-apply cardinalities");
                let (phys_left_key, phys_left_attr, phys_right_key, phys_right_attr) = if card_a <= card_b {
                    (key_a.clone(), attr_a, key_b.clone(), attr_b)
                } else {
                    (key_b.clone(), attr_b, key_a.clone(), attr_a)
                };

                let left_plan = realized.remove(&phys_left_key).expect("ensure_realized guarantees this key exists");
                let right_plan = realized.remove(&phys_right_key).expect("ensure_realized guarantees this key exists");
                let left_idx = resolve_attr_index(&left_plan.schema, &left_plan.origins, &phys_left_attr)?;
                let right_idx = resolve_attr_index(&right_plan.schema, &right_plan.origins, &phys_right_attr)?;
                let resolved_or = vec![predicate::Comparison {
                    op: or[0].op,
                    left: predicate::Operand::Attribute { side: Side::Left, index: left_idx },
                    right: predicate::Operand::Attribute { side: Side::Right, index: right_idx },
                }];

                let mut merged_schema = left_plan.schema.merge(&right_plan.schema);
                merged_schema.name = rel_a.clone();
                let merged_origins: Vec<String> = left_plan.origins.iter().chain(right_plan.origins.iter()).cloned().collect();
                let new_key = phys_left_key.clone();
                for v in home.values_mut() {
                    if *v == phys_right_key {
                        *v = new_key.clone();
                    }
                }
                home.insert(rel_a, new_key.clone());
                home.insert(rel_b, new_key.clone());
                realized.insert(
                    new_key,
                    Plan { node: PlanNode::Join { left: Box::new(left_plan), right: Box::new(right_plan), pred: vec![resolved_or] }, schema: merged_schema, origins: merged_origins },
                );
            }
        }
    }

    for key in &from.order {
        ensure_realized(&mut realized, &home, &from, key);
    }
    let mut seen = std::collections::HashSet::new();
    let remaining: Vec<String> = from.order.iter().map(|k| home[k].clone()).filter(|k| seen.insert(k.clone())).collect();
    let mut remaining = remaining.into_iter();
    let mut acc = realized.remove(&remaining.next().expect("FROM clause always has at least one relation")).expect("realized by the ensure_realized pass above");
    for key in remaining {
        let right = realized.remove(&key).expect("realized by the ensure_realized pass above");
        let mut merged_schema = acc.schema.merge(&right.schema);
        merged_schema.name = acc.schema.name.clone();
        let merged_origins: Vec<String> = acc.origins.iter().chain(right.origins.iter()).cloned().collect();
        acc = Plan { node: PlanNode::Join { left: Box::new(acc), right: Box::new(right), pred: vec![] }, schema: merged_schema, origins: merged_origins };
    }

    let sum_item = query.select_list.iter().find_map(|i| if let SelectItem::Sum(e) = i { Some(e) } else { None });

    let mut top = if !query.group_by.is_empty() {
        let group_order: Vec<usize> = query.group_by.iter().map(|n| resolve_attr_index(&acc.schema, &acc.origins, n)).collect::<Result<_, _>>()?;
        let expr = resolve_expr(sum_item.ok_or(Error::MissingAggregate)?, &acc.schema, &acc.origins)?;
        let mut attrs = vec![Attribute::new("sum", infer_expr_type(&expr, &acc.schema))];
        attrs.extend(group_order.iter().map(|&i| acc.schema.attributes[i].clone()));
        let schema = Schema::new("group", attrs);
        // The sum column is a fresh aggregate, not a copy of any source
        // column, so it carries no origin of its own.
        let mut origins = vec![String::new()];
        origins.extend(group_order.iter().map(|&i| acc.origins[i].clone()));
        Plan { node: PlanNode::GroupBy { input: Box::new(acc), group_order, expr }, schema, origins }
    } else if let Some(e) = sum_item {
        let expr = resolve_expr(e, &acc.schema, &acc.origins)?;
        let ty = infer_expr_type(&expr, &acc.schema);
        let schema = Schema::new("sum", vec![Attribute::new("sum", ty)]);
        Plan { node: PlanNode::Sum { input: Box::new(acc), expr }, schema, origins: vec![String::new()] }
    } else {
        let indices: Vec<usize> = if query.select_list.is_empty() || query.select_list.iter().any(|i| matches!(i, SelectItem::Star)) {
            (0..acc.schema.len()).collect()
        } else {
            query
                .select_list
                .iter()
                .map(|i| match i {
                    SelectItem::Column(name) => resolve_attr_index(&acc.schema, &acc.origins, name),
                    SelectItem::Star => unreachable!("star only ever appears alone in a select_list"),
                    SelectItem::Sum(_) => unreachable!("sum_item would have taken the Sum branch above"),
                })
                .collect::<Result<_, _>>()?
        };
        let attrs = indices.iter().map(|&i| acc.schema.attributes[i].clone()).collect();
        let schema = Schema::new(acc.schema.name.clone(), attrs);
        let origins = indices.iter().map(|&i| acc.origins[i].clone()).collect();
        Plan { node: PlanNode::Project { input: Box::new(acc), indices }, schema, origins }
    };

    if query.distinct {
        top = Plan { schema: top.schema.clone(), origins: top.origins.clone(), node: PlanNode::Distinct { input: Box::new(top) } };
    }
    Ok(top)
}

/// A live operator, kept around only so its worker thread can be joined
/// once the caller has drained the plan's final output pipe.
pub enum Running {
    Scan(Scan),
    SelectPipe(SelectPipe),
    Join(Join),
    Project(Project),
    Sum(Sum),
    GroupBy(GroupBy),
    Distinct(Distinct),
}

impl Running {
    pub fn wait_until_done(self) -> Result<(), Error> {
        match self {
            Running::Scan(mut o) => Ok(o.wait_until_done()?),
            Running::SelectPipe(mut o) => Ok(o.wait_until_done()?),
            Running::Join(mut o) => Ok(o.wait_until_done()?),
            Running::Project(mut o) => Ok(o.wait_until_done()?),
            Running::Sum(mut o) => Ok(o.wait_until_done()?),
            Running::GroupBy(mut o) => Ok(o.wait_until_done()?),
            Running::Distinct(mut o) => Ok(o.wait_until_done()?),
        }
    }
}

/// Instantiates every operator in `plan`, starting each worker thread as
/// soon as it's built (safe regardless of order: every pipe between them
/// is a bounded blocking queue, not a channel that must be polled from
/// the consuming end first). Returns the final output pipe and every
/// operator so the caller can join them after draining it.
pub fn execute(plan: &Plan, catalog: &Catalog, config: &Config) -> Result<(Pipe<Record>, Vec<Running>), Error> {
    match &plan.node {
        PlanNode::Scan { table_name, pred } => {
            let path = config.data_dir.join(format!("{table_name}.bin"));
            let schema = catalog.schema(table_name)?.clone();
            let table = Table::open(&path, schema, config.page_size, config.pipe_capacity, config.sort_pages)?;
            let mut op = Scan::new(table, pred.clone(), config.pipe_capacity);
            let out = op.output().clone();
            op.run();
            Ok((out, vec![Running::Scan(op)]))
        }
        PlanNode::SelectPipe { input, pred } => {
            let (in_pipe, mut handles) = execute(input, catalog, config)?;
            let mut op = SelectPipe::new(in_pipe, pred.clone(), config.pipe_capacity);
            let out = op.output().clone();
            op.run();
            handles.push(Running::SelectPipe(op));
            Ok((out, handles))
        }
        PlanNode::Join { left, right, pred } => {
            let (left_pipe, mut handles) = execute(left, catalog, config)?;
            let (right_pipe, right_handles) = execute(right, catalog, config)?;
            handles.extend(right_handles);
            let mut op = Join::new(left_pipe, right_pipe, pred.clone(), left.schema.clone(), config.page_size, config.pipe_capacity, config.sort_pages, config.bnl_block_pages);
            let out = op.output().clone();
            op.run();
            handles.push(Running::Join(op));
            Ok((out, handles))
        }
        PlanNode::Project { input, indices } => {
            let (in_pipe, mut handles) = execute(input, catalog, config)?;
            let mut op = Project::new(in_pipe, indices.clone(), config.page_size, config.pipe_capacity);
            let out = op.output().clone();
            op.run();
            handles.push(Running::Project(op));
            Ok((out, handles))
        }
        PlanNode::Sum { input, expr } => {
            let (in_pipe, mut handles) = execute(input, catalog, config)?;
            let mut op = Sum::new(in_pipe, expr.clone(), config.page_size, config.pipe_capacity);
            let out = op.output().clone();
            op.run();
            handles.push(Running::Sum(op));
            Ok((out, handles))
        }
        PlanNode::GroupBy { input, group_order, expr } => {
            let (in_pipe, mut handles) = execute(input, catalog, config)?;
            let mut op = GroupBy::new(in_pipe, group_order.clone(), expr.clone(), config.page_size, config.pipe_capacity, config.sort_pages);
            let out = op.output().clone();
            op.run();
            handles.push(Running::GroupBy(op));
            Ok((out, handles))
        }
        PlanNode::Distinct { input } => {
            let (in_pipe, mut handles) = execute(input, catalog, config)?;
            let mut op = Distinct::new(in_pipe, &input.schema, config.page_size, config.pipe_capacity, config.sort_pages);
            let out = op.output().clone();
            op.run();
            handles.push(Running::Distinct(op));
            Ok((out, handles))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::TableRef;
    use crate::record::Record;
    use crate::schema::Attribute;
    use crate::stats::StatComparison;
    use crate::types::Value::Int;
    use std::collections::HashMap as Map;

    fn setup(dir: &std::path::Path) -> (Catalog, Config) {
        let mut catalog = Catalog::load(dir).unwrap();
        catalog.create_table("r", vec![Attribute::new("a", Type::Int), Attribute::new("b", Type::Int)]).unwrap();
        catalog.create_table("s", vec![Attribute::new("k", Type::Int)]).unwrap();
        let config = Config { page_size: 4096, pipe_capacity: 16, sort_pages: 4, bnl_block_pages: 4, range_selectivity: 1.0 / 3.0, data_dir: dir.to_path_buf() };
        let mut r = Table::create_heap(dir.join("r.bin"), catalog.schema("r").unwrap().clone(), config.page_size).unwrap();
        for (a, b) in [(1, 10), (2, 20), (1, 30)] {
            r.add(Record::new(&[Int(a), Int(b)], config.page_size).unwrap()).unwrap();
        }
        r.close().unwrap();
        let mut s = Table::create_heap(dir.join("s.bin"), catalog.schema("s").unwrap().clone(), config.page_size).unwrap();
        for k in [1, 2] {
            s.add(Record::new(&[Int(k)], config.page_size).unwrap()).unwrap();
        }
        s.close().unwrap();
        (catalog, config)
    }

    #[test]
    fn plans_and_executes_single_relation_selection() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, config) = setup(dir.path());
        let mut stats = Statistics::new(1.0 / 3.0);
        stats.set_relation("r", 3.0, Map::from([("a".to_string(), 2.0)]));

        let query = SelectQuery {
            distinct: false,
            select_list: vec![SelectItem::Star],
            from: vec![TableRef { name: "r".to_string(), alias: None }],
            where_: vec![vec![StatComparison { op: CompareOp::Eq, left: StatOperand::Attribute("a".to_string()), right: StatOperand::Literal(Int(1)) }]],
            group_by: vec![],
        };
        let plan = plan_select(&query, &catalog, &mut stats).unwrap();
        let (out, handles) = execute(&plan, &catalog, &config).unwrap();
        let mut rows = vec![];
        while let Some(r) = out.remove() {
            rows.push(r.values().unwrap());
        }
        for h in handles {
            h.wait_until_done().unwrap();
        }
        assert_eq!(rows, vec![vec![Int(1), Int(10)], vec![Int(1), Int(30)]]);
    }

    #[test]
    fn plans_and_executes_equijoin() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, config) = setup(dir.path());
        let mut stats = Statistics::new(1.0 / 3.0);
        stats.set_relation("r", 3.0, Map::from([("a".to_string(), 2.0)]));
        stats.set_relation("s", 2.0, Map::from([("k".to_string(), 2.0)]));

        let query = SelectQuery {
            distinct: false,
            select_list: vec![SelectItem::Star],
            from: vec![TableRef { name: "r".to_string(), alias: None }, TableRef { name: "s".to_string(), alias: None }],
            where_: vec![vec![StatComparison { op: CompareOp::Eq, left: StatOperand::Attribute("r.a".to_string()), right: StatOperand::Attribute("s.k".to_string()) }]],
            group_by: vec![],
        };
        let plan = plan_select(&query, &catalog, &mut stats).unwrap();
        let (out, handles) = execute(&plan, &catalog, &config).unwrap();
        let mut rows = vec![];
        while let Some(r) = out.remove() {
            rows.push(r.values().unwrap());
        }
        for h in handles {
            h.wait_until_done().unwrap();
        }
        rows.sort_by_key(|v| match (&v[0], &v[1]) {
            (Int(a), Int(b)) => (*a, *b),
            _ => unreachable!(),
        });
        // Merged schema is [s.k, r.a, r.b]: cardinality picked s as the
        // physical left/inner side, though the subtree is still
        // addressable under "r" (the conjunct's own left relation).
        assert_eq!(rows, vec![vec![Int(1), Int(1), Int(10)], vec![Int(1), Int(1), Int(30)], vec![Int(2), Int(2), Int(20)]]);
    }
}
