//! SQL-subset parser (§6, §10): a `pest` grammar drives parsing, the same
//! tool the teacher uses in `parser.rs`, producing the plain
//! `AndList`/`OrList`/`ComparisonOp`/`TableList` values §1 says the core
//! consumes. Deliberately thin — this module exists so the crate builds
//! end-to-end, not as one of the three hard subsystems §1 names.

use crate::predicate::CompareOp;
use crate::stats::{StatAndList, StatComparison, StatOperand, StatOrList};
use crate::types::Value;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as DeriveParser;

#[derive(DeriveParser)]
#[grammar = "grammar.pest"]
struct SqlParser;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("syntax error: {0}")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),
    #[error("unreachable parse rule {0:?}")]
    Unreachable(Rule),
}

impl From<pest::error::Error<Rule>> for Error {
    fn from(e: pest::error::Error<Rule>) -> Self {
        Error::Syntax(Box::new(e))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Organization {
    Heap,
    Sorted(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct CreateTable {
    pub name: String,
    pub attributes: Vec<(String, crate::types::Type)>,
    pub organization: Organization,
}

#[derive(Debug, Clone)]
pub struct InsertInto {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct DropTable {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputTarget {
    Stdout,
    None,
    Path(String),
}

#[derive(Debug, Clone)]
pub struct UpdateStatistics {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

/// An arithmetic expression over relation-qualified attribute names, not
/// yet resolved to indices — resolution is the planner's job, once it
/// knows which subtree schema each name currently lives under.
#[derive(Debug, Clone)]
pub enum RawExpr {
    IntLiteral(i32),
    DoubleLiteral(f64),
    Attribute(String),
    Add(Box<RawExpr>, Box<RawExpr>),
    Sub(Box<RawExpr>, Box<RawExpr>),
    Mul(Box<RawExpr>, Box<RawExpr>),
}

#[derive(Debug, Clone)]
pub enum SelectItem {
    Star,
    Column(String),
    Sum(RawExpr),
}

#[derive(Debug, Clone)]
pub struct SelectQuery {
    pub distinct: bool,
    pub select_list: Vec<SelectItem>,
    pub from: Vec<TableRef>,
    pub where_: StatAndList,
    pub group_by: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Statement {
    CreateTable(CreateTable),
    InsertInto(InsertInto),
    DropTable(DropTable),
    SetOutput(OutputTarget),
    UpdateStatistics(UpdateStatistics),
    Select(SelectQuery),
    Quit,
}

pub fn parse(input: &str) -> Result<Statement, Error> {
    let command = SqlParser::parse(Rule::command, input)?.next().expect("command rule always produces one pair");
    let stmt = command.into_inner().find(|p| p.as_rule() != Rule::EOI).expect("command always contains one statement");
    match stmt.as_rule() {
        Rule::create_stmt => Ok(Statement::CreateTable(parse_create(stmt))),
        Rule::insert_stmt => Ok(Statement::InsertInto(parse_insert(stmt))),
        Rule::drop_stmt => Ok(Statement::DropTable(parse_drop(stmt))),
        Rule::set_output_stmt => Ok(Statement::SetOutput(parse_set_output(stmt))),
        Rule::update_stats_stmt => Ok(Statement::UpdateStatistics(parse_update_stats(stmt))),
        Rule::select_stmt => Ok(Statement::Select(parse_select(stmt))),
        Rule::quit_stmt => Ok(Statement::Quit),
        r => Err(Error::Unreachable(r)),
    }
}

fn unquote(s: &str) -> String {
    s.trim_matches('\'').to_string()
}

fn parse_type(s: &str) -> crate::types::Type {
    s.parse().expect("type_name rule only matches recognized type keywords")
}

fn parse_create(pair: Pair<Rule>) -> CreateTable {
    let mut inner = pair.into_inner();
    let name = inner.next().unwrap().as_str().to_string();
    let column_defs = inner.next().unwrap();
    let mut attributes = vec![];
    for column_def in column_defs.into_inner() {
        let mut cd = column_def.into_inner();
        let attr_name = cd.next().unwrap().as_str().to_string();
        let attr_type = parse_type(cd.next().unwrap().as_str());
        attributes.push((attr_name, attr_type));
    }
    let organization_pair = inner.next().unwrap();
    let mut org_inner = organization_pair.into_inner();
    let organization = match org_inner.next() {
        None => Organization::Heap,
        Some(ident_list) => Organization::Sorted(ident_list.into_inner().map(|i| i.as_str().to_string()).collect()),
    };
    CreateTable { name, attributes, organization }
}

fn parse_insert(pair: Pair<Rule>) -> InsertInto {
    let mut inner = pair.into_inner();
    let name = inner.next().unwrap().as_str().to_string();
    let path = unquote(inner.next().unwrap().as_str());
    InsertInto { name, path }
}

fn parse_drop(pair: Pair<Rule>) -> DropTable {
    let name = pair.into_inner().next().unwrap().as_str().to_string();
    DropTable { name }
}

fn parse_set_output(pair: Pair<Rule>) -> OutputTarget {
    let target = pair.into_inner().next().unwrap();
    let s = target.as_str();
    if s.eq_ignore_ascii_case("STDOUT") {
        OutputTarget::Stdout
    } else if s.eq_ignore_ascii_case("NONE") {
        OutputTarget::None
    } else {
        OutputTarget::Path(unquote(s))
    }
}

fn parse_update_stats(pair: Pair<Rule>) -> UpdateStatistics {
    let name = pair.into_inner().next().unwrap().as_str().to_string();
    UpdateStatistics { name }
}

fn parse_literal(pair: Pair<Rule>) -> Value {
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::number => {
            let s = inner.as_str();
            if s.contains('.') {
                Value::Double(s.parse().expect("number rule only matches valid floats"))
            } else {
                Value::Int(s.parse().expect("number rule only matches valid ints"))
            }
        }
        Rule::string_lit => Value::String(unquote(inner.as_str())),
        r => unreachable!("literal can only contain number or string_lit, got {r:?}"),
    }
}

fn parse_operand(pair: Pair<Rule>) -> StatOperand {
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::literal => StatOperand::Literal(parse_literal(inner)),
        Rule::qualified => StatOperand::Attribute(inner.as_str().to_string()),
        r => unreachable!("operand can only contain literal or qualified, got {r:?}"),
    }
}

fn parse_comparison(pair: Pair<Rule>) -> StatComparison {
    let mut inner = pair.into_inner();
    let left = parse_operand(inner.next().unwrap());
    let op = match inner.next().unwrap().as_str() {
        "<" => CompareOp::Lt,
        ">" => CompareOp::Gt,
        "=" => CompareOp::Eq,
        s => unreachable!("comp_op rule only matches <, >, =, got {s:?}"),
    };
    let right = parse_operand(inner.next().unwrap());
    StatComparison { op, left, right }
}

fn parse_or_list(pair: Pair<Rule>) -> StatOrList {
    pair.into_inner().map(parse_comparison).collect()
}

fn parse_and_list(pair: Pair<Rule>) -> StatAndList {
    pair.into_inner().map(parse_or_list).collect()
}

fn parse_arith_term(pair: Pair<Rule>) -> RawExpr {
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::qualified => RawExpr::Attribute(inner.as_str().to_string()),
        Rule::number => {
            let s = inner.as_str();
            if s.contains('.') {
                RawExpr::DoubleLiteral(s.parse().unwrap())
            } else {
                RawExpr::IntLiteral(s.parse().unwrap())
            }
        }
        Rule::arith_expr => parse_arith_expr(inner),
        r => unreachable!("arith_term can only contain qualified, number, or arith_expr, got {r:?}"),
    }
}

fn parse_arith_factor(pair: Pair<Rule>) -> RawExpr {
    let mut terms = pair.into_inner().map(parse_arith_term);
    let mut acc = terms.next().expect("arith_factor always has at least one term");
    for t in terms {
        acc = RawExpr::Mul(Box::new(acc), Box::new(t));
    }
    acc
}

fn parse_arith_expr(pair: Pair<Rule>) -> RawExpr {
    let mut inner = pair.into_inner();
    let mut acc = parse_arith_factor(inner.next().expect("arith_expr always has at least one factor"));
    while let Some(op_pair) = inner.next() {
        let rhs = parse_arith_factor(inner.next().expect("add_op is always followed by a factor"));
        acc = match op_pair.as_str() {
            "-" => RawExpr::Sub(Box::new(acc), Box::new(rhs)),
            _ => RawExpr::Add(Box::new(acc), Box::new(rhs)),
        };
    }
    acc
}

fn parse_select_item(pair: Pair<Rule>) -> SelectItem {
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::sum_expr => {
            let expr_pair = inner.into_inner().next().unwrap();
            SelectItem::Sum(parse_arith_expr(expr_pair))
        }
        Rule::qualified => SelectItem::Column(inner.as_str().to_string()),
        r => unreachable!("select_item can only contain sum_expr or qualified, got {r:?}"),
    }
}

fn parse_select_list(pair: Pair<Rule>) -> Vec<SelectItem> {
    let mut inner = pair.into_inner();
    match inner.next() {
        None => vec![],
        Some(first) if first.as_rule() == Rule::star => vec![SelectItem::Star],
        Some(first) => {
            let mut items = vec![parse_select_item(first)];
            items.extend(inner.map(parse_select_item));
            items
        }
    }
}

fn parse_table_ref(pair: Pair<Rule>) -> TableRef {
    let mut inner = pair.into_inner();
    let name = inner.next().unwrap().as_str().to_string();
    let alias = inner.next().map(|p| p.as_str().to_string());
    TableRef { name, alias }
}

fn parse_table_ref_list(pair: Pair<Rule>) -> Vec<TableRef> {
    pair.into_inner().map(parse_table_ref).collect()
}

fn parse_select(pair: Pair<Rule>) -> SelectQuery {
    let mut distinct = false;
    let mut select_list = vec![];
    let mut from = vec![];
    let mut where_ = vec![];
    let mut group_by = vec![];
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::distinct_kw => distinct = true,
            Rule::select_list => select_list = parse_select_list(p),
            Rule::table_ref_list => from = parse_table_ref_list(p),
            Rule::where_clause => where_ = parse_and_list(p.into_inner().next().unwrap()),
            Rule::group_by_clause => group_by = p.into_inner().next().unwrap().into_inner().map(|i| i.as_str().to_string()).collect(),
            _ => {}
        }
    }
    SelectQuery { distinct, select_list, from, where_, group_by }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_table_sorted() {
        let stmt = parse("CREATE TABLE r(a INT, b DOUBLE) AS SORTED ON a").unwrap();
        match stmt {
            Statement::CreateTable(ct) => {
                assert_eq!(ct.name, "r");
                assert_eq!(ct.attributes.len(), 2);
                assert_eq!(ct.organization, Organization::Sorted(vec!["a".to_string()]));
            }
            _ => panic!("expected CreateTable"),
        }
    }

    #[test]
    fn parses_insert_into() {
        let stmt = parse("INSERT INTO r FROM '/tmp/data.csv'").unwrap();
        match stmt {
            Statement::InsertInto(ins) => {
                assert_eq!(ins.name, "r");
                assert_eq!(ins.path, "/tmp/data.csv");
            }
            _ => panic!("expected InsertInto"),
        }
    }

    #[test]
    fn parses_simple_select_with_where() {
        let stmt = parse("SELECT * FROM r WHERE a = 1").unwrap();
        match stmt {
            Statement::Select(q) => {
                assert!(matches!(q.select_list[..], [SelectItem::Star]));
                assert_eq!(q.from.len(), 1);
                assert_eq!(q.where_.len(), 1);
            }
            _ => panic!("expected Select"),
        }
    }

    #[test]
    fn parses_group_by_with_sum() {
        let stmt = parse("SELECT a, SUM(b) FROM r GROUP BY a").unwrap();
        match stmt {
            Statement::Select(q) => {
                assert_eq!(q.group_by, vec!["a".to_string()]);
                assert!(matches!(q.select_list[1], SelectItem::Sum(_)));
            }
            _ => panic!("expected Select"),
        }
    }

    #[test]
    fn parses_two_table_join_with_distinct() {
        let stmt = parse("SELECT DISTINCT T.k FROM S, T WHERE S.k = T.k").unwrap();
        match stmt {
            Statement::Select(q) => {
                assert!(q.distinct);
                assert_eq!(q.from.len(), 2);
                assert_eq!(q.where_.len(), 1);
            }
            _ => panic!("expected Select"),
        }
    }

    #[test]
    fn parses_quit() {
        assert!(matches!(parse("QUIT").unwrap(), Statement::Quit));
    }
}
