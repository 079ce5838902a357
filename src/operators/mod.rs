//! The operator runtime (§4.6): a DAG of plan-tree nodes, each launched
//! as its own worker thread, wired together by `Pipe<Record>`s. Grounded
//! on the source's `RelOp.cc`/`RelOp.h` and `operation_node.h`; the
//! teacher's read-only `project.rs` gave the `ProjectAction`-style
//! "rewrite by kept index list" shape reused here.

pub mod distinct;
pub mod group_by;
pub mod join;
pub mod project;
pub mod scan;
pub mod select_pipe;
pub mod sum;
pub mod write_out;

use crate::record::Record;
use crate::types::Value;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Table(#[from] crate::table::Error),
    #[error(transparent)]
    Heap(#[from] crate::table::heap::Error),
    #[error(transparent)]
    Record(#[from] crate::record::Error),
    #[error(transparent)]
    Sort(#[from] crate::sort::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("worker thread panicked")]
    WorkerPanicked,
    #[error("Sum/GroupBy expression evaluated over a non-numeric value")]
    NonNumericExpression,
}

/// A recursive arithmetic expression over attribute references and
/// numeric literals, evaluated per-record by Sum and GroupBy (§4.6).
#[derive(Clone, Debug)]
pub enum Expr {
    IntLiteral(i32),
    DoubleLiteral(f64),
    Attribute(usize),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
}

/// A numeric accumulator that stays `Int` as long as every value it has
/// seen was `Int`, and becomes `Double` permanently the first time it
/// absorbs one — matching §4.6's "accumulates into an Int or Double
/// accumulator depending on the expression's numeric type".
#[derive(Clone, Copy, Debug)]
pub enum Numeric {
    Int(i32),
    Double(f64),
}

impl Numeric {
    pub fn zero() -> Numeric {
        Numeric::Int(0)
    }

    pub fn add(self, other: Numeric) -> Numeric {
        match (self, other) {
            (Numeric::Int(a), Numeric::Int(b)) => Numeric::Int(a + b),
            (Numeric::Int(a), Numeric::Double(b)) => Numeric::Double(a as f64 + b),
            (Numeric::Double(a), Numeric::Int(b)) => Numeric::Double(a + b as f64),
            (Numeric::Double(a), Numeric::Double(b)) => Numeric::Double(a + b),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Numeric::Int(x) => Value::Int(x),
            Numeric::Double(x) => Value::Double(x),
        }
    }
}

fn numeric_of(v: &Value) -> Result<Numeric, Error> {
    match v {
        Value::Int(x) => Ok(Numeric::Int(*x)),
        Value::Double(x) => Ok(Numeric::Double(*x)),
        Value::String(_) => Err(Error::NonNumericExpression),
    }
}

fn binop(a: Numeric, b: Numeric, f_int: fn(i32, i32) -> i32, f_dbl: fn(f64, f64) -> f64) -> Numeric {
    match (a, b) {
        (Numeric::Int(x), Numeric::Int(y)) => Numeric::Int(f_int(x, y)),
        (Numeric::Int(x), Numeric::Double(y)) => Numeric::Double(f_dbl(x as f64, y)),
        (Numeric::Double(x), Numeric::Int(y)) => Numeric::Double(f_dbl(x, y as f64)),
        (Numeric::Double(x), Numeric::Double(y)) => Numeric::Double(f_dbl(x, y)),
    }
}

/// Evaluates `expr` against `record`, producing a typed numeric result.
pub fn eval_expr(expr: &Expr, record: &Record) -> Result<Numeric, Error> {
    match expr {
        Expr::IntLiteral(x) => Ok(Numeric::Int(*x)),
        Expr::DoubleLiteral(x) => Ok(Numeric::Double(*x)),
        Expr::Attribute(idx) => numeric_of(&record.get(*idx)?),
        Expr::Add(l, r) => Ok(binop(eval_expr(l, record)?, eval_expr(r, record)?, |a, b| a + b, |a, b| a + b)),
        Expr::Sub(l, r) => Ok(binop(eval_expr(l, record)?, eval_expr(r, record)?, |a, b| a - b, |a, b| a - b)),
        Expr::Mul(l, r) => Ok(binop(eval_expr(l, record)?, eval_expr(r, record)?, |a, b| a * b, |a, b| a * b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value::Int;

    #[test]
    fn eval_expr_mixed_arithmetic() {
        let rec = Record::new(&[Int(3), crate::types::Value::Double(1.5)], 4096).unwrap();
        let expr = Expr::Add(Box::new(Expr::Attribute(0)), Box::new(Expr::Attribute(1)));
        match eval_expr(&expr, &rec).unwrap() {
            Numeric::Double(v) => assert!((v - 4.5).abs() < 1e-9),
            Numeric::Int(_) => panic!("expected promotion to Double"),
        }
    }
}
