use std::cmp::Ordering;
use std::fmt;

use super::error::{EngineError, EngineResult};
use super::model::Table;

// ---------------------------------------------------------------------------
// Row filter: a single comparison naming the rows to remove
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    Greater,
}

/// One side of a comparison: a `{column}` reference or a number.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Value(f64),
}

/// A parsed `LHS OP RHS` expression.
///
/// Accepted forms are `OP VALUE` (the left operand is the chosen column) and
/// `LHS OP RHS`, where operands are numbers or `{column name}` references and
/// `OP` is `<` or `>`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFilter {
    pub lhs: Operand,
    pub op: Comparison,
    pub rhs: Operand,
}

#[derive(Debug, PartialEq)]
enum Token {
    Op(Comparison),
    Column(String),
    Literal(String),
}

fn tokenize(expr: &str) -> EngineResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '<' | '>' => {
                chars.next();
                tokens.push(Token::Op(if c == '<' {
                    Comparison::Less
                } else {
                    Comparison::Greater
                }));
            }
            '{' => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(EngineError::Validation(format!(
                        "unterminated column reference in '{expr}'"
                    )));
                }
                tokens.push(Token::Column(name));
            }
            _ => {
                let mut literal = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '<' | '>' | '{') {
                        break;
                    }
                    literal.push(c);
                    chars.next();
                }
                tokens.push(Token::Literal(literal));
            }
        }
    }
    Ok(tokens)
}

fn operand(token: Token) -> EngineResult<Operand> {
    match token {
        Token::Column(name) => Ok(Operand::Column(name)),
        Token::Literal(text) => text.parse::<f64>().map(Operand::Value).map_err(|_| {
            EngineError::Type(format!("cannot compare a numeric column with '{text}'"))
        }),
        Token::Op(_) => Err(EngineError::Validation("expected a value, found an operator".into())),
    }
}

impl RowFilter {
    /// Parse `expr`; `column` stands in for the missing left operand of the
    /// two-token form.
    pub fn parse(expr: &str, column: &str) -> EngineResult<Self> {
        let malformed = || {
            EngineError::Validation(format!(
                "'{expr}' is not of the form 'OP VALUE' or 'LHS OP RHS' with OP '<' or '>'"
            ))
        };
        let mut tokens = tokenize(expr)?.into_iter();
        match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
            (Some(Token::Op(op)), Some(rhs), None, None) => Ok(RowFilter {
                lhs: Operand::Column(column.to_string()),
                op,
                rhs: operand(rhs)?,
            }),
            (Some(lhs), Some(Token::Op(op)), Some(rhs), None) => Ok(RowFilter {
                lhs: operand(lhs)?,
                op,
                rhs: operand(rhs)?,
            }),
            _ => Err(malformed()),
        }
    }

    /// Per-row removal mask. A row is kept only where the opposite strict
    /// comparison holds, so equal values and missing operands match.
    pub fn matches(&self, table: &Table) -> EngineResult<Vec<bool>> {
        let resolve = |operand: &Operand| -> EngineResult<Vec<f64>> {
            match operand {
                Operand::Column(name) => Ok(table.require_column(name)?.to_vec()),
                Operand::Value(v) => Ok(vec![*v; table.len()]),
            }
        };
        let lhs = resolve(&self.lhs)?;
        let rhs = resolve(&self.rhs)?;
        Ok(lhs
            .iter()
            .zip(&rhs)
            .map(|(l, r)| match self.op {
                Comparison::Less => l.partial_cmp(r) != Some(Ordering::Greater),
                Comparison::Greater => l.partial_cmp(r) != Some(Ordering::Less),
            })
            .collect())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(name) => write!(f, "{{{name}}}"),
            Operand::Value(v) => write!(f, "{v}"),
        }
    }
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Comparison::Less => "<",
            Comparison::Greater => ">",
        };
        write!(f, "{} {op} {}", self.lhs, self.rhs)
    }
}

/// Apply `filter` to `table`.
///
/// With `whole_row` the matching rows are dropped; otherwise only `column`
/// is blanked (set missing) in those rows. Returns the number of matches.
pub fn remove_rows(
    table: &mut Table,
    column: &str,
    filter: &RowFilter,
    whole_row: bool,
) -> EngineResult<usize> {
    let hits = filter.matches(table)?;
    let count = hits.iter().filter(|h| **h).count();

    if whole_row {
        let keep: Vec<bool> = hits.iter().map(|h| !h).collect();
        table.retain_rows(&keep);
    } else {
        if column == table.frequency_axis() {
            return Err(EngineError::Validation(format!(
                "cannot blank values of the frequency axis '{column}'; remove whole rows instead"
            )));
        }
        let table_name = table.name.clone();
        let col = table
            .columns_mut()
            .iter_mut()
            .find(|c| c.name == column)
            .ok_or_else(|| EngineError::unknown_column(&table_name, column))?;
        for (value, hit) in col.values.iter_mut().zip(&hits) {
            if *hit {
                *value = f64::NAN;
            }
        }
    }

    log::info!(
        "filter '{filter}' on '{}': {count} rows {}",
        table.name,
        if whole_row { "removed" } else { "blanked" }
    );
    Ok(count)
}

// ---------------------------------------------------------------------------
// Column modifier: scalar arithmetic on one column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnOp {
    Multiply(f64),
    Divide(f64),
    Power(f64),
    /// Logarithm in the given base.
    Log(f64),
}

impl ColumnOp {
    /// Parse `"* 2"`, `"/ 10"`, `"^ 0.5"` or `"log 10"`.
    pub fn parse(expr: &str) -> EngineResult<Self> {
        let invalid = || {
            EngineError::Validation(format!(
                "'{expr}' is not one of '* k', '/ k', '^ k' or 'log b'"
            ))
        };
        let mut parts = expr.split_whitespace();
        let (Some(op), Some(arg), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let k: f64 = arg.parse().map_err(|_| invalid())?;
        match op {
            "*" => Ok(ColumnOp::Multiply(k)),
            "/" => Ok(ColumnOp::Divide(k)),
            "^" => Ok(ColumnOp::Power(k)),
            "log" if k > 0.0 && k != 1.0 => Ok(ColumnOp::Log(k)),
            "log" => Err(EngineError::Validation(format!(
                "logarithm base must be positive and not 1, got {k}"
            ))),
            _ => Err(invalid()),
        }
    }

    fn apply(self, v: f64) -> f64 {
        match self {
            ColumnOp::Multiply(k) => v * k,
            ColumnOp::Divide(k) => v / k,
            ColumnOp::Power(k) => v.powf(k),
            ColumnOp::Log(base) => v.log(base),
        }
    }
}

/// Rewrite every value of `column` with `op`.
pub fn modify_column(table: &mut Table, column: &str, op: ColumnOp) -> EngineResult<()> {
    let table_name = table.name.clone();
    let col = table
        .columns_mut()
        .iter_mut()
        .find(|c| c.name == column)
        .ok_or_else(|| EngineError::unknown_column(&table_name, column))?;
    for v in &mut col.values {
        *v = op.apply(*v);
    }
    log::info!("applied {op:?} to '{column}' of '{table_name}'");
    Ok(())
}
