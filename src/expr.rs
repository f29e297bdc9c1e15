//! Parsing and evaluation of value expressions.
//!
//! An expression is parsed by recursive descent into a small node tree and
//! then evaluated once per row of the input table, with the current row
//! bound on top of the caller's variable scope. Aggregate functions are
//! evaluated at parse time over the whole table and lower into constant
//! nodes, so they produce the same scalar for every row.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::cell::{Cell, CellKey, DataType};
use crate::error::{QueryError, Result};
use crate::table::Table;
use crate::tokens::{Token, TokenKind, TokenStream};
use crate::vars::{BoundRow, VariableList};

/// Result of evaluating an expression over a table: one cell per row plus
/// the inferred column type. `empty_value` is what the expression yields
/// for a hypothetical all-null row; aggregate projection falls back to it
/// when the input has no rows (COUNT lowers to 0, the other aggregates to
/// null).
pub struct EvaluatedExpression {
    pub data_type: DataType,
    pub values: Vec<Cell>,
    pub empty_value: Cell,
}

#[derive(Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

enum ExprNode {
    Constant(Cell),
    Variable(String),
    Binary {
        op: ArithOp,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
}

impl ExprNode {
    fn binary(op: ArithOp, left: ExprNode, right: ExprNode) -> ExprNode {
        ExprNode::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn evaluate(&self, scope: &VariableList<'_>) -> Result<Cell> {
        match self {
            ExprNode::Constant(cell) => Ok(cell.clone()),
            ExprNode::Variable(name) => Ok(scope.value(name)?.clone()),
            ExprNode::Binary { op, left, right } => {
                let left = left.evaluate(scope)?;
                let right = right.evaluate(scope)?;
                match op {
                    ArithOp::Add => left.add(&right),
                    ArithOp::Sub => left.sub(&right),
                    ArithOp::Mul => left.mul(&right),
                    ArithOp::Div => left.div(&right),
                }
            }
        }
    }

    fn data_type(&self, scope: &VariableList<'_>) -> Result<DataType> {
        match self {
            ExprNode::Constant(cell) => Ok(cell.data_type()),
            ExprNode::Variable(name) => scope.data_type(name),
            ExprNode::Binary { left, right, .. } => Ok(DataType::common(
                left.data_type(scope)?,
                right.data_type(scope)?,
            )),
        }
    }
}

/// Convert a literal token to a cell: quoted text is a string, a number
/// with a dot is a float, any other number an int, `NULL` is null.
pub fn literal_cell(token: &Token) -> Result<Cell> {
    match token.kind {
        TokenKind::Text => Ok(Cell::Text(token.text.clone())),
        TokenKind::Number => {
            let target = if token.text.contains('.') {
                DataType::Float
            } else {
                DataType::Int
            };
            Cell::from_text(&token.text, target)
        }
        TokenKind::Identifier if token.like("NULL") => Ok(Cell::Null),
        _ => Err(QueryError::parse(format!(
            "expected a literal, got '{}'",
            token.text
        ))),
    }
}

/// Parses an expression off a token stream and evaluates it across every
/// row of a table, under an outer variable scope.
pub struct ExpressionEvaluation<'a> {
    table: &'a Table,
    variables: &'a VariableList<'a>,
}

impl<'a> ExpressionEvaluation<'a> {
    pub fn new(table: &'a Table, variables: &'a VariableList<'a>) -> Self {
        ExpressionEvaluation { table, variables }
    }

    pub fn evaluate(&self, stream: &mut TokenStream) -> Result<EvaluatedExpression> {
        let tree = self.parse_additive(stream)?;

        // The inferred type comes from a dummy all-null row, so it only
        // depends on declared column types, never on the data.
        let dummy = vec![Cell::Null; self.table.header().len()];
        let dummy_scope = self
            .variables
            .extend(BoundRow::new(self.table.header(), &dummy));
        let data_type = tree.data_type(&dummy_scope)?;
        let empty_value = tree.evaluate(&dummy_scope)?;

        let values = self.evaluate_tree(&tree)?;
        Ok(EvaluatedExpression {
            data_type,
            values,
            empty_value,
        })
    }

    fn evaluate_tree(&self, tree: &ExprNode) -> Result<Vec<Cell>> {
        let mut values = Vec::with_capacity(self.table.row_count());
        for row in self.table.rows() {
            let scope = self
                .variables
                .extend(BoundRow::new(self.table.header(), row));
            values.push(tree.evaluate(&scope)?);
        }
        Ok(values)
    }

    fn parse_additive(&self, stream: &mut TokenStream) -> Result<ExprNode> {
        let mut node = self.parse_multiplicative(stream)?;
        loop {
            if stream.try_ignore("+")? {
                node = ExprNode::binary(ArithOp::Add, node, self.parse_multiplicative(stream)?);
            } else if stream.try_ignore("-")? {
                node = ExprNode::binary(ArithOp::Sub, node, self.parse_multiplicative(stream)?);
            } else {
                return Ok(node);
            }
        }
    }

    fn parse_multiplicative(&self, stream: &mut TokenStream) -> Result<ExprNode> {
        let mut node = self.parse_primary(stream)?;
        loop {
            if stream.try_ignore("*")? {
                node = ExprNode::binary(ArithOp::Mul, node, self.parse_primary(stream)?);
            } else if stream.try_ignore("/")? {
                node = ExprNode::binary(ArithOp::Div, node, self.parse_primary(stream)?);
            } else {
                return Ok(node);
            }
        }
    }

    fn parse_primary(&self, stream: &mut TokenStream) -> Result<ExprNode> {
        let token = stream.peek()?.clone();
        match token.kind {
            TokenKind::Number | TokenKind::Text => {
                stream.get()?;
                Ok(ExprNode::Constant(literal_cell(&token)?))
            }
            TokenKind::Identifier => {
                if token.like("NULL") {
                    stream.get()?;
                    Ok(ExprNode::Constant(Cell::Null))
                } else if token.like("COUNT") {
                    stream.get()?;
                    self.parse_count(stream)
                } else if ["MIN", "MAX", "SUM", "AVG"].iter().any(|f| token.like(f)) {
                    stream.get()?;
                    self.parse_aggregate(&token, stream)
                } else {
                    self.parse_variable(stream)
                }
            }
            _ => Err(QueryError::parse(format!(
                "unexpected token '{}' in expression",
                token.text
            ))),
        }
    }

    fn parse_variable(&self, stream: &mut TokenStream) -> Result<ExprNode> {
        Ok(ExprNode::Variable(parse_column_name(stream)?))
    }

    fn parse_count(&self, stream: &mut TokenStream) -> Result<ExprNode> {
        stream.ignore("(")?;
        if stream.try_ignore("*")? {
            stream.ignore(")")?;
            return Ok(ExprNode::Constant(Cell::Int(self.table.row_count() as i32)));
        }
        let distinct = stream.try_ignore("DISTINCT")?;
        stream.try_ignore("ALL")?;
        let argument = self.parse_variable(stream)?;
        stream.ignore(")")?;

        let mut values = self.evaluate_tree(&argument)?;
        if distinct {
            values = distinct_cells(values);
        }
        let count = values.iter().filter(|cell| !cell.is_null()).count();
        Ok(ExprNode::Constant(Cell::Int(count as i32)))
    }

    fn parse_aggregate(&self, function: &Token, stream: &mut TokenStream) -> Result<ExprNode> {
        stream.ignore("(")?;
        let distinct = stream.try_ignore("DISTINCT")?;
        let argument = self.parse_additive(stream)?;
        stream.ignore(")")?;

        let mut values = self.evaluate_tree(&argument)?;
        if distinct {
            values = distinct_cells(values);
        }
        if values.is_empty() {
            return Ok(ExprNode::Constant(Cell::Null));
        }
        let result = if function.like("SUM") {
            sum_cells(&values)?
        } else if function.like("AVG") {
            let total = sum_cells(&values)?;
            total.div(&Cell::Int(values.len() as i32))?
        } else if function.like("MIN") {
            extremum(&values, Ordering::Less)
        } else {
            extremum(&values, Ordering::Greater)
        };
        Ok(ExprNode::Constant(result))
    }
}

/// Parse a possibly qualified column name (`name` or `alias.name`).
pub fn parse_column_name(stream: &mut TokenStream) -> Result<String> {
    let mut name = stream.get_of_type(TokenKind::Identifier)?;
    while stream.peek()?.text == "." {
        stream.get()?;
        name.push('.');
        name.push_str(&stream.get_of_type(TokenKind::Identifier)?);
    }
    Ok(name)
}

fn distinct_cells(values: Vec<Cell>) -> Vec<Cell> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|cell| seen.insert(CellKey(cell.clone())))
        .collect()
}

fn sum_cells(values: &[Cell]) -> Result<Cell> {
    let mut total = values[0].clone();
    for value in &values[1..] {
        total = total.add(value)?;
    }
    Ok(total)
}

fn extremum(values: &[Cell], wanted: Ordering) -> Cell {
    let mut best = values[0].clone();
    for value in &values[1..] {
        if value.compare(&best) == Some(wanted) {
            best = value.clone();
        }
    }
    best
}
