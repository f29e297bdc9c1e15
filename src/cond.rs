//! Parsing and evaluation of boolean conditions.
//!
//! A condition evaluates to one boolean per row of the input table.
//! Subselects re-enter the statement dispatcher through [`SubqueryRunner`],
//! carrying the caller's variable scope extended with the current row so
//! correlated references resolve. The subquery source text is captured
//! verbatim between its parentheses and re-tokenized for every row.

use crate::cell::{Cell, CmpOp};
use crate::error::{QueryError, Result};
use crate::expr::{literal_cell, EvaluatedExpression, ExpressionEvaluation};
use crate::like::is_like;
use crate::table::{Row, Table};
use crate::tokens::{TokenKind, TokenStream};
use crate::vars::{BoundRow, VariableList};

/// Capability to execute a nested SELECT in the caller's scope.
pub trait SubqueryRunner {
    fn run_subquery(&self, query: &str, variables: &VariableList<'_>) -> Result<Table>;
}

pub struct ConditionEvaluation<'a> {
    table: &'a Table,
    variables: &'a VariableList<'a>,
    runner: &'a dyn SubqueryRunner,
}

impl<'a> ConditionEvaluation<'a> {
    pub fn new(
        table: &'a Table,
        variables: &'a VariableList<'a>,
        runner: &'a dyn SubqueryRunner,
    ) -> Self {
        ConditionEvaluation {
            table,
            variables,
            runner,
        }
    }

    pub fn evaluate(&self, stream: &mut TokenStream) -> Result<Vec<bool>> {
        self.disjunctive(stream)
    }

    fn disjunctive(&self, stream: &mut TokenStream) -> Result<Vec<bool>> {
        let mut result = self.conjunctive(stream)?;
        while stream.try_ignore("OR")? {
            let other = self.conjunctive(stream)?;
            for (bit, or) in result.iter_mut().zip(other) {
                *bit = *bit || or;
            }
        }
        Ok(result)
    }

    fn conjunctive(&self, stream: &mut TokenStream) -> Result<Vec<bool>> {
        let mut result = self.inner(stream)?;
        while stream.try_ignore("AND")? {
            let other = self.inner(stream)?;
            for (bit, and) in result.iter_mut().zip(other) {
                *bit = *bit && and;
            }
        }
        Ok(result)
    }

    fn inner(&self, stream: &mut TokenStream) -> Result<Vec<bool>> {
        let negate = stream.try_ignore("NOT")?;
        let mut result = self.primary(stream)?;
        if negate {
            for bit in &mut result {
                *bit = !*bit;
            }
        }
        Ok(result)
    }

    fn primary(&self, stream: &mut TokenStream) -> Result<Vec<bool>> {
        if stream.try_ignore("EXISTS")? {
            stream.ignore("(")?;
            let subquery = stream.capture_parenthesized()?;
            return self.exists(&subquery);
        }
        let expression = if stream.try_ignore("(")? {
            let expression = ExpressionEvaluation::new(self.table, self.variables).evaluate(stream)?;
            stream.ignore(")")?;
            expression
        } else {
            ExpressionEvaluation::new(self.table, self.variables).evaluate(stream)?
        };
        self.condition_switch(stream, expression)
    }

    fn condition_switch(
        &self,
        stream: &mut TokenStream,
        expression: EvaluatedExpression,
    ) -> Result<Vec<bool>> {
        let token = stream.get()?;
        if token.like("IS") {
            self.evaluate_is(stream, expression)
        } else if token.like("LIKE") {
            self.evaluate_like(stream, expression)
        } else if token.like("IN") {
            self.evaluate_in(stream, expression)
        } else if token.like("BETWEEN") {
            self.evaluate_between(stream, expression)
        } else if let Some(op) = CmpOp::parse(&token.text) {
            self.evaluate_compare(stream, expression, op)
        } else {
            Err(QueryError::parse(format!(
                "unexpected token '{}' in condition",
                token.text
            )))
        }
    }

    fn evaluate_is(
        &self,
        stream: &mut TokenStream,
        expression: EvaluatedExpression,
    ) -> Result<Vec<bool>> {
        let negate = stream.try_ignore("NOT")?;
        stream.ignore("NULL")?;
        Ok(expression
            .values
            .iter()
            .map(|cell| cell.is_null() != negate)
            .collect())
    }

    fn evaluate_like(
        &self,
        stream: &mut TokenStream,
        expression: EvaluatedExpression,
    ) -> Result<Vec<bool>> {
        let pattern = stream.get_of_type(TokenKind::Text)?;
        Ok(expression
            .values
            .iter()
            .map(|cell| match cell.repr() {
                Some(value) => is_like(&value, &pattern),
                None => false,
            })
            .collect())
    }

    fn evaluate_in(
        &self,
        stream: &mut TokenStream,
        expression: EvaluatedExpression,
    ) -> Result<Vec<bool>> {
        stream.ignore("(")?;
        if stream.peek()?.like("SELECT") {
            let subquery = stream.capture_parenthesized()?;
            let mut bits = Vec::with_capacity(expression.values.len());
            for (row, value) in self.table.rows().iter().zip(&expression.values) {
                let scope = self.scope_for(row);
                let result = self.runner.run_subquery(&subquery, &scope)?;
                let column = extract_column(&result)?;
                bits.push(column.iter().any(|member| CmpOp::Eq.test(value, member)));
            }
            return Ok(bits);
        }
        // A literal list is parsed once; membership uses SQL equality, so
        // null never belongs.
        let mut list = Vec::new();
        loop {
            let token = stream.get()?;
            list.push(literal_cell(&token)?);
            if stream.try_ignore(",")? {
                continue;
            }
            stream.ignore(")")?;
            break;
        }
        Ok(expression
            .values
            .iter()
            .map(|value| list.iter().any(|member| CmpOp::Eq.test(value, member)))
            .collect())
    }

    fn evaluate_between(
        &self,
        stream: &mut TokenStream,
        expression: EvaluatedExpression,
    ) -> Result<Vec<bool>> {
        let low = ExpressionEvaluation::new(self.table, self.variables).evaluate(stream)?;
        stream.ignore("AND")?;
        let high = ExpressionEvaluation::new(self.table, self.variables).evaluate(stream)?;
        Ok((0..expression.values.len())
            .map(|index| {
                let value = &expression.values[index];
                CmpOp::Le.test(&low.values[index], value)
                    && CmpOp::Le.test(value, &high.values[index])
            })
            .collect())
    }

    fn evaluate_compare(
        &self,
        stream: &mut TokenStream,
        expression: EvaluatedExpression,
        op: CmpOp,
    ) -> Result<Vec<bool>> {
        let has_any = stream.try_ignore("ANY")?;
        let has_all = if has_any {
            false
        } else {
            stream.try_ignore("ALL")?
        };

        if stream.try_ignore("(")? {
            let subquery = stream.capture_parenthesized()?;
            let mut bits = Vec::with_capacity(expression.values.len());
            for (row, value) in self.table.rows().iter().zip(&expression.values) {
                let scope = self.scope_for(row);
                let result = self.runner.run_subquery(&subquery, &scope)?;
                let bit = if has_any {
                    extract_column(&result)?
                        .iter()
                        .any(|member| op.test(value, member))
                } else if has_all {
                    extract_column(&result)?
                        .iter()
                        .all(|member| op.test(value, member))
                } else {
                    let member = extract_single_cell(&result)?;
                    op.test(value, &member)
                };
                bits.push(bit);
            }
            return Ok(bits);
        }

        if has_any || has_all {
            return Err(QueryError::parse("ANY/ALL requires a subquery"));
        }
        let rhs = ExpressionEvaluation::new(self.table, self.variables).evaluate(stream)?;
        Ok(expression
            .values
            .iter()
            .zip(&rhs.values)
            .map(|(left, right)| op.test(left, right))
            .collect())
    }

    fn exists(&self, subquery: &str) -> Result<Vec<bool>> {
        let mut bits = Vec::with_capacity(self.table.row_count());
        for row in self.table.rows() {
            let scope = self.scope_for(row);
            let result = self.runner.run_subquery(subquery, &scope)?;
            bits.push(result.row_count() > 0);
        }
        Ok(bits)
    }

    fn scope_for(&self, row: &'a Row) -> VariableList<'a> {
        self.variables
            .extend(BoundRow::new(self.table.header(), row))
    }
}

fn extract_column(table: &Table) -> Result<Vec<Cell>> {
    if table.header().len() != 1 {
        return Err(QueryError::invalid("subquery must return a single column"));
    }
    Ok(table.rows().iter().map(|row| row[0].clone()).collect())
}

fn extract_single_cell(table: &Table) -> Result<Cell> {
    if table.header().len() != 1 || table.row_count() != 1 {
        return Err(QueryError::invalid("subquery must return a single value"));
    }
    Ok(table.rows()[0][0].clone())
}
