//! The statement dispatcher and the table catalog.
//!
//! Locking discipline: the catalog lock is always acquired before any table
//! lock. CREATE and DROP take it exclusively; SELECT, INSERT and DELETE
//! take it shared for the duration of the statement. Shared acquisitions
//! use `read_recursive` so a correlated subquery re-entering the catalog on
//! the same thread cannot deadlock behind a queued writer.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cell::{Cell, DataType};
use crate::cond::{ConditionEvaluation, SubqueryRunner};
use crate::error::{QueryError, Result};
use crate::expr::{literal_cell, parse_column_name, ExpressionEvaluation};
use crate::serial;
use crate::table::{Column, Table, TableHeader};
use crate::tokens::{is_keyword, TokenKind, TokenStream};
use crate::vars::VariableList;

const AGGREGATE_NAMES: [&str; 5] = ["COUNT", "SUM", "AVG", "MIN", "MAX"];

/// A named collection of tables behind a reader-writer lock, plus the
/// statement dispatcher operating on it.
pub struct Database {
    tables: RwLock<BTreeMap<String, Arc<RwLock<Table>>>>,
}

impl Default for Database {
    fn default() -> Self {
        Database::new()
    }
}

impl Database {
    pub fn new() -> Database {
        Database {
            tables: RwLock::new(BTreeMap::new()),
        }
    }

    /// Run one statement and format the outcome as a response: `OK
    /// <message>` for successful commands, the serialized result table for
    /// SELECT, `ERROR <message>` for any failure.
    pub fn process_query(&self, query: &str) -> String {
        match self.execute(query) {
            Ok(response) => response,
            Err(err) => format!("ERROR {}", err),
        }
    }

    fn execute(&self, query: &str) -> Result<String> {
        let mut stream = TokenStream::new(query);
        let first = stream.peek()?.clone();
        if first.like("CREATE") {
            self.execute_create(&mut stream)
        } else if first.like("DROP") {
            self.execute_drop(&mut stream)
        } else if first.like("INSERT") {
            self.execute_insert(&mut stream)
        } else if first.like("DELETE") {
            self.execute_delete(&mut stream)
        } else if first.like("SELECT") {
            let result = self.execute_select(&mut stream, &VariableList::new())?;
            serial::table_to_string(&result)
        } else {
            Err(QueryError::invalid(format!(
                "unknown statement '{}'",
                first.text
            )))
        }
    }

    /// Install a table under a new name. Used by CREATE TABLE and by the
    /// database manager when loading from disk.
    pub fn insert_table(&self, name: &str, table: Table) -> Result<()> {
        let mut catalog = self.tables.write();
        if catalog.contains_key(name) {
            return Err(QueryError::invalid(format!(
                "Table {} already exists",
                name
            )));
        }
        catalog.insert(name.to_string(), Arc::new(RwLock::new(table)));
        Ok(())
    }

    pub fn remove_table(&self, name: &str) -> Result<()> {
        let mut catalog = self.tables.write();
        if catalog.remove(name).is_none() {
            return Err(QueryError::invalid(format!(
                "Table {} does not exist",
                name
            )));
        }
        Ok(())
    }

    /// Consistent copy of every table, for persistence.
    pub fn snapshot(&self) -> Vec<(String, Table)> {
        let catalog = self.tables.read_recursive();
        catalog
            .iter()
            .map(|(name, table)| (name.clone(), table.read_recursive().clone()))
            .collect()
    }

    fn execute_create(&self, stream: &mut TokenStream) -> Result<String> {
        stream.ignore("CREATE")?;
        stream.ignore("TABLE")?;
        let name = stream.get_of_type(TokenKind::Identifier)?;
        stream.ignore("(")?;
        let mut columns = Vec::new();
        loop {
            let column = stream.get_of_type(TokenKind::Identifier)?;
            if is_keyword(&column) {
                return Err(QueryError::invalid(format!(
                    "column name '{}' is a reserved keyword",
                    column
                )));
            }
            let type_word = stream.get_of_type(TokenKind::Identifier)?;
            columns.push(Column {
                alias: String::new(),
                name: column,
                data_type: DataType::parse(&type_word)?,
                index: 0,
            });
            if stream.try_ignore(",")? {
                continue;
            }
            stream.ignore(")")?;
            break;
        }
        stream.try_ignore(";")?;
        stream.assert_end()?;

        self.insert_table(&name, Table::new(TableHeader::new(columns)))?;
        Ok(format!("OK Table {} created", name))
    }

    fn execute_drop(&self, stream: &mut TokenStream) -> Result<String> {
        stream.ignore("DROP")?;
        stream.ignore("TABLE")?;
        let name = stream.get_of_type(TokenKind::Identifier)?;
        stream.try_ignore(";")?;
        stream.assert_end()?;

        self.remove_table(&name)?;
        Ok(format!("OK Table {} dropped", name))
    }

    fn execute_insert(&self, stream: &mut TokenStream) -> Result<String> {
        stream.ignore("INSERT")?;
        stream.ignore("INTO")?;
        let name = stream.get_of_type(TokenKind::Identifier)?;

        let mut column_names: Option<Vec<String>> = None;
        if stream.try_ignore("(")? {
            let mut names = Vec::new();
            loop {
                names.push(stream.get_of_type(TokenKind::Identifier)?);
                if stream.try_ignore(",")? {
                    continue;
                }
                stream.ignore(")")?;
                break;
            }
            column_names = Some(names);
        }

        stream.ignore("VALUES")?;
        stream.ignore("(")?;
        let mut literals = Vec::new();
        loop {
            let token = stream.get()?;
            literals.push(literal_cell(&token)?);
            if stream.try_ignore(",")? {
                continue;
            }
            stream.ignore(")")?;
            break;
        }
        stream.try_ignore(";")?;
        stream.assert_end()?;

        let catalog = self.tables.read_recursive();
        let handle = catalog
            .get(&name)
            .cloned()
            .ok_or_else(|| QueryError::invalid(format!("Table {} does not exist", name)))?;
        let mut table = handle.write();

        let row = match column_names {
            None => {
                // Positional assignment to all columns.
                if literals.len() != table.header().len() {
                    return Err(QueryError::invalid("column count mismatch"));
                }
                literals
                    .iter()
                    .zip(table.header().columns())
                    .map(|(cell, column)| cell.convert(column.data_type))
                    .collect::<Result<Vec<Cell>>>()?
            }
            Some(names) => {
                // Named assignment; omitted columns stay null.
                if names.len() != literals.len() {
                    return Err(QueryError::invalid("column count mismatch"));
                }
                let mut row = vec![Cell::Null; table.header().len()];
                for (column_name, cell) in names.iter().zip(&literals) {
                    let index = table.header().resolve(column_name)?;
                    row[index] = cell.convert(table.header().columns()[index].data_type)?;
                }
                row
            }
        };
        table.add_row(row)?;
        Ok("OK Row inserted".to_string())
    }

    fn execute_delete(&self, stream: &mut TokenStream) -> Result<String> {
        stream.ignore("DELETE")?;
        stream.ignore("FROM")?;
        let name = stream.get_of_type(TokenKind::Identifier)?;
        stream.ignore("WHERE")?;

        let catalog = self.tables.read_recursive();
        let handle = catalog
            .get(&name)
            .cloned()
            .ok_or_else(|| QueryError::invalid(format!("Table {} does not exist", name)))?;
        let mut table = handle.write();

        let keep: Vec<bool> = {
            let variables = VariableList::new();
            let bits = ConditionEvaluation::new(&table, &variables, self).evaluate(stream)?;
            bits.iter().map(|bit| !bit).collect()
        };
        stream.try_ignore(";")?;
        stream.assert_end()?;

        table.retain(&keep);
        Ok("OK Rows deleted".to_string())
    }

    fn execute_select(
        &self,
        stream: &mut TokenStream,
        outer: &VariableList<'_>,
    ) -> Result<Table> {
        stream.ignore("SELECT")?;
        let distinct = stream.try_ignore("DISTINCT")?;
        if !distinct {
            stream.try_ignore("ALL")?;
        }

        let mut items = Vec::new();
        loop {
            items.push(stream.capture_projection_item()?);
            if stream.try_ignore(",")? {
                continue;
            }
            break;
        }

        stream.ignore("FROM")?;
        let mut sources: Vec<(String, String)> = Vec::new();
        loop {
            let name = stream.get_of_type(TokenKind::Identifier)?;
            let alias = {
                let next = stream.peek()?;
                if next.kind == TokenKind::Identifier && !is_keyword(&next.text) {
                    stream.get()?.text
                } else {
                    name.clone()
                }
            };
            sources.push((name, alias));
            if stream.try_ignore(",")? {
                continue;
            }
            break;
        }

        let catalog = self.tables.read_recursive();
        let mut handles = Vec::with_capacity(sources.len());
        for (name, _) in &sources {
            let handle = catalog
                .get(name)
                .cloned()
                .ok_or_else(|| QueryError::invalid(format!("Table {} does not exist", name)))?;
            handles.push(handle);
        }
        let mut working = {
            let guards: Vec<_> = handles
                .iter()
                .map(|handle| handle.read_recursive())
                .collect();
            let operands: Vec<(&Table, &str)> = guards
                .iter()
                .zip(&sources)
                .map(|(guard, (_, alias))| (&**guard, alias.as_str()))
                .collect();
            Table::cross_product(&operands)?
        };

        if stream.try_ignore("WHERE")? {
            let bits = ConditionEvaluation::new(&working, outer, self).evaluate(stream)?;
            working.retain(&bits);
        }

        let mut group_columns: Vec<String> = Vec::new();
        let mut having: Option<String> = None;
        if stream.try_ignore("GROUP")? {
            stream.ignore("BY")?;
            loop {
                group_columns.push(parse_column_name(stream)?);
                if stream.try_ignore(",")? {
                    continue;
                }
                break;
            }
            if stream.try_ignore("HAVING")? {
                having = Some(stream.capture_statement_tail()?);
            }
        }
        stream.try_ignore(";")?;
        stream.assert_end()?;

        let aggregate = !group_columns.is_empty()
            || items.iter().any(|item| {
                let upper = item.to_ascii_uppercase();
                AGGREGATE_NAMES.iter().any(|name| upper.contains(name))
            });

        let groups: Vec<Table> = if group_columns.is_empty() {
            vec![working.clone()]
        } else {
            working.clone().group_by(&group_columns)?
        };

        let groups = match &having {
            Some(condition) => {
                let mut kept = Vec::new();
                for group in groups {
                    if self.aggregate_condition(&group, outer, condition)? {
                        kept.push(group);
                    }
                }
                kept
            }
            None => groups,
        };

        let mut result: Option<Table> = None;
        for group in &groups {
            let projected = self.project(group, &items, outer, aggregate)?;
            match &mut result {
                None => result = Some(projected),
                Some(table) => table.append(projected)?,
            }
        }
        let mut result = match result {
            Some(table) => table,
            None => {
                // Every partition was filtered out; the header is still
                // materialized from the projection expressions, inferred
                // over an empty input.
                working.clear_rows();
                self.project(&working, &items, outer, false)?
            }
        };

        if distinct {
            result.deduplicate();
        }
        Ok(result)
    }

    /// Project a group through the expression list. In aggregate mode the
    /// output is a single row; otherwise one output row per input row. The
    /// lone projection `*` clones the input instead.
    fn project(
        &self,
        input: &Table,
        items: &[String],
        outer: &VariableList<'_>,
        aggregate: bool,
    ) -> Result<Table> {
        if !aggregate && items.len() == 1 && items[0] == "*" {
            return Ok(input.clone());
        }

        let mut columns = Vec::with_capacity(items.len());
        let mut evaluated = Vec::with_capacity(items.len());
        for item in items {
            let mut item_stream = TokenStream::new(item);
            let expression = ExpressionEvaluation::new(input, outer).evaluate(&mut item_stream)?;
            item_stream.assert_end()?;
            columns.push(Column {
                alias: String::new(),
                name: item.clone(),
                data_type: expression.data_type,
                index: 0,
            });
            evaluated.push(expression);
        }

        let mut result = Table::new(TableHeader::new(columns));
        if aggregate {
            let row: Vec<Cell> = evaluated
                .iter()
                .map(|expression| {
                    expression
                        .values
                        .first()
                        .cloned()
                        .unwrap_or_else(|| expression.empty_value.clone())
                })
                .collect();
            result.add_row(row)?;
        } else {
            for index in 0..input.row_count() {
                let row: Vec<Cell> = evaluated
                    .iter()
                    .map(|expression| expression.values[index].clone())
                    .collect();
                result.add_row(row)?;
            }
        }
        Ok(result)
    }

    /// Evaluate a condition over a partition in aggregate mode: every
    /// per-row result must agree, and the common value is the verdict.
    /// An empty partition is never retained.
    fn aggregate_condition(
        &self,
        group: &Table,
        outer: &VariableList<'_>,
        condition: &str,
    ) -> Result<bool> {
        let mut stream = TokenStream::new(condition);
        let bits = ConditionEvaluation::new(group, outer, self).evaluate(&mut stream)?;
        stream.assert_end()?;
        let Some((first, rest)) = bits.split_first() else {
            return Ok(false);
        };
        if rest.iter().any(|bit| bit != first) {
            return Err(QueryError::invalid(
                "non-aggregate condition used as aggregate",
            ));
        }
        Ok(*first)
    }
}

impl SubqueryRunner for Database {
    fn run_subquery(&self, query: &str, variables: &VariableList<'_>) -> Result<Table> {
        let mut stream = TokenStream::new(query);
        self.execute_select(&mut stream, variables)
    }
}
