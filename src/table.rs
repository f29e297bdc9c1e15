use std::collections::{HashMap, HashSet};

use crate::cell::{Cell, CellKey, DataType};
use crate::error::{QueryError, Result};

/// One column of a table: an optional alias (set by cross product), the
/// declared name and type, and the column's position within a row.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub alias: String,
    pub name: String,
    pub data_type: DataType,
    pub index: usize,
}

/// Outcome of a column lookup.
pub enum ColumnMatch<'a> {
    NotFound,
    Unique(&'a Column),
    Ambiguous,
}

/// Ordered column descriptors plus a lookup index keyed by bare name and,
/// where an alias is set, by `alias.name`.
#[derive(Debug, Clone)]
pub struct TableHeader {
    columns: Vec<Column>,
    lookup: HashMap<String, Vec<usize>>,
}

impl TableHeader {
    /// Build a header from column descriptors. Positional indices are
    /// assigned from the sequence order; whatever `index` the caller set is
    /// overwritten, which keeps the descriptor/position invariant by
    /// construction.
    pub fn new(mut columns: Vec<Column>) -> TableHeader {
        for (index, column) in columns.iter_mut().enumerate() {
            column.index = index;
        }
        let mut lookup: HashMap<String, Vec<usize>> = HashMap::new();
        for column in &columns {
            lookup
                .entry(column.name.clone())
                .or_default()
                .push(column.index);
            if !column.alias.is_empty() {
                lookup
                    .entry(format!("{}.{}", column.alias, column.name))
                    .or_default()
                    .push(column.index);
            }
        }
        TableHeader { columns, lookup }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Look a column up by bare or alias-qualified name.
    pub fn find(&self, key: &str) -> ColumnMatch<'_> {
        match self.lookup.get(key).map(Vec::as_slice) {
            None | Some([]) => ColumnMatch::NotFound,
            Some([index]) => ColumnMatch::Unique(&self.columns[*index]),
            Some(_) => ColumnMatch::Ambiguous,
        }
    }

    /// Resolve a name to a unique column index, failing on missing or
    /// ambiguous names.
    pub fn resolve(&self, key: &str) -> Result<usize> {
        match self.find(key) {
            ColumnMatch::Unique(column) => Ok(column.index),
            ColumnMatch::NotFound => {
                Err(QueryError::invalid(format!("unknown column: {}", key)))
            }
            ColumnMatch::Ambiguous => {
                Err(QueryError::invalid(format!("ambiguous column name: {}", key)))
            }
        }
    }

    /// Header of a cross product: this header's columns followed by the
    /// other's, re-indexed.
    pub fn concat(&self, other: &TableHeader) -> TableHeader {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        TableHeader::new(columns)
    }

    /// Copy of this header with the alias installed on every column.
    pub fn with_alias(&self, alias: &str) -> TableHeader {
        let columns = self
            .columns
            .iter()
            .map(|column| Column {
                alias: alias.to_string(),
                ..column.clone()
            })
            .collect();
        TableHeader::new(columns)
    }

    fn validate_row(&self, row: &[Cell]) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(QueryError::internal("row length mismatches table header"));
        }
        for (cell, column) in row.iter().zip(&self.columns) {
            let variant = cell.data_type();
            if variant != column.data_type && variant != DataType::Null {
                return Err(QueryError::internal(format!(
                    "cell type mismatch in column {}",
                    column.name
                )));
            }
        }
        Ok(())
    }
}

pub type Row = Vec<Cell>;

/// An in-memory table: a header and its rows in insertion order.
///
/// Stored tables live in the catalog behind a reader-writer lock;
/// intermediate results produced by the relational operators are plain
/// values owned by the executing statement.
#[derive(Debug, Clone)]
pub struct Table {
    header: TableHeader,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(header: TableHeader) -> Table {
        Table {
            header,
            rows: Vec::new(),
        }
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Append a row, validating length and per-column cell types.
    pub fn add_row(&mut self, row: Row) -> Result<()> {
        self.header.validate_row(&row)?;
        self.rows.push(row);
        Ok(())
    }

    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    /// Retain the rows whose flag is set, preserving their order.
    pub fn retain(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        self.rows.retain(|_| *flags.next().unwrap_or(&false));
    }

    /// Cartesian product of the operands, in `outer_row x inner_row` order.
    /// Each operand's columns get the corresponding alias installed.
    pub fn cross_product(operands: &[(&Table, &str)]) -> Result<Table> {
        let Some(((first, first_alias), rest)) = operands.split_first() else {
            return Err(QueryError::invalid("cross product of no tables"));
        };
        let mut header = first.header.with_alias(first_alias);
        let mut rows = first.rows.clone();
        for (table, alias) in rest {
            header = header.concat(&table.header.with_alias(alias));
            let mut product = Vec::with_capacity(rows.len() * table.rows.len());
            for outer in &rows {
                for inner in &table.rows {
                    let mut row = outer.clone();
                    row.extend(inner.iter().cloned());
                    product.push(row);
                }
            }
            rows = product;
        }
        Ok(Table { header, rows })
    }

    /// Collapse duplicate rows by cell identity, keeping first occurrences.
    pub fn deduplicate(&mut self) {
        let mut seen: HashSet<Vec<CellKey>> = HashSet::new();
        self.rows
            .retain(|row| seen.insert(row.iter().cloned().map(CellKey).collect()));
    }

    /// Vertical union: append another table's rows to this one. The column
    /// descriptors of both tables must match exactly.
    pub fn append(&mut self, other: Table) -> Result<()> {
        if self.header.columns != other.header.columns {
            return Err(QueryError::invalid(
                "mismatched columns in vertical union",
            ));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Partition the rows by the identity-tuple of the named columns. Each
    /// partition inherits this table's header; partition order is
    /// unspecified. Consumes the table.
    pub fn group_by(self, keys: &[String]) -> Result<Vec<Table>> {
        let indices: Vec<usize> = keys
            .iter()
            .map(|key| self.header.resolve(key))
            .collect::<Result<_>>()?;
        let mut partitions: HashMap<Vec<CellKey>, Vec<Row>> = HashMap::new();
        for row in self.rows {
            let key: Vec<CellKey> = indices
                .iter()
                .map(|&index| CellKey(row[index].clone()))
                .collect();
            partitions.entry(key).or_default().push(row);
        }
        Ok(partitions
            .into_values()
            .map(|rows| Table {
                header: self.header.clone(),
                rows,
            })
            .collect())
    }
}
