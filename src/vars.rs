use crate::cell::{Cell, DataType};
use crate::error::{QueryError, Result};
use crate::table::{ColumnMatch, TableHeader};

/// A row paired with its header, for name-based access during evaluation.
#[derive(Clone, Copy)]
pub struct BoundRow<'a> {
    header: &'a TableHeader,
    row: &'a [Cell],
}

impl<'a> BoundRow<'a> {
    pub fn new(header: &'a TableHeader, row: &'a [Cell]) -> Self {
        BoundRow { header, row }
    }

    /// Look a value up by bare or qualified column name. `None` when the
    /// name does not exist in this header; an error when it matches more
    /// than one column.
    fn find(&self, name: &str) -> Result<Option<(&'a Cell, DataType)>> {
        match self.header.find(name) {
            ColumnMatch::NotFound => Ok(None),
            ColumnMatch::Unique(column) => Ok(Some((&self.row[column.index], column.data_type))),
            ColumnMatch::Ambiguous => Err(QueryError::invalid(format!(
                "ambiguous column name: {}",
                name
            ))),
        }
    }
}

/// A stack of bound rows forming a name-resolution scope.
///
/// Members are scanned innermost-first, so a column bound by the current
/// query shadows one of the same name bound by an enclosing query.
/// Ambiguity within the winning member (two columns sharing a bare name in
/// one header) is an error.
#[derive(Clone, Default)]
pub struct VariableList<'a> {
    members: Vec<BoundRow<'a>>,
}

impl<'a> VariableList<'a> {
    pub fn new() -> Self {
        VariableList::default()
    }

    /// Scope extended by one more bound row; the receiver is unchanged.
    pub fn extend(&self, row: BoundRow<'a>) -> VariableList<'a> {
        let mut result = self.clone();
        result.members.push(row);
        result
    }

    pub fn value(&self, name: &str) -> Result<&'a Cell> {
        Ok(self.lookup(name)?.0)
    }

    pub fn data_type(&self, name: &str) -> Result<DataType> {
        Ok(self.lookup(name)?.1)
    }

    fn lookup(&self, name: &str) -> Result<(&'a Cell, DataType)> {
        for member in self.members.iter().rev() {
            if let Some(found) = member.find(name)? {
                return Ok(found);
            }
        }
        Err(QueryError::invalid(format!("unknown column: {}", name)))
    }
}
