//! Table persistence: the serialized form is one record of column names,
//! one of declared type names, then one record per row with nulls as the
//! absent field.

use std::io::{BufRead, Write};

use crate::cell::{Cell, DataType};
use crate::csv;
use crate::error::{QueryError, Result};
use crate::table::{Column, Table, TableHeader};

pub fn serialize_table<W: Write>(table: &Table, out: &mut W) -> std::io::Result<()> {
    let mut records: Vec<csv::Record> = Vec::with_capacity(table.row_count() + 2);
    records.push(
        table
            .header()
            .columns()
            .iter()
            .map(|column| Some(column.name.clone()))
            .collect(),
    );
    records.push(
        table
            .header()
            .columns()
            .iter()
            .map(|column| Some(column.data_type.name().to_string()))
            .collect(),
    );
    for row in table.rows() {
        records.push(row.iter().map(Cell::repr).collect());
    }
    csv::write_records(out, &records)
}

/// Serialize a table into the response text sent back for a SELECT.
pub fn table_to_string(table: &Table) -> Result<String> {
    let mut buffer = Vec::new();
    serialize_table(table, &mut buffer)?;
    String::from_utf8(buffer).map_err(|_| QueryError::internal("non-utf8 serialized table"))
}

pub fn load_table<R: BufRead>(input: R) -> Result<Table> {
    let records = csv::read_records(input)?;
    if records.len() < 2 {
        return Err(QueryError::parse("table data needs a name and a type row"));
    }

    let mut columns = Vec::with_capacity(records[0].len());
    for field in &records[0] {
        let Some(name) = field else {
            return Err(QueryError::parse("null column name"));
        };
        columns.push(Column {
            alias: String::new(),
            name: name.clone(),
            data_type: DataType::Null,
            index: 0,
        });
    }

    if records[1].len() != columns.len() {
        return Err(QueryError::parse("column type count mismatch"));
    }
    for (column, field) in columns.iter_mut().zip(&records[1]) {
        let Some(type_name) = field else {
            return Err(QueryError::parse("null column type"));
        };
        column.data_type = DataType::from_name(type_name)?;
    }

    let mut table = Table::new(TableHeader::new(columns));
    for record in &records[2..] {
        if record.len() != table.header().len() {
            return Err(QueryError::parse("row field count mismatch"));
        }
        let mut row = Vec::with_capacity(record.len());
        for (field, column) in record.iter().zip(table.header().columns()) {
            let cell = match field {
                Some(text) => Cell::from_text(text, column.data_type)?,
                None => Cell::Null,
            };
            row.push(cell);
        }
        table.add_row(row)?;
    }
    Ok(table)
}
