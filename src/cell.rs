use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::error::{QueryError, Result};

/// Declared type of a table column or runtime type of a cell.
///
/// `Null` never appears as a declared column type in CREATE TABLE; it shows
/// up only as the runtime type of a null cell and as the inferred type of a
/// projection whose expression is always null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Null,
    Int,
    Float,
    Char,
    Text,
}

impl DataType {
    /// Parse a column type keyword from CREATE TABLE (case-insensitive).
    pub fn parse(word: &str) -> Result<DataType> {
        match word.to_ascii_uppercase().as_str() {
            "INT" => Ok(DataType::Int),
            "FLOAT" => Ok(DataType::Float),
            "STRING" => Ok(DataType::Text),
            "CHAR" => Ok(DataType::Char),
            _ => Err(QueryError::parse(format!("invalid column type '{}'", word))),
        }
    }

    /// Name used in the serialized type row.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Null => "NULL",
            DataType::Int => "INT",
            DataType::Float => "FLOAT",
            DataType::Char => "CHAR",
            DataType::Text => "STRING",
        }
    }

    /// Inverse of [`DataType::name`], used when loading a table file.
    pub fn from_name(name: &str) -> Result<DataType> {
        match name {
            "NULL" => Ok(DataType::Null),
            "INT" => Ok(DataType::Int),
            "FLOAT" => Ok(DataType::Float),
            "CHAR" => Ok(DataType::Char),
            "STRING" => Ok(DataType::Text),
            _ => Err(QueryError::parse(format!("invalid data type '{}'", name))),
        }
    }

    /// Common promotion type for a binary operation on two cells.
    ///
    /// The promotion order is int -> float -> string; char always promotes
    /// to string, even against another char. Null absorbs everything.
    pub fn common(left: DataType, right: DataType) -> DataType {
        if left == DataType::Null || right == DataType::Null {
            DataType::Null
        } else if left == right && left != DataType::Char {
            left
        } else if matches!(
            (left, right),
            (DataType::Int, DataType::Float) | (DataType::Float, DataType::Int)
        ) {
            DataType::Float
        } else {
            DataType::Text
        }
    }
}

/// A single value stored in a table.
///
/// Cells are dynamically typed; a stored cell either matches its column's
/// declared type or is null.
#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Int(i32),
    Float(f32),
    Char(u8),
    Text(String),
}

#[derive(Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl Cell {
    pub fn data_type(&self) -> DataType {
        match self {
            Cell::Null => DataType::Null,
            Cell::Int(_) => DataType::Int,
            Cell::Float(_) => DataType::Float,
            Cell::Char(_) => DataType::Char,
            Cell::Text(_) => DataType::Text,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Build a cell of the given type from its textual form.
    pub fn from_text(text: &str, target: DataType) -> Result<Cell> {
        Cell::Text(text.to_string()).convert(target)
    }

    /// Convert the cell to a different data type.
    ///
    /// Null converts to null regardless of target. String-to-number parsing
    /// must consume the entire string. Char and the numeric types do not
    /// convert into each other except through an intermediate string.
    pub fn convert(&self, target: DataType) -> Result<Cell> {
        match target {
            DataType::Null => Ok(Cell::Null),
            DataType::Text => Ok(self.to_text()),
            DataType::Int => self.to_int(),
            DataType::Float => self.to_float(),
            DataType::Char => self.to_char(),
        }
    }

    fn to_text(&self) -> Cell {
        match self {
            Cell::Null => Cell::Null,
            Cell::Int(v) => Cell::Text(v.to_string()),
            Cell::Float(v) => Cell::Text(v.to_string()),
            Cell::Char(c) => Cell::Text((*c as char).to_string()),
            Cell::Text(s) => Cell::Text(s.clone()),
        }
    }

    fn to_int(&self) -> Result<Cell> {
        match self {
            Cell::Null => Ok(Cell::Null),
            Cell::Int(v) => Ok(Cell::Int(*v)),
            Cell::Float(v) => Ok(Cell::Int(*v as i32)),
            Cell::Text(s) => s
                .parse::<i32>()
                .map(Cell::Int)
                .map_err(|_| QueryError::conversion(format!("'{}' is not an int", s))),
            Cell::Char(_) => Err(QueryError::conversion("cannot convert char to int")),
        }
    }

    fn to_float(&self) -> Result<Cell> {
        match self {
            Cell::Null => Ok(Cell::Null),
            Cell::Int(v) => Ok(Cell::Float(*v as f32)),
            Cell::Float(v) => Ok(Cell::Float(*v)),
            Cell::Text(s) => s
                .parse::<f32>()
                .map(Cell::Float)
                .map_err(|_| QueryError::conversion(format!("'{}' is not a float", s))),
            Cell::Char(_) => Err(QueryError::conversion("cannot convert char to float")),
        }
    }

    fn to_char(&self) -> Result<Cell> {
        match self {
            Cell::Null => Ok(Cell::Null),
            Cell::Char(c) => Ok(Cell::Char(*c)),
            Cell::Text(s) if s.len() == 1 => Ok(Cell::Char(s.as_bytes()[0])),
            Cell::Text(s) => Err(QueryError::conversion(format!("'{}' is not a char", s))),
            _ => Err(QueryError::conversion("cannot convert value to char")),
        }
    }

    /// String representation of the cell, or `None` for null.
    pub fn repr(&self) -> Option<String> {
        match self.to_text() {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn add(&self, other: &Cell) -> Result<Cell> {
        self.binary_op(other, BinOp::Add)
    }

    pub fn sub(&self, other: &Cell) -> Result<Cell> {
        self.binary_op(other, BinOp::Sub)
    }

    pub fn mul(&self, other: &Cell) -> Result<Cell> {
        self.binary_op(other, BinOp::Mul)
    }

    pub fn div(&self, other: &Cell) -> Result<Cell> {
        self.binary_op(other, BinOp::Div)
    }

    fn binary_op(&self, other: &Cell, op: BinOp) -> Result<Cell> {
        let common = DataType::common(self.data_type(), other.data_type());
        if common == DataType::Null {
            return Ok(Cell::Null);
        }
        let left = self.convert(common)?;
        let right = other.convert(common)?;
        match (left, right) {
            (Cell::Int(a), Cell::Int(b)) => match op {
                BinOp::Add => Ok(Cell::Int(a.wrapping_add(b))),
                BinOp::Sub => Ok(Cell::Int(a.wrapping_sub(b))),
                BinOp::Mul => Ok(Cell::Int(a.wrapping_mul(b))),
                BinOp::Div => {
                    if b == 0 {
                        Err(QueryError::invalid("division by zero"))
                    } else {
                        Ok(Cell::Int(a.wrapping_div(b)))
                    }
                }
            },
            (Cell::Float(a), Cell::Float(b)) => match op {
                BinOp::Add => Ok(Cell::Float(a + b)),
                BinOp::Sub => Ok(Cell::Float(a - b)),
                BinOp::Mul => Ok(Cell::Float(a * b)),
                BinOp::Div => Ok(Cell::Float(a / b)),
            },
            (Cell::Text(a), Cell::Text(b)) if op == BinOp::Add => Ok(Cell::Text(a + &b)),
            _ => Err(QueryError::invalid("invalid operands for arithmetic")),
        }
    }

    /// Ordering under SQL comparison semantics.
    ///
    /// Operands are promoted to their common type first; any comparison
    /// involving null is undefined and yields `None`, which every
    /// comparison predicate treats as false.
    pub fn compare(&self, other: &Cell) -> Option<Ordering> {
        let common = DataType::common(self.data_type(), other.data_type());
        if common == DataType::Null {
            return None;
        }
        let left = self.convert(common).ok()?;
        let right = other.convert(common).ok()?;
        match (left, right) {
            (Cell::Int(a), Cell::Int(b)) => Some(a.cmp(&b)),
            (Cell::Float(a), Cell::Float(b)) => a.partial_cmp(&b),
            (Cell::Char(a), Cell::Char(b)) => Some(a.cmp(&b)),
            (Cell::Text(a), Cell::Text(b)) => Some(a.cmp(&b)),
            _ => None,
        }
    }

    /// Strict identity: same variant, same payload.
    ///
    /// Unlike SQL equality, two nulls are identical. This is the relation
    /// used for hashing, grouping and deduplication.
    pub fn identical(&self, other: &Cell) -> bool {
        match (self, other) {
            (Cell::Null, Cell::Null) => true,
            (Cell::Int(a), Cell::Int(b)) => a == b,
            (Cell::Float(a), Cell::Float(b)) => a.to_bits() == b.to_bits(),
            (Cell::Char(a), Cell::Char(b)) => a == b,
            (Cell::Text(a), Cell::Text(b)) => a == b,
            _ => false,
        }
    }
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Gt,
    Eq,
    Le,
    Ge,
    Ne,
}

impl CmpOp {
    pub fn parse(lexeme: &str) -> Option<CmpOp> {
        match lexeme {
            "<" => Some(CmpOp::Lt),
            ">" => Some(CmpOp::Gt),
            "=" => Some(CmpOp::Eq),
            "<=" => Some(CmpOp::Le),
            ">=" => Some(CmpOp::Ge),
            "<>" => Some(CmpOp::Ne),
            _ => None,
        }
    }

    /// Apply the operator to two cells; false whenever either is null.
    pub fn test(self, left: &Cell, right: &Cell) -> bool {
        let Some(ordering) = left.compare(right) else {
            return false;
        };
        match self {
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
            CmpOp::Ne => ordering != Ordering::Equal,
        }
    }
}

/// Wrapper giving a cell hash/equality by identity, for use as a map key
/// during grouping and deduplication.
#[derive(Debug, Clone)]
pub struct CellKey(pub Cell);

impl PartialEq for CellKey {
    fn eq(&self, other: &CellKey) -> bool {
        self.0.identical(&other.0)
    }
}

impl Eq for CellKey {}

impl Hash for CellKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Cell::Null => 0u8.hash(state),
            Cell::Int(v) => {
                1u8.hash(state);
                v.hash(state);
            }
            Cell::Float(v) => {
                2u8.hash(state);
                v.to_bits().hash(state);
            }
            Cell::Char(c) => {
                3u8.hash(state);
                c.hash(state);
            }
            Cell::Text(s) => {
                4u8.hash(state);
                s.hash(state);
            }
        }
    }
}
