//! Runs the .slt scripts under tests/slt/ against the engine through the
//! sqllogictest harness.

use async_trait::async_trait;
use sqllogictest::{DBOutput, DefaultColumnType};

use tarndb::{Database, QueryError};

struct TarnDB {
    db: Database,
}

#[async_trait]
impl sqllogictest::AsyncDB for TarnDB {
    type Error = QueryError;
    type ColumnType = DefaultColumnType;

    async fn run(&mut self, sql: &str) -> Result<DBOutput<Self::ColumnType>, Self::Error> {
        let response = self.db.process_query(sql);
        if let Some(message) = response.strip_prefix("ERROR ") {
            return Err(QueryError::invalid(message));
        }
        if response.starts_with("OK") {
            return Ok(DBOutput::StatementComplete(0));
        }

        // A serialized table: names row, types row, then data rows.
        let mut width = 0;
        let mut rows = Vec::new();
        for (index, line) in response.lines().enumerate() {
            let record = tarndb::csv::parse_line(line)?;
            if index == 0 {
                width = record.len();
                continue;
            }
            if index == 1 {
                continue;
            }
            rows.push(
                record
                    .into_iter()
                    .map(|field| field.unwrap_or_else(|| "NULL".to_string()))
                    .collect(),
            );
        }
        Ok(DBOutput::Rows {
            types: vec![DefaultColumnType::Text; width],
            rows,
        })
    }
}

fn run_script(path: &str) {
    let mut tester = sqllogictest::Runner::new(|| async {
        Ok::<_, QueryError>(TarnDB {
            db: Database::new(),
        })
    });
    let content = std::fs::read_to_string(path).expect("read slt script");
    let records = sqllogictest::parser::parse_with_name::<DefaultColumnType>(&content, path)
        .expect("parse slt script");
    tester.run_multi(records).expect("slt script failed");
}

#[test]
fn basic() {
    run_script("tests/slt/basic.slt");
}

#[test]
fn aggregates() {
    run_script("tests/slt/aggregates.slt");
}
