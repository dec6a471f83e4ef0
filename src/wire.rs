//! The comma-delimited table format spoken by peers and served to clients.
//!
//! A table on the wire is one header row followed by data rows. Every row is
//! comma-joined, carries a trailing comma, and ends with `\n`; the table ends
//! with one extra blank line. `parse` and `serialize` round-trip exactly.

use thiserror::Error;

/// The one command peers and clients understand, sent as a single line.
pub const STAT_COMMAND: &str = "show stat";

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed stats table: {0}")]
    MalformedTable(String),
}

/// A parsed statistics table: the header row naming each column plus the
/// data rows. Cells stay as strings exactly as they appeared on the wire.
///
/// Invariant: every data row has the same number of cells as the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parses a full peer response into a table.
    ///
    /// Trailing blank lines are the end-of-table sentinel and are dropped,
    /// as is the empty cell each row's trailing comma produces.
    pub fn parse(input: &str) -> Result<Self, WireError> {
        let mut lines: Vec<&str> = input.split('\n').collect();
        while lines
            .last()
            .is_some_and(|line| line.trim_end_matches('\r').is_empty())
        {
            lines.pop();
        }

        let mut cell_rows = lines.iter().map(|line| split_row(line));
        let header = cell_rows
            .next()
            .ok_or_else(|| WireError::MalformedTable("empty response".to_string()))?;
        if header.is_empty() {
            return Err(WireError::MalformedTable("empty header row".to_string()));
        }

        let mut rows = Vec::with_capacity(lines.len() - 1);
        for (index, row) in cell_rows.enumerate() {
            if row.len() != header.len() {
                return Err(WireError::MalformedTable(format!(
                    "row {} has {} cells, header has {}",
                    index + 1,
                    row.len(),
                    header.len()
                )));
            }
            rows.push(row);
        }

        Ok(Table { header, rows })
    }

    /// Encodes the table back into its wire form.
    pub fn serialize(&self) -> String {
        let mut output = String::new();
        for row in std::iter::once(&self.header).chain(self.rows.iter()) {
            for cell in row {
                output.push_str(cell);
                output.push(',');
            }
            output.push('\n');
        }
        output.push('\n');
        output
    }
}

fn split_row(line: &str) -> Vec<String> {
    let mut cells: Vec<String> = line
        .trim_end_matches('\r')
        .split(',')
        .map(str::to_string)
        .collect();
    // The trailing comma always yields one empty artifact cell.
    cells.pop();
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# pxname,svname,status,qcur,\nhttp-in,FRONTEND,OPEN,,\napp,web1,UP,3,\n\n";

    #[test]
    fn parses_header_and_rows() {
        let table = Table::parse(SAMPLE).expect("sample should parse");
        assert_eq!(table.header, vec!["# pxname", "svname", "status", "qcur"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["http-in", "FRONTEND", "OPEN", ""]);
        assert_eq!(table.rows[1], vec!["app", "web1", "UP", "3"]);
    }

    #[test]
    fn round_trips_exactly() {
        let table = Table::parse(SAMPLE).expect("sample should parse");
        let encoded = table.serialize();
        assert_eq!(encoded, SAMPLE);
        let reparsed = Table::parse(&encoded).expect("serialized table should parse");
        assert_eq!(reparsed, table);
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            Table::parse(""),
            Err(WireError::MalformedTable(_))
        ));
        assert!(matches!(
            Table::parse("\n\n"),
            Err(WireError::MalformedTable(_))
        ));
    }

    #[test]
    fn rejects_ragged_rows() {
        let ragged = "# pxname,svname,\napp,web1,UP,\n\n";
        assert!(matches!(
            Table::parse(ragged),
            Err(WireError::MalformedTable(_))
        ));
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let crlf = "# pxname,svname,\r\napp,web1,\r\n\r\n";
        let table = Table::parse(crlf).expect("crlf table should parse");
        assert_eq!(table.header, vec!["# pxname", "svname"]);
        assert_eq!(table.rows, vec![vec!["app", "web1"]]);
    }
}
