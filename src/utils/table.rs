//! Markdown scene-table parsing for display. Never fails: anything that does
//! not look like a scene table is shown as the original text.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableView {
    Table { header: Vec<String>, rows: Vec<Vec<String>> },
    Verbatim(String),
}

fn split_cells(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(|c| c.trim().to_string()).collect()
}

fn is_header(line: &str) -> bool {
    line.contains('|')
        && split_cells(line)
            .iter()
            .any(|c| c.to_lowercase().contains("timestamp"))
}

pub fn parse_scene_table(text: &str) -> TableView {
    let verbatim = || TableView::Verbatim(text.to_string());
    let lines: Vec<&str> = text.lines().collect();

    let Some(header_at) = lines.iter().position(|l| is_header(l)) else {
        return verbatim();
    };
    let header = split_cells(lines[header_at]);

    let rows: Vec<Vec<String>> = lines
        .iter()
        .skip(header_at + 2)
        .take_while(|l| l.trim_start().starts_with('|'))
        .map(|l| split_cells(l))
        .filter(|cells| cells.iter().filter(|c| !c.is_empty()).count() >= 2)
        .collect();

    if rows.is_empty() {
        return verbatim();
    }
    TableView::Table { header, rows }
}

/// Plain-text rendering for the terminal.
pub fn render(view: &TableView) -> String {
    match view {
        TableView::Verbatim(text) => text.clone(),
        TableView::Table { header, rows } => {
            let columns = header.len().max(rows.iter().map(|r| r.len()).max().unwrap_or(0));
            let mut widths = vec![0usize; columns];
            for row in std::iter::once(header).chain(rows.iter()) {
                for (i, cell) in row.iter().enumerate() {
                    widths[i] = widths[i].max(cell.chars().count());
                }
            }

            let line = |cells: &[String]| {
                let padded: Vec<String> = (0..columns)
                    .map(|i| {
                        let cell = cells.get(i).map(String::as_str).unwrap_or("");
                        format!("{:width$}", cell, width = widths[i])
                    })
                    .collect();
                format!("| {} |", padded.join(" | "))
            };

            let mut out = vec![line(header.as_slice())];
            out.push(format!(
                "|{}|",
                widths.iter().map(|w| "-".repeat(w + 2)).collect::<Vec<_>>().join("|")
            ));
            out.extend(rows.iter().map(|r| line(r.as_slice())));
            out.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_row_table() {
        let text = "| Timestamp | Action |\n|---|---|\n| 0:00 | Open |";
        match parse_scene_table(text) {
            TableView::Table { header, rows } => {
                assert_eq!(header, vec!["Timestamp", "Action"]);
                assert_eq!(rows, vec![vec!["0:00".to_string(), "Open".to_string()]]);
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_no_timestamp_header_is_verbatim() {
        let text = "| Time | Action |\n|---|---|\n| 0:00 | Open |";
        assert_eq!(parse_scene_table(text), TableView::Verbatim(text.to_string()));
        assert_eq!(parse_scene_table(""), TableView::Verbatim(String::new()));
    }

    #[test]
    fn test_short_rows_are_dropped() {
        let text = "Intro\n|TIMESTAMP|Visual|\n|-|-|\n|0:00|Dryer|\n|lonely|\n|0:05|Sock|\n\nOutro | text";
        match parse_scene_table(text) {
            TableView::Table { rows, .. } => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[1], vec!["0:05", "Sock"]);
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_header_without_rows_is_verbatim() {
        let text = "|Timestamp|Action|\n|-|-|";
        assert_eq!(parse_scene_table(text), TableView::Verbatim(text.to_string()));
    }

    #[test]
    fn test_render_pads_ragged_rows() {
        let view = TableView::Table {
            header: vec!["Timestamp".to_string(), "Action".to_string()],
            rows: vec![vec!["0:00".to_string(), "Open".to_string(), "extra".to_string()]],
        };
        let out = render(&view);
        assert_eq!(out.lines().count(), 3);
        assert!(out.contains("| 0:00      | Open   | extra |"));
    }
}
