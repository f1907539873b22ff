//! Layout-block interpreter (spec §4.3): the HTML table mini-parser and
//! the non-table whitespace-split/distribute-bbox rule. Grounded
//! verbatim on original_source `backend/worker/ocr/vl_engine.py`'s
//! `_parse_table_html`/`_tokens_from_table`/`_tokens_from_text_block`.
//!
//! Flagged in spec §9 as "the most fragile component" — kept small and
//! dedicated to the narrow HTML-table-fragment shape VL engines emit,
//! not a general HTML parser.

use super::engine::{BlockLabel, LayoutBlock};
use crate::parsing::label_map::LABEL_HINTS;
use crate::types::{BBox, Token};
use std::collections::HashMap;

/// One row of an HTML table, as plain cell text in column order.
fn parse_html_rows(html: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for row_html in split_tag(html, "tr") {
        let mut cells = Vec::new();
        for cell_html in split_tag(&row_html, "td").into_iter().chain(split_tag(&row_html, "th")) {
            cells.push(strip_tags(&cell_html).trim().to_string());
        }
        if !cells.is_empty() {
            rows.push(cells);
        }
    }
    rows
}

/// Extract the inner contents of every `<tag ...>...</tag>` occurrence,
/// case-insensitively. Good enough for the simple single-level table
/// fragments VL engines emit (no nested tables).
fn split_tag(html: &str, tag: &str) -> Vec<String> {
    let lower = html.to_lowercase();
    let open_needle = format!("<{tag}");
    let close_needle = format!("</{tag}>");
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(start_rel) = lower[pos..].find(&open_needle) {
        let open_start = pos + start_rel;
        let Some(tag_end_rel) = lower[open_start..].find('>') else { break };
        let content_start = open_start + tag_end_rel + 1;
        let Some(close_rel) = lower[content_start..].find(&close_needle) else { break };
        let content_end = content_start + close_rel;
        out.push(html[content_start..content_end].to_string());
        pos = content_end + close_needle.len();
    }
    out
}

fn strip_tags(html: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
}

/// Result of interpreting a single `Table` layout block: label->value
/// cells plus synthesized tokens spanning each cell's column region of
/// the block's bbox.
pub struct TableParse {
    pub cells: HashMap<String, String>,
    pub tokens: Vec<Token>,
}

/// Parse a table block's HTML per spec §4.3: if the first row looks
/// like a label row (matches a closed set of hint terms), the second
/// row is read positionally as values; otherwise cells are paired by
/// adjacent columns.
pub fn parse_table_block(block: &LayoutBlock) -> TableParse {
    let rows = parse_html_rows(&block.content);
    let mut cells = HashMap::new();
    let mut tokens = Vec::new();

    if rows.is_empty() {
        return TableParse { cells, tokens };
    }

    let first_row_is_labels = rows[0]
        .iter()
        .any(|cell| LABEL_HINTS.iter().any(|hint| cell.contains(hint)));

    if first_row_is_labels && rows.len() >= 2 {
        let labels = &rows[0];
        let values = &rows[1];
        let n = labels.len().min(values.len());
        for i in 0..n {
            let label = labels[i].clone();
            let value = values[i].clone();
            if value.is_empty() {
                continue;
            }
            let cell_bbox = column_bbox(&block.bbox, i, n);
            tokens.push(Token::new(value.clone(), 0.95, cell_bbox));
            cells.insert(label, value);
        }
    } else {
        // No label row: pair cells by adjacent columns (label, value, label, value, ...).
        for row in &rows {
            let mut i = 0;
            while i + 1 < row.len() {
                let label = row[i].clone();
                let value = row[i + 1].clone();
                if !value.is_empty() {
                    let cell_bbox = column_bbox(&block.bbox, i + 1, row.len());
                    tokens.push(Token::new(value.clone(), 0.9, cell_bbox));
                    cells.insert(label, value);
                }
                i += 2;
            }
        }
    }

    TableParse { cells, tokens }
}

/// The `i`th of `n` equal-width column slices of `bbox`.
fn column_bbox(bbox: &BBox, i: usize, n: usize) -> BBox {
    let n = n.max(1) as f32;
    let width = bbox.width() / n;
    let x0 = bbox.x0 + width * i as f32;
    BBox::new(x0, bbox.y0, x0 + width, bbox.y1)
}

/// Non-table content lines are split on whitespace; if a line has
/// multiple whitespace-separated parts, the parts are distributed
/// across the block's width proportionally (spec §4.3).
pub fn tokens_from_text_block(block: &LayoutBlock) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in block.content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        if parts.len() == 1 {
            tokens.push(Token::new(parts[0], 0.9, block.bbox));
            continue;
        }
        let total_chars: usize = parts.iter().map(|p| p.chars().count()).sum();
        let mut x_cursor = block.bbox.x0;
        for part in parts {
            let share = part.chars().count() as f32 / total_chars.max(1) as f32;
            let part_width = block.bbox.width() * share;
            let bbox = BBox::new(x_cursor, block.bbox.y0, x_cursor + part_width, block.bbox.y1);
            tokens.push(Token::new(part, 0.9, bbox));
            x_cursor += part_width;
        }
    }
    tokens
}

/// Interpret every layout block of a VL response into the flat token
/// stream plus aggregate table-cell map the rest of the pipeline
/// expects, in the block's *local* crop coordinates (the router offsets
/// by the crop origin afterward).
pub fn interpret_blocks(blocks: &[LayoutBlock]) -> (Vec<Token>, HashMap<String, String>) {
    let mut tokens = Vec::new();
    let mut cells = HashMap::new();
    for block in blocks {
        match block.label {
            BlockLabel::Table => {
                let parsed = parse_table_block(block);
                tokens.extend(parsed.tokens);
                cells.extend(parsed.cells);
            }
            BlockLabel::Text => {
                tokens.extend(tokens_from_text_block(block));
            }
            BlockLabel::Image | BlockLabel::Other => {}
        }
    }
    (tokens, cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_block(html: &str) -> LayoutBlock {
        LayoutBlock {
            label: BlockLabel::Table,
            content: html.to_string(),
            bbox: BBox::new(0.0, 0.0, 300.0, 60.0),
        }
    }

    #[test]
    fn label_row_produces_cells_and_tokens() {
        let html = "<table><tr><td>開催日</td><td>会場</td></tr><tr><td>24/10/18</td><td>東京</td></tr></table>";
        let parsed = parse_table_block(&table_block(html));
        assert_eq!(parsed.cells.get("開催日").unwrap(), "24/10/18");
        assert_eq!(parsed.cells.get("会場").unwrap(), "東京");
        assert_eq!(parsed.tokens.len(), 2);
    }

    #[test]
    fn non_label_row_pairs_adjacent_columns() {
        let html = "<table><tr><td>色</td><td>白</td><td>型式</td><td>ABC123</td></tr></table>";
        let parsed = parse_table_block(&table_block(html));
        assert_eq!(parsed.cells.get("色").unwrap(), "白");
        assert_eq!(parsed.cells.get("型式").unwrap(), "ABC123");
    }

    #[test]
    fn text_block_distributes_bboxes_proportionally() {
        let block = LayoutBlock {
            label: BlockLabel::Text,
            content: "東京 2057回".to_string(),
            bbox: BBox::new(0.0, 0.0, 100.0, 20.0),
        };
        let tokens = tokens_from_text_block(&block);
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].bbox.x1 <= tokens[1].bbox.x0 + 0.01);
    }
}
