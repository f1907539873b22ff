pub mod header;
pub mod label_map;
pub mod normalize;
pub mod sheet;
pub mod values;

use crate::types::Token;

/// Cluster tokens into text rows by y-center proximity (spec §4.4.a):
/// threshold = `max(6, 0.6 * median_height)`.
pub fn group_tokens_by_row(tokens: &[Token]) -> Vec<Vec<Token>> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut heights: Vec<f32> = tokens.iter().map(|t| t.bbox.height().abs()).collect();
    heights.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median_height = heights[heights.len() / 2];
    let threshold = (median_height * 0.6).max(6.0);

    let mut sorted: Vec<Token> = tokens.to_vec();
    sorted.sort_by(|a, b| {
        a.bbox
            .y0
            .partial_cmp(&b.bbox.y0)
            .unwrap()
            .then(a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap())
    });

    let mut rows: Vec<Vec<Token>> = Vec::new();
    for token in sorted {
        let cy = token.bbox.y_center();
        let mut placed = false;
        for row in rows.iter_mut() {
            let row_cy: f32 = row.iter().map(|t| t.bbox.y_center()).sum::<f32>() / row.len() as f32;
            if (cy - row_cy).abs() <= threshold {
                row.push(token.clone());
                placed = true;
                break;
            }
        }
        if !placed {
            rows.push(vec![token]);
        }
    }
    rows
}

/// Bounding rect spanning a set of tokens (used for block/row evidence bboxes).
pub fn row_bbox(tokens: &[Token]) -> Option<crate::types::BBox> {
    if tokens.is_empty() {
        return None;
    }
    let x0 = tokens.iter().map(|t| t.bbox.x0).fold(f32::INFINITY, f32::min);
    let y0 = tokens.iter().map(|t| t.bbox.y0).fold(f32::INFINITY, f32::min);
    let x1 = tokens.iter().map(|t| t.bbox.x1).fold(f32::NEG_INFINITY, f32::max);
    let y1 = tokens.iter().map(|t| t.bbox.y1).fold(f32::NEG_INFINITY, f32::max);
    Some(crate::types::BBox::new(x0, y0, x1, y1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BBox;

    fn tok(text: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> Token {
        Token::new(text, 0.9, BBox::new(x0, y0, x1, y1))
    }

    #[test]
    fn group_tokens_by_row_clusters_same_line() {
        let tokens = vec![
            tok("開催日", 0.0, 10.0, 50.0, 30.0),
            tok("24/10/18", 60.0, 11.0, 120.0, 31.0),
            tok("会場", 0.0, 50.0, 50.0, 70.0),
        ];
        let rows = group_tokens_by_row(&tokens);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
    }
}
