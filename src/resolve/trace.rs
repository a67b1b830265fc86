//! Line-of-attack trace.
//!
//! Rasterises the straight line between an attacker and its target for the
//! renderer. The trace is purely visual and is computed from positions only,
//! outside any lock.

use crate::board::Position;

/// Cells visited by a shot from `origin` to `target`, both included.
///
/// Steps one cell at a time along the axis with the larger extent and
/// derives the other coordinate from the line equation, rounded to the
/// nearest integer (halves away from zero). Points outside a
/// `height` x `width` grid are skipped.
pub fn attack_path(
    origin: Position,
    target: Position,
    height: usize,
    width: usize,
) -> Vec<Position> {
    let (r0, c0) = (origin.row as i64, origin.col as i64);
    let (r1, c1) = (target.row as i64, target.col as i64);
    let d_row = r1 - r0;
    let d_col = c1 - c0;
    let steps = d_row.abs().max(d_col.abs());

    let mut path = Vec::with_capacity(steps as usize + 1);
    let in_bounds = |row: i64, col: i64| {
        row >= 0 && col >= 0 && (row as usize) < height && (col as usize) < width
    };

    if steps == 0 {
        if in_bounds(r0, c0) {
            path.push(origin);
        }
        return path;
    }

    let along_cols = d_col.abs() >= d_row.abs();
    for step in 0..=steps {
        let (row, col) = if along_cols {
            let col = c0 + step * d_col.signum();
            let slope = d_row as f64 / d_col as f64;
            let row = (r0 as f64 + slope * (col - c0) as f64).round() as i64;
            (row, col)
        } else {
            let row = r0 + step * d_row.signum();
            let slope = d_col as f64 / d_row as f64;
            let col = (c0 as f64 + slope * (row - r0) as f64).round() as i64;
            (row, col)
        };
        if in_bounds(row, col) {
            path.push(Position::new(row as usize, col as usize));
        }
    }
    path
}
