//! Step validation.

use super::board::Coordinate;

/// A step is legal iff it lands on one of the four orthogonal neighbours.
pub fn is_legal_step(from: Coordinate, to: Coordinate) -> bool {
    from.distance_to(&to) == 1
}

/// Index of the first illegal pair in a path, where pair `i` is
/// `path[i] -> path[i + 1]`.
pub fn first_illegal_step(path: &[Coordinate]) -> Option<usize> {
    path.windows(2)
        .position(|pair| !is_legal_step(pair[0], pair[1]))
}
