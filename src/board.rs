//! Board query service
//!
//! The seam between the combat core and the surrounding map code: the
//! solver and AI only ever talk to the `Board` trait. `GridBoard` is the
//! reference implementation used by tests and the skirmish binary:
//! terrain costs plus an occupancy index.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::{AHashMap, AHashSet};

use crate::core::types::{Nid, Pos, Team};

/// Options for a shortest-path query
#[derive(Debug, Clone, Copy, Default)]
pub struct PathConstraints {
    /// Accept a path ending on any tile adjacent to the goal; needed when
    /// the goal tile itself is occupied by the unit being approached
    pub adj_good_enough: bool,
    /// Mover's team; hostile-occupied tiles block traversal
    pub mover_team: Option<Team>,
}

pub trait Board {
    fn in_bounds(&self, pos: Pos) -> bool;
    /// Cost to enter a tile; infinite means impassable
    fn movement_cost(&self, pos: Pos) -> f32;
    fn unit_at(&self, pos: Pos) -> Option<&Nid>;
    fn team_at(&self, pos: Pos) -> Option<Team>;
    fn place_unit(&mut self, pos: Pos, nid: Nid, team: Team);
    fn clear_unit(&mut self, pos: Pos);
    fn shortest_path(&self, start: Pos, goal: Pos, constraints: PathConstraints)
        -> Option<Vec<Pos>>;
}

/// Grid with uniform-by-default terrain costs and an occupancy index
#[derive(Debug, Clone, Default)]
pub struct GridBoard {
    width: i32,
    height: i32,
    costs: AHashMap<Pos, f32>,
    occupants: AHashMap<Pos, (Nid, Team)>,
}

impl GridBoard {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            costs: AHashMap::new(),
            occupants: AHashMap::new(),
        }
    }

    pub fn set_cost(&mut self, pos: Pos, cost: f32) {
        self.costs.insert(pos, cost);
    }
}

impl Board for GridBoard {
    fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn movement_cost(&self, pos: Pos) -> f32 {
        if !self.in_bounds(pos) {
            return f32::INFINITY;
        }
        self.costs.get(&pos).copied().unwrap_or(1.0)
    }

    fn unit_at(&self, pos: Pos) -> Option<&Nid> {
        self.occupants.get(&pos).map(|(nid, _)| nid)
    }

    fn team_at(&self, pos: Pos) -> Option<Team> {
        self.occupants.get(&pos).map(|(_, team)| *team)
    }

    fn place_unit(&mut self, pos: Pos, nid: Nid, team: Team) {
        self.occupants.insert(pos, (nid, team));
    }

    fn clear_unit(&mut self, pos: Pos) {
        self.occupants.remove(&pos);
    }

    fn shortest_path(
        &self,
        start: Pos,
        goal: Pos,
        constraints: PathConstraints,
    ) -> Option<Vec<Pos>> {
        find_path(self, start, goal, constraints)
    }
}

/// Node in the A* open set
#[derive(Debug, Clone)]
struct PathNode {
    pos: Pos,
    f_cost: f32, // g_cost + heuristic
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* over any board implementation
pub fn find_path(
    board: &dyn Board,
    start: Pos,
    goal: Pos,
    constraints: PathConstraints,
) -> Option<Vec<Pos>> {
    if start == goal {
        return Some(vec![start]);
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<Pos, Pos> = AHashMap::new();
    let mut g_scores: AHashMap<Pos, f32> = AHashMap::new();

    g_scores.insert(start, 0.0);
    open_set.push(PathNode {
        pos: start,
        f_cost: start.distance(goal) as f32,
    });

    while let Some(current) = open_set.pop() {
        if current.pos == goal
            || (constraints.adj_good_enough && current.pos.distance(goal) == 1)
        {
            return Some(reconstruct_path(&came_from, current.pos));
        }

        let current_g = *g_scores.get(&current.pos).unwrap_or(&f32::INFINITY);

        for neighbor in current.pos.neighbors() {
            if !board.in_bounds(neighbor) {
                continue;
            }
            let move_cost = board.movement_cost(neighbor);
            if move_cost.is_infinite() {
                continue;
            }
            // Hostile-occupied tiles block traversal; the goal itself is
            // exempt so adjacent-good-enough queries still expand toward it
            if neighbor != goal {
                if let (Some(mover), Some(occupant)) =
                    (constraints.mover_team, board.team_at(neighbor))
                {
                    if mover.is_enemy(occupant) {
                        continue;
                    }
                }
            }

            let tentative_g = current_g + move_cost;
            let neighbor_g = *g_scores.get(&neighbor).unwrap_or(&f32::INFINITY);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.pos);
                g_scores.insert(neighbor, tentative_g);
                open_set.push(PathNode {
                    pos: neighbor,
                    f_cost: tentative_g + neighbor.distance(goal) as f32,
                });
            }
        }
    }

    None // No path found
}

fn reconstruct_path(came_from: &AHashMap<Pos, Pos>, mut current: Pos) -> Vec<Pos> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Every tile reachable from `start` within `movement` cost.
///
/// Allied-occupied tiles can be moved through but not stopped on; the
/// start tile itself is always included.
pub fn valid_moves(board: &dyn Board, start: Pos, team: Team, movement: i32) -> AHashSet<Pos> {
    let mut reachable = AHashSet::new();
    reachable.insert(start);
    if movement <= 0 {
        return reachable;
    }

    let mut best: AHashMap<Pos, f32> = AHashMap::new();
    best.insert(start, 0.0);
    let mut open = BinaryHeap::new();
    open.push(PathNode {
        pos: start,
        f_cost: 0.0,
    });

    while let Some(current) = open.pop() {
        let current_g = *best.get(&current.pos).unwrap_or(&f32::INFINITY);
        for neighbor in current.pos.neighbors() {
            if !board.in_bounds(neighbor) {
                continue;
            }
            let cost = board.movement_cost(neighbor);
            if cost.is_infinite() {
                continue;
            }
            let g = current_g + cost;
            if g > movement as f32 {
                continue;
            }
            if let Some(occupant) = board.team_at(neighbor) {
                if team.is_enemy(occupant) {
                    continue;
                }
                // Pass through allies, but the tile is not a stop
                if g < *best.get(&neighbor).unwrap_or(&f32::INFINITY) {
                    best.insert(neighbor, g);
                    open.push(PathNode {
                        pos: neighbor,
                        f_cost: g,
                    });
                }
                continue;
            }
            if g < *best.get(&neighbor).unwrap_or(&f32::INFINITY) {
                best.insert(neighbor, g);
                reachable.insert(neighbor);
                open.push(PathNode {
                    pos: neighbor,
                    f_cost: g,
                });
            }
        }
    }

    reachable
}

/// Walk `path` as far as `movement` allows, never stopping on an occupied
/// tile; returns the furthest permitted position
pub fn travel_along(board: &dyn Board, path: &[Pos], movement: i32) -> Option<Pos> {
    let mut budget = movement as f32;
    let mut stop = *path.first()?;
    for pos in path.iter().skip(1) {
        budget -= board.movement_cost(*pos);
        if budget < 0.0 {
            break;
        }
        if board.unit_at(*pos).is_none() {
            stop = *pos;
        }
    }
    Some(stop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pathfind_straight_line() {
        let board = GridBoard::new(10, 10);
        let path = find_path(
            &board,
            Pos::new(0, 0),
            Pos::new(5, 0),
            PathConstraints::default(),
        )
        .unwrap();
        assert_eq!(path.first(), Some(&Pos::new(0, 0)));
        assert_eq!(path.last(), Some(&Pos::new(5, 0)));
        assert_eq!(path.len(), 6);
    }

    #[test]
    fn test_pathfind_around_impassable() {
        let mut board = GridBoard::new(10, 3);
        board.set_cost(Pos::new(2, 0), f32::INFINITY);
        board.set_cost(Pos::new(2, 1), f32::INFINITY);
        let path = find_path(
            &board,
            Pos::new(0, 0),
            Pos::new(5, 0),
            PathConstraints::default(),
        )
        .unwrap();
        assert!(!path.contains(&Pos::new(2, 0)));
        assert!(!path.contains(&Pos::new(2, 1)));
    }

    #[test]
    fn test_pathfind_no_path() {
        let mut board = GridBoard::new(10, 10);
        let goal = Pos::new(5, 5);
        for neighbor in goal.neighbors() {
            board.set_cost(neighbor, f32::INFINITY);
        }
        assert!(find_path(&board, Pos::new(0, 0), goal, PathConstraints::default()).is_none());
    }

    #[test]
    fn test_adjacent_good_enough_stops_next_to_occupied_goal() {
        let mut board = GridBoard::new(10, 10);
        let goal = Pos::new(5, 0);
        board.place_unit(goal, Nid::from("enemy"), Team::Enemy);
        let path = find_path(
            &board,
            Pos::new(0, 0),
            goal,
            PathConstraints {
                adj_good_enough: true,
                mover_team: Some(Team::Player),
            },
        )
        .unwrap();
        let end = *path.last().unwrap();
        assert_eq!(end.distance(goal), 1);
    }

    #[test]
    fn test_hostiles_block_traversal() {
        let mut board = GridBoard::new(10, 3);
        for y in 0..3 {
            board.place_unit(Pos::new(2, y), Nid::new(format!("e{y}")), Team::Enemy);
        }
        let constraints = PathConstraints {
            adj_good_enough: false,
            mover_team: Some(Team::Player),
        };
        assert!(find_path(&board, Pos::new(0, 0), Pos::new(5, 0), constraints).is_none());
    }

    #[test]
    fn test_valid_moves_respects_budget_and_occupancy() {
        let mut board = GridBoard::new(10, 10);
        board.place_unit(Pos::new(1, 0), Nid::from("ally"), Team::Player);
        let moves = valid_moves(&board, Pos::new(0, 0), Team::Player, 2);
        // Can pass through the ally but not stop on them
        assert!(!moves.contains(&Pos::new(1, 0)));
        assert!(moves.contains(&Pos::new(2, 0)));
        assert!(moves.contains(&Pos::new(0, 2)));
        assert!(!moves.contains(&Pos::new(0, 3)));
        assert!(moves.contains(&Pos::new(0, 0)));
    }

    #[test]
    fn test_travel_along_stops_at_budget() {
        let board = GridBoard::new(10, 10);
        let path: Vec<Pos> = (0..=6).map(|x| Pos::new(x, 0)).collect();
        assert_eq!(travel_along(&board, &path, 3), Some(Pos::new(3, 0)));
        assert_eq!(travel_along(&board, &path, 99), Some(Pos::new(6, 0)));
    }

    #[test]
    fn test_travel_along_skips_occupied_stop() {
        let mut board = GridBoard::new(10, 10);
        board.place_unit(Pos::new(3, 0), Nid::from("ally"), Team::Player);
        let path: Vec<Pos> = (0..=6).map(|x| Pos::new(x, 0)).collect();
        // Budget lands exactly on the occupied tile; back off to the last free one
        assert_eq!(travel_along(&board, &path, 3), Some(Pos::new(2, 0)));
    }
}
