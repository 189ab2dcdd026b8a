//! Core type definitions used throughout the engine

use serde::{Deserialize, Serialize};

/// Stable string identifier for a content entity (unit, item, skill, component).
///
/// Nids are the interface between authoring data and the engine and must
/// stay stable across content versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nid(pub String);

impl Nid {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Nid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for Nid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Team a unit fights for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Player,
    Enemy,
    /// Neutral green units, allied with the player side
    Other,
}

impl Team {
    pub fn is_enemy(&self, other: Team) -> bool {
        match (self, other) {
            (Team::Enemy, Team::Enemy) => false,
            (Team::Enemy, _) | (_, Team::Enemy) => true,
            _ => false,
        }
    }

    pub fn is_ally(&self, other: Team) -> bool {
        !self.is_enemy(other)
    }
}

/// Grid position on the battle map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two tiles
    pub fn distance(&self, other: Pos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Four orthogonal neighbors
    pub fn neighbors(&self) -> [Pos; 4] {
        [
            Pos::new(self.x + 1, self.y),
            Pos::new(self.x - 1, self.y),
            Pos::new(self.x, self.y + 1),
            Pos::new(self.x, self.y - 1),
        ]
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// All tiles at exactly `radius` Manhattan distance from `center`
pub fn manhattan_ring(center: Pos, radius: u32) -> Vec<Pos> {
    if radius == 0 {
        return vec![center];
    }
    let r = radius as i32;
    let mut ring = Vec::with_capacity((radius * 4) as usize);
    for dx in -r..=r {
        let dy = r - dx.abs();
        ring.push(Pos::new(center.x + dx, center.y + dy));
        if dy != 0 {
            ring.push(Pos::new(center.x + dx, center.y - dy));
        }
    }
    ring
}

/// Union of rings for every radius in `min..=max`
pub fn manhattan_sphere(center: Pos, min: u32, max: u32) -> Vec<Pos> {
    (min..=max).flat_map(|r| manhattan_ring(center, r)).collect()
}

/// Stat block keys the combat core reads.
///
/// The wider game carries more stats; only the ones consumed by equations
/// and movement appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatId {
    Hp,
    Str,
    Mag,
    Skl,
    Spd,
    Lck,
    Def,
    Res,
    Mov,
    Con,
}

impl StatId {
    pub const ALL: [StatId; 10] = [
        StatId::Hp,
        StatId::Str,
        StatId::Mag,
        StatId::Skl,
        StatId::Spd,
        StatId::Lck,
        StatId::Def,
        StatId::Res,
        StatId::Mov,
        StatId::Con,
    ];

    /// Uppercase name used as an equation parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            StatId::Hp => "HP",
            StatId::Str => "STR",
            StatId::Mag => "MAG",
            StatId::Skl => "SKL",
            StatId::Spd => "SPD",
            StatId::Lck => "LCK",
            StatId::Def => "DEF",
            StatId::Res => "RES",
            StatId::Mov => "MOV",
            StatId::Con => "CON",
        }
    }

    pub fn from_name(s: &str) -> Option<StatId> {
        StatId::ALL.iter().copied().find(|id| id.as_str() == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manhattan_distance() {
        assert_eq!(Pos::new(0, 0).distance(Pos::new(0, 2)), 2);
        assert_eq!(Pos::new(1, 1).distance(Pos::new(-1, -1)), 4);
        assert_eq!(Pos::new(3, 3).distance(Pos::new(3, 3)), 0);
    }

    #[test]
    fn test_manhattan_ring_counts() {
        // Radius 0 is just the center
        assert_eq!(manhattan_ring(Pos::new(0, 0), 0), vec![Pos::new(0, 0)]);
        // A ring of radius r has 4r tiles
        assert_eq!(manhattan_ring(Pos::new(0, 0), 1).len(), 4);
        assert_eq!(manhattan_ring(Pos::new(0, 0), 3).len(), 12);
    }

    #[test]
    fn test_manhattan_sphere_membership() {
        let sphere = manhattan_sphere(Pos::new(0, 0), 1, 2);
        assert!(sphere.contains(&Pos::new(0, 2)));
        assert!(sphere.contains(&Pos::new(1, 1)));
        assert!(!sphere.contains(&Pos::new(0, 0)));
        assert!(!sphere.contains(&Pos::new(0, 3)));
    }

    #[test]
    fn test_team_hostility() {
        assert!(Team::Player.is_enemy(Team::Enemy));
        assert!(Team::Enemy.is_enemy(Team::Other));
        assert!(Team::Player.is_ally(Team::Other));
        assert!(Team::Enemy.is_ally(Team::Enemy));
    }

    #[test]
    fn test_stat_id_roundtrip() {
        for id in StatId::ALL {
            assert_eq!(StatId::from_name(id.as_str()), Some(id));
        }
        assert_eq!(StatId::from_name("XYZ"), None);
    }
}
