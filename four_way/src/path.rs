//! Quadrants and the paths vehicles take through them.
//!
//! ```text
//!                N
//!   +------------+------------+
//!   | Quadrant 2 | Quadrant 1 |
//! W +------------+------------+ E
//!   | Quadrant 3 | Quadrant 4 |
//!   +------------+------------+
//!                S
//! ```
//!
//! A vehicle holds the quadrant it enters through and the quadrant it leaves through.  A left turn
//! also sweeps through the quadrant diagonally across from its exit, so it holds three.  Every
//! other manoeuvre is covered by the entry and exit quadrants alone.

use std::fmt::{Display, Formatter};

use super::Direction;

///////////////////////////////////////////// Quadrant /////////////////////////////////////////////

/// One cell of the intersection.  The derived order is the lock order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Quadrant {
    NorthEast = 1,
    NorthWest = 2,
    SouthWest = 3,
    SouthEast = 4,
}

impl Quadrant {
    /// Every quadrant in ascending order.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthEast,
        Quadrant::NorthWest,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    /// The quadrant's number, 1 through 4.
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Zero-based index, for tables with one slot per quadrant.
    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    fn bit(self) -> u8 {
        1u8 << self.index()
    }
}

impl Display for Quadrant {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.number())
    }
}

/////////////////////////////////////////////// Turn ///////////////////////////////////////////////

/// The manoeuvre a vehicle makes, judged from its entry and exit directions.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Turn {
    UTurn,
    Right,
    Straight,
    Left,
}

impl Turn {
    pub fn classify(entry: Direction, exit: Direction) -> Self {
        if exit == entry {
            Turn::UTurn
        } else if exit == entry.opposite() {
            Turn::Straight
        } else if exit == left_exit(entry) {
            Turn::Left
        } else {
            Turn::Right
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Turn::UTurn => "u-turn",
            Turn::Right => "right",
            Turn::Straight => "straight",
            Turn::Left => "left",
        }
    }
}

impl Display for Turn {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.name())
    }
}

/////////////////////////////////////////////// Path ///////////////////////////////////////////////

/// The set of quadrants one crossing holds.  Iteration is always ascending.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Path {
    mask: u8,
}

impl Path {
    fn with(self, quadrant: Quadrant) -> Self {
        Self {
            mask: self.mask | quadrant.bit(),
        }
    }

    pub fn contains(&self, quadrant: Quadrant) -> bool {
        self.mask & quadrant.bit() != 0
    }

    pub fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// The quadrants on this path in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Quadrant> + '_ {
        Quadrant::ALL.into_iter().filter(|q| self.contains(*q))
    }

    pub fn quadrants(&self) -> Vec<Quadrant> {
        self.iter().collect()
    }
}

impl FromIterator<Quadrant> for Path {
    fn from_iter<I: IntoIterator<Item = Quadrant>>(quadrants: I) -> Self {
        quadrants.into_iter().fold(Path::default(), Path::with)
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        let quadrants = self.iter().map(|q| q.to_string()).collect::<Vec<_>>();
        write!(f, "[{}]", quadrants.join(", "))
    }
}

///////////////////////////////////////////// resolve //////////////////////////////////////////////

/// The quadrant a vehicle occupies first when it enters from `entry`.
pub fn entry_quadrant(entry: Direction) -> Quadrant {
    match entry {
        Direction::East => Quadrant::NorthEast,
        Direction::North => Quadrant::NorthWest,
        Direction::West => Quadrant::SouthWest,
        Direction::South => Quadrant::SouthEast,
    }
}

/// The quadrant a vehicle occupies last when it leaves toward `exit`.
pub fn exit_quadrant(exit: Direction) -> Quadrant {
    match exit {
        Direction::North => Quadrant::NorthEast,
        Direction::West => Quadrant::NorthWest,
        Direction::South => Quadrant::SouthWest,
        Direction::East => Quadrant::SouthEast,
    }
}

// The exit a left turn from `entry` leaves through.
fn left_exit(entry: Direction) -> Direction {
    match entry {
        Direction::South => Direction::West,
        Direction::East => Direction::South,
        Direction::North => Direction::East,
        Direction::West => Direction::North,
    }
}

// The extra quadrant a left turn from `entry` sweeps through.
fn left_turn_waypoint(entry: Direction) -> Quadrant {
    match entry {
        Direction::South => Quadrant::NorthEast,
        Direction::East => Quadrant::NorthWest,
        Direction::North => Quadrant::SouthWest,
        Direction::West => Quadrant::SouthEast,
    }
}

/// Compute the quadrants a vehicle entering from `entry` and leaving toward `exit` must hold.
///
/// The result is deterministic and iterates in ascending quadrant order, which is exactly the
/// order [crate::QuadrantLocks::acquire] takes the locks in.
pub fn resolve(entry: Direction, exit: Direction) -> Path {
    let path = Path::default()
        .with(entry_quadrant(entry))
        .with(exit_quadrant(exit));
    match Turn::classify(entry, exit) {
        Turn::Left => path.with(left_turn_waypoint(entry)),
        Turn::UTurn | Turn::Right | Turn::Straight => path,
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
