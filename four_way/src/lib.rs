//! four_way simulates vehicles crossing a four-way intersection.
//!
//! The intersection is split into four quadrants.  Each direction has a bounded [Lane] that an
//! arrival thread fills and a crossing thread drains.  A crossing vehicle holds every quadrant on
//! its [Path] at once.  Quadrants are always locked in ascending order, so crossings from different
//! lanes overlap whenever their paths are disjoint and can never deadlock when they are not.
//!
//! The usual entry point is [simulate], which takes a [Schedule] and runs all eight threads to
//! completion.  [Intersection] exposes the per-direction pieces for callers that want to drive the
//! threads themselves.

use std::fmt::{Display, Formatter};
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use biometrics::Counter;
use indicio::value;

pub mod intersection;
pub mod lane;
pub mod path;
pub mod quadrant;
pub mod schedule;
pub mod simulation;

pub use intersection::{CrossingObserver, CrossingState, Intersection};
pub use lane::{Lane, LaneStats};
pub use path::{resolve, Path, Quadrant, Turn};
pub use quadrant::{QuadrantGuard, QuadrantLocks};
pub use schedule::Schedule;
pub use simulation::{simulate, simulate_with_observer, Report};

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static INVALID_CAPACITY: Counter = Counter::new("four_way.error.invalid_capacity");
static INVALID_DIRECTION: Counter = Counter::new("four_way.error.invalid_direction");
static MALFORMED_SCHEDULE: Counter = Counter::new("four_way.error.malformed_schedule");
static DUPLICATE_VEHICLE: Counter = Counter::new("four_way.error.duplicate_vehicle");
static WRONG_LANE: Counter = Counter::new("four_way.error.wrong_lane");
static UNEXPECTED_ARRIVAL: Counter = Counter::new("four_way.error.unexpected_arrival");
static WORKER_PANICKED: Counter = Counter::new("four_way.error.worker_panicked");
static IO_ERROR: Counter = Counter::new("four_way.error.io");

/// Register this crate's biometrics.
pub fn register_biometrics(collector: &biometrics::Collector) {
    collector.register_counter(&INVALID_CAPACITY);
    collector.register_counter(&INVALID_DIRECTION);
    collector.register_counter(&MALFORMED_SCHEDULE);
    collector.register_counter(&DUPLICATE_VEHICLE);
    collector.register_counter(&WRONG_LANE);
    collector.register_counter(&UNEXPECTED_ARRIVAL);
    collector.register_counter(&WORKER_PANICKED);
    collector.register_counter(&IO_ERROR);

    intersection::register_biometrics(collector);
    lane::register_biometrics(collector);
    quadrant::register_biometrics(collector);
    schedule::register_biometrics(collector);
    simulation::register_biometrics(collector);
}

////////////////////////////////////////////// indicio /////////////////////////////////////////////

pub static COLLECTOR: indicio::Collector = indicio::Collector::new();

///////////////////////////////////////////// Constants ////////////////////////////////////////////

/// The number of vehicles a lane holds unless configured otherwise.
pub const DEFAULT_LANE_CAPACITY: usize = 10;

/////////////////////////////////////////////// Error //////////////////////////////////////////////

/// Every way the simulator can refuse to run.  All of these are detected before or as the worker
/// threads start; none of them is retried.
#[derive(Debug)]
pub enum Error {
    /// Lanes must hold at least one vehicle.
    InvalidCapacity { capacity: usize },
    /// A direction was neither a known name nor one of the numeric codes 0-3.
    InvalidDirection { what: String },
    /// A schedule line could not be parsed.
    MalformedSchedule { line: usize, what: String },
    /// Two vehicles in one schedule share an id.
    DuplicateVehicle { id: u64 },
    /// A vehicle was handed to the lane of a direction it does not enter from.
    WrongLane {
        vehicle: u64,
        entry: Direction,
        lane: Direction,
    },
    /// More vehicles arrived on a lane than it was told to expect.
    UnexpectedArrival { lane: Direction, expected: u64 },
    /// A worker thread panicked instead of returning.
    WorkerPanicked { worker: String },
    Io(std::io::Error),
}

impl Error {
    pub(crate) fn invalid_capacity(capacity: usize) -> Self {
        INVALID_CAPACITY.click();
        Self::InvalidCapacity { capacity }
    }

    pub(crate) fn invalid_direction(what: impl Into<String>) -> Self {
        INVALID_DIRECTION.click();
        Self::InvalidDirection { what: what.into() }
    }

    pub(crate) fn malformed_schedule(line: usize, what: impl Into<String>) -> Self {
        MALFORMED_SCHEDULE.click();
        Self::MalformedSchedule {
            line,
            what: what.into(),
        }
    }

    pub(crate) fn duplicate_vehicle(id: u64) -> Self {
        DUPLICATE_VEHICLE.click();
        Self::DuplicateVehicle { id }
    }

    pub(crate) fn wrong_lane(vehicle: &Vehicle, lane: Direction) -> Self {
        WRONG_LANE.click();
        Self::WrongLane {
            vehicle: vehicle.id(),
            entry: vehicle.entry(),
            lane,
        }
    }

    pub(crate) fn unexpected_arrival(lane: Direction, expected: u64) -> Self {
        UNEXPECTED_ARRIVAL.click();
        Self::UnexpectedArrival { lane, expected }
    }

    pub(crate) fn worker_panicked(worker: impl Into<String>) -> Self {
        WORKER_PANICKED.click();
        Self::WorkerPanicked {
            worker: worker.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        match self {
            Error::InvalidCapacity { capacity } => {
                write!(f, "lane capacity must be positive; got {}", capacity)
            }
            Error::InvalidDirection { what } => {
                write!(f, "invalid direction {:?}", what)
            }
            Error::MalformedSchedule { line, what } => {
                write!(f, "malformed schedule at line {}: {}", line, what)
            }
            Error::DuplicateVehicle { id } => {
                write!(f, "vehicle {} appears more than once", id)
            }
            Error::WrongLane {
                vehicle,
                entry,
                lane,
            } => {
                write!(
                    f,
                    "vehicle {} enters from {} but was submitted to the {} lane",
                    vehicle, entry, lane
                )
            }
            Error::UnexpectedArrival { lane, expected } => {
                write!(
                    f,
                    "the {} lane expected {} vehicles and got more",
                    lane, expected
                )
            }
            Error::WorkerPanicked { worker } => {
                write!(f, "worker {} panicked", worker)
            }
            Error::Io(err) => {
                write!(f, "io error: {}", err)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        IO_ERROR.click();
        Self::Io(err)
    }
}

///////////////////////////////////////////// Direction ////////////////////////////////////////////

/// A compass direction.  Vehicles enter from one direction and leave toward another.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Every direction, in the order of their numeric codes.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// The numeric code schedules use for this direction.
    pub fn code(self) -> u64 {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    /// Map a numeric schedule code back to a direction.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Direction::North),
            1 => Some(Direction::South),
            2 => Some(Direction::East),
            3 => Some(Direction::West),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }

    /// The direction a vehicle entering from `self` faces away from.
    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if let Ok(code) = s.parse::<u64>() {
            return Direction::from_code(code).ok_or_else(|| Error::invalid_direction(s));
        }
        match s.to_ascii_lowercase().as_str() {
            "n" | "north" => Ok(Direction::North),
            "s" | "south" => Ok(Direction::South),
            "e" | "east" => Ok(Direction::East),
            "w" | "west" => Ok(Direction::West),
            _ => Err(Error::invalid_direction(s)),
        }
    }
}

impl From<Direction> for indicio::Value {
    fn from(direction: Direction) -> Self {
        indicio::Value::from(direction.name())
    }
}

/////////////////////////////////////////// DirectionMap ///////////////////////////////////////////

/// One `T` per direction.  Lookups are exhaustive matches, so there is no index to get wrong.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DirectionMap<T> {
    pub north: T,
    pub south: T,
    pub east: T,
    pub west: T,
}

impl<T> DirectionMap<T> {
    /// Build a map by calling `f` once per direction, in [Direction::ALL] order.
    pub fn from_fn<F: FnMut(Direction) -> T>(mut f: F) -> Self {
        Self {
            north: f(Direction::North),
            south: f(Direction::South),
            east: f(Direction::East),
            west: f(Direction::West),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> + '_ {
        Direction::ALL.into_iter().map(move |d| (d, &self[d]))
    }

    pub fn map<U, F: FnMut(Direction, T) -> U>(self, mut f: F) -> DirectionMap<U> {
        let DirectionMap {
            north,
            south,
            east,
            west,
        } = self;
        DirectionMap {
            north: f(Direction::North, north),
            south: f(Direction::South, south),
            east: f(Direction::East, east),
            west: f(Direction::West, west),
        }
    }
}

impl<T> IntoIterator for DirectionMap<T> {
    type Item = (Direction, T);
    type IntoIter = std::array::IntoIter<(Direction, T), 4>;

    fn into_iter(self) -> Self::IntoIter {
        [
            (Direction::North, self.north),
            (Direction::South, self.south),
            (Direction::East, self.east),
            (Direction::West, self.west),
        ]
        .into_iter()
    }
}

impl<T> Index<Direction> for DirectionMap<T> {
    type Output = T;

    fn index(&self, direction: Direction) -> &T {
        match direction {
            Direction::North => &self.north,
            Direction::South => &self.south,
            Direction::East => &self.east,
            Direction::West => &self.west,
        }
    }
}

impl<T> IndexMut<Direction> for DirectionMap<T> {
    fn index_mut(&mut self, direction: Direction) -> &mut T {
        match direction {
            Direction::North => &mut self.north,
            Direction::South => &mut self.south,
            Direction::East => &mut self.east,
            Direction::West => &mut self.west,
        }
    }
}

////////////////////////////////////////////// Vehicle /////////////////////////////////////////////

/// A vehicle is fixed at creation.  It is moved, never shared, as it travels from the schedule
/// into a lane and out to the departures of its exit direction.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Vehicle {
    id: u64,
    entry: Direction,
    exit: Direction,
}

impl Vehicle {
    pub fn new(id: u64, entry: Direction, exit: Direction) -> Self {
        Self { id, entry, exit }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn entry(&self) -> Direction {
        self.entry
    }

    pub fn exit(&self) -> Direction {
        self.exit
    }

    pub fn turn(&self) -> Turn {
        Turn::classify(self.entry, self.exit)
    }

    /// The quadrants this vehicle must hold while it crosses.
    pub fn path(&self) -> Path {
        resolve(self.entry, self.exit)
    }
}

impl Display for Vehicle {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "vehicle {} ({} -> {})", self.id, self.entry, self.exit)
    }
}

impl From<&Vehicle> for indicio::Value {
    fn from(vehicle: &Vehicle) -> Self {
        value!({
            id: vehicle.id,
            entry: vehicle.entry,
            exit: vehicle.exit,
            turn: vehicle.turn().name(),
        })
    }
}

//////////////////////////////////////// IntersectionOptions ///////////////////////////////////////

#[derive(Clone, Debug, Eq, PartialEq, arrrg_derive::CommandLine)]
pub struct IntersectionOptions {
    #[arrrg(optional, "Number of vehicles that may wait in each lane before arrivals block.")]
    pub lane_capacity: usize,
}

impl IntersectionOptions {
    /// Check the options before anything is built from them.
    pub fn validate(&self) -> Result<(), Error> {
        if self.lane_capacity == 0 {
            return Err(Error::invalid_capacity(self.lane_capacity));
        }
        Ok(())
    }
}

impl Default for IntersectionOptions {
    fn default() -> Self {
        Self {
            lane_capacity: DEFAULT_LANE_CAPACITY,
        }
    }
}

impl From<&IntersectionOptions> for indicio::Value {
    fn from(options: &IntersectionOptions) -> Self {
        value!({
            lane_capacity: options.lane_capacity as u64,
        })
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_codes_round_trip() {
        for direction in Direction::ALL {
            assert_eq!(Some(direction), Direction::from_code(direction.code()));
        }
        assert_eq!(None, Direction::from_code(4));
    }

    #[test]
    fn direction_from_str() {
        assert_eq!(Direction::North, "0".parse().unwrap());
        assert_eq!(Direction::West, "3".parse().unwrap());
        assert_eq!(Direction::East, "East".parse().unwrap());
        assert_eq!(Direction::South, "s".parse().unwrap());
        assert!(matches!(
            "4".parse::<Direction>(),
            Err(Error::InvalidDirection { .. })
        ));
        assert!(matches!(
            "up".parse::<Direction>(),
            Err(Error::InvalidDirection { .. })
        ));
    }

    #[test]
    fn direction_map_is_exhaustive() {
        let mut map = DirectionMap::from_fn(|d| d.code());
        assert_eq!(0, map[Direction::North]);
        assert_eq!(3, map[Direction::West]);
        map[Direction::East] = 42;
        assert_eq!(
            vec![
                (Direction::North, 0),
                (Direction::South, 1),
                (Direction::East, 42),
                (Direction::West, 3),
            ],
            map.iter().map(|(d, x)| (d, *x)).collect::<Vec<_>>()
        );
        let names = map.map(|d, _| d.name());
        assert_eq!("south", names.south);
    }

    #[test]
    fn options_reject_zero_capacity() {
        assert!(IntersectionOptions::default().validate().is_ok());
        let options = IntersectionOptions { lane_capacity: 0 };
        assert!(matches!(
            options.validate(),
            Err(Error::InvalidCapacity { capacity: 0 })
        ));
    }

    #[test]
    fn opposite_is_an_involution() {
        for direction in Direction::ALL {
            assert_ne!(direction, direction.opposite());
            assert_eq!(direction, direction.opposite().opposite());
        }
    }
}
