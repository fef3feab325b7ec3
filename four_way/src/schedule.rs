//! Schedules: which vehicles arrive from which direction, in what order.
//!
//! The text format has one vehicle per line:
//!
//! ```text
//! # id entry exit
//! 1 0 1
//! 2 south west
//! 3 E n
//! ```
//!
//! Directions are the numeric codes 0-3 (north, south, east, west) or names.  Everything after a
//! `#` is ignored, as are blank lines.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use biometrics::Counter;
use guacamole::combinators::range_to;
use guacamole::Guacamole;

use super::{Direction, DirectionMap, Error, Vehicle};

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static PARSE: Counter = Counter::new("four_way.schedule.parse");
static LOAD: Counter = Counter::new("four_way.schedule.load");
static RANDOM: Counter = Counter::new("four_way.schedule.random");
static VEHICLE: Counter = Counter::new("four_way.schedule.vehicle");

/// Register the schedule biometrics.
pub fn register_biometrics(collector: &biometrics::Collector) {
    collector.register_counter(&PARSE);
    collector.register_counter(&LOAD);
    collector.register_counter(&RANDOM);
    collector.register_counter(&VEHICLE);
}

///////////////////////////////////////////// Schedule /////////////////////////////////////////////

/// Vehicles grouped by entry direction.  Each direction keeps the order vehicles were pushed in,
/// and no two vehicles share an id.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Schedule {
    arrivals: DirectionMap<Vec<Vehicle>>,
    ids: HashSet<u64>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the text format.  Errors carry the one-based line number.
    pub fn parse(text: &str) -> Result<Self, Error> {
        PARSE.click();
        let mut schedule = Schedule::new();
        for (idx, line) in text.lines().enumerate() {
            let lineno = idx + 1;
            let line = match line.find('#') {
                Some(hash) => &line[..hash],
                None => line,
            };
            let fields = line.split_whitespace().collect::<Vec<_>>();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != 3 {
                return Err(Error::malformed_schedule(
                    lineno,
                    format!("expected \"<id> <entry> <exit>\", got {} fields", fields.len()),
                ));
            }
            let id = fields[0].parse::<u64>().map_err(|err| {
                Error::malformed_schedule(lineno, format!("bad id {:?}: {}", fields[0], err))
            })?;
            let entry = parse_direction(lineno, fields[1])?;
            let exit = parse_direction(lineno, fields[2])?;
            schedule.push(Vehicle::new(id, entry, exit))?;
        }
        Ok(schedule)
    }

    /// Read and parse the schedule at `path`.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        LOAD.click();
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// A schedule of `vehicles` vehicles with ids 1 through `vehicles`, each with an entry and
    /// exit drawn from `seed`.  The same seed always yields the same schedule.
    pub fn random(vehicles: u64, seed: u64) -> Self {
        RANDOM.click();
        let mut guac = Guacamole::new(seed);
        let mut direction = range_to(4u64);
        let mut schedule = Schedule::new();
        for id in 1..=vehicles {
            let entry = Direction::from_code(direction(&mut guac)).unwrap_or(Direction::North);
            let exit = Direction::from_code(direction(&mut guac)).unwrap_or(Direction::North);
            VEHICLE.click();
            schedule.ids.insert(id);
            schedule.arrivals[entry].push(Vehicle::new(id, entry, exit));
        }
        schedule
    }

    /// Append `vehicle` to the arrivals for its entry direction.
    pub fn push(&mut self, vehicle: Vehicle) -> Result<(), Error> {
        if !self.ids.insert(vehicle.id()) {
            return Err(Error::duplicate_vehicle(vehicle.id()));
        }
        VEHICLE.click();
        self.arrivals[vehicle.entry()].push(vehicle);
        Ok(())
    }

    /// The vehicles entering from `direction`, in arrival order.
    pub fn arrivals(&self, direction: Direction) -> &[Vehicle] {
        &self.arrivals[direction]
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn into_arrivals(self) -> DirectionMap<Vec<Vehicle>> {
        self.arrivals
    }
}

/// Writes the text format one direction at a time, each in arrival order.
impl Display for Schedule {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        for vehicle in self.arrivals.iter().flat_map(|(_, v)| v) {
            writeln!(
                f,
                "{} {} {}",
                vehicle.id(),
                vehicle.entry().code(),
                vehicle.exit().code()
            )?;
        }
        Ok(())
    }
}

fn parse_direction(lineno: usize, field: &str) -> Result<Direction, Error> {
    field.parse::<Direction>().map_err(|err| match err {
        Error::InvalidDirection { what } => {
            Error::malformed_schedule(lineno, format!("invalid direction {:?}", what))
        }
        err => err,
    })
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
