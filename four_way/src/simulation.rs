//! Run a whole schedule through an intersection on eight threads.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::thread::JoinHandle;

use biometrics::Counter;
use indicio::{clue, value, ERROR, INFO};

use super::intersection::{CrossingObserver, Intersection, NopObserver};
use super::lane::LaneStats;
use super::schedule::Schedule;
use super::{Direction, DirectionMap, Error, IntersectionOptions, Vehicle, COLLECTOR};

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static SIMULATE: Counter = Counter::new("four_way.simulation.simulate");
static SIMULATE_FAILED: Counter = Counter::new("four_way.simulation.failed");
static WORKER_SPAWNED: Counter = Counter::new("four_way.simulation.worker_spawned");
static WORKER_JOINED: Counter = Counter::new("four_way.simulation.worker_joined");

/// Register the simulation biometrics.
pub fn register_biometrics(collector: &biometrics::Collector) {
    collector.register_counter(&SIMULATE);
    collector.register_counter(&SIMULATE_FAILED);
    collector.register_counter(&WORKER_SPAWNED);
    collector.register_counter(&WORKER_JOINED);
}

////////////////////////////////////////////// Report //////////////////////////////////////////////

/// What happened once every worker finished.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Report {
    departed: DirectionMap<Vec<Vehicle>>,
    lanes: DirectionMap<LaneStats>,
}

impl Report {
    /// The vehicles that left toward `exit`, most recent first.
    pub fn departed(&self, exit: Direction) -> &[Vehicle] {
        &self.departed[exit]
    }

    pub fn lane(&self, direction: Direction) -> &LaneStats {
        &self.lanes[direction]
    }

    pub fn total_arrived(&self) -> u64 {
        self.lanes.iter().map(|(_, stats)| stats.arrived).sum()
    }

    pub fn total_crossed(&self) -> u64 {
        self.lanes.iter().map(|(_, stats)| stats.crossed).sum()
    }

    pub fn total_departed(&self) -> u64 {
        self.departed.iter().map(|(_, v)| v.len() as u64).sum()
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        writeln!(
            f,
            "{:<6} {:>8} {:>8} {:>8}",
            "lane", "arrived", "crossed", "departed"
        )?;
        for direction in Direction::ALL {
            writeln!(
                f,
                "{:<6} {:>8} {:>8} {:>8}",
                direction.name(),
                self.lanes[direction].arrived,
                self.lanes[direction].crossed,
                self.departed[direction].len()
            )?;
        }
        writeln!(
            f,
            "{:<6} {:>8} {:>8} {:>8}",
            "total",
            self.total_arrived(),
            self.total_crossed(),
            self.total_departed()
        )
    }
}

impl From<&Report> for indicio::Value {
    fn from(report: &Report) -> Self {
        value!({
            arrived: report.total_arrived(),
            crossed: report.total_crossed(),
            departed: report.total_departed(),
            north: &report.lanes.north,
            south: &report.lanes.south,
            east: &report.lanes.east,
            west: &report.lanes.west,
        })
    }
}

///////////////////////////////////////////// simulate /////////////////////////////////////////////

/// Run `schedule` to completion: one arrival thread and one crossing thread per direction.
pub fn simulate(options: &IntersectionOptions, schedule: Schedule) -> Result<Report, Error> {
    simulate_with_observer(options, schedule, Arc::new(NopObserver))
}

/// [simulate], with `observer` hooked into every crossing thread.
pub fn simulate_with_observer(
    options: &IntersectionOptions,
    schedule: Schedule,
    observer: Arc<dyn CrossingObserver>,
) -> Result<Report, Error> {
    SIMULATE.click();
    clue!(COLLECTOR, INFO, {
        simulate: {
            options: options,
            vehicles: schedule.len() as u64,
        },
    });
    let result = run(options, schedule, observer);
    match &result {
        Ok(report) => {
            clue!(COLLECTOR, INFO, {
                report: report,
            });
        }
        Err(err) => {
            SIMULATE_FAILED.click();
            clue!(COLLECTOR, ERROR, {
                error: err.to_string(),
            });
        }
    }
    result
}

fn run(
    options: &IntersectionOptions,
    schedule: Schedule,
    observer: Arc<dyn CrossingObserver>,
) -> Result<Report, Error> {
    let intersection = Arc::new(Intersection::with_observer(options, observer)?);
    let arrivals = schedule.into_arrivals();
    for (direction, vehicles) in arrivals.iter() {
        intersection.expect(direction, vehicles.len() as u64);
    }

    let mut crossings: Vec<(String, JoinHandle<u64>)> = Vec::with_capacity(4);
    for direction in Direction::ALL {
        let name = format!("crossing-{}", direction);
        let worker = Arc::clone(&intersection);
        match std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker.run_crossings(direction))
        {
            Ok(handle) => {
                WORKER_SPAWNED.click();
                crossings.push((name, handle));
            }
            Err(err) => {
                close_all(&intersection);
                return Err(err.into());
            }
        }
    }

    let mut arrivals_workers: Vec<(Direction, String, JoinHandle<Result<u64, Error>>)> =
        Vec::with_capacity(4);
    let mut status = Ok(());
    for (direction, vehicles) in arrivals {
        let name = format!("arrivals-{}", direction);
        let worker = Arc::clone(&intersection);
        match std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker.submit_arrivals(direction, vehicles))
        {
            Ok(handle) => {
                WORKER_SPAWNED.click();
                arrivals_workers.push((direction, name, handle));
            }
            Err(err) => {
                close_all(&intersection);
                status = Err(err.into());
                break;
            }
        }
    }

    for (direction, name, handle) in arrivals_workers {
        let result = match handle.join() {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(Error::worker_panicked(name)),
        };
        WORKER_JOINED.click();
        if let Err(err) = result {
            intersection.close(direction);
            if status.is_ok() {
                status = Err(err);
            }
        }
    }
    for (name, handle) in crossings {
        let result = handle.join();
        WORKER_JOINED.click();
        if result.is_err() && status.is_ok() {
            status = Err(Error::worker_panicked(name));
        }
    }
    status?;

    Ok(Report {
        departed: DirectionMap::from_fn(|exit| intersection.departed(exit)),
        lanes: DirectionMap::from_fn(|direction| intersection.lane_stats(direction)),
    })
}

fn close_all(intersection: &Intersection) {
    for direction in Direction::ALL {
        intersection.close(direction);
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_schedule() {
        let report = simulate(&IntersectionOptions::default(), Schedule::new()).unwrap();
        assert_eq!(0, report.total_arrived());
        assert_eq!(0, report.total_departed());
        for direction in Direction::ALL {
            assert!(report.lane(direction).torn_down);
        }
    }

    #[test]
    fn invalid_options() {
        let options = IntersectionOptions { lane_capacity: 0 };
        let schedule = Schedule::parse("1 0 1\n").unwrap();
        assert!(matches!(
            simulate(&options, schedule),
            Err(Error::InvalidCapacity { capacity: 0 })
        ));
    }

    #[test]
    fn small_schedule() {
        let schedule = Schedule::parse(
            "1 n s\n\
             2 s n\n\
             3 e w\n\
             4 w e\n\
             5 s w\n\
             6 n n\n",
        )
        .unwrap();
        let options = IntersectionOptions { lane_capacity: 1 };
        let report = simulate(&options, schedule).unwrap();
        assert_eq!(6, report.total_arrived());
        assert_eq!(6, report.total_crossed());
        assert_eq!(6, report.total_departed());
        let mut west = report
            .departed(Direction::West)
            .iter()
            .map(Vehicle::id)
            .collect::<Vec<_>>();
        west.sort();
        assert_eq!(vec![3, 5], west);
        assert_eq!(2, report.lane(Direction::North).crossed);
        assert_eq!(2, report.lane(Direction::South).crossed);
    }

    #[test]
    fn report_display() {
        let schedule = Schedule::parse("1 n s\n2 n e\n").unwrap();
        let report = simulate(&IntersectionOptions::default(), schedule).unwrap();
        let text = report.to_string();
        assert!(text.contains("north"));
        assert!(text.lines().last().unwrap().starts_with("total"));
        assert_eq!(6, text.lines().count());
    }
}
