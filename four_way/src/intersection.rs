//! The intersection: four lanes, one shared quadrant lock set, and where vehicles go when they
//! leave.
//!
//! [Intersection::submit_arrivals] is the body of an arrival thread and
//! [Intersection::run_crossings] is the body of a crossing thread.  Each direction gets one of
//! each.  Both block until their lane is done.

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

use biometrics::Counter;
use indicio::{clue, DEBUG, INFO};

use super::lane::{Lane, LaneStats};
use super::path::Quadrant;
use super::quadrant::QuadrantLocks;
use super::{Direction, DirectionMap, Error, IntersectionOptions, Vehicle, COLLECTOR};

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static NEW_INTERSECTION: Counter = Counter::new("four_way.intersection.new");
static ARRIVALS_SUBMITTED: Counter = Counter::new("four_way.intersection.arrivals_submitted");
static ARRIVALS_FAILED: Counter = Counter::new("four_way.intersection.arrivals_failed");
static CROSSING: Counter = Counter::new("four_way.intersection.crossing");
static DEPARTED: Counter = Counter::new("four_way.intersection.departed");
static LANE_DRAINED: Counter = Counter::new("four_way.intersection.lane_drained");

/// Register the intersection biometrics.
pub fn register_biometrics(collector: &biometrics::Collector) {
    collector.register_counter(&NEW_INTERSECTION);
    collector.register_counter(&ARRIVALS_SUBMITTED);
    collector.register_counter(&ARRIVALS_FAILED);
    collector.register_counter(&CROSSING);
    collector.register_counter(&DEPARTED);
    collector.register_counter(&LANE_DRAINED);
}

/////////////////////////////////////////// CrossingState //////////////////////////////////////////

/// Where a crossing thread is in its loop.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CrossingState {
    WaitingForVehicle,
    AcquiringQuadrants,
    Crossing,
    Releasing,
    Done,
}

impl CrossingState {
    pub fn name(self) -> &'static str {
        match self {
            CrossingState::WaitingForVehicle => "waiting_for_vehicle",
            CrossingState::AcquiringQuadrants => "acquiring_quadrants",
            CrossingState::Crossing => "crossing",
            CrossingState::Releasing => "releasing",
            CrossingState::Done => "done",
        }
    }
}

impl Display for CrossingState {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.name())
    }
}

impl From<CrossingState> for indicio::Value {
    fn from(state: CrossingState) -> Self {
        indicio::Value::from(state.name())
    }
}

///////////////////////////////////////// CrossingObserver /////////////////////////////////////////

/// Hooks into the crossing loop.  Every method has an empty default.
pub trait CrossingObserver: Send + Sync {
    /// Called while the vehicle holds its quadrants and before it is recorded as departed.
    /// Sleeping here lengthens the crossing.
    fn crossing(&self, _vehicle: &Vehicle, _quadrants: &[Quadrant]) {}

    /// Called every time the crossing thread for a lane changes state.
    fn transition(&self, _lane: Direction, _state: CrossingState) {}
}

#[derive(Debug, Default)]
pub(crate) struct NopObserver;

impl CrossingObserver for NopObserver {}

/////////////////////////////////////////// Intersection ///////////////////////////////////////////

/// Everything the worker threads share.  Wrap it in an `Arc` and hand a clone to each thread.
pub struct Intersection {
    lanes: DirectionMap<Lane>,
    quadrants: Arc<QuadrantLocks>,
    departed: DirectionMap<Mutex<Vec<Vehicle>>>,
    observer: Arc<dyn CrossingObserver>,
}

impl Intersection {
    pub fn new(options: &IntersectionOptions) -> Result<Self, Error> {
        Self::with_observer(options, Arc::new(NopObserver))
    }

    pub fn with_observer(
        options: &IntersectionOptions,
        observer: Arc<dyn CrossingObserver>,
    ) -> Result<Self, Error> {
        options.validate()?;
        let lanes = DirectionMap {
            north: Lane::new(Direction::North, options.lane_capacity)?,
            south: Lane::new(Direction::South, options.lane_capacity)?,
            east: Lane::new(Direction::East, options.lane_capacity)?,
            west: Lane::new(Direction::West, options.lane_capacity)?,
        };
        NEW_INTERSECTION.click();
        Ok(Self {
            lanes,
            quadrants: Arc::new(QuadrantLocks::new()),
            departed: DirectionMap::default(),
            observer,
        })
    }

    /// Announce that `count` vehicles will arrive from `direction`.  Call it before the crossing
    /// thread for that direction starts.
    pub fn expect(&self, direction: Direction, count: u64) {
        self.lanes[direction].expect(count);
    }

    /// Feed `vehicles` into the lane for `direction` in order, blocking while the lane is full.
    ///
    /// Every vehicle must enter from `direction`; the list is checked before anything is queued.
    /// On error the lane is closed so its crossing thread still finishes.
    pub fn submit_arrivals(
        &self,
        direction: Direction,
        vehicles: Vec<Vehicle>,
    ) -> Result<u64, Error> {
        let lane = &self.lanes[direction];
        clue!(COLLECTOR, INFO, {
            arrivals: {
                lane: direction,
                vehicles: vehicles.len() as u64,
            },
        });
        if let Some(vehicle) = vehicles.iter().find(|v| v.entry() != direction) {
            ARRIVALS_FAILED.click();
            lane.close();
            return Err(Error::wrong_lane(vehicle, direction));
        }
        let mut arrived = 0;
        for vehicle in vehicles {
            if let Err(err) = lane.enqueue(vehicle) {
                ARRIVALS_FAILED.click();
                lane.close();
                return Err(err);
            }
            arrived += 1;
        }
        ARRIVALS_SUBMITTED.click();
        clue!(COLLECTOR, INFO, {
            arrivals_done: {
                lane: direction,
                arrived: arrived,
            },
        });
        Ok(arrived)
    }

    /// Drain the lane for `direction`, moving every vehicle across the intersection.  Returns the
    /// number of vehicles that crossed once the lane has delivered everything it expected.
    pub fn run_crossings(&self, direction: Direction) -> u64 {
        let lane = &self.lanes[direction];
        let mut crossed = 0;
        loop {
            self.transition(direction, CrossingState::WaitingForVehicle);
            let Some(vehicle) = lane.dequeue() else {
                break;
            };
            self.transition(direction, CrossingState::AcquiringQuadrants);
            let guard = self.quadrants.acquire(&vehicle);
            self.transition(direction, CrossingState::Crossing);
            CROSSING.click();
            clue!(COLLECTOR, DEBUG, {
                crossing: {
                    vehicle: &vehicle,
                    path: vehicle.path().to_string(),
                },
            });
            self.observer.crossing(&vehicle, &guard.quadrants());
            self.depart(vehicle);
            self.transition(direction, CrossingState::Releasing);
            guard.release();
            lane.mark_crossed();
            crossed += 1;
        }
        if lane.teardown() {
            LANE_DRAINED.click();
        }
        self.transition(direction, CrossingState::Done);
        clue!(COLLECTOR, INFO, {
            crossings_done: {
                lane: direction,
                crossed: crossed,
            },
        });
        crossed
    }

    /// Give up on vehicles that have not yet arrived at `direction`.
    pub fn close(&self, direction: Direction) {
        self.lanes[direction].close();
    }

    /// The vehicles that have left toward `exit`, most recent first.
    pub fn departed(&self, exit: Direction) -> Vec<Vehicle> {
        let departed = self.departed[exit].lock().unwrap();
        departed.iter().rev().cloned().collect()
    }

    pub fn lane_stats(&self, direction: Direction) -> LaneStats {
        self.lanes[direction].stats()
    }

    pub fn quadrants(&self) -> &Arc<QuadrantLocks> {
        &self.quadrants
    }

    fn depart(&self, vehicle: Vehicle) {
        DEPARTED.click();
        let exit = vehicle.exit();
        self.departed[exit].lock().unwrap().push(vehicle);
    }

    fn transition(&self, lane: Direction, state: CrossingState) {
        clue!(COLLECTOR, DEBUG, {
            transition: {
                lane: lane,
                state: state,
            },
        });
        self.observer.transition(lane, state);
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    fn intersection(capacity: usize) -> Arc<Intersection> {
        let options = IntersectionOptions {
            lane_capacity: capacity,
        };
        Arc::new(Intersection::new(&options).unwrap())
    }

    #[test]
    fn zero_capacity() {
        let options = IntersectionOptions { lane_capacity: 0 };
        assert!(matches!(
            Intersection::new(&options),
            Err(Error::InvalidCapacity { capacity: 0 })
        ));
    }

    #[test]
    fn one_lane_end_to_end() {
        let intersection = intersection(2);
        let vehicles = vec![
            Vehicle::new(1, Direction::North, Direction::South),
            Vehicle::new(2, Direction::North, Direction::East),
            Vehicle::new(3, Direction::North, Direction::South),
            Vehicle::new(4, Direction::North, Direction::West),
        ];
        intersection.expect(Direction::North, vehicles.len() as u64);
        let t_intersection = Arc::clone(&intersection);
        let crossing = std::thread::spawn(move || t_intersection.run_crossings(Direction::North));
        assert_eq!(4, intersection.submit_arrivals(Direction::North, vehicles).unwrap());
        assert_eq!(4, crossing.join().unwrap());
        let south = intersection
            .departed(Direction::South)
            .iter()
            .map(Vehicle::id)
            .collect::<Vec<_>>();
        assert_eq!(vec![3, 1], south);
        assert_eq!(1, intersection.departed(Direction::East).len());
        assert_eq!(1, intersection.departed(Direction::West).len());
        assert!(intersection.departed(Direction::North).is_empty());
        let stats = intersection.lane_stats(Direction::North);
        assert_eq!(4, stats.arrived);
        assert_eq!(4, stats.crossed);
        assert!(stats.torn_down);
        assert_eq!(4, intersection.quadrants().crossings(Quadrant::NorthWest));
        assert_eq!(3, intersection.quadrants().crossings(Quadrant::SouthWest));
        assert_eq!(0, intersection.quadrants().crossings(Quadrant::NorthEast));
    }

    #[test]
    fn wrong_lane_closes_the_lane() {
        let intersection = intersection(4);
        intersection.expect(Direction::East, 2);
        let t_intersection = Arc::clone(&intersection);
        let crossing = std::thread::spawn(move || t_intersection.run_crossings(Direction::East));
        let vehicles = vec![
            Vehicle::new(1, Direction::East, Direction::West),
            Vehicle::new(2, Direction::West, Direction::East),
        ];
        assert!(matches!(
            intersection.submit_arrivals(Direction::East, vehicles),
            Err(Error::WrongLane {
                vehicle: 2,
                entry: Direction::West,
                lane: Direction::East,
            })
        ));
        assert_eq!(0, crossing.join().unwrap());
        assert_eq!(0, intersection.lane_stats(Direction::East).arrived);
    }

    #[test]
    fn too_many_arrivals() {
        let intersection = intersection(4);
        intersection.expect(Direction::West, 1);
        let vehicles = vec![
            Vehicle::new(1, Direction::West, Direction::East),
            Vehicle::new(2, Direction::West, Direction::North),
        ];
        assert!(matches!(
            intersection.submit_arrivals(Direction::West, vehicles),
            Err(Error::UnexpectedArrival {
                lane: Direction::West,
                expected: 1,
            })
        ));
        assert_eq!(1, intersection.run_crossings(Direction::West));
        assert_eq!(1, intersection.departed(Direction::East).len());
    }

    #[derive(Default)]
    struct CountingObserver {
        crossings: AtomicU64,
        done: AtomicU64,
    }

    impl CrossingObserver for CountingObserver {
        fn crossing(&self, vehicle: &Vehicle, quadrants: &[Quadrant]) {
            assert_eq!(vehicle.path().quadrants(), quadrants);
            self.crossings.fetch_add(1, Ordering::SeqCst);
        }

        fn transition(&self, _: Direction, state: CrossingState) {
            if state == CrossingState::Done {
                self.done.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn observer_sees_every_crossing() {
        let observer = Arc::new(CountingObserver::default());
        let options = IntersectionOptions::default();
        let intersection =
            Intersection::with_observer(&options, Arc::clone(&observer) as _).unwrap();
        intersection.expect(Direction::South, 3);
        let vehicles = (0..3)
            .map(|id| Vehicle::new(id, Direction::South, Direction::West))
            .collect();
        intersection
            .submit_arrivals(Direction::South, vehicles)
            .unwrap();
        assert_eq!(3, intersection.run_crossings(Direction::South));
        assert_eq!(3, observer.crossings.load(Ordering::SeqCst));
        assert_eq!(1, observer.done.load(Ordering::SeqCst));
    }
}
