//! [Lane] is the bounded queue of vehicles waiting on one side of the intersection.
//!
//! One arrival thread calls [Lane::enqueue] and one crossing thread calls [Lane::dequeue].  The
//! queue is a circular buffer guarded by the lane's mutex with a condition variable for each side:
//! arrivals wait for room and crossings wait for vehicles.  Nothing outside this module can touch
//! the buffer, its indices or its counters.

use std::sync::{Condvar, Mutex, MutexGuard};

use biometrics::Counter;

use super::{Direction, Error, Vehicle};

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static NEW_LANE: Counter = Counter::new("four_way.lane.new");
static EXPECT: Counter = Counter::new("four_way.lane.expect");
static ENQUEUE: Counter = Counter::new("four_way.lane.enqueue");
static ENQUEUE_WAIT: Counter = Counter::new("four_way.lane.enqueue_wait");
static DEQUEUE: Counter = Counter::new("four_way.lane.dequeue");
static DEQUEUE_WAIT: Counter = Counter::new("four_way.lane.dequeue_wait");
static DEQUEUE_DRAINED: Counter = Counter::new("four_way.lane.dequeue_drained");
static CROSSED: Counter = Counter::new("four_way.lane.crossed");
static CLOSE: Counter = Counter::new("four_way.lane.close");
static TEARDOWN: Counter = Counter::new("four_way.lane.teardown");

/// Register the lane biometrics.
pub fn register_biometrics(collector: &biometrics::Collector) {
    collector.register_counter(&NEW_LANE);
    collector.register_counter(&EXPECT);
    collector.register_counter(&ENQUEUE);
    collector.register_counter(&ENQUEUE_WAIT);
    collector.register_counter(&DEQUEUE);
    collector.register_counter(&DEQUEUE_WAIT);
    collector.register_counter(&DEQUEUE_DRAINED);
    collector.register_counter(&CROSSED);
    collector.register_counter(&CLOSE);
    collector.register_counter(&TEARDOWN);
}

///////////////////////////////////////////// LaneStats ////////////////////////////////////////////

/// A consistent snapshot of a lane's counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LaneStats {
    pub capacity: usize,
    pub occupancy: usize,
    pub expected: u64,
    pub arrived: u64,
    pub dequeued: u64,
    pub crossed: u64,
    pub torn_down: bool,
}

impl From<&LaneStats> for indicio::Value {
    fn from(stats: &LaneStats) -> Self {
        indicio::value!({
            capacity: stats.capacity as u64,
            occupancy: stats.occupancy as u64,
            expected: stats.expected,
            arrived: stats.arrived,
            dequeued: stats.dequeued,
            crossed: stats.crossed,
        })
    }
}

///////////////////////////////////////////// LaneState ////////////////////////////////////////////

#[derive(Debug)]
struct LaneState {
    buffer: Vec<Option<Vehicle>>,
    head: usize,
    tail: usize,
    occupancy: usize,
    expected: u64,
    arrived: u64,
    dequeued: u64,
    crossed: u64,
    torn_down: bool,
}

impl LaneState {
    fn drained(&self) -> bool {
        self.occupancy == 0 && self.dequeued >= self.expected
    }
}

/////////////////////////////////////////////// Lane ///////////////////////////////////////////////

/// A bounded single-producer, single-consumer queue of vehicles for one entry direction.
#[derive(Debug)]
pub struct Lane {
    direction: Direction,
    capacity: usize,
    state: Mutex<LaneState>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl Lane {
    /// Create an empty lane that holds at most `capacity` vehicles.
    pub fn new(direction: Direction, capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::invalid_capacity(capacity));
        }
        NEW_LANE.click();
        let state = LaneState {
            buffer: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            occupancy: 0,
            expected: 0,
            arrived: 0,
            dequeued: 0,
            crossed: 0,
            torn_down: false,
        };
        Ok(Self {
            direction,
            capacity,
            state: Mutex::new(state),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        })
    }

    /// Tell the lane that `count` more vehicles will arrive.  The crossing thread stops once every
    /// expected vehicle has been dequeued, so this must happen before it starts.
    pub fn expect(&self, count: u64) {
        EXPECT.click();
        let mut state = self.state.lock().unwrap();
        state.expected += count;
        let _state = self.assert_invariants(state);
    }

    /// Append `vehicle` to the tail, waiting while the lane is full.  Fails if the lane was not told
    /// to expect this vehicle or was closed while waiting.
    pub fn enqueue(&self, vehicle: Vehicle) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.torn_down || state.arrived >= state.expected {
                return Err(Error::unexpected_arrival(self.direction, state.expected));
            }
            if state.occupancy < self.capacity {
                break;
            }
            ENQUEUE_WAIT.click();
            state = self.not_full.wait(state).unwrap();
        }
        let tail = state.tail;
        state.buffer[tail] = Some(vehicle);
        state.tail = (tail + 1) % self.capacity;
        state.occupancy += 1;
        state.arrived += 1;
        let _state = self.assert_invariants(state);
        ENQUEUE.click();
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the vehicle at the head, waiting while the lane is empty.  Returns `None` once
    /// every expected vehicle has been dequeued.
    pub fn dequeue(&self) -> Option<Vehicle> {
        let mut state = self.state.lock().unwrap();
        while state.occupancy == 0 {
            if state.drained() {
                DEQUEUE_DRAINED.click();
                return None;
            }
            DEQUEUE_WAIT.click();
            state = self.not_empty.wait(state).unwrap();
        }
        let head = state.head;
        let vehicle = state.buffer[head]
            .take()
            .expect("occupied slot should hold a vehicle");
        state.head = (head + 1) % self.capacity;
        state.occupancy -= 1;
        state.dequeued += 1;
        let _state = self.assert_invariants(state);
        DEQUEUE.click();
        self.not_full.notify_one();
        Some(vehicle)
    }

    /// Stop expecting vehicles that have not arrived yet.  The crossing thread drains whatever is
    /// queued and then sees the end of the lane instead of waiting forever.
    pub fn close(&self) {
        CLOSE.click();
        let mut state = self.state.lock().unwrap();
        state.expected = state.arrived;
        let _state = self.assert_invariants(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Record that a dequeued vehicle finished crossing.
    pub fn mark_crossed(&self) {
        let mut state = self.state.lock().unwrap();
        state.crossed += 1;
        let _state = self.assert_invariants(state);
        CROSSED.click();
    }

    /// Release the buffer once the lane has drained.  Returns false and leaves the lane alone if
    /// vehicles are still expected.
    pub fn teardown(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.drained() || state.crossed < state.dequeued {
            return false;
        }
        state.buffer = Vec::new();
        state.torn_down = true;
        TEARDOWN.click();
        true
    }

    pub fn stats(&self) -> LaneStats {
        let state = self.state.lock().unwrap();
        LaneStats {
            capacity: self.capacity,
            occupancy: state.occupancy,
            expected: state.expected,
            arrived: state.arrived,
            dequeued: state.dequeued,
            crossed: state.crossed,
            torn_down: state.torn_down,
        }
    }

    // Call with the lock held.
    fn assert_invariants<'a>(
        &self,
        state: MutexGuard<'a, LaneState>,
    ) -> MutexGuard<'a, LaneState> {
        assert!(state.occupancy <= self.capacity);
        assert!(state.crossed <= state.dequeued);
        assert!(state.dequeued <= state.arrived);
        assert!(state.arrived <= state.expected);
        assert_eq!(state.arrived - state.dequeued, state.occupancy as u64);
        assert_eq!((state.head + state.occupancy) % self.capacity, state.tail);
        state
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
