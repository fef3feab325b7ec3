use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};

use four_way::{
    resolve, simulate, simulate_with_observer, CrossingObserver, Direction, Intersection,
    IntersectionOptions, Quadrant, Schedule, Vehicle,
};

#[test]
fn opposing_straight_traffic_completes() {
    let schedule = Schedule::parse("1 n s\n2 s n\n").unwrap();
    let report = simulate(&IntersectionOptions::default(), schedule).unwrap();
    assert_eq!(
        vec![Vehicle::new(1, Direction::North, Direction::South)],
        report.departed(Direction::South)
    );
    assert_eq!(
        vec![Vehicle::new(2, Direction::South, Direction::North)],
        report.departed(Direction::North)
    );
}

/// Holds every crossing until two vehicles are inside at once.
struct Rendezvous {
    barrier: Barrier,
    seen: Mutex<Vec<Vec<Quadrant>>>,
}

impl CrossingObserver for Rendezvous {
    fn crossing(&self, _: &Vehicle, quadrants: &[Quadrant]) {
        self.seen.lock().unwrap().push(quadrants.to_vec());
        self.barrier.wait();
    }
}

#[test]
fn disjoint_paths_cross_together() {
    // Both vehicles must be inside the intersection at the same time for the barrier to open.
    let observer = Arc::new(Rendezvous {
        barrier: Barrier::new(2),
        seen: Mutex::new(vec![]),
    });
    let schedule = Schedule::parse("1 n s\n2 s n\n").unwrap();
    let report =
        simulate_with_observer(&IntersectionOptions::default(), schedule, observer.clone())
            .unwrap();
    assert_eq!(2, report.total_departed());
    let seen = observer.seen.lock().unwrap();
    let all = seen.iter().flatten().collect::<HashSet<_>>();
    assert_eq!(4, all.len());
}

#[test]
fn left_turn_holds_three_quadrants() {
    let path = resolve(Direction::South, Direction::West);
    assert_eq!(3, path.len());
    assert!(path.contains(Quadrant::NorthEast));
    assert_eq!(2, resolve(Direction::North, Direction::South).len());
}

#[test]
fn departures_are_most_recent_first_and_fifo_per_lane() {
    let mut text = String::new();
    for id in 1..=50 {
        text += &format!("{} north south\n", id);
    }
    let schedule = Schedule::parse(&text).unwrap();
    let report = simulate(&IntersectionOptions { lane_capacity: 3 }, schedule).unwrap();
    let ids = report
        .departed(Direction::South)
        .iter()
        .map(Vehicle::id)
        .collect::<Vec<_>>();
    assert_eq!((1..=50).rev().collect::<Vec<_>>(), ids);
}

#[test]
fn conservation() {
    for seed in [1u64, 7, 99] {
        let schedule = Schedule::random(250, seed);
        let expected = Direction::ALL.map(|d| schedule.arrivals(d).len() as u64);
        let report = simulate(&IntersectionOptions { lane_capacity: 2 }, schedule).unwrap();
        for (idx, direction) in Direction::ALL.iter().enumerate() {
            let stats = report.lane(*direction);
            assert_eq!(expected[idx], stats.arrived);
            assert_eq!(expected[idx], stats.crossed);
            assert_eq!(0, stats.occupancy);
            assert!(stats.torn_down);
        }
        assert_eq!(250, report.total_departed());
        let ids = Direction::ALL
            .iter()
            .flat_map(|d| report.departed(*d).iter().map(Vehicle::id))
            .collect::<HashSet<_>>();
        assert_eq!(250, ids.len());
    }
}

#[test]
fn crossings_leave_lanes_in_order() {
    // Departures toward one exit from a single lane keep the lane's order.
    let schedule = Schedule::random(300, 5);
    let arrivals = Direction::ALL.map(|d| {
        schedule
            .arrivals(d)
            .iter()
            .map(Vehicle::id)
            .collect::<Vec<_>>()
    });
    let report = simulate(&IntersectionOptions::default(), schedule).unwrap();
    for exit in Direction::ALL {
        let mut departed = report.departed(exit).to_vec();
        departed.reverse();
        for (idx, entry) in Direction::ALL.iter().enumerate() {
            let from_entry = departed
                .iter()
                .filter(|v| v.entry() == *entry)
                .map(Vehicle::id)
                .collect::<Vec<_>>();
            let expected = arrivals[idx]
                .iter()
                .copied()
                .filter(|id| from_entry.contains(id))
                .collect::<Vec<_>>();
            assert_eq!(expected, from_entry);
        }
    }
}

#[test]
fn isolated_intersections() {
    let options = IntersectionOptions::default();
    let lhs = Arc::new(Intersection::new(&options).unwrap());
    let rhs = Arc::new(Intersection::new(&options).unwrap());
    lhs.expect(Direction::East, 1);
    rhs.expect(Direction::East, 1);
    let vehicle = Vehicle::new(1, Direction::East, Direction::West);
    let _guard = lhs.quadrants().acquire(&vehicle);
    rhs.submit_arrivals(Direction::East, vec![vehicle.clone()])
        .unwrap();
    assert_eq!(1, rhs.run_crossings(Direction::East));
    assert_eq!(1, rhs.departed(Direction::West).len());
    assert!(lhs.departed(Direction::West).is_empty());
}
