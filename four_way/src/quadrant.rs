//! The quadrant lock set.
//!
//! There is one mutex per quadrant and every crossing goes through [QuadrantLocks::acquire].  It
//! takes the locks in ascending quadrant order and the returned [QuadrantGuard] gives them back in
//! descending order.  Because every crossing thread agrees on that order, no cycle of waiting
//! threads can form.

use std::sync::{Mutex, MutexGuard, TryLockError};

use biometrics::Counter;

use super::path::{Path, Quadrant};
use super::Vehicle;

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static NEW_QUADRANT_LOCKS: Counter = Counter::new("four_way.quadrant.new");
static ACQUIRE: Counter = Counter::new("four_way.quadrant.acquire");
static ACQUIRE_CONTENDED: Counter = Counter::new("four_way.quadrant.acquire_contended");
static RELEASE: Counter = Counter::new("four_way.quadrant.release");

/// Register the quadrant biometrics.
pub fn register_biometrics(collector: &biometrics::Collector) {
    collector.register_counter(&NEW_QUADRANT_LOCKS);
    collector.register_counter(&ACQUIRE);
    collector.register_counter(&ACQUIRE_CONTENDED);
    collector.register_counter(&RELEASE);
}

///////////////////////////////////////////// Occupancy ////////////////////////////////////////////

#[derive(Debug, Default)]
struct Occupancy {
    vehicle: Option<u64>,
    crossings: u64,
}

/////////////////////////////////////////// QuadrantLocks //////////////////////////////////////////

/// Four independent locks, one per quadrant.  Share it between lanes with an `Arc`.
#[derive(Debug, Default)]
pub struct QuadrantLocks {
    quadrants: [Mutex<Occupancy>; 4],
}

impl QuadrantLocks {
    pub fn new() -> Self {
        NEW_QUADRANT_LOCKS.click();
        Self::default()
    }

    /// Block until `vehicle` holds every quadrant on its path.
    pub fn acquire(&self, vehicle: &Vehicle) -> QuadrantGuard<'_> {
        self.acquire_path(vehicle.id(), &vehicle.path())
    }

    /// Block until `vehicle` holds every quadrant on `path`.  Quadrants off the path are never
    /// touched.
    pub fn acquire_path(&self, vehicle: u64, path: &Path) -> QuadrantGuard<'_> {
        let mut held: Vec<(Quadrant, MutexGuard<'_, Occupancy>)> = Vec::with_capacity(path.len());
        for quadrant in path.iter() {
            if let Some((last, _)) = held.last() {
                assert!(
                    *last < quadrant,
                    "quadrant {} requested after quadrant {}",
                    quadrant,
                    last
                );
            }
            let lock = &self.quadrants[quadrant.index()];
            let mut occupancy = match lock.try_lock() {
                Ok(occupancy) => occupancy,
                Err(TryLockError::WouldBlock) => {
                    ACQUIRE_CONTENDED.click();
                    lock.lock().unwrap()
                }
                Err(TryLockError::Poisoned(err)) => {
                    panic!("quadrant {} poisoned: {}", quadrant, err);
                }
            };
            assert!(
                occupancy.vehicle.is_none(),
                "quadrant {} already holds vehicle {:?}",
                quadrant,
                occupancy.vehicle
            );
            occupancy.vehicle = Some(vehicle);
            ACQUIRE.click();
            held.push((quadrant, occupancy));
        }
        QuadrantGuard { vehicle, held }
    }

    /// The number of crossings that have passed through `quadrant` and released it.
    pub fn crossings(&self, quadrant: Quadrant) -> u64 {
        self.quadrants[quadrant.index()].lock().unwrap().crossings
    }
}

/////////////////////////////////////////// QuadrantGuard //////////////////////////////////////////

/// Proof that one vehicle holds its quadrants.  Dropping it releases them in descending order.
#[derive(Debug)]
pub struct QuadrantGuard<'a> {
    vehicle: u64,
    held: Vec<(Quadrant, MutexGuard<'a, Occupancy>)>,
}

impl QuadrantGuard<'_> {
    pub fn vehicle(&self) -> u64 {
        self.vehicle
    }

    /// The quadrants held, ascending.
    pub fn quadrants(&self) -> Vec<Quadrant> {
        self.held.iter().map(|(q, _)| *q).collect()
    }

    /// Release every quadrant.  Equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for QuadrantGuard<'_> {
    fn drop(&mut self) {
        while let Some((_, mut occupancy)) = self.held.pop() {
            occupancy.vehicle = None;
            occupancy.crossings += 1;
            RELEASE.click();
        }
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
