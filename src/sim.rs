//! The parts of the simulator that vehicle generation depends on: a clock and random streams.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// A named source of random numbers, shared by the objects that draw from it.
/// Streams are single-threaded.
pub type Stream = Rc<RefCell<StdRng>>;

/// Creates a stream with a fixed seed.
pub fn seeded_stream(seed: u64) -> Stream {
    Rc::new(RefCell::new(StdRng::seed_from_u64(seed)))
}

/// The simulator that drives vehicle generation.
pub trait Simulator {
    /// The current simulation time in s.
    fn time(&self) -> f64;

    /// The random stream with the given name, if the simulator has one.
    fn stream(&self, name: &str) -> Option<Stream>;

    /// Returns true if the simulation has not advanced yet.
    fn is_time_zero(&self) -> bool {
        self.time() == 0.0
    }
}

/// A clock that is advanced by hand, with a registry of named streams.
#[derive(Debug, Default)]
pub struct SimClock {
    time: Cell<f64>,
    streams: HashMap<String, Stream>,
}

impl SimClock {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a stream with a fixed seed.
    pub fn with_stream(mut self, name: &str, seed: u64) -> Self {
        self.streams.insert(name.to_owned(), seeded_stream(seed));
        self
    }

    pub fn set_time(&self, time: f64) {
        self.time.set(time);
    }

    /// Advances the clock by `dt` seconds.
    pub fn advance(&self, dt: f64) {
        self.time.set(self.time.get() + dt);
    }
}

impl Simulator for SimClock {
    fn time(&self) -> f64 {
        self.time.get()
    }

    fn stream(&self, name: &str) -> Option<Stream> {
        self.streams.get(name).cloned()
    }
}
