//! Vehicle generation from origin-destination demand.
//!
//! An [OdMatrix] holds demand per origin, destination and [Category]. [apply_od] turns it into
//! [VehicleGenerator]s: each has a demand tree ([OriginNode]) from which headways and GTU
//! characteristics are drawn, and a set of lane positions to generate on.

mod applier;
mod categorization;
mod characteristics;
mod demand;
mod generator;
mod headway;
mod markov;
mod matrix;
mod options;
mod pattern;

pub use applier::apply_od;
pub use categorization::{Categorization, Category, CategoryValue, Dimension};
pub use characteristics::{
    DefaultGtuCharacteristicsGeneratorOd, GtuCharacteristicsGeneratorOd, OdCharacteristicsGenerator,
};
pub use demand::{DemandFrequency, DemandLeaf, DemandNode, DestinationNode, OriginNode, SharedMarkovChain};
pub use generator::{
    ErrorHandler, GeneratedGtu, GeneratorLanePosition, GeneratorObjects, GeneratorPositions, IdGenerator,
    LaneBias, LaneBiases, VehicleGenerator,
};
pub use headway::{ArrivalsHeadwayGenerator, HeadwayDistribution};
pub use markov::{MarkovChain, MarkovCorrelation};
pub use matrix::OdMatrix;
pub use options::{OdOption, OdOptions};
pub use pattern::{interpolate_vector, DemandPattern, Interpolation};
