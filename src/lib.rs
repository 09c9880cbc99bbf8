pub mod config;
pub mod cost;
pub mod grid;
pub mod math;
pub mod retrieval;
pub mod wind;

pub use config::{CostParameters, SolverOptions};
pub use grid::{GridField, GridLevel, RadarGrid};
pub use retrieval::{
    retrieve_wind_field_multigrid, retrieve_wind_field_multigrid_with, AuxiliaryInputs,
    BackgroundProfile, RetrievalError,
};
pub use wind::WindField;
