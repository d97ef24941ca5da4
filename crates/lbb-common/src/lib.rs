pub mod admin;
pub mod db;
pub mod departement;
pub mod geo;
pub mod index;
pub mod logging;
pub mod mapping;
pub mod office;
pub mod reference;
pub mod run_id;
pub mod scoring;
pub mod search;
pub mod settings;
pub mod store;
pub mod text;
pub mod urls;

pub use office::{HiringType, Office};
pub use reference::ReferenceData;
pub use settings::{Profile, Settings};
