pub mod dataset_service;
pub mod in_flight;
pub mod query_service;
pub mod tutorial_service;
