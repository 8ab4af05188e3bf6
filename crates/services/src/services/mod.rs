pub mod autosave;
pub mod catalog_admin;
pub mod catalog_query;
pub mod intake;
pub mod intake_api;
pub mod local_fallback;
pub mod normalized_profile;
pub mod price;
pub mod quiz_condition;
pub mod quiz_config;
pub mod quiz_flow;
pub mod recommendation_cache;
pub mod recommendations;
