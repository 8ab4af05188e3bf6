pub mod catalog;
pub mod dashboard_layout;
pub mod discipline;
pub mod intake_profile;
pub mod intake_session;
