pub mod human;
pub mod logging;
pub mod report;
