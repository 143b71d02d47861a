//! Text interface: prompt commands and the profit report.

pub mod prompt;
pub mod report;
