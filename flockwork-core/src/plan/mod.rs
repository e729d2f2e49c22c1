//! Ultra-plan artifact parsing
//!
//! This module handles parsing of the Markdown plan artifact a planning
//! worker writes: a dependency-ordered sequence of groups, each an
//! ordered set of tasks.

mod parser;

pub use parser::{parse_plan, Group, Plan, Task};
