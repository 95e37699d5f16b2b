//! CLI subcommands (spec.md §6). One module per subcommand, matching the
//! teacher's `src/commands/` layout.

pub mod graphviz_cmd;
pub mod patch;
pub mod print_cmd;
