//! `rtpp graphviz FILE` (spec.md §6): emit a DOT graph of the parsed
//! CST to stdout, before any lowering.

use crate::error::RtppResult;
use crate::graphviz;

pub fn graphviz_cmd(cmd: &clap::ArgMatches) -> RtppResult<()> {
    let file = cmd.get_one::<String>("file").expect("required");
    let source = std::fs::read_to_string(file)?;
    let (cst, root) = crate::parse_source(&source)?;
    println!("{}", graphviz::render(&cst, root));
    Ok(())
}
