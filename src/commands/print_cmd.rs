//! `rtpp print FILE` (spec.md §6): parse and reprint with no lowering,
//! a sanity check that the tree builder's whitespace algorithm round-trips
//! the input byte-for-byte.

use crate::error::RtppResult;
use crate::print;

pub fn print_cmd(cmd: &clap::ArgMatches) -> RtppResult<()> {
    let file = cmd.get_one::<String>("file").expect("required");
    let source = std::fs::read_to_string(file)?;
    let (cst, root) = crate::parse_source(&source)?;
    print!("{}", print::print_to_string(&cst, root));
    Ok(())
}
