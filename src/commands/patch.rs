//! `rtpp patch FILE [-o PATH] [-f] [-j]` (spec.md §6), grounded on
//! `PatchCmd.runPatch` in
//! `original_source/src/rt_preproc/cli/patch_cmd.py`: print the original
//! source, run the lowering pass, print the patched source.

use colored::Colorize;

use crate::error::{RtppError, RtppResult};
use crate::print;

pub fn patch(cmd: &clap::ArgMatches) -> RtppResult<()> {
    let file = cmd.get_one::<String>("file").expect("required");
    let output = cmd.get_one::<String>("output");
    let just_output = cmd.get_flag("just-output");
    let use_formatter = cmd.get_flag("formatter");

    let source = std::fs::read_to_string(file)?;

    if !just_output {
        println!("File: {}", file.yellow().bold());
        println!("\n{}", "---- ORIGINAL C SOURCE ----".green());
        print!("{source}");
    }

    let (mut cst, root) = crate::parse_source(&source)?;
    let mut pass = crate::lower::Lowering::new();
    let new_root = pass.run(&mut cst, root)?;
    let mut rendered = print::print_to_string(&cst, new_root);
    if use_formatter {
        rendered = print::apply_formatter(&rendered)?;
    }

    if !just_output {
        println!("\n{}", "---- PATCHED C SOURCE ----".green());
    }

    match output {
        Some(path) => std::fs::write(path, rendered).map_err(RtppError::Io)?,
        None => print!("{rendered}"),
    }

    Ok(())
}
