use clap::{arg, crate_version, Arg, ArgAction, Command, ValueHint};

pub fn build_cli() -> Command {
    let long_help = "rtpp is invoked with exactly one of three subcommands.
Set RUST_LOG environment variable to control logging level.
  levels: trace,debug,info,warn,error

Examples:
---------
Patch a file, writing to stdout:       `rtpp patch foo.c`
Patch a file, writing to a new file:   `rtpp patch foo.c -o foo.rtpp.c`
Patch quietly, piped to a formatter:   `RTPP_FORMATTER=clang-format rtpp patch foo.c -f -j`
Sanity-check the printer round-trips:  `rtpp print foo.c | diff foo.c -`
Inspect the parsed tree:               `rtpp graphviz foo.c | dot -Tpng -o foo.png`";

    Command::new("rtpp")
        .about("Rewrites C #ifdef/#define variability into runtime environment-variable checks.")
        .after_long_help(long_help)
        .version(crate_version!())
        .subcommand(
            Command::new("patch")
                .arg(arg!(<file> "C file to patch").value_hint(ValueHint::FilePath))
                .arg(arg!(-o --output <PATH> "output file to write to (default: stdout)").required(false))
                .arg(Arg::new("formatter").short('f').long("formatter").help(
                    "pipe the patched source through $RTPP_FORMATTER before writing it out",
                ).action(ArgAction::SetTrue))
                .arg(Arg::new("just-output").short('j').long("just-output").help(
                    "suppress the `File:`/banner lines, emitting only the patched source",
                ).action(ArgAction::SetTrue))
                .about("parse, lower, and print a C translation unit"),
        )
        .subcommand(
            Command::new("print")
                .arg(arg!(<file> "C file to print").value_hint(ValueHint::FilePath))
                .about("parse and reprint a file unchanged, for sanity checking"),
        )
        .subcommand(
            Command::new("graphviz")
                .arg(arg!(<file> "C file to inspect").value_hint(ValueHint::FilePath))
                .about("emit a DOT graph of the parsed concrete syntax tree to stdout"),
        )
}
