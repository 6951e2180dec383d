mod repl;

use std::env;
use std::fs;

use anyhow::Context;

use crate::repl::Repl;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.len() == 1 {
        let mut repl = Repl::new();
        repl.run()?;
        Ok(())
    } else if args.len() == 2 {
        run_file(&args[1])
    } else {
        println!("Usage: tally [filename]");
        println!("       tally           # Run in REPL mode");
        Ok(())
    }
}

fn run_file(filename: &str) -> anyhow::Result<()> {
    let source =
        fs::read_to_string(filename).with_context(|| format!("cannot read {}", filename))?;

    let mut repl = Repl::new();
    match repl.evaluate_source(&source) {
        Ok(value) => println!("{}", value),
        Err(e) => {
            println!("\x1B[31m{}\x1B[0m", e);
            std::process::exit(1);
        }
    }
    Ok(())
}
