use clap::Parser;
use std::io;
use std::path::PathBuf;

use gramgen::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Grammar in json form
    grammar: PathBuf,

    #[arg(short, long, help = "Production to start from, defaults to the language")]
    start: Option<String>,

    #[arg(short, long, default_value_t = 1)]
    count: usize,

    #[arg(long, help = "Seed for reproducible output")]
    seed: Option<u64>,

    #[arg(long, help = "Log every decision")]
    trace: bool,

    #[arg(short, long, help = "Ask for every decision on the terminal")]
    interactive: bool,

    #[arg(long, help = "Print the generated tree instead of the text")]
    tree: bool,

    #[arg(long, default_value = "\n", help = "Printed after every generated sentence")]
    separator: String,
}

fn choices(args: &Args) -> Box<dyn Choices> {
    let random = match args.seed {
        Some(seed) => SimpleChoices::seeded(seed),
        None => SimpleChoices::from_entropy(),
    };
    let choices: Box<dyn Choices> = if args.interactive {
        Box::new(
            InteractiveChoices::new(io::stdin().lock(), IoOutput::stderr())
                .with_defaults(Box::new(random)),
        )
    } else {
        Box::new(random)
    };
    if args.trace {
        Box::new(TracingChoices::new(choices, LogOutput::default()))
    } else {
        choices
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    // Load up a grammar file
    let grammar = Grammar::load(&args.grammar)?;
    let start = args
        .start
        .clone()
        .unwrap_or_else(|| grammar.language().to_string());

    let generator = Generator::builder(grammar).choices(choices(&args)).build()?;
    log::info!("Loaded grammar for {}; generating {} from {}", generator.language(), args.count, start);

    let mut out = IoOutput::stdout();
    for _ in 0..args.count {
        let tree = generator.generate_tree(&start)?;
        if args.tree {
            tree.s_expression(&mut out)?;
        } else {
            tree.write(&mut out)?;
        }
        out.append(&args.separator)?;
    }
    out.flush()?;

    Ok(())
}
