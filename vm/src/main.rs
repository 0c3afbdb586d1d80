use clap::Parser as ClapParser;
use std::process;
use std::sync::Arc;

use somvm::{
    Interpreter, InterpreterSettings, LoopProfiler, Tier, Universe, Value, disassemble,
};

mod demos;

use demos::Demo;

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Demo program to run
    #[arg(value_enum)]
    demo: Demo,

    /// Interpreter tier the demo is assembled for
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    tier: u8,

    /// Print the assembled bytecode instead of running it
    #[arg(long, help = "Dump the demo's bytecode and literals")]
    disassemble: bool,

    /// Behave as if running under an optimizing tier (clear-on-pop)
    #[arg(long, help = "Enable clear-on-pop and report loop entries")]
    optimizing: bool,

    /// Nested activations allowed before a stack overflow
    #[arg(long, default_value_t = InterpreterSettings::default().max_depth)]
    max_depth: usize,
}

fn render(value: &Value) -> String {
    match value {
        Value::Array(array) => {
            let elements: Vec<String> = array.to_vec().iter().map(render).collect();
            format!("#({})", elements.join(" "))
        }
        other => format!("{other:?}"),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let tier = if cli.tier == 2 { Tier::Two } else { Tier::One };

    let universe = Universe::bootstrap();
    let program = match demos::build(&universe, cli.demo, tier) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("Error assembling {:?} for {:?}: {}", cli.demo, tier, err);
            process::exit(1);
        }
    };

    if cli.disassemble {
        print!("{}", disassemble(&program.method));
        return;
    }

    let profiler = Arc::new(LoopProfiler::new(cli.optimizing));
    let settings = InterpreterSettings { max_depth: cli.max_depth };
    let mut interp = Interpreter::with_hooks(universe, profiler.clone(), settings);
    match interp.run(&program.method, program.receiver, &program.args) {
        Ok(value) => println!("{}", render(&value)),
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    }

    if cli.optimizing {
        for (method, pc, count) in profiler.report() {
            println!("optimized entry {} @ {}: {}", method, pc, count);
        }
    }
}
