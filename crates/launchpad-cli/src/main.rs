#[macro_use]
mod macros;

pub mod cli;

fn main() {
    cli::main();
}
