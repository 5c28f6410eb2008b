mod actions;
mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    cli::dispatch::run()
}
