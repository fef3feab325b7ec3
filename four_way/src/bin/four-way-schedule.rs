use arrrg::CommandLine;

use four_way::Schedule;

#[derive(Clone, Debug, Eq, PartialEq, arrrg_derive::CommandLine)]
pub struct Options {
    #[arrrg(optional, "Number of vehicles to generate.")]
    pub vehicles: u64,
    #[arrrg(optional, "Seed for the generator.  The same seed yields the same schedule.")]
    pub seed: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            vehicles: 20,
            seed: 0,
        }
    }
}

fn main() {
    let (options, free) =
        Options::from_command_line_relaxed("USAGE: four-way-schedule [--vehicles N] [--seed S]");
    if !free.is_empty() {
        eprintln!("four-way-schedule takes no positional arguments");
        std::process::exit(129);
    }
    print!("{}", Schedule::random(options.vehicles, options.seed));
}
