use arrrg::CommandLine;

use four_way::{simulate, Direction, IntersectionOptions, Schedule, COLLECTOR};

const USAGE: &str =
    "USAGE: four-way [--intersection-lane-capacity N] [--verbose] [--departures] SCHEDULE_FILE";

#[derive(Clone, Debug, Default, Eq, PartialEq, arrrg_derive::CommandLine)]
pub struct Options {
    #[arrrg(nested)]
    pub intersection: IntersectionOptions,
    #[arrrg(flag, "Log every crossing and state transition.")]
    pub verbose: bool,
    #[arrrg(flag, "Print the vehicles that left toward each direction, most recent first.")]
    pub departures: bool,
}

fn main() {
    let (options, free) = Options::from_command_line_relaxed(USAGE);
    if free.len() != 1 {
        eprintln!("{}", USAGE);
        std::process::exit(129);
    }
    COLLECTOR.register(indicio::stdio::StdioEmitter);
    if options.verbose {
        COLLECTOR.set_verbosity(indicio::DEBUG);
    } else {
        COLLECTOR.set_verbosity(indicio::INFO);
    }
    let schedule = match Schedule::load(&free[0]) {
        Ok(schedule) => schedule,
        Err(err) => {
            eprintln!("could not load {}: {}", free[0], err);
            std::process::exit(1);
        }
    };
    let report = match simulate(&options.intersection, schedule) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("simulation failed: {}", err);
            std::process::exit(1);
        }
    };
    print!("{}", report);
    if options.departures {
        for exit in Direction::ALL {
            let ids = report
                .departed(exit)
                .iter()
                .map(|v| v.id().to_string())
                .collect::<Vec<_>>();
            println!("{}: [{}]", exit, ids.join(", "));
        }
    }
}
