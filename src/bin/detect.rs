//! Lists the boards `flashtest` can run tests on.

use std::process;

use clap::{crate_authors, crate_version, App, AppSettings::*, Arg};
use log::LevelFilter;
use simplelog::*;

use flashtest::{BoardDetector, StLinkDetector};

fn main() {
    let matches = App::new("flashtest-detect")
        .version(format!("v{}", crate_version!()).as_str())
        .author(crate_authors!())
        .about("Lists attached STM32F3 Discovery boards")
        .max_term_width(80)
        .setting(ColoredHelp)
        .arg(
            Arg::with_name("v")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Sets the logging level of verbosity"),
        )
        .get_matches();

    let log_level = match matches.occurrences_of("v") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(e) = TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("could not set up logging: {}", e);
    }

    let boards = StLinkDetector.detect_boards();
    if boards.is_empty() {
        println!("No boards detected");
        process::exit(1);
    }
    for (i, board) in boards.iter().enumerate() {
        println!("Board {}:", i);
        println!("  serial_number: {}", board.serial_number);
        println!("  port: {}", board.port);
    }
}
