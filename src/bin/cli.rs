//! Flashtest command line interface.

use std::process;
use std::time::Duration;

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_t, App, AppSettings::*, Arg,
};
use console::style;
use log::{debug, trace, LevelFilter};
use simplelog::*;

use flashtest::{self as ft, TestBench, DEFAULT_OPENOCD_CONFIG};

fn main() {
    ctrlc::set_handler(move || {
        eprintln!("🛑 received Ctrl+C!");
        process::exit(1);
    })
    .expect("Failed to install my Ctrl-C handler!");

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .author(crate_authors!())
        .about(crate_description!())
        .long_about(
            "\n\
            Flashes a unit test binary to an attached board with OpenOCD, \
            resets the board and reads the test output from its serial port \
            until the device goes quiet.\n\
            \n\
            The run passes when the output contains the test start and \
            completion markers and no test failure. The exit code is 0 when \
            the tests passed and 1 otherwise.\n\
            \n\
            When neither `--stlink-serial` nor `--port` is given, the first \
            attached STM32F3 Discovery board is used.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .arg(
            Arg::with_name("BINARY")
                .help("the target test binary to run")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("OPENOCD_CONFIG")
                .help("path to the OpenOCD configuration file")
                .long("openocd-config")
                .takes_value(true)
                .default_value(DEFAULT_OPENOCD_CONFIG),
        )
        .arg(
            Arg::with_name("STLINK_SERIAL")
                .help("serial number of the ST-Link to use when flashing")
                .long("stlink-serial")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("PORT")
                .help("the serial port to read the test output from")
                .long("port")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("BAUD_RATE")
                .help("serial port baud rate")
                .long("baud")
                .takes_value(true)
                .default_value("115200")
                .validator(positive_integer),
        )
        .arg(
            Arg::with_name("TEST_TIMEOUT")
                .help("seconds of silence before a test is considered done or unresponsive")
                .long("test-timeout")
                .takes_value(true)
                .default_value("2.0")
                .validator(positive_seconds),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help(
                    "Output additional logs as the script runs, repeat for \
                     higher verbosity",
                ),
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

    trace!("{:#?}", matches);

    // Arguments with default values ===========================================

    // The validators already checked these values, failing to parse them here
    // means clap let an invalid value through.
    let baud_rate = value_t!(matches.value_of("BAUD_RATE"), u32).unwrap_or_else(|e| e.exit());
    let test_timeout = parse_seconds(matches.value_of("TEST_TIMEOUT").unwrap_or_default())
        .unwrap_or_else(|e| clap::Error::value_validation_auto(e).exit());

    let mut builder = ft::SettingsBuilder::new(matches.value_of_os("BINARY").unwrap_or_default())
        .baud_rate(baud_rate)
        .test_timeout(test_timeout);
    if let Some(config) = matches.value_of_os("OPENOCD_CONFIG") {
        builder = builder.openocd_config(config);
    }

    // Arguments with NO default values ========================================

    if let Some(serial) = matches.value_of("STLINK_SERIAL") {
        builder = builder.stlink_serial(serial);
    }
    if let Some(port) = matches.value_of("PORT") {
        builder = builder.port(port);
    }

    let settings = builder.finalize();
    debug!("{:#?}", settings);

    // Run the test ============================================================

    let bench = TestBench::system(&settings);
    let mut test = ft::factory(settings, bench);
    match test.run() {
        Ok(verdict) => {
            debug!("verdict: {}", verdict);
            process::exit(if verdict.passed() { 0 } else { 1 });
        }
        Err(err) => {
            eprintln!("{}: {}", style("error").red(), err);
            process::exit(1);
        }
    }
}

fn positive_integer(value: String) -> Result<(), String> {
    match value.parse::<u32>() {
        Ok(v) if v > 0 => Ok(()),
        _ => Err(format!("`{}` needs to be a positive integer", value)),
    }
}

fn positive_seconds(value: String) -> Result<(), String> {
    parse_seconds(&value).map(|_| ())
}

/// Parses a strictly positive number of seconds that fits in a `Duration`.
fn parse_seconds(value: &str) -> Result<Duration, String> {
    match value.parse::<f64>().map(Duration::try_from_secs_f64) {
        Ok(Ok(duration)) if duration > Duration::from_secs(0) => Ok(duration),
        _ => Err(format!("`{}` needs to be a positive number of seconds", value)),
    }
}

#[test]
fn seconds_must_be_positive() {
    assert_eq!(parse_seconds("2.5"), Ok(Duration::from_millis(2500)));
    assert!(parse_seconds("0").is_err());
    assert!(parse_seconds("-1").is_err());
    assert!(parse_seconds("two").is_err());
}

#[test]
fn seconds_must_fit_in_a_duration() {
    assert!(parse_seconds("1e20").is_err());
    assert!(parse_seconds("inf").is_err());
    assert!(parse_seconds("NaN").is_err());
    assert!(parse_seconds("1e9").is_ok());
}
