mod analyser;
mod ui;

use analyser::core::{AnalysisConfig, TrafficReport};
use analyser::error::AnalyserError;
use analyser::source::TsharkSource;
use clap::{ArgAction, ArgGroup, Parser};
use ui::output;
use std::fs;

const DEFAULT_LIVE_COUNT: usize = 100;

/// flowsniff aggregates captured traffic into flows and flags anomalies
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["file", "interface"])))]
struct Args {
    /// pcap/pcapng file to analyze
    #[arg(short = 'f', long, value_parser)]
    file: Option<String>,

    /// Interface to capture from live
    #[arg(short = 'i', long, value_parser)]
    interface: Option<String>,

    /// tshark display filter applied before analysis
    #[arg(short = 'd', long, value_parser)]
    display_filter: Option<String>,

    /// Number of packets to capture in live mode, default is 100
    #[arg(short = 'c', long, requires = "interface", value_parser)]
    count: Option<usize>,

    /// Save raw live capture to this file
    #[arg(short = 'w', long, requires = "interface", value_parser)]
    write: Option<String>,

    /// Packet count above which a flow is reported, default is 100
    #[arg(short = 't', long, default_value_t = 100, allow_negative_numbers = true, value_parser)]
    threshold: i64,

    /// Distinct destination ports above which a source is reported as scanning, default is 10
    #[arg(short = 'p', long, default_value_t = 10, allow_negative_numbers = true, value_parser)]
    scan_ports: i64,

    /// Number of top conversations to report, default is 5
    #[arg(short = 'n', long, default_value_t = 5, value_parser)]
    top: usize,

    /// Merge both directions of a host pair into one flow
    #[arg(short = 'b', long, action = ArgAction::SetTrue)]
    bidirectional: bool,

    /// Directory to write the JSON report to
    #[arg(short = 'o', long, value_parser)]
    output_dir: Option<String>,

    /// Display output as formatted JSON
    #[arg(short = 'j', long, action = ArgAction::SetTrue)]
    json: bool,
}

fn main() {
    simple_logger::init_with_env().unwrap();

    let args = Args::parse();

    if let Err(err) = run(args) {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), AnalyserError> {
    let config = AnalysisConfig::new(args.threshold, args.scan_ports, args.top, args.bidirectional)?;

    if let Some(out_dir) = args.output_dir.as_deref() {
        log::info!("Output directory {out_dir}");
        fs::create_dir_all(out_dir)?;
    } else {
        log::warn!("No output directory specified.");
    }

    let report = capture_and_analyse(&args, &config)?;

    // ---- Output ----
    if args.json {
        let json = output::data_as_json(&report)?;
        match args.output_dir.as_deref() {
            Some(out_dir) => output::data_to_file(json, &std::path::Path::new(out_dir).join("flowsniff_report.json"))?,
            None => println!("{json}"),
        }
    } else {
        output::print_results(&report);
        if let Some(out_dir) = args.output_dir.as_deref() {
            let json = output::data_as_json(&report)?;
            output::data_to_file(json, &std::path::Path::new(out_dir).join("flowsniff_report.json"))?;
        }
    }

    Ok(())
}

fn capture_and_analyse(args: &Args, config: &AnalysisConfig) -> Result<TrafficReport, AnalyserError> {
    let filter = args.display_filter.as_deref();

    let mut source = match (args.file.as_deref(), args.interface.as_deref()) {
        (Some(file), _) => TsharkSource::from_file(file, filter)?,
        (None, Some(interface)) => TsharkSource::live(interface, filter, args.write.as_deref(), args.count.unwrap_or(DEFAULT_LIVE_COUNT))?,
        (None, None) => return Err(AnalyserError::InvalidArgument("either a file or an interface is required".to_string())),
    };

    let report = analyser::core::analyse(&mut source, config);
    source.stop();

    report
}
