use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use clap::Parser;
use log::{error, info};
use hm10_force_gauge::init_logging;
use hm10_force_gauge::pipeline::gauge::Channel;
use hm10_force_gauge::pipeline::types::{AdapterState, TransportEvent, UiUpdate};
use hm10_force_gauge::pipeline::{Pipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Replays a captured HM-10 serial stream through the telemetry pipeline and prints what the gauges would show.\n\nExample: ./target/release/hm10-replay capture.txt --fragment-size 20", long_about = None)]
struct Args {
    /// Captured serial text, or - to read from stdin
    input: PathBuf,

    /// Split the stream into fragments of this many bytes, like the BLE link would
    #[arg(long)]
    fragment_size: Option<usize>,

    /// Width of the gauge container
    #[arg(long, default_value_t = 540.0)]
    width: f32,

    /// Height of the gauge container
    #[arg(long, default_value_t = 360.0)]
    height: f32,

    /// Name reported for the simulated peripheral
    #[arg(long, default_value = "replay")]
    peer: String,
}

fn read_input(path: &PathBuf) -> io::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut content = Vec::new();
        io::stdin().read_to_end(&mut content)?;
        return Ok(content);
    }

    fs::read(path)
}

// fragments are cut on byte boundaries, like notifications are
fn fragments(content: &[u8], size: Option<usize>) -> Vec<String> {
    match size {
        Some(size) if size > 0 => content
            .chunks(size)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect(),
        _ => vec![String::from_utf8_lossy(content).into_owned()],
    }
}

fn print_updates(pipeline: &Pipeline, updates: Vec<UiUpdate>) {
    for update in updates {
        match update {
            UiUpdate::AppendLog(line) => print!("{}", line),
            UiUpdate::FramingError(message) => println!("! {}", message),
            UiUpdate::UpdateGauge(channel, fill) => {
                println!(
                    "# {}: force {} fill {:.1}px (top at y={:.1})",
                    channel,
                    pipeline.gauges().force(channel),
                    fill.height(),
                    fill.top(),
                );
            },
            UiUpdate::StatusNotice(notice) => println!("* {}", notice),
            UiUpdate::ReplaceLog(_) | UiUpdate::Banner(_) => {},
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    let content = match read_input(&args.input) {
        Ok(content) => content,
        Err(err) => {
            error!("Failed to read {}: {}", args.input.to_string_lossy(), err);
            return ExitCode::FAILURE;
        },
    };

    let mut pipeline = Pipeline::new(PipelineConfig::default());
    pipeline.set_layout(args.width, args.height);
    pipeline.handle(TransportEvent::AdapterStateChanged(AdapterState::PoweredOn));
    pipeline.handle(TransportEvent::Connected(args.peer.clone()));

    let fragments = fragments(&content, args.fragment_size);
    info!("Replaying {} bytes as {} fragments", content.len(), fragments.len());

    for fragment in fragments {
        let updates = pipeline.handle(TransportEvent::Fragment(fragment));
        print_updates(&pipeline, updates);
    }

    println!();
    for channel in Channel::all() {
        println!("{}: force {} fill {:.1}px", channel, pipeline.gauges().force(channel), pipeline.fill_height(channel));
    }
    if !pipeline.pending().is_empty() {
        println!("unterminated: {:?}", pipeline.pending());
    }

    ExitCode::SUCCESS
}
