#![forbid(unsafe_code)]

//! bindchain demo binary entry point.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use bindchain_demo::walkthrough::{self, Step};
use bindchain_demo::{cli, logging};

fn open_transcript(path: &str) -> io::Result<Box<dyn Write>> {
    if path == "-" {
        Ok(Box::new(io::stdout()))
    } else {
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}

fn write_step(out: &mut dyn Write, step: &Step) -> io::Result<()> {
    let line = step.to_jsonl().map_err(io::Error::other)?;
    writeln!(out, "{line}")
}

fn main() {
    let opts = cli::Opts::parse();

    if let Err(e) = logging::init(&opts.log_filter, opts.log_json) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let mut transcript = match opts.jsonl.as_deref().map(open_transcript).transpose() {
        Ok(transcript) => transcript,
        Err(e) => {
            eprintln!("Failed to open JSONL output: {e}");
            std::process::exit(1);
        }
    };
    let to_stdout = opts.jsonl.as_deref() == Some("-");

    let mut write_error = None;
    let result = walkthrough::run(&opts.script(), |step| {
        if !to_stdout {
            println!("{step}");
        }
        if let Some(out) = transcript.as_mut()
            && write_error.is_none()
            && let Err(e) = write_step(&mut **out, step)
        {
            write_error = Some(e);
        }
    });

    if let Err(e) = result {
        eprintln!("Walkthrough failed: {e}");
        std::process::exit(1);
    }
    let flushed = transcript.as_mut().map_or(Ok(()), |out| out.flush());
    if let Some(e) = write_error.or(flushed.err()) {
        eprintln!("Failed to write JSONL output: {e}");
        std::process::exit(1);
    }
}
