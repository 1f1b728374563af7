use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use footnoted::{Format, Warning};

#[derive(Parser)]
#[command(name = "footnoted", version, about = "Inline footnotes in PDF, DOCX, and RTF files")]
struct Args {
    /// Input file, or a directory with --batch
    input: PathBuf,

    /// Output file, or a directory with --batch. Defaults to the input
    /// name with an `.inlined` suffix before the extension.
    output: Option<PathBuf>,

    /// Override format detection (pdf, docx, or rtf)
    #[arg(long)]
    format: Option<String>,

    /// Process every supported file in the input directory
    #[arg(long)]
    batch: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let result = if args.batch {
        run_batch(&args)
    } else {
        run_single(&args)
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run_single(args: &Args) -> Result<(), String> {
    let output = match &args.output {
        Some(path) => path.clone(),
        None => default_output(&args.input),
    };
    let warnings = match &args.format {
        Some(name) => {
            let format = parse_format(name)?;
            let bytes = std::fs::read(&args.input)
                .map_err(|e| format!("{}: {e}", args.input.display()))?;
            let processed = footnoted::process(&bytes, format).map_err(|e| e.to_string())?;
            std::fs::write(&output, &processed.bytes)
                .map_err(|e| format!("{}: {e}", output.display()))?;
            processed.warnings
        }
        None => footnoted::process_path(&args.input, &output).map_err(|e| e.to_string())?,
    };
    report_warnings(&args.input, &warnings);
    Ok(())
}

fn run_batch(args: &Args) -> Result<(), String> {
    let out_dir = args
        .output
        .as_ref()
        .ok_or("--batch requires an output directory")?;
    std::fs::create_dir_all(out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;

    let entries = std::fs::read_dir(&args.input)
        .map_err(|e| format!("{}: {e}", args.input.display()))?;
    let mut failures = 0usize;
    let mut processed = 0usize;
    for entry in entries {
        let entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| Format::from_extension(e).is_ok());
        if !path.is_file() || !supported {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        let output = out_dir.join(name);
        match footnoted::process_path(&path, &output) {
            Ok(warnings) => {
                processed += 1;
                report_warnings(&path, &warnings);
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {e}", path.display());
            }
        }
    }
    eprintln!("{processed} files processed, {failures} failed");
    if failures > 0 {
        return Err("some files failed".into());
    }
    Ok(())
}

fn parse_format(name: &str) -> Result<Format, String> {
    Format::from_extension(name).map_err(|e| e.to_string())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = input.extension().and_then(|e| e.to_str()).unwrap_or("out");
    input.with_file_name(format!("{stem}.inlined.{ext}"))
}

fn report_warnings(path: &Path, warnings: &[Warning]) {
    for w in warnings {
        eprintln!("{}: warning: {w}", path.display());
    }
}
