use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use cal_lexer::tokenize;
use cal_parser::{parse, ParserOptions};
use clap::{ArgAction, Parser};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "cal-bench", about = "Measure C/AL lexing and parsing")]
struct Cli {
    /// Specific object(s) to run, by file stem. If omitted, runs all discovered objects.
    #[arg(short = 't', long = "test", action = ArgAction::Append)]
    tests: Vec<String>,

    /// Iterations per object (measured)
    #[arg(short = 'n', long = "iterations", default_value_t = 50)]
    iterations: u32,

    /// Warmup iterations (not measured)
    #[arg(short = 'w', long = "warmup", default_value_t = 5)]
    warmup: u32,

    /// Output JSON file path; default: benchmark/results/<timestamp>.json
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Also measure the objects under demos/
    #[arg(long = "include-demos", default_value_t = false)]
    include_demos: bool,

    /// List discovered objects and exit
    #[arg(long = "list", default_value_t = false)]
    list: bool,
}

#[derive(Debug, Serialize)]
struct BenchResult {
    name: String,
    iterations: u32,
    bytes: usize,
    tokens: usize,
    diagnostics: usize,
    avg_total_ms: f64,
    min_total_ms: f64,
    max_total_ms: f64,
    avg_lex_ms: f64,
    avg_parse_ms: f64,
}

#[derive(Debug, Serialize)]
struct OutputDoc {
    timestamp: String,
    cal_version: String,
    benchmarks: Vec<BenchResult>,
}

#[derive(Debug, Clone)]
struct ObjectCase {
    name: String,
    path: PathBuf,
}

struct Samples {
    totals: Vec<f64>,
    lexes: Vec<f64>,
    parses: Vec<f64>,
    tokens: usize,
    diagnostics: usize,
}

fn workspace_root() -> PathBuf {
    // crates/cal-bench -> crates -> root
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest.ancestors().nth(2).map(Path::to_path_buf).unwrap_or(manifest)
}

fn discover_objects(include_demos: bool) -> Vec<ObjectCase> {
    let root = workspace_root();
    let mut out = Vec::new();

    let mut candidates = vec![root.join("benchmark/objects")];
    if include_demos {
        candidates.push(root.join("demos"));
    }

    for dir in candidates {
        let Ok(entries) = fs::read_dir(&dir) else { continue };
        for e in entries.flatten() {
            let p = e.path();
            if p.extension().and_then(|s| s.to_str()) == Some("txt") {
                let name = p.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_string();
                out.push(ObjectCase { name, path: p });
            }
        }
    }

    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

fn read_object(path: &Path) -> io::Result<String> {
    fs::read(path).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

fn measure_object(src: &str, options: &ParserOptions, iterations: u32, warmup: u32) -> Samples {
    for _ in 0..warmup {
        let lexed = tokenize(src);
        let _ = parse(&lexed.tokens, options);
    }

    let mut samples = Samples {
        totals: Vec::with_capacity(iterations as usize),
        lexes: Vec::with_capacity(iterations as usize),
        parses: Vec::with_capacity(iterations as usize),
        tokens: 0,
        diagnostics: 0,
    };

    for _ in 0..iterations {
        let t0 = Instant::now();
        let lexed = tokenize(src);
        let t_lex = t0.elapsed();

        let t = Instant::now();
        let output = parse(&lexed.tokens, options);
        let t_parse = t.elapsed();

        samples.tokens = lexed.tokens.len();
        samples.diagnostics = output.diagnostics.len();
        samples.lexes.push(dur_ms(t_lex));
        samples.parses.push(dur_ms(t_parse));
        samples.totals.push(dur_ms(t0.elapsed()));
    }

    samples
}

fn dur_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn stats(vals: &[f64]) -> (f64, f64, f64) {
    if vals.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let min = vals.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg = vals.iter().sum::<f64>() / (vals.len() as f64);
    (avg, min, max)
}

fn write_report(path: &Path, doc: &OutputDoc) -> io::Result<()> {
    let json = serde_json::to_string_pretty(doc)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let options = ParserOptions::default();

    let mut objects = discover_objects(cli.include_demos);

    if cli.list {
        println!("Discovered objects:");
        for o in &objects {
            println!("- {} ({})", o.name, o.path.display());
        }
        return ExitCode::SUCCESS;
    }

    if !cli.tests.is_empty() {
        let wanted: HashSet<_> = cli.tests.iter().map(|s| s.to_lowercase()).collect();
        objects.retain(|o| wanted.contains(&o.name.to_lowercase()));
        if objects.is_empty() {
            eprintln!("No matching objects. Use --list to see available.");
            return ExitCode::from(2);
        }
    }

    if objects.is_empty() {
        eprintln!("No .txt objects found in benchmark/objects or demos.");
        return ExitCode::from(2);
    }

    let mut results = Vec::new();

    for case in &objects {
        let src = match read_object(&case.path) {
            Ok(src) => src,
            Err(e) => {
                eprintln!("Failed to read {}: {}", case.path.display(), e);
                return ExitCode::from(2);
            }
        };
        let samples = measure_object(&src, &options, cli.iterations, cli.warmup);
        let (avg_t, min_t, max_t) = stats(&samples.totals);
        let (avg_l, _, _) = stats(&samples.lexes);
        let (avg_p, _, _) = stats(&samples.parses);

        println!(
            "{:>36}: total avg={:.3}ms min={:.3}ms max={:.3}ms | lex={:.3}ms parse={:.3}ms | {} tokens, {} diagnostics",
            case.name, avg_t, min_t, max_t, avg_l, avg_p, samples.tokens, samples.diagnostics
        );

        results.push(BenchResult {
            name: case.name.clone(),
            iterations: cli.iterations,
            bytes: src.len(),
            tokens: samples.tokens,
            diagnostics: samples.diagnostics,
            avg_total_ms: avg_t,
            min_total_ms: min_t,
            max_total_ms: max_t,
            avg_lex_ms: avg_l,
            avg_parse_ms: avg_p,
        });
    }

    let now = chrono::Utc::now();
    let out_path = cli.output.clone().unwrap_or_else(|| {
        // Windows-safe filename timestamp
        let ts_file = now.format("%Y-%m-%d_%H-%M-%SZ").to_string();
        workspace_root().join("benchmark/results").join(format!("{}.json", ts_file))
    });

    let doc = OutputDoc {
        timestamp: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        cal_version: env!("CARGO_PKG_VERSION").to_string(),
        benchmarks: results,
    };

    if let Err(e) = write_report(&out_path, &doc) {
        eprintln!("Failed to write {}: {}", out_path.display(), e);
        return ExitCode::from(2);
    }

    println!("\nSaved results to {}", out_path.display());
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_empty_samples_are_zero() {
        assert_eq!(stats(&[]), (0.0, 0.0, 0.0));
    }

    #[test]
    fn stats_report_avg_min_max() {
        assert_eq!(stats(&[1.0, 3.0, 2.0]), (2.0, 1.0, 3.0));
    }

    #[test]
    fn discovers_benchmark_objects() {
        let objects = discover_objects(false);
        assert!(objects.iter().any(|o| o.name == "report-50001-customer-balance"));
        let with_demos = discover_objects(true);
        assert!(with_demos.len() > objects.len());
    }

    #[test]
    fn measures_the_requested_iterations() {
        let samples = measure_object("OBJECT Codeunit 1 X\n{\n}\n", &ParserOptions::default(), 3, 0);
        assert_eq!(samples.lexes.len(), 3);
        assert_eq!(samples.diagnostics, 0);
        assert!(samples.tokens > 0);
    }
}
