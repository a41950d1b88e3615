mod config;
mod runner;

use std::{path::PathBuf, str::FromStr};

use anyhow::{bail, Context};
use config::Config;
use runner::PhaseRunner;
use textdef::{ParseError, ParseOptions};
use textdef_json::JsonGrammar;

struct StdoutSink;

impl std::fmt::Write for StdoutSink {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        use std::io::Write as _;
        std::io::stdout()
            .write_all(s.as_bytes())
            .map_err(|_| std::fmt::Error)
    }
}

fn main() {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "WARN".to_owned());
    let level = log::LevelFilter::from_str(&level).unwrap_or(log::LevelFilter::Warn);

    let logger = simplelog::TermLogger::init(
        level,
        simplelog::ConfigBuilder::new()
            .set_time_format_custom(&[])
            .build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Never,
    );
    if let Err(e) = logger {
        eprintln!("Failed to initialize logging: {e}");
    }

    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(1);
        }
    }
}

/// 1-based line and column of a byte offset, columns count characters.
fn line_column(src: &str, offset: usize) -> (usize, usize) {
    let before = src.get(..offset).unwrap_or(src);
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().unwrap_or("").chars().count() + 1;
    (line, column)
}

fn report_error(file: &str, src: &str, error: &ParseError) {
    log::debug!("full error:\n{error}");

    let deepest = error.deepest();
    let (line, column) = line_column(src, deepest.position());
    eprintln!("{file}:{line}:{column} {deepest}");
}

/// Returns `Ok(false)` when the input was rejected, the error is already reported.
fn run() -> anyhow::Result<bool> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    let mut do_raw = false;
    let mut do_validate = false;
    let mut do_grammar = false;

    let mut do_bench = false;
    let mut bench_iters = 1;
    let mut config_path = None;

    let mut files = Vec::new();
    let mut iter = args.iter().map(String::as_str);

    while let Some(arg) = iter.next() {
        match arg {
            "--raw" => do_raw = true,
            "--validate" => do_validate = true,
            "--grammar" => do_grammar = true,
            "--bench" => do_bench = true,
            "--iters" => {
                bench_iters = iter
                    .next()
                    .context("Expected argument to --iters")?
                    .parse::<u32>()
                    .context("Expected number")?;
                if bench_iters == 0 {
                    bail!("--iters must be positive");
                }
            }
            "--config" => {
                let path = iter.next().context("Expected argument to --config")?;
                config_path = Some(PathBuf::from(path));
            }
            _ if arg.starts_with("--") => bail!("Unknown flag {arg}"),
            _ => files.push(arg),
        }
    }

    let json = JsonGrammar::new().context("Failed to build the JSON grammar")?;
    if let Err(errors) = json.grammar().check() {
        for e in errors {
            log::error!("{e}");
        }
    }
    log::debug!("JSON grammar has {} nodes", json.grammar().len());

    if do_grammar {
        json.grammar()
            .display_into(json.value_json, &mut StdoutSink)
            .context("Failed to print the grammar")?;
        if files.is_empty() {
            return Ok(true);
        }
    }

    let file = match files.as_slice() {
        [] => bail!("No file provided"),
        [file] => *file,
        _ => bail!("Only one file may be provided"),
    };

    let options = match config_path {
        Some(path) => Config::load(&path)?.options(),
        None => ParseOptions::default(),
    };
    log::info!("parsing `{file}` with depth limit {}", options.max_depth);

    let src = std::fs::read_to_string(file).with_context(|| format!("Failed to read `{file}`"))?;
    let runner = PhaseRunner::new(src.len(), do_bench, bench_iters);

    if do_validate {
        let valid = runner.run("validate", || json.validate_with(&src, &options));
        println!("{valid}");
        return Ok(true);
    }

    if do_raw {
        let result = runner.run("parse", || json.grammar().parse_with(json.value, &src, &options));
        return match result {
            Ok(value) => {
                println!("{value:#?}");
                Ok(true)
            }
            Err(e) => {
                report_error(file, &src, &e);
                Ok(false)
            }
        };
    }

    match runner.run("parse", || json.parse_with(&src, &options)) {
        Ok(value) => {
            let value = serde_json::Value::from(value);
            let pretty = serde_json::to_string_pretty(&value).context("Failed to print result")?;
            println!("{pretty}");
            Ok(true)
        }
        Err(e) => {
            report_error(file, &src, &e);
            Ok(false)
        }
    }
}

#[test]
fn test_line_column() {
    let src = "{\n  \"ä\": x\n}";
    assert_eq!(line_column(src, 0), (1, 1));
    assert_eq!(line_column(src, 2), (2, 1));
    // "ä" is two bytes but one column
    assert_eq!(line_column(src, 10), (2, 8));
    assert_eq!(line_column(src, src.len()), (3, 2));
}
