use std::{
    env,
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
    process,
};

use txn_summary::{
    config::ConfigManager,
    core::ReportManager,
    domain::{RebuildRequest, ReportQuery, TransactionRecord},
    init,
    storage::JsonDocumentStore,
    utils::build_info,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
    init();

    if let Err(err) = run() {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        process::exit(1);
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "version" => {
            println!("{}", build_info::current().summary());
        }
        "import" => {
            let path = rest.first().map(PathBuf::from).ok_or("import needs a file")?;
            let records = read_records(&path)?;
            let written = manager()?.import(&records)?;
            println!("Imported {written} transactions from {}", path.display());
        }
        "indexes" => {
            let report = manager()?.ensure_indexes()?;
            println!("ttl index: {}, unique index: {}", report.ttl, report.unique);
        }
        "rebuild" => {
            let options = Options::parse(&rest)?;
            // Validated before any write.
            let request = RebuildRequest::parse(&options.modes, options.merchant_id.as_deref())?;
            let report = manager()?.rebuild(&request)?;
            let modes: Vec<&str> = report.modes.iter().map(|mode| mode.as_str()).collect();
            println!(
                "Upserted {} docs (modes={:?}, merchant={})",
                report.requested, modes, report.scope
            );
            if !report.is_complete() {
                eprintln!(
                    "Warning: {} of {} writes failed",
                    report.requested - report.written(),
                    report.requested
                );
            }
        }
        "report" => {
            let options = Options::parse(&rest)?;
            let metric = options.metric.as_deref().ok_or("report needs --type")?;
            let mode = match options.modes.as_slice() {
                [mode] => mode.as_str(),
                _ => return Err("report needs exactly one --mode".into()),
            };
            let query = ReportQuery::parse(metric, mode, options.merchant_id.as_deref())?;
            let series = manager()?.report(&query, options.cached)?;
            println!("{}", serde_json::to_string_pretty(&series)?);
        }
        _ => {
            print_usage();
            process::exit(1);
        }
    }

    Ok(())
}

fn manager() -> CliResult<ReportManager> {
    let configs = ConfigManager::new()?;
    let config = configs.load()?;
    let store = JsonDocumentStore::new(configs.data_dir())?;
    Ok(ReportManager::new(config, &store)?)
}

fn read_records(path: &PathBuf) -> CliResult<Vec<TransactionRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|err| format!("line {}: {err}", number + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[derive(Debug, Default)]
struct Options {
    modes: Vec<String>,
    merchant_id: Option<String>,
    metric: Option<String>,
    cached: bool,
}

impl Options {
    fn parse(args: &[String]) -> CliResult<Self> {
        let mut options = Options::default();
        let mut iter = args.iter().peekable();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--mode" => {
                    // `--mode daily weekly` and `--mode daily --mode weekly` both work.
                    let before = options.modes.len();
                    while let Some(value) = iter.next_if(|next| !next.starts_with("--")) {
                        options.modes.push(value.clone());
                    }
                    if options.modes.len() == before {
                        return Err("--mode needs a value".into());
                    }
                }
                "--merchant-id" => {
                    let value = iter.next().ok_or("--merchant-id needs a value")?;
                    options.merchant_id = Some(value.clone());
                }
                "--type" => {
                    let value = iter.next().ok_or("--type needs a value")?;
                    options.metric = Some(value.clone());
                }
                "--cached" => options.cached = true,
                other => return Err(format!("unknown option `{other}`").into()),
            }
        }
        Ok(options)
    }
}

fn print_usage() {
    eprintln!(
        "Usage: txn_summary_cli <command>\n\
         Commands:\n  \
         import <transactions.jsonl>\n  \
         rebuild [--mode daily|weekly|monthly ...] [--merchant-id ID]\n  \
         report --type count|amount --mode daily|weekly|monthly [--merchant-id ID] [--cached]\n  \
         indexes\n  \
         version"
    );
}
