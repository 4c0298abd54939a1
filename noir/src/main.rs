//! Noir detective console.
//!
//! Work a case with an AI assistant from the terminal:
//!
//! ```bash
//! cargo run -p noir -- --save-dir ./saves --window 6
//! ```

mod console;

use noir_core::{CaseContext, Investigation, SessionConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Command line options.
#[derive(Debug, Default, PartialEq)]
struct Options {
    save_dir: Option<PathBuf>,
    case_file: Option<PathBuf>,
    window: Option<usize>,
    help: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Run with --help for usage.");
            std::process::exit(2);
        }
    };

    if options.help {
        print_help();
        return Ok(());
    }

    let mut config = SessionConfig::from_env()?;
    if let Some(path) = options.case_file {
        let json = tokio::fs::read_to_string(&path).await?;
        config.case = CaseContext::from_json(&json)?;
    }
    if let Some(dir) = options.save_dir {
        config = config.with_save_dir(dir);
    }
    if let Some(window) = options.window {
        config = config.with_history_window(window);
    }

    tracing::info!(
        case = %config.case.id,
        save_dir = %config.save_dir.display(),
        "starting console"
    );

    let investigation = Investigation::with_gemini(config);
    console::run_console(investigation).await?;
    Ok(())
}

/// Log to stderr so diagnostics never mix with the narrative on stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => options.help = true,
            "--save-dir" => {
                let dir = args.get(i + 1).ok_or("--save-dir needs a directory")?;
                options.save_dir = Some(PathBuf::from(dir));
                i += 1;
            }
            "--case" => {
                let file = args.get(i + 1).ok_or("--case needs a JSON file")?;
                options.case_file = Some(PathBuf::from(file));
                i += 1;
            }
            "--window" => {
                let n = args.get(i + 1).ok_or("--window needs a number")?;
                let n = n
                    .parse()
                    .map_err(|_| format!("--window expects a number, got '{n}'"))?;
                options.window = Some(n);
                i += 1;
            }
            other => return Err(format!("unknown option '{other}'")),
        }
        i += 1;
    }

    Ok(options)
}

fn print_help() {
    println!("Noir - an AI-narrated detective investigation");
    println!();
    println!("USAGE:");
    println!("  noir [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help          Show this help message");
    println!("  --save-dir <DIR>    Where case files are stored (default: ./saves)");
    println!("  --case <FILE>       Load the case from a JSON file");
    println!("  --window <N>        Turns of history the assistant sees (default: 6)");
    println!();
    println!("ENVIRONMENT:");
    println!("  GEMINI_API_KEY      Gemini API key (API_KEY is also accepted)");
    println!("  NOIR_HISTORY_WINDOW, NOIR_SAVE_DIR, NOIR_MODEL, NOIR_IMAGE_MODEL");
    println!("  RUST_LOG            Log filter for stderr (default: warn)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("noir")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(parse_args(&args(&[])).unwrap(), Options::default());
    }

    #[test]
    fn test_parse_all_options() {
        let options = parse_args(&args(&[
            "--save-dir",
            "/tmp/cabinet",
            "--case",
            "case.json",
            "--window",
            "4",
        ]))
        .unwrap();

        assert_eq!(options.save_dir, Some(PathBuf::from("/tmp/cabinet")));
        assert_eq!(options.case_file, Some(PathBuf::from("case.json")));
        assert_eq!(options.window, Some(4));
        assert!(!options.help);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&["--window"])).is_err());
        assert!(parse_args(&args(&["--window", "lots"])).is_err());
        assert!(parse_args(&args(&["--verbose"])).is_err());
    }
}
