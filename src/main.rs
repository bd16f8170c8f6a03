//! epub-extract - EPUB metadata and outline extractor

use std::process::ExitCode;

use clap::Parser;

use epub_extract::epub::EpubDoc;

#[derive(Parser)]
#[command(name = "epub-extract")]
#[command(version, about = "Extract EPUB metadata and table of contents as JSON", long_about = None)]
#[command(after_help = "EXAMPLES:
    epub-extract book.epub              Print the extraction record
    epub-extract --pretty book.epub     Same, pretty-printed")]
struct Cli {
    /// Input EPUB file
    #[arg(value_name = "EPUB")]
    input: Option<String>,

    /// Pretty-print the JSON record
    #[arg(short, long)]
    pretty: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing operand is a usage error, not a crash: emit an empty record
    // and report failure through the exit status
    let Some(input) = cli.input else {
        println!("{{}}");
        return ExitCode::FAILURE;
    };

    match run(&input, cli.pretty) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(input: &str, pretty: bool) -> Result<(), String> {
    let doc = EpubDoc::new(input).map_err(|e| e.to_string())?;
    let summary = doc.summary();

    let record = if pretty {
        serde_json::to_string_pretty(&summary)
    } else {
        serde_json::to_string(&summary)
    }
    .map_err(|e| e.to_string())?;

    println!("{record}");
    Ok(())
}
