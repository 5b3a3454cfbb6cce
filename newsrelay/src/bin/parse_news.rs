use std::io::Read;
use std::process::ExitCode;

use newsrelay::parser;

/// Parse a `/news` payload offline and print the decoded fields as JSON.
///
/// Usage: parse_news '"Title" "Body" https://example.com/img.png'
/// With no argument the payload is read from stdin.
fn main() -> ExitCode {
    let payload = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("failed to read stdin: {}", e);
                return ExitCode::FAILURE;
            }
            buf
        }
    };

    match parser::parse(&payload) {
        Ok(parsed) => {
            match serde_json::to_string_pretty(&parsed) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("failed to encode result: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {} ({})", e, e.code());
            ExitCode::from(2)
        }
    }
}
