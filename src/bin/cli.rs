//! ringkv CLI Client
//!
//! Sends one command and prints the reply.

use std::net::TcpStream;
use std::process::ExitCode;

use bytes::BytesMut;
use clap::Parser;
use ringkv::protocol::{read_frame, write_frame, WireValue};

/// ringkv CLI
#[derive(Parser, Debug)]
#[command(name = "ringkv-cli")]
#[command(about = "CLI for the ringkv key-value server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    server: String,

    /// Command and its arguments, e.g. `SET foo bar`
    #[arg(required = true, num_args = 1..)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(failed) if failed => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("(error) {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the server answered with an error
fn run(args: &Args) -> ringkv::Result<bool> {
    let mut stream = TcpStream::connect(&args.server)?;

    let request: Vec<WireValue> = args
        .command
        .iter()
        .map(|word| WireValue::bulk(word.clone().into_bytes()))
        .collect();
    // Always send an array, even for a single word
    write_frame(&mut stream, &[WireValue::Array(request)])?;

    let mut buf = BytesMut::new();
    let reply = read_frame(&mut stream, &mut buf)?.unwrap_or_default();

    if reply.is_empty() {
        println!("(empty array)");
        return Ok(false);
    }

    let mut failed = false;
    for (i, value) in reply.iter().enumerate() {
        let line = render(value);
        failed |= value.is_error();
        if reply.len() > 1 {
            println!("{}) {}", i + 1, line);
        } else {
            println!("{}", line);
        }
    }
    Ok(failed)
}

fn render(value: &WireValue) -> String {
    match value {
        WireValue::SimpleStatus(s) => s.clone(),
        WireValue::Error(e) => format!("(error) {}", e),
        WireValue::Integer(n) => format!("(integer) {}", n),
        WireValue::BulkBytes(Some(b)) => format!("\"{}\"", String::from_utf8_lossy(b)),
        WireValue::BulkBytes(None) => "(nil)".to_string(),
        WireValue::Array(items) => items.iter().map(render).collect::<Vec<_>>().join(" "),
    }
}
