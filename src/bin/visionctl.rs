//! visionctl - operator client for a running visiond
//!
//! Sends command lines to the daemon's control REPL and prints the
//! response lines. One command can be given on the command line; with
//! none, lines are read from stdin until EOF.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address of the daemon's control REPL.
    #[arg(long, default_value = "127.0.0.1:8767")]
    addr: String,
    /// Command and arguments to send (reads stdin when omitted).
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let stream = TcpStream::connect(&args.addr)
        .with_context(|| format!("failed to connect to visiond at {}", args.addr))?;
    stream.set_read_timeout(Some(RESPONSE_TIMEOUT))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    if args.command.is_empty() {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            println!("{}", exchange(&mut writer, &mut reader, &line)?);
        }
        return Ok(());
    }

    let line = args.command.join(" ");
    let response = exchange(&mut writer, &mut reader, &line)?;
    println!("{response}");
    if !response.starts_with("ok") {
        std::process::exit(1);
    }
    Ok(())
}

fn exchange(
    writer: &mut TcpStream,
    reader: &mut BufReader<TcpStream>,
    line: &str,
) -> Result<String> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    let mut response = String::new();
    let n = reader.read_line(&mut response)?;
    if n == 0 {
        return Err(anyhow!("daemon closed the connection"));
    }
    Ok(response.trim_end().to_string())
}
