//! XML <-> JSON converter driven by a node-type module
//!
//! Usage:
//!   cargo run --example roundtrip -- --schema example-interfaces.json \
//!       --top interfaces --input config.xml --to json
//!
//! Optional `--set PATH=VALUE` arguments are applied to the decoded tree
//! before it is written out. Set `RUST_LOG=rust_yangbind=trace` to watch the
//! codecs work.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use rust_yangbind::json::{self, JsonMode};
use rust_yangbind::xml::{self, XmlOptions};
use rust_yangbind::{BindError, DataTree, PathHelper, SchemaModule};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Xml,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "roundtrip")]
#[command(about = "Convert YANG instance data between NETCONF XML and RESTCONF JSON")]
struct Args {
    /// Path to the node-type module (.json)
    #[arg(short, long)]
    schema: PathBuf,

    /// Top-level node the input document carries
    #[arg(short, long)]
    top: String,

    /// Input document; the format follows from its first character
    #[arg(short, long)]
    input: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    to: Format,

    /// Unqualified JSON with keyed list objects instead of RFC 7951
    #[arg(long)]
    legacy_json: bool,

    /// Assignments applied before writing, e.g. "/system/hostname=r1"
    #[arg(long = "set", value_name = "PATH=VALUE")]
    sets: Vec<String>,

    /// Compact output
    #[arg(long)]
    compact: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Split `PATH=VALUE` at the first `=` past the last key predicate
fn split_assignment(assignment: &str) -> rust_yangbind::Result<(&str, &str)> {
    let from = assignment.rfind(']').map_or(0, |i| i + 1);
    assignment[from..]
        .find('=')
        .map(|i| (&assignment[..from + i], &assignment[from + i + 1..]))
        .ok_or_else(|| BindError::SchemaViolation(format!("expected PATH=VALUE, got '{}'", assignment)))
}

fn run(args: &Args) -> rust_yangbind::Result<String> {
    let module = Arc::new(SchemaModule::from_file(&args.schema)?);
    let input = std::fs::read_to_string(&args.input)?;
    let mode = if args.legacy_json { JsonMode::Default } else { JsonMode::Ietf };

    let mut tree: DataTree = if input.trim_start().starts_with('<') {
        xml::decode(&input, &module, &args.top)?
    } else {
        json::decode_with(&input, &module, &args.top, mode)?
    };

    for assignment in &args.sets {
        let (path, value) = split_assignment(assignment)?;
        tree.set(path, value)?;
    }
    tree.validate()?;

    match (args.to, args.compact) {
        (Format::Xml, compact) => {
            let helper = PathHelper::new(Arc::clone(&module))?;
            xml::to_string(&helper, &tree, XmlOptions { pretty: !compact })
        }
        (Format::Json, true) => json::to_string(&tree, mode),
        (Format::Json, false) => json::to_string_pretty(&tree, mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_assignment_skips_key_predicates() {
        assert_eq!(
            split_assignment("/interfaces/interface[name='eth0']/mtu=9000").unwrap(),
            ("/interfaces/interface[name='eth0']/mtu", "9000")
        );
        assert_eq!(
            split_assignment("/interfaces/interface[name='a=b']/description=x=y").unwrap(),
            ("/interfaces/interface[name='a=b']/description", "x=y")
        );
        assert_eq!(split_assignment("/maintenance/window=").unwrap(), ("/maintenance/window", ""));
        assert!(split_assignment("/interfaces/interface[name='eth0']").is_err());
    }
}
