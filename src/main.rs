//! Thin CLI layer: parse args, styled output, and call into crest-core.
//! Crash-proof: panic caught and reported; all errors return Result.

use clap::{Arg, ArgAction, Command};
use colored::Colorize;
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

// ---- UI helpers (no-op when stdout isn't a TTY) ----

fn use_color() -> bool {
    std::io::stdout().is_terminal() && env::var("NO_COLOR").unwrap_or_default().is_empty()
}

fn success(msg: &str) {
    if use_color() {
        println!("{}", msg.green());
    } else {
        println!("{}", msg);
    }
}

fn error(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{}", msg);
    }
}

fn dim(msg: &str) {
    if use_color() {
        println!("{}", msg.dimmed());
    } else {
        println!("{}", msg);
    }
}

fn run() -> Result<(), String> {
    let matches = Command::new("crest")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Push detached signatures to a content-addressable registry and link them to the signed artifact")
        .after_help(
            "Examples:\n  crest push registry.example.com/apps/web:v1.2\n  crest push localhost:5000/lib/tool@sha256:… --signature release.sig --plain-http\n  crest cache list",
        )
        .subcommand(
            Command::new("push")
                .about("Push signatures for an artifact and link them to its manifest")
                .arg(
                    Arg::new("reference")
                        .required(false)
                        .help("Artifact reference: <registry>/<repository>[:tag][@digest]"),
                )
                .arg(
                    Arg::new("signature")
                        .short('s')
                        .long("signature")
                        .action(ArgAction::Append)
                        .help("Signature payload file; repeatable, pushed in the given order (default: all cached signatures for the artifact)"),
                )
                .arg(
                    Arg::new("username")
                        .short('u')
                        .long("username")
                        .help("Registry username (Basic auth; requires --password)"),
                )
                .arg(
                    Arg::new("password")
                        .short('p')
                        .long("password")
                        .help("Registry password (Basic auth; requires --username)"),
                )
                .arg(
                    Arg::new("plain-http")
                        .long("plain-http")
                        .action(ArgAction::SetTrue)
                        .help("Use plain HTTP instead of HTTPS (or set CREST_PLAIN_HTTP=1)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output linked descriptors as machine-readable JSON"),
                ),
        )
        .subcommand(
            Command::new("cache")
                .about("Manage the local signature cache")
                .subcommand(Command::new("list").about("List cached (subject, signature) digest pairs"))
                .subcommand(Command::new("size").about("Show cache entry count and total size"))
                .subcommand(Command::new("clean").about("Remove all cached signatures")),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("push", sub_m)) => {
            let reference = sub_m
                .get_one::<String>("reference")
                .map(|s| s.as_str())
                .unwrap_or("");
            let signature_paths: Vec<PathBuf> = sub_m
                .get_many::<String>("signature")
                .map(|v| v.map(PathBuf::from).collect())
                .unwrap_or_default();
            let opts = crest_core::PushOptions {
                signature_paths,
                username: sub_m.get_one::<String>("username").cloned(),
                password: sub_m.get_one::<String>("password").cloned(),
                plain_http: sub_m.get_flag("plain-http")
                    || crest_core::default_plain_http(Path::new(".")),
            };
            let deadline = crest_core::command_deadline(Path::new("."));

            if sub_m.get_flag("json") {
                let mut linked: Vec<crest_core::Descriptor> = Vec::new();
                crest_core::run_push(&deadline, reference, &opts, |desc| {
                    linked.push(desc.clone())
                })
                .map_err(|e| e.to_string())?;
                let out = serde_json::to_string_pretty(&linked).map_err(|e| e.to_string())?;
                println!("{}", out);
            } else {
                crest_core::run_push(&deadline, reference, &opts, |desc| {
                    println!("{}", desc.digest)
                })
                .map_err(|e| e.to_string())?;
            }
        }
        Some(("cache", sub_m)) => match sub_m.subcommand() {
            Some(("list", _)) => {
                let pairs = crest_core::list_signatures(&crest_core::cache_dir())?;
                for (subject, signature) in pairs {
                    println!("{} {}", subject, signature);
                }
            }
            Some(("size", _)) => {
                let root = crest_core::cache_dir();
                let count = crest_core::list_signatures(&root)?.len();
                let bytes = crest_core::cache_size_bytes(&root);
                println!("{} signatures, {} bytes", count, bytes);
            }
            Some(("clean", _)) => {
                crest_core::cache_clean(&crest_core::cache_dir())?;
                crest_core::log("Signature cache cleaned.");
                success("Cache cleaned.");
            }
            _ => {
                dim("Run `crest cache --help` for cache commands.");
            }
        },
        _ => {
            if use_color() {
                println!("{}", "crest".bright_cyan().bold());
                dim("Push detached signatures to a registry and link them to the signed artifact.");
            } else {
                println!("crest — push detached signatures to a registry");
            }
            dim("\nRun `crest --help` for details.");
        }
    }

    Ok(())
}

fn main() {
    if !use_color() {
        colored::control::set_override(false);
    }

    let code = match std::panic::catch_unwind(run) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error(&e);
            1
        }
        Err(_) => {
            error("An unexpected error occurred. Please report this issue.");
            1
        }
    };
    std::process::exit(code);
}
