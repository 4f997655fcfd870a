use clap::{arg, command};
use std::path::PathBuf;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub const DEFAULT_SEED: &str = "W4398186459";

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("bibcrawl")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("bibcrawl")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Enable debug logging (RUST_LOG takes precedence)")
                .required(false)
                .conflicts_with("quiet"),
        )
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Breadth-first crawl of the OpenAlex graph from a seed. Resumes from the \
                checkpoint in the output directory when one exists.",
                )
                .arg(
                    arg!(<METHOD>)
                        .help("Traversal to run")
                        .value_parser(["citation", "author", "author_limit", "author_graph"]),
                )
                .arg(
                    arg!(-s --"seed" <ID>)
                        .required(false)
                        .help("Seed work (W...) or author (A...) ID; full OpenAlex URLs are accepted")
                        .default_value(DEFAULT_SEED),
                )
                .arg(
                    arg!(-l --"limit" <N>)
                        .required(false)
                        .help("Stop once the limit counter reaches N")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("100000"),
                )
                .arg(
                    arg!(--"limit-on" <COUNTER>)
                        .required(false)
                        .help("Counter the limit applies to (default depends on the method)")
                        .value_parser(["works", "nodes", "collected"]),
                )
                .arg(
                    arg!(-c --"checkpoint-every" <N>)
                        .required(false)
                        .help("Write a checkpoint every N processed nodes")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(-b --"batch-size" <N>)
                        .required(false)
                        .help("Maximum frontier IDs fetched per batch")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-o --"output-dir" <PATH>)
                        .required(false)
                        .help("Where the database and checkpoint live (default: <seed>_<method>_database)"),
                )
                .arg(
                    arg!(--"config" <PATH>)
                        .required(false)
                        .help("TOML file with [fetch] and [traversal] settings"),
                )
                .arg(
                    arg!(--"mailto" <EMAIL>)
                        .required(false)
                        .help("Contact address sent to OpenAlex for the polite pool"),
                )
                .arg(
                    arg!(--"requeue-failed" <ATTEMPTS>)
                        .required(false)
                        .help("Retry IDs of failed batches up to ATTEMPTS times instead of dropping them")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(--"no-progress")
                        .required(false)
                        .help("Disable the progress bar")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("status")
                .about("Summarize the checkpoint and run history of an output directory")
                .arg(
                    arg!(<DIR>)
                        .help("Output directory of a crawl")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("coauthors")
                .about("Rank authors by number of distinct co-authors in a crawl database")
                .arg(
                    arg!(<PATH>)
                        .help("Output directory of a crawl, or the database file itself")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-t --"top" <N>)
                        .required(false)
                        .help("Only list the N best-connected authors")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}
