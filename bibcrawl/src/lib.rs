pub mod commands;
pub mod handlers;

pub use handlers::{
    CrawlArgs, build_config, build_options, generate_status_report, resolve_database_path,
    resolve_output_dir, summary_lines,
};
