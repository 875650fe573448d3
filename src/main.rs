use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use mdpatch::{
    add_line_numbers, apply_operation, update_properties, DocumentClient, PatchOperation,
    PatchOutcome, RangeEnd,
};
use serde_json::{Map, Value};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mdpatch")]
#[command(about = "Targeted Markdown patching for remote documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Base URL of the document store API (or MDPATCH_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// API token (or MDPATCH_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Enable diagnostic logging on stderr (filter with RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a document's Markdown
    Read {
        /// Document id (dashed or undashed) or a share URL
        document: String,

        /// Prefix each line with its aligned 1-based number
        #[arg(long)]
        numbered: bool,
    },

    /// Replace an inclusive 1-indexed line range
    Replace {
        /// Document id (dashed or undashed) or a share URL
        document: String,

        /// First line to replace; one past the last line inserts after it
        #[arg(short, long)]
        start: usize,

        /// Last line to replace (omit to replace through the end)
        #[arg(short, long)]
        end: Option<usize>,

        #[command(flatten)]
        content: ContentSource,

        #[command(flatten)]
        write: WriteFlags,
    },

    /// Apply a unified diff
    Apply {
        /// Document id (dashed or undashed) or a share URL
        document: String,

        /// Diff file to apply (stdin if omitted)
        #[arg(short, long)]
        patch_file: Option<PathBuf>,

        #[command(flatten)]
        write: WriteFlags,
    },

    /// Add content after the existing text
    Append {
        /// Document id (dashed or undashed) or a share URL
        document: String,

        #[command(flatten)]
        content: ContentSource,

        #[command(flatten)]
        write: WriteFlags,
    },

    /// Add content before the existing text
    Prepend {
        /// Document id (dashed or undashed) or a share URL
        document: String,

        #[command(flatten)]
        content: ContentSource,

        #[command(flatten)]
        write: WriteFlags,
    },

    /// Update document properties (read, merge once, write)
    Props {
        /// Document id (dashed or undashed) or a share URL
        document: String,

        /// KEY=VALUE pair; repeatable. Values parse as JSON when they
        /// can, otherwise as strings; an empty value removes the key
        #[arg(short, long = "set", value_name = "KEY=VALUE", required = true)]
        set: Vec<String>,
    },
}

#[derive(Args)]
struct ContentSource {
    /// Replacement content (an empty string deletes the range)
    #[arg(short, long, conflicts_with = "content_file")]
    content: Option<String>,

    /// Read content from a file (stdin if neither flag is given)
    #[arg(long)]
    content_file: Option<PathBuf>,
}

impl ContentSource {
    fn resolve(self) -> Result<String> {
        if let Some(content) = self.content {
            return Ok(content);
        }
        if let Some(path) = self.content_file {
            return Ok(fs::read_to_string(&path).map_err(|e| {
                anyhow::anyhow!("could not read content file {}: {e}", path.display())
            })?);
        }
        read_stdin()
    }
}

#[derive(Args)]
struct WriteFlags {
    /// Compute and show the diff without writing anything back
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show a colored diff after a successful write
    #[arg(short, long)]
    diff: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        init_tracing();
    }

    let client = build_client(&cli)?;

    match cli.command {
        Commands::Read { document, numbered } => cmd_read(&client, &document, numbered).await,

        Commands::Replace {
            document,
            start,
            end,
            content,
            write,
        } => {
            let operation = PatchOperation::ReplaceLines {
                start,
                end: end.map_or(RangeEnd::End, RangeEnd::Line),
                content: content.resolve()?,
            };
            cmd_patch(&client, &document, operation, write).await
        }

        Commands::Apply {
            document,
            patch_file,
            write,
        } => {
            let patch = match patch_file {
                Some(path) => fs::read_to_string(&path).map_err(|e| {
                    anyhow::anyhow!("could not read patch file {}: {e}", path.display())
                })?,
                None => read_stdin()?,
            };
            cmd_patch(&client, &document, PatchOperation::ApplyDiff { patch }, write).await
        }

        Commands::Append {
            document,
            content,
            write,
        } => {
            let operation = PatchOperation::Append {
                content: content.resolve()?,
            };
            cmd_patch(&client, &document, operation, write).await
        }

        Commands::Prepend {
            document,
            content,
            write,
        } => {
            let operation = PatchOperation::Prepend {
                content: content.resolve()?,
            };
            cmd_patch(&client, &document, operation, write).await
        }

        Commands::Props { document, set } => cmd_props(&client, &document, &set).await,
    }
}

/// Resolve API configuration: explicit flags first, then environment.
fn build_client(cli: &Cli) -> Result<DocumentClient> {
    let api_url = cli
        .api_url
        .clone()
        .or_else(|| env::var("MDPATCH_API_URL").ok())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "{}\n{}\n  {}\n  {}",
                "No API URL configured.".red(),
                "Try one of:".bold(),
                "1. Pass it explicitly: mdpatch --api-url https://docs.example.com read <id>",
                "2. Set the environment variable: export MDPATCH_API_URL=https://docs.example.com"
            )
        })?;

    let token = cli
        .token
        .clone()
        .or_else(|| env::var("MDPATCH_TOKEN").ok())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "{}\n{}\n  {}\n  {}",
                "No API token configured.".red(),
                "Try one of:".bold(),
                "1. Pass it explicitly: mdpatch --token <token> read <id>",
                "2. Set the environment variable: export MDPATCH_TOKEN=<token>"
            )
        })?;

    Ok(DocumentClient::new(api_url, token)?)
}

async fn cmd_read(client: &DocumentClient, document: &str, numbered: bool) -> Result<()> {
    let doc = client.get_document(document).await?;

    if numbered {
        println!("{}", add_line_numbers(&doc.markdown));
    } else {
        println!("{}", doc.markdown);
    }
    Ok(())
}

/// Shared flow for every edit subcommand: fetch, patch, gate, write back.
async fn cmd_patch(
    client: &DocumentClient,
    document: &str,
    operation: PatchOperation,
    write: WriteFlags,
) -> Result<()> {
    // 1. Fetch the current content
    let doc = client.get_document(document).await?;
    let name = doc.title.as_deref().unwrap_or(&doc.id);

    // 2. Run the engine; nothing has been written yet
    let outcome = match apply_operation(&doc.markdown, &operation) {
        Ok(outcome) => outcome,
        Err(error) => {
            eprintln!("{} {}", "✗".red(), error);
            if error.is_conflict() {
                eprintln!(
                    "  {}",
                    "CONFLICT: the document changed since the diff was generated".red()
                );
                eprintln!("  Re-read with: mdpatch read {document} --numbered");
            }
            std::process::exit(1);
        }
    };

    if outcome.lines_changed == 0 {
        println!("{} {}: no changes", "⊙".yellow(), name);
        return Ok(());
    }

    // 3. Dry-run gate
    if write.dry_run {
        println!("{}", "[DRY RUN - nothing will be written]".cyan());
        display_diff(&doc.markdown, &outcome.patched);
        println!();
        summarize(name, &outcome, true);
        return Ok(());
    }

    // 4. Write the patched content back
    client.put_document(document, &outcome.patched).await?;
    summarize(name, &outcome, false);

    if write.diff {
        display_diff(&doc.markdown, &outcome.patched);
    }
    Ok(())
}

async fn cmd_props(client: &DocumentClient, document: &str, pairs: &[String]) -> Result<()> {
    let updates = parse_property_updates(pairs)?;
    let merged = update_properties(client, document, &updates).await?;

    println!(
        "{} {} propert{} set ({} total)",
        "✓".green(),
        updates.len(),
        if updates.len() == 1 { "y" } else { "ies" },
        merged.len()
    );
    Ok(())
}

fn parse_property_updates(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut updates = Map::new();

    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            anyhow::bail!("--set expects KEY=VALUE, got `{pair}`");
        };
        if key.trim().is_empty() {
            anyhow::bail!("--set expects a non-empty key in `{pair}`");
        }

        let value = if raw.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        };
        updates.insert(key.to_string(), value);
    }

    Ok(updates)
}

fn summarize(name: &str, outcome: &PatchOutcome, dry_run: bool) {
    let verb = if dry_run { "would change" } else { "changed" };
    println!(
        "{} {}: {} {} line{}",
        "✓".green(),
        name,
        verb,
        outcome.lines_changed,
        if outcome.lines_changed == 1 { "" } else { "s" }
    );
}

/// Show a colored line diff between original and patched content.
fn display_diff(original: &str, modified: &str) {
    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{change}").red(),
            ChangeTag::Insert => format!("+{change}").green(),
            ChangeTag::Equal => format!(" {change}").normal(),
        };
        print!("{sign}");
    }
    if !modified.ends_with('\n') {
        println!();
    }
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| anyhow::anyhow!("could not read content from stdin: {e}"))?;
    Ok(buffer)
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mdpatch=debug")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn property_pairs_parse_json_then_fall_back_to_strings() {
        let updates = parse_property_updates(&[
            "count=42".to_string(),
            "done=true".to_string(),
            "title=Hello world".to_string(),
        ])
        .unwrap();

        assert_eq!(updates["count"], json!(42));
        assert_eq!(updates["done"], json!(true));
        assert_eq!(updates["title"], json!("Hello world"));
    }

    #[test]
    fn empty_value_maps_to_a_removal() {
        let updates = parse_property_updates(&["owner=".to_string()]).unwrap();
        assert_eq!(updates["owner"], Value::Null);
    }

    #[test]
    fn pair_without_equals_is_rejected() {
        assert!(parse_property_updates(&["no-separator".to_string()]).is_err());
        assert!(parse_property_updates(&["=value".to_string()]).is_err());
    }
}
