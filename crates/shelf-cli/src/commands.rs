use std::fmt::Write as _;
use std::io::{self, BufRead, Write as _};
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use shelf_codec::Value;
use shelf_store::{BackendKind, Store, StoreConfig};

use crate::cli::*;

/// Config file picked up from the working directory when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "shelf.toml";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(cli.config.as_deref(), cli.root.as_deref())?;
    if let Command::Config = cli.command {
        return cmd_config(&config, cli.format);
    }

    let store = config
        .open_store()
        .with_context(|| format!("failed to open store at {}", config.root.display()))?;
    match cli.command {
        Command::Sessions => cmd_sessions(&store, cli.format),
        Command::Types(args) => cmd_types(&store, args, cli.format),
        Command::Ls(args) => cmd_ls(&store, args, cli.format),
        Command::Dump(args) => cmd_dump(&store, args, cli.format),
        Command::Rm(args) => cmd_rm(&store, args),
        Command::Drop(args) => cmd_drop(&store, args),
        Command::Config => Ok(()),
    }
}

fn resolve_config(path: Option<&Path>, root: Option<&Path>) -> anyhow::Result<StoreConfig> {
    let mut config = match path {
        Some(path) => StoreConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => StoreConfig::load(DEFAULT_CONFIG_FILE)?,
        None => StoreConfig::default(),
    };
    if let Some(root) = root {
        config.backend = BackendKind::Local;
        config.root = root.to_path_buf();
    }
    Ok(config)
}

fn cmd_config(config: &StoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}

fn cmd_sessions(store: &Store, format: OutputFormat) -> anyhow::Result<()> {
    let sessions = store.list_sessions()?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
    } else if sessions.is_empty() {
        println!("No sessions.");
    } else {
        for session in &sessions {
            println!("{}", session.yellow());
        }
    }
    Ok(())
}

fn cmd_types(store: &Store, args: SessionArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut counts = Vec::new();
    for entity_type in store.list_entity_types(&args.session)? {
        let count = store.list_ids(&args.session, &entity_type)?.len();
        counts.push((entity_type, count));
    }
    if format == OutputFormat::Json {
        let map: serde_json::Map<String, serde_json::Value> = counts
            .into_iter()
            .map(|(entity_type, count)| (entity_type, count.into()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else if counts.is_empty() {
        println!("Session {} is empty.", args.session.yellow());
    } else {
        for (entity_type, count) in &counts {
            println!("{:<24} {}", entity_type.cyan(), count.to_string().bold());
        }
    }
    Ok(())
}

fn cmd_ls(store: &Store, args: TypeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let ids = store.list_ids(&args.session, &args.entity_type)?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&ids)?);
    } else if ids.is_empty() {
        println!("No {} records.", args.entity_type.cyan());
    } else {
        for id in &ids {
            println!("{id}");
        }
    }
    Ok(())
}

fn cmd_dump(store: &Store, args: RecordArgs, format: OutputFormat) -> anyhow::Result<()> {
    let bytes = store.read_raw(&args.session, &args.entity_type, &args.id)?;
    let value = shelf_codec::decode_value(&bytes).with_context(|| {
        format!(
            "record {}/{}/{} is not a valid frame",
            args.session, args.entity_type, args.id
        )
    })?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&value)?),
        OutputFormat::Text => {
            println!("{} {} ({} bytes)", "Record".bold(), args.id.yellow(), bytes.len());
            print!("{}", render(&value));
        }
    }
    Ok(())
}

fn cmd_rm(store: &Store, args: RecordArgs) -> anyhow::Result<()> {
    store.delete_raw(&args.session, &args.entity_type, &args.id)?;
    println!(
        "{} Removed {} {} from {}",
        "✓".green().bold(),
        args.entity_type.cyan(),
        args.id.yellow(),
        args.session.bold()
    );
    Ok(())
}

fn cmd_drop(store: &Store, args: DropArgs) -> anyhow::Result<()> {
    if !store.session_exists(&args.session)? {
        anyhow::bail!("session {} does not exist", args.session);
    }
    if !args.yes && !confirm(&format!("Drop session {} and all of its records?", args.session))? {
        println!("Aborted.");
        return Ok(());
    }
    store.drop_session(&args.session)?;
    println!("{} Dropped session {}", "✓".green().bold(), args.session.yellow());
    Ok(())
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

// ---- Text rendering ----

/// Render a schema-less value as an indented tree.
fn render(value: &Value) -> String {
    let mut out = String::new();
    render_into(&mut out, value, 0);
    out.push('\n');
    out
}

fn render_into(out: &mut String, value: &Value, depth: usize) {
    let pad = "  ".repeat(depth + 1);
    let close = "  ".repeat(depth);
    // Writing to a String cannot fail.
    let _ = match value {
        Value::Null => write!(out, "null"),
        Value::Text { type_name, text } if type_name == "string" => write!(out, "{text:?}"),
        Value::Text { text, .. } => write!(out, "{text}"),
        Value::Enum { type_name, variant } => write!(out, "{type_name}::{variant}"),
        Value::Array { type_name, items } | Value::List { type_name, items } => {
            if items.is_empty() {
                write!(out, "{type_name} []")
            } else {
                out.push_str(type_name);
                out.push_str(" [\n");
                for item in items {
                    out.push_str(&pad);
                    render_into(out, item, depth + 1);
                    out.push_str(",\n");
                }
                write!(out, "{close}]")
            }
        }
        Value::Record {
            type_name,
            fields,
            truncated,
        } => {
            out.push_str(type_name);
            if fields.is_empty() {
                out.push_str(" {}");
            } else {
                out.push_str(" {\n");
                for (name, field) in fields {
                    out.push_str(&pad);
                    out.push_str(name);
                    out.push_str(": ");
                    render_into(out, field, depth + 1);
                    out.push_str(",\n");
                }
                out.push_str(&close);
                out.push('}');
            }
            if *truncated {
                out.push_str(" (truncated)");
            }
            Ok(())
        }
        Value::Shared { id, value } => {
            let _ = write!(out, "&{id} ");
            render_into(out, value, depth);
            Ok(())
        }
        Value::BackRef { id } => write!(out, "*{id}"),
    };
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    use shelf_codec::persist_record;

    use super::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Item {
        name: String,
        qty: u32,
        tags: Vec<String>,
    }

    persist_record!(Item { name, qty, tags });

    fn value_of<T: shelf_codec::Persist>(value: &T) -> Value {
        shelf_codec::decode_value(&shelf_codec::encode(value).unwrap().bytes).unwrap()
    }

    #[test]
    fn render_record() {
        let item = Item {
            name: "tea".into(),
            qty: 3,
            tags: vec![],
        };
        assert_eq!(
            render(&value_of(&item)),
            "Item {\n  name: \"tea\",\n  qty: 3,\n  tags: list<string> [],\n}\n"
        );
    }

    #[test]
    fn render_nested_list() {
        let tags = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            render(&value_of(&tags)),
            "list<string> [\n  \"a\",\n  \"b\",\n]\n"
        );
    }

    #[test]
    fn render_shared_nodes() {
        let node = Rc::new(RefCell::new(7u8));
        let value = value_of(&vec![Rc::clone(&node), node]);
        let text = render(&value);
        assert!(text.contains("&0 7"));
        assert!(text.contains("*0"));
    }

    #[test]
    fn render_truncated_record() {
        let item = Item {
            name: "tea".into(),
            qty: 3,
            tags: vec![],
        };
        let bytes = shelf_codec::encode(&item).unwrap().bytes;
        let value = shelf_codec::decode_value(&bytes[..bytes.len() - 2]).unwrap();
        assert!(render(&value).trim_end().ends_with("(truncated)"));
    }

    #[test]
    fn root_flag_forces_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelf.toml");
        std::fs::write(&path, "backend = \"memory\"\nstaged_saves = false\n").unwrap();

        let config = resolve_config(Some(&path), None).unwrap();
        assert_eq!(config.backend, BackendKind::Memory);

        let config = resolve_config(Some(&path), Some(Path::new("/srv/shelf"))).unwrap();
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.root, PathBuf::from("/srv/shelf"));
        assert!(!config.staged_saves);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_config(Some(&dir.path().join("nope.toml")), None).is_err());
    }
}
