use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use inventory_api::{InventoryApi, NewItemRequest, NewUserRequest};
use inventory_core::{NumericInput, PackagingRequest, TextInput};
use serde_json::Value;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "inv")]
#[command(about = "Inventory packaging CLI")]
struct Cli {
    #[arg(long, env = "INVENTORY_DB", default_value = "./inventory.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    Item {
        #[command(subcommand)]
        command: ItemCommand,
    },
    Packaging {
        #[command(subcommand)]
        command: PackagingCommand,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Migrate(DbMigrateArgs),
    IntegrityCheck,
}

#[derive(Debug, Args)]
struct DbMigrateArgs {
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    Add(UserAddArgs),
    Show(IdArgs),
}

#[derive(Debug, Args)]
struct UserAddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: Option<String>,
}

#[derive(Debug, Args)]
struct IdArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Subcommand)]
enum ItemCommand {
    Add(ItemAddArgs),
    Show(IdArgs),
    List,
}

#[derive(Debug, Args)]
struct ItemAddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    sku: Option<String>,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Debug, Subcommand)]
enum PackagingCommand {
    Set(PackagingSetArgs),
    Clear(PackagingClearArgs),
    History(PackagingHistoryArgs),
}

// Amounts stay as text so the CLI and HTTP bodies share one validation path.
#[derive(Debug, Args)]
struct PackagingSetArgs {
    #[arg(long)]
    item: String,
    #[arg(long = "type")]
    packaging_type: String,
    #[arg(long)]
    amount: String,
    #[arg(long)]
    unit: String,
    #[arg(long)]
    pack_size: Option<String>,
    #[arg(long)]
    pack_unit: Option<String>,
    #[arg(long)]
    user: String,
}

#[derive(Debug, Args)]
struct PackagingClearArgs {
    #[arg(long)]
    item: String,
    #[arg(long = "type")]
    packaging_type: String,
}

#[derive(Debug, Args)]
struct PackagingHistoryArgs {
    #[arg(long)]
    item: String,
    #[arg(long, default_value_t = false)]
    active_only: bool,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn emit_serialized<T: serde::Serialize>(value: &T, what: &str) -> Result<()> {
    emit_json(serde_json::to_value(value).with_context(|| format!("failed to serialize {what}"))?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = InventoryApi::new(cli.db);
    match cli.command {
        Command::Db { command } => run_db(command, &api),
        Command::User { command } => run_user(command, &api),
        Command::Item { command } => run_item(command, &api),
        Command::Packaging { command } => run_packaging(command, &api),
    }
}

fn run_db(command: DbCommand, api: &InventoryApi) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => {
            let status = api.schema_status()?;
            emit_json(serde_json::json!({
                "current_version": status.current_version,
                "target_version": status.target_version,
                "pending_versions": status.pending_versions,
                "up_to_date": status.pending_versions.is_empty(),
                "inferred_from_legacy": status.inferred_from_legacy
            }))
        }
        DbCommand::Migrate(args) => {
            let result = api.migrate(args.dry_run)?;
            emit_serialized(&result, "migration result")
        }
        DbCommand::IntegrityCheck => {
            let report = api.integrity_check()?;
            emit_serialized(&report, "integrity report")
        }
    }
}

fn run_user(command: UserCommand, api: &InventoryApi) -> Result<()> {
    let user = match command {
        UserCommand::Add(args) => {
            api.create_user(NewUserRequest { name: args.name, email: args.email })?
        }
        UserCommand::Show(args) => api.get_user(&args.id)?,
    };
    emit_serialized(&user, "user")
}

fn run_item(command: ItemCommand, api: &InventoryApi) -> Result<()> {
    match command {
        ItemCommand::Add(args) => {
            let item = api.create_item(NewItemRequest {
                name: args.name,
                sku: args.sku,
                description: args.description,
            })?;
            emit_serialized(&item, "item")
        }
        ItemCommand::Show(args) => emit_serialized(&api.get_item(&args.id)?, "item"),
        ItemCommand::List => {
            let items = api.list_items()?;
            emit_json(serde_json::json!({
                "count": items.len(),
                "items": serde_json::to_value(&items).context("failed to serialize items")?
            }))
        }
    }
}

fn run_packaging(command: PackagingCommand, api: &InventoryApi) -> Result<()> {
    match command {
        PackagingCommand::Set(args) => {
            let user = api.get_user(&args.user)?;
            let request = PackagingRequest {
                packaging_type: Some(TextInput::Text(args.packaging_type)),
                amount: Some(NumericInput::Text(args.amount)),
                unit: Some(TextInput::Text(args.unit)),
                pack_size: args.pack_size.map(NumericInput::Text),
                pack_unit: args.pack_unit.map(TextInput::Text),
            };
            let item = api.update_packaging(&args.item, &request, user.id)?;
            emit_serialized(&item, "item")
        }
        PackagingCommand::Clear(args) => {
            let item = api.delete_packaging(&args.item, &args.packaging_type)?;
            emit_serialized(&item, "item")
        }
        PackagingCommand::History(args) => {
            let entries = if args.active_only {
                api.packaging_history(&args.item)?
            } else {
                api.packaging_by_item_id(&args.item)?
            };
            emit_json(serde_json::json!({
                "item_id": args.item,
                "active_only": args.active_only,
                "count": entries.len(),
                "entries": serde_json::to_value(&entries).context("failed to serialize history")?
            }))
        }
    }
}
