mod view;

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};
use zwicky_engine::{
    Action, EditTarget, EngineConfig, ExpansionState, GatewayClient, Id, PromptBuilder, Session,
    SessionLogger, UuidIds, Workbench,
};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Morphological analysis workbench", long_about = None)]
struct Args {
    /// Gateway endpoint (overrides config and ZWICKY_GATEWAY_URL)
    #[arg(long)]
    gateway_url: Option<String>,

    /// Model id sent with every request
    #[arg(long)]
    model: Option<String>,

    /// Challenge to start with
    #[arg(long)]
    challenge: Option<String>,

    /// Export file to load at startup
    #[arg(long)]
    import: Option<PathBuf>,

    /// Seed for idea sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for session.jsonl
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Enable debug mode
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    SetChallenge,
    GenerateAttributes,
    AddAttribute,
    RenameAttribute,
    DeleteAttribute,
    AddItems,
    EditItem,
    DeleteItem,
    ToggleSelect,
    GenerateIdea,
    ShowIdeas,
    ExpandIdea,
    GenerateVariation,
    Export,
    Import,
    DismissError,
    Quit,
}

impl MenuChoice {
    const ALL: [MenuChoice; 17] = [
        MenuChoice::SetChallenge,
        MenuChoice::GenerateAttributes,
        MenuChoice::AddAttribute,
        MenuChoice::RenameAttribute,
        MenuChoice::DeleteAttribute,
        MenuChoice::AddItems,
        MenuChoice::EditItem,
        MenuChoice::DeleteItem,
        MenuChoice::ToggleSelect,
        MenuChoice::GenerateIdea,
        MenuChoice::ShowIdeas,
        MenuChoice::ExpandIdea,
        MenuChoice::GenerateVariation,
        MenuChoice::Export,
        MenuChoice::Import,
        MenuChoice::DismissError,
        MenuChoice::Quit,
    ];

    fn label(self) -> &'static str {
        match self {
            MenuChoice::SetChallenge => "Set challenge",
            MenuChoice::GenerateAttributes => "Generate attributes",
            MenuChoice::AddAttribute => "Add attribute",
            MenuChoice::RenameAttribute => "Rename attribute",
            MenuChoice::DeleteAttribute => "Delete attribute",
            MenuChoice::AddItems => "Add items",
            MenuChoice::EditItem => "Edit item",
            MenuChoice::DeleteItem => "Delete item",
            MenuChoice::ToggleSelect => "Select / deselect item",
            MenuChoice::GenerateIdea => "Generate idea",
            MenuChoice::ShowIdeas => "Show ideas",
            MenuChoice::ExpandIdea => "Expand idea",
            MenuChoice::GenerateVariation => "Generate variation",
            MenuChoice::Export => "Export to file",
            MenuChoice::Import => "Import from file",
            MenuChoice::DismissError => "Dismiss error",
            MenuChoice::Quit => "Quit",
        }
    }
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("info,zwicky_cli=debug,zwicky_engine=debug")
    } else {
        EnvFilter::new("warn,zwicky_cli=info,zwicky_engine=info")
    };

    fmt::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

async fn spin<F: Future>(msg: &str, fut: F) -> F::Output {
    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));

    let out = fut.await;

    spinner.finish_and_clear();
    out
}

fn pick(prompt: &str, options: &[String]) -> Result<Option<usize>> {
    if options.is_empty() {
        println!("{}", style("Nothing to choose from.").dim());
        return Ok(None);
    }
    Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(options)
        .default(0)
        .interact_opt()
        .context("Failed to read selection")
}

fn pick_attribute(session: &Session) -> Result<Option<Id>> {
    let attrs = session.grid.attributes();
    let labels: Vec<String> = attrs.iter().map(|a| a.name.clone()).collect();
    Ok(pick("Attribute", &labels)?.map(|i| attrs[i].id.clone()))
}

fn pick_item(session: &Session) -> Result<Option<(Id, Id)>> {
    let Some(attribute) = pick_attribute(session)? else {
        return Ok(None);
    };
    let Some(attr) = session.grid.attribute(&attribute) else {
        return Ok(None);
    };
    let labels: Vec<String> = attr
        .items
        .iter()
        .map(|i| {
            if i.selected {
                format!("{} (selected)", i.text)
            } else {
                i.text.clone()
            }
        })
        .collect();
    Ok(pick("Item", &labels)?.map(|i| (attribute.clone(), attr.items[i].id.clone())))
}

fn pick_idea(session: &Session, only_collapsed: bool) -> Result<Option<Id>> {
    let ideas: Vec<_> = session
        .ideas
        .iter()
        .filter(|i| !only_collapsed || i.expansion == ExpansionState::Collapsed)
        .collect();
    let labels: Vec<String> = ideas.iter().map(|i| view::idea_label(i)).collect();
    Ok(pick("Idea", &labels)?.map(|i| ideas[i].id.clone()))
}

fn ask(prompt: &str, initial: &str) -> Result<String> {
    Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .with_initial_text(initial)
        .allow_empty(true)
        .interact_text()
        .context("Failed to read input")
}

/// Enter-to-continue item entry: each non-empty line commits and opens the
/// next item; an empty line discards the open one.
async fn add_items(bench: &mut Workbench<GatewayClient>, attribute: Id) -> Result<()> {
    bench.dispatch(Action::AddItem(attribute)).await;
    loop {
        let Some(EditTarget::Item { attribute, item }) = bench.session().grid.editing().cloned()
        else {
            return Ok(());
        };
        let text = ask("Item (empty to finish)", "")?;
        if text.trim().is_empty() {
            bench
                .dispatch(Action::CommitItemEdit { attribute, item })
                .await;
            return Ok(());
        }
        bench
            .dispatch(Action::SetItemText {
                attribute: attribute.clone(),
                item: item.clone(),
                text,
            })
            .await;
        bench
            .dispatch(Action::CommitItemAndAddNext { attribute, item })
            .await;
    }
}

async fn run_choice(bench: &mut Workbench<GatewayClient>, choice: MenuChoice) -> Result<bool> {
    match choice {
        MenuChoice::SetChallenge => {
            let text = ask("Challenge", &bench.session().challenge.clone())?;
            bench.dispatch(Action::SetChallenge(text)).await;
        }
        MenuChoice::GenerateAttributes => {
            spin("Generating attributes...", bench.dispatch(Action::RequestAttributes)).await;
        }
        MenuChoice::AddAttribute => {
            bench.dispatch(Action::AddAttribute).await;
            if let Some(EditTarget::Attribute(id)) = bench.session().grid.editing().cloned() {
                let name = ask("Attribute name", zwicky_engine::grid::NEW_ATTRIBUTE_NAME)?;
                bench
                    .dispatch(Action::RenameAttribute {
                        attribute: id,
                        name,
                    })
                    .await;
                bench.dispatch(Action::FinishAttributeEdit).await;
            }
        }
        MenuChoice::RenameAttribute => {
            if let Some(id) = pick_attribute(bench.session())? {
                let current = bench
                    .session()
                    .grid
                    .attribute(&id)
                    .map(|a| a.name.clone())
                    .unwrap_or_default();
                bench.dispatch(Action::BeginAttributeEdit(id.clone())).await;
                let name = ask("Attribute name", &current)?;
                bench
                    .dispatch(Action::RenameAttribute {
                        attribute: id,
                        name,
                    })
                    .await;
                bench.dispatch(Action::FinishAttributeEdit).await;
            }
        }
        MenuChoice::DeleteAttribute => {
            if let Some(id) = pick_attribute(bench.session())? {
                let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt("Delete this attribute and its items?")
                    .default(false)
                    .interact()
                    .context("Failed to read confirmation")?;
                if confirmed {
                    bench.dispatch(Action::DeleteAttribute(id)).await;
                }
            }
        }
        MenuChoice::AddItems => {
            if let Some(id) = pick_attribute(bench.session())? {
                add_items(bench, id).await?;
            }
        }
        MenuChoice::EditItem => {
            if let Some((attribute, item)) = pick_item(bench.session())? {
                let current = bench
                    .session()
                    .grid
                    .attribute(&attribute)
                    .and_then(|a| a.item(&item))
                    .map(|i| i.text.clone())
                    .unwrap_or_default();
                bench
                    .dispatch(Action::BeginItemEdit {
                        attribute: attribute.clone(),
                        item: item.clone(),
                    })
                    .await;
                let text = ask("Item", &current)?;
                bench
                    .dispatch(Action::SetItemText {
                        attribute: attribute.clone(),
                        item: item.clone(),
                        text,
                    })
                    .await;
                bench
                    .dispatch(Action::CommitItemEdit { attribute, item })
                    .await;
            }
        }
        MenuChoice::DeleteItem => {
            if let Some((attribute, item)) = pick_item(bench.session())? {
                bench.dispatch(Action::DeleteItem { attribute, item }).await;
            }
        }
        MenuChoice::ToggleSelect => {
            if let Some((attribute, item)) = pick_item(bench.session())? {
                bench.dispatch(Action::ToggleSelect { attribute, item }).await;
            }
        }
        MenuChoice::GenerateIdea => {
            let before = bench.session().ideas.len();
            spin("Generating idea...", bench.dispatch(Action::RequestIdea)).await;
            if bench.session().ideas.len() > before {
                if let Some(idea) = bench.session().ideas.iter().next() {
                    println!("\n{}", view::idea(idea));
                }
            }
        }
        MenuChoice::ShowIdeas => {
            if bench.session().ideas.is_empty() {
                println!("{}", style("No ideas yet.").dim());
            }
            for idea in bench.session().ideas.iter() {
                println!("{}", view::idea(idea));
                println!("{}", style("---").dim());
            }
        }
        MenuChoice::ExpandIdea => {
            if let Some(id) = pick_idea(bench.session(), true)? {
                spin("Generating details...", bench.dispatch(Action::ExpandIdea(id.clone())))
                    .await;
                if let Some(idea) = bench.session().ideas.get(&id) {
                    println!("\n{}", view::idea(idea));
                }
            }
        }
        MenuChoice::GenerateVariation => {
            if let Some(id) = pick_idea(bench.session(), false)? {
                let before = bench.session().ideas.len();
                spin(
                    "Generating variation...",
                    bench.dispatch(Action::RequestVariation(id)),
                )
                .await;
                if bench.session().ideas.len() > before {
                    if let Some(idea) = bench.session().ideas.iter().next() {
                        println!("\n{}", view::idea(idea));
                    }
                }
            }
        }
        MenuChoice::Export => {
            let dir = ask("Export directory", ".")?;
            if let Some(path) = bench.export_into(&PathBuf::from(dir)).await {
                println!("{} {}", style("Exported to").green(), path.display());
            }
        }
        MenuChoice::Import => {
            let path = ask("File to import", "")?;
            if !path.trim().is_empty() && bench.import_from(&PathBuf::from(path.trim())).await {
                println!("{}", style("Imported.").green());
            }
        }
        MenuChoice::DismissError => {
            bench.dispatch(Action::DismissError).await;
        }
        MenuChoice::Quit => return Ok(false),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Setup Logging
    setup_logging(args.debug);

    // 2. Resolve configuration: file, env, then flags
    let work_dir = std::env::current_dir().context("Failed to resolve working directory")?;
    let mut config = EngineConfig::load(&work_dir)
        .await
        .context("Failed to load .zwicky/config.json")?;
    if let Some(url) = &args.gateway_url {
        config.gateway_url = url.clone();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    info!(gateway = %config.gateway_url, model = %config.model, "configuration resolved");

    // 3. Build the workbench
    let session = match args.seed {
        Some(seed) => Session::new(Box::new(UuidIds), Box::new(StdRng::seed_from_u64(seed))),
        None => Session::default(),
    };
    let client = GatewayClient::new(config.gateway_url.clone());
    let mut bench = Workbench::new(client, PromptBuilder::from_config(&config), session);

    if let Some(dir) = &args.log_dir {
        let logger = SessionLogger::open(dir)
            .await
            .context("Failed to create session log directory")?;
        logger
            .log_session_start(&config.model, &config.gateway_url)
            .await
            .context("Failed to write session log")?;
        bench = bench.with_logger(logger);
    }

    // Banner
    println!(
        "\n{}",
        style("   ZWICKY BOX   ").bold().on_blue().white()
    );
    println!("{}", style("----------------").dim());

    if let Some(challenge) = args.challenge.clone() {
        bench.dispatch(Action::SetChallenge(challenge)).await;
    }
    if let Some(path) = &args.import {
        if bench.import_from(path).await {
            println!("{} {}", style("Loaded").green(), path.display());
        }
    }

    let labels: Vec<&str> = MenuChoice::ALL.iter().map(|c| c.label()).collect();
    loop {
        println!("\n{}", view::header(bench.session()));
        println!("{}", view::grid(&bench.session().grid));
        if let Some(message) = &bench.session().error {
            println!("{}", view::error(message));
        }

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("What next?")
            .items(&labels)
            .default(0)
            .interact_opt()
            .context("Failed to read selection")?;
        let Some(index) = selection else {
            break;
        };
        if !run_choice(&mut bench, MenuChoice::ALL[index]).await? {
            break;
        }
    }

    println!("{}", style("Bye.").dim());
    Ok(())
}
