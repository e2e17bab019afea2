//! SecurePass CLI - command-line front end for the local password vault
//!
//! The master password is read from `SECUREPASS_PASSWORD` or prompted for. It
//! is only ever handed to the vault core, never written anywhere.

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{info, Level};

use vault_core::crypto::SecretString;
use vault_core::{
    CredentialRecord, CredentialUpdate, GeneratorOptions, NewCredential, Vault, VaultPaths,
    VaultState,
};

/// SecurePass - local password vault
#[derive(Parser, Debug)]
#[command(name = "securepass")]
#[command(version)]
#[command(about = "SecurePass - store website credentials encrypted under one master password")]
struct Args {
    /// Vault directory (defaults to the platform data directory)
    #[arg(long, env = "SECUREPASS_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Master password (prompted for when absent)
    #[arg(long, env = "SECUREPASS_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// First-time setup: choose the master password
    Init,
    /// Add a credential (the password is prompted for unless --generate is given)
    Add {
        website: String,
        username: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        tags: Option<String>,
        /// Generate a random password instead of prompting
        #[arg(long)]
        generate: bool,
    },
    /// Show one credential
    Get {
        id: i64,
        /// Print the password
        #[arg(long)]
        show: bool,
    },
    /// List credentials, most recently updated first
    List {
        /// Only credentials in exactly this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Search website, username, category and tags
    Search { query: String },
    /// Change fields of a credential
    Update {
        id: i64,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        username: Option<String>,
        /// Prompt for a new password
        #[arg(long, conflicts_with = "generate")]
        new_password: bool,
        /// Replace the password with a generated one
        #[arg(long)]
        generate: bool,
        /// New category (empty string clears it)
        #[arg(long)]
        category: Option<String>,
        /// New tags (empty string clears them)
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete a credential
    Delete { id: i64 },
    /// Manage the category vocabulary
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Print a random password
    Generate {
        #[arg(long)]
        length: Option<usize>,
        #[arg(long)]
        no_uppercase: bool,
        #[arg(long)]
        no_digits: bool,
        #[arg(long)]
        no_symbols: bool,
    },
    /// Write an encrypted bundle of every credential
    Export { file: PathBuf },
    /// Add every credential from an encrypted bundle
    Import { file: PathBuf },
    /// Delete all credentials and categories and clear the master password
    Reset {
        /// Skip the confirmation prompts (must be given twice)
        #[arg(long, action = ArgAction::Count)]
        yes: u8,
    },
}

#[derive(Subcommand, Debug)]
enum CategoryAction {
    Add { name: String },
    Delete { name: String },
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let paths = match &args.data_dir {
        Some(dir) => VaultPaths::with_dir(dir.clone()),
        None => VaultPaths::new(),
    }
    .context("Failed to open vault directory")?;
    let mut vault = Vault::open(paths, Default::default()).context("Failed to open vault")?;

    match args.command {
        Command::Init => init(&mut vault, args.password).await,
        Command::Generate {
            length,
            no_uppercase,
            no_digits,
            no_symbols,
        } => {
            let defaults = &vault.settings().generator;
            let options = GeneratorOptions {
                length: length.unwrap_or(defaults.length),
                uppercase: defaults.uppercase && !no_uppercase,
                digits: defaults.digits && !no_digits,
                symbols: defaults.symbols && !no_symbols,
            };
            println!("{}", vault.generate_password(Some(&options))?);
            Ok(())
        }
        command => {
            unlock(&mut vault, args.password).await?;
            run(&mut vault, command).await
        }
    }
}

async fn init(vault: &mut Vault, password: Option<String>) -> anyhow::Result<()> {
    if vault.state() != VaultState::NotInitialized {
        bail!("A master password is already set. Use `securepass reset` to start over.");
    }

    let password = match password {
        Some(password) => SecretString::new(password),
        None => {
            let password =
                SecretString::new(rpassword::prompt_password("New master password: ")?);
            let confirm =
                SecretString::new(rpassword::prompt_password("Confirm master password: ")?);
            if password.expose() != confirm.expose() {
                bail!("Passwords do not match");
            }
            password
        }
    };

    vault.setup(password.expose()).await?;
    println!("Master password set. Vault stored in {}", vault.paths().dir().display());
    Ok(())
}

async fn unlock(vault: &mut Vault, password: Option<String>) -> anyhow::Result<()> {
    if vault.state() == VaultState::NotInitialized {
        bail!("No master password set. Run `securepass init` first.");
    }

    let password = SecretString::new(match password {
        Some(password) => password,
        None => rpassword::prompt_password("Master password: ")?,
    });

    vault.unlock(password.expose()).await.context("Failed to unlock vault")?;
    info!("Vault unlocked");
    Ok(())
}

async fn run(vault: &mut Vault, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Add {
            website,
            username,
            category,
            tags,
            generate,
        } => {
            let secret = if generate {
                vault.generate_password(None)?
            } else {
                rpassword::prompt_password(format!("Password for {}@{}: ", username, website))?
            };

            let credential = NewCredential {
                website,
                username,
                secret,
                category,
                tags,
            };
            let id = vault.store()?.add(&credential)?;
            println!("Added credential {}", id);
        }
        Command::Get { id, show } => {
            let record = vault
                .store()?
                .get(id)?
                .with_context(|| format!("No credential with id {}", id))?;
            print_record(&record, show);
        }
        Command::List { category } => {
            let records = match category {
                Some(category) => vault.store()?.list_by_category(&category)?,
                None => vault.load_all().await?,
            };
            print_table(&records);
        }
        Command::Search { query } => {
            let records = vault.store()?.search(&query)?;
            print_table(&records);
        }
        Command::Update {
            id,
            website,
            username,
            new_password,
            generate,
            category,
            tags,
        } => {
            let secret = if generate {
                Some(vault.generate_password(None)?)
            } else if new_password {
                Some(rpassword::prompt_password("New password: ")?)
            } else {
                None
            };

            let update = CredentialUpdate {
                website,
                username,
                secret,
                category: category.map(non_empty),
                tags: tags.map(non_empty),
            };
            vault.store()?.update(id, &update)?;
            println!("Updated credential {}", id);
        }
        Command::Delete { id } => {
            vault.store()?.delete(id)?;
            println!("Deleted credential {}", id);
        }
        Command::Category { action } => {
            let store = vault.store()?;
            match action {
                CategoryAction::Add { name } => {
                    if store.add_category(&name)? {
                        println!("Added category {}", name);
                    } else {
                        println!("Category {} already exists", name);
                    }
                }
                CategoryAction::Delete { name } => {
                    store.delete_category(&name)?;
                    println!("Deleted category {}", name);
                }
                CategoryAction::List => {
                    for name in store.list_categories()? {
                        println!("{}", name);
                    }
                }
            }
        }
        Command::Export { file } => {
            let count = vault.export_to(&file).await?;
            println!("Exported {} credentials to {}", count, file.display());
        }
        Command::Import { file } => {
            let count = vault.import_from(&file).await?;
            println!("Imported {} credentials from {}", count, file.display());
        }
        Command::Reset { yes } => {
            if yes < 2 && !confirm_reset()? {
                println!("Reset cancelled");
                return Ok(());
            }
            vault.reset_account().await?;
            println!("Account reset. Run `securepass init` to set a new master password.");
        }
        Command::Init | Command::Generate { .. } => {
            bail!("command does not need an unlocked vault")
        }
    }

    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Two separate confirmations; the reset cannot be undone
fn confirm_reset() -> anyhow::Result<bool> {
    println!("This will permanently delete every saved password and category");
    println!("and clear the master password. This cannot be undone.");
    if !ask("Reset the account? [y/N] ")? {
        return Ok(false);
    }
    ask("Last warning: all data will be deleted. Are you absolutely sure? [y/N] ")
}

fn ask(prompt: &str) -> anyhow::Result<bool> {
    print!("{}", prompt);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}

fn print_record(record: &CredentialRecord, show_secret: bool) {
    println!("id:       {}", record.id);
    println!("website:  {}", record.website);
    println!("username: {}", record.username);
    if show_secret {
        println!("password: {}", record.secret);
    } else {
        println!("password: ******** (use --show)");
    }
    println!("category: {}", record.category.as_deref().unwrap_or("-"));
    println!("tags:     {}", record.tags.as_deref().unwrap_or("-"));
    println!("created:  {}", record.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("updated:  {}", record.updated_at.format("%Y-%m-%d %H:%M:%S"));
}

fn print_table(records: &[CredentialRecord]) {
    if records.is_empty() {
        println!("No credentials found");
        return;
    }

    println!("{:>5}  {:<30}  {:<24}  {:<14}  {}", "ID", "WEBSITE", "USERNAME", "CATEGORY", "UPDATED");
    for record in records {
        println!(
            "{:>5}  {:<30}  {:<24}  {:<14}  {}",
            record.id,
            record.website,
            record.username,
            record.category.as_deref().unwrap_or("-"),
            record.updated_at.format("%Y-%m-%d %H:%M"),
        );
    }
}
