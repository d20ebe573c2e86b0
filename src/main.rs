use anyhow::{bail, Context, Result};
use bot_translations::config::Config;
use bot_translations::i18n::{self, TranslationManager};
use bot_translations::telegram::TelegramFileFetcher;
use std::fmt;
use std::path::Path;
use tracing::info;

const USAGE: &str = "Usage: bot-translations <command>

Commands:
  resolve <key> <language> [args...]   Resolve a string
  families                             List language bases
  variants [base]                      List language files, optionally of one base
  validate <file>                      Validate a live language file
  prepare <path>                       Stage and validate a local file
  prepare-remote <file_id> <file name> Download a Telegram document, stage and validate it
  promote <file>                       Move a staged file into the language directory
  metrics                              Resolve every master key in every language and report fallbacks";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bot_translations=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = Config::from_env()?;
    let manager = TranslationManager::new(&config).context("Failed to load language files")?;

    match (command.as_str(), &args[1..]) {
        ("resolve", [key, language, rest @ ..]) => {
            let arguments: Vec<&dyn fmt::Display> =
                rest.iter().map(|a| a as &dyn fmt::Display).collect();
            println!("{}", manager.resolve_string(key, language, &arguments)?);
        }
        ("families", []) => {
            for base in manager.list_language_families() {
                println!("{}", base);
            }
        }
        ("variants", rest) if rest.len() <= 1 => {
            let base = rest.first().map(String::as_str);
            println!(
                "{}",
                serde_json::to_string_pretty(&manager.list_language_variants(base))?
            );
        }
        ("validate", [file]) => match manager.validate_existing(file)? {
            Some(text) => println!("{}", text),
            None => bail!("No language file named '{}'", file),
        },
        ("prepare", [path]) => {
            let path = Path::new(path);
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .context("Upload path has no file name")?;

            let prepared = manager.prepare_upload(&bytes, file_name)?;
            println!("{}", prepared.render(manager.parse_mode()));
        }
        ("prepare-remote", [handle, file_name]) => {
            let fetcher = TelegramFileFetcher::from_config(&config)
                .context("TELEGRAM_BOT_TOKEN not set, remote uploads are disabled")?;
            let prepared = manager
                .prepare_remote_upload(&fetcher, handle, file_name)
                .await?;
            println!("{}", prepared.render(manager.parse_mode()));
        }
        ("promote", [file]) => {
            let outcome = manager.promote(file);
            println!("{}", outcome.render(manager.parse_mode()));
            if !outcome.is_completed() {
                bail!("Promotion of '{}' did not complete", file);
            }
        }
        ("metrics", []) => {
            survey(&manager);
            println!("{}", serde_json::to_string_pretty(&manager.metrics())?);
        }
        _ => bail!("Invalid command line\n\n{}", USAGE),
    }

    Ok(())
}

/// Resolve every master key in every language with placeholder arguments.
fn survey(manager: &TranslationManager) {
    let corpus = manager.corpus();
    let master = corpus.master();

    for document in corpus.documents() {
        for entry in master.entries() {
            let arity = entry
                .values
                .first()
                .map(|value| i18n::arity(value))
                .unwrap_or(0);
            let placeholders: Vec<String> = (0..arity).map(|i| format!("<{}>", i)).collect();
            let arguments: Vec<&dyn fmt::Display> =
                placeholders.iter().map(|a| a as &dyn fmt::Display).collect();

            // Failures are counted by the manager
            let _ = manager.resolve_string(&entry.key, document.file_name(), &arguments);
        }
    }

    info!(
        "Resolved {} key(s) across {} language file(s)",
        master.entries().len(),
        corpus.len()
    );
}
