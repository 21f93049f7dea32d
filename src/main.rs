use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tgsession_rs::console;
use tgsession_rs::{
    load_session_file, normalize_phone, AccountKind, ApiCredentials, BotToken, Config,
    GeneratedSession, LoginPrompt, SessionGenerator, SessionInspector, SessionRecord,
    SessionStore, SessionToken, TelegramConnector, ValidationResult, APP_NAME, APP_VERSION,
};
use tracing_subscriber::EnvFilter;

/// Exit status used when the user aborts with Ctrl-C
const EXIT_ABORTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API ID from my.telegram.org (overrides TG_API_ID)
    #[arg(long, global = true, requires = "api_hash")]
    api_id: Option<String>,

    /// API Hash from my.telegram.org (overrides TG_API_HASH)
    #[arg(long, global = true, requires = "api_id")]
    api_hash: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate session strings without the interactive menu
    Validate {
        /// Session strings to validate
        tokens: Vec<String>,

        /// Read session strings from a file, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the session string stored in a session file
    Convert {
        /// Path to the session file
        path: PathBuf,
    },
}

const MENU: [&str; 8] = [
    "Generate User Account Session String",
    "Generate Bot Account Session String",
    "Validate Existing Session String",
    "Validate Multiple Session Strings",
    "Convert Session File to String",
    "View Usage Examples",
    "Security Best Practices",
    "Exit",
];

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let mut config = Config::from_env();

    init_tracing(&config.log_level);

    if let (Some(id), Some(hash)) = (&args.api_id, &args.api_hash) {
        config.api = Some(ApiCredentials::parse(id, hash)?);
    }

    match args.command {
        Some(Command::Validate { tokens, file, json }) => {
            validate_command(&config, tokens, file, json).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Convert { path }) => {
            let token = load_session_file(&path)?;
            println!("{}", token.expose());
            Ok(ExitCode::SUCCESS)
        }
        None => App::new(config)?.run().await,
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read session strings from a file, skipping blank lines and `#` comments
fn read_tokens(path: &Path) -> anyhow::Result<Vec<SessionToken>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(SessionToken::from)
        .collect())
}

async fn validate_command(
    config: &Config,
    tokens: Vec<String>,
    file: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let mut tokens: Vec<SessionToken> = tokens.into_iter().map(SessionToken::from).collect();
    if let Some(file) = file {
        tokens.extend(read_tokens(&file)?);
    }
    if tokens.is_empty() {
        bail!("no session strings given, pass them as arguments or with --file");
    }

    let Some(api) = config.api.clone() else {
        bail!("API credentials required: set TG_API_ID/TG_API_HASH or pass --api-id/--api-hash");
    };

    let inspector = SessionInspector::new(TelegramConnector::new(api), config.inspector.clone());
    let results = inspector.validate_many(&tokens).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&tokens, results.values());
    }
    Ok(())
}

fn print_results<'a>(
    tokens: &[SessionToken],
    results: impl Iterator<Item = &'a ValidationResult>,
) {
    let rows: Vec<Vec<String>> = tokens
        .iter()
        .zip(results)
        .enumerate()
        .map(|(i, (token, result))| {
            let (status, detail) = match (&result.identity, &result.error) {
                (Some(identity), _) => (
                    "valid",
                    format!("{} {} ({})", identity.kind(), identity.display_name(), identity.id),
                ),
                (None, Some(err)) => ("invalid", err.to_string()),
                (None, None) => ("invalid", String::new()),
            };
            vec![
                (i + 1).to_string(),
                token.preview(),
                status.to_string(),
                detail,
            ]
        })
        .collect();

    console::table(&["#", "Session", "Status", "Account / Error"], &rows);
}

/// Prompts for the login code and 2FA password on the terminal
struct TerminalPrompt;

impl LoginPrompt for TerminalPrompt {
    fn login_code(&self) -> tgsession_rs::Result<String> {
        console::info("A login code was sent to your Telegram app.");
        let code = console::input("Login code", true)?;
        if code.is_empty() {
            return Err(tgsession_rs::Error::LoginAborted {
                reason: "no login code entered".to_string(),
            });
        }
        Ok(code)
    }

    fn password(&self, hint: Option<&str>) -> tgsession_rs::Result<String> {
        console::warning("Two-factor authentication is enabled on this account.");
        let prompt = match hint {
            Some(hint) if !hint.is_empty() => format!("2FA password (hint: {})", hint),
            _ => "2FA password".to_string(),
        };
        console::secret(&prompt)
    }
}

struct App {
    config: Config,
    store: SessionStore,
}

impl App {
    fn new(config: Config) -> anyhow::Result<Self> {
        let store = SessionStore::new(&config);
        store
            .ensure_directories()
            .context("failed to create backup/export directories")?;
        Ok(Self { config, store })
    }

    async fn run(&mut self) -> anyhow::Result<ExitCode> {
        console::banner(&format!("{} v{}", APP_NAME, APP_VERSION));
        println!("This tool helps you generate and manage Telegram session strings securely.");

        loop {
            println!();
            let choice = match console::select("Choose an option", &MENU) {
                Ok(choice) => choice,
                Err(e) if e.is_interrupted() => return Ok(aborted()),
                Err(e) => return Err(e.into()),
            };

            let outcome = match choice {
                0 => self.generate_user_session().await,
                1 => self.generate_bot_session().await,
                2 => self.validate_session().await,
                3 => self.validate_many().await,
                4 => self.convert_session_file(),
                5 => {
                    show_examples();
                    Ok(())
                }
                6 => {
                    show_security_practices();
                    Ok(())
                }
                _ => {
                    console::success(&format!("Thank you for using {}!", APP_NAME));
                    return Ok(ExitCode::SUCCESS);
                }
            };

            if let Err(e) = outcome {
                if e
                    .downcast_ref::<tgsession_rs::Error>()
                    .is_some_and(tgsession_rs::Error::is_interrupted)
                {
                    return Ok(aborted());
                }
                tracing::debug!("Menu action failed: {:?}", e);
                console::error(&format!("{:#}", e));
            }
        }
    }

    /// API credentials from the configuration, or typed in once
    fn api(&mut self) -> anyhow::Result<ApiCredentials> {
        if let Some(api) = &self.config.api {
            return Ok(api.clone());
        }

        console::info("📋 Enter your API credentials from https://my.telegram.org/apps");
        let id = console::input("API ID", true)?;
        let hash = console::input("API Hash", true)?;
        let api = ApiCredentials::parse(&id, &hash)?;

        self.config.api = Some(api.clone());
        Ok(api)
    }

    fn save(&self, kind: AccountKind, generated: &GeneratedSession) -> anyhow::Result<()> {
        let record = SessionRecord::new(
            generated.token.clone(),
            kind,
            Some(generated.identity.clone()),
        );
        let path = self.store.export(&record, self.config.export_format)?;
        console::success(&format!("Session string saved to {:?}", path));
        Ok(())
    }

    async fn generate_user_session(&mut self) -> anyhow::Result<()> {
        console::banner("USER ACCOUNT SESSION GENERATOR");

        let api = self.api()?;
        let phone = normalize_phone(&console::input("Phone number (with country code)", true)?)?;

        console::info("Connecting to Telegram...");
        let generator = SessionGenerator::new(api);
        let generated = generator.user_session(&phone, &TerminalPrompt).await?;

        console::success(&format!(
            "Successfully logged in as: {}",
            generated.identity.display_name()
        ));
        console::show_session("YOUR SESSION STRING:", &generated.token);
        self.save(AccountKind::User, &generated)?;

        if self.config.send_to_saved_messages
            && console::confirm("Send session string to your Saved Messages?", false)?
        {
            match generator.send_to_saved_messages(&generated.token).await {
                Ok(()) => console::success("Session string sent to your Saved Messages!"),
                Err(e) => console::warning(&format!("Could not send to Saved Messages: {}", e)),
            }
        }
        Ok(())
    }

    async fn generate_bot_session(&mut self) -> anyhow::Result<()> {
        console::banner("BOT ACCOUNT SESSION GENERATOR");

        let bot_token = BotToken::parse(&console::secret("Bot Token (input hidden)")?)?;
        let api = self.api()?;

        console::info("Connecting to Telegram as bot...");
        let generated = SessionGenerator::new(api).bot_session(&bot_token).await?;

        console::success(&format!(
            "Successfully connected as bot: {}",
            generated.identity.display_name()
        ));
        console::show_session("YOUR BOT SESSION STRING:", &generated.token);
        self.save(AccountKind::Bot, &generated)
    }

    fn inspector(&mut self) -> anyhow::Result<SessionInspector<TelegramConnector>> {
        let api = self.api()?;
        Ok(SessionInspector::new(
            TelegramConnector::new(api),
            self.config.inspector.clone(),
        ))
    }

    async fn validate_session(&mut self) -> anyhow::Result<()> {
        console::banner("SESSION STRING VALIDATOR");

        let token = SessionToken::new(console::input("Enter session string to validate", true)?);
        let inspector = self.inspector()?;

        console::info("Validating session string...");
        let result = inspector.validate(&token).await;
        console::report(&result);
        Ok(())
    }

    async fn validate_many(&mut self) -> anyhow::Result<()> {
        console::banner("BATCH SESSION VALIDATOR");

        let source = console::select(
            "Where are the session strings?",
            &["Read from a file (one per line)", "Type them in"],
        )?;
        let tokens = if source == 0 {
            read_tokens(Path::new(&console::input("File path", true)?))?
        } else {
            console::info("Enter one session string per line, an empty line finishes.");
            let mut tokens = Vec::new();
            loop {
                let line = console::input(&format!("Session #{}", tokens.len() + 1), false)?;
                if line.is_empty() {
                    break;
                }
                tokens.push(SessionToken::new(line));
            }
            tokens
        };

        if tokens.is_empty() {
            console::warning("No session strings to validate.");
            return Ok(());
        }

        let inspector = self.inspector()?;
        console::info(&format!("Validating {} session strings...", tokens.len()));
        let results = inspector.validate_many(&tokens).await;

        print_results(&tokens, results.values());
        let valid = results.values().filter(|r| r.is_valid).count();
        console::highlight(&format!("{} of {} session strings are valid", valid, tokens.len()));
        Ok(())
    }

    fn convert_session_file(&mut self) -> anyhow::Result<()> {
        console::banner("SESSION FILE TO STRING CONVERTER");

        let input = console::input("Session file path", true)?;
        let mut path = PathBuf::from(&input);
        if !path.exists() && path.extension().is_none() {
            path.set_extension("session");
        }

        console::info("Converting session file to string...");
        let token = load_session_file(&path)?;
        console::success("Session file converted successfully!");
        console::show_session("CONVERTED SESSION STRING:", &token);

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.config.default_session_name(chrono::Local::now()));
        let target = self.store.export_dir().join(format!("{}_string.txt", stem));
        if let Some(backup) = self.store.write(&target, token.expose())? {
            console::info(&format!("Previous file backed up to {:?}", backup));
        }
        console::success(&format!("Session string saved to {:?}", target));
        Ok(())
    }
}

fn aborted() -> ExitCode {
    console::warning("Operation cancelled by user.");
    ExitCode::from(EXIT_ABORTED)
}

fn show_examples() {
    console::banner("SESSION STRING USAGE EXAMPLES");
    console::highlight("1. VALIDATE A SESSION STRING FROM RUST");
    println!(
        r#"
use tgsession_rs::{{ApiCredentials, InspectorConfig, SessionInspector, SessionToken, TelegramConnector}};

let api = ApiCredentials::parse(&std::env::var("TG_API_ID")?, &std::env::var("TG_API_HASH")?)?;
let inspector = SessionInspector::new(TelegramConnector::new(api), InspectorConfig::default());
let result = inspector.validate(&SessionToken::new(std::env::var("TG_SESSION_STRING")?)).await;
println!("valid: {{}}", result.is_valid);
"#
    );
    console::highlight("2. CONNECT WITH GRAMMERS");
    println!(
        r#"
// grammers-client 0.7; later releases changed how clients are built
use base64::Engine;
use grammers_client::{{Client, Config}};
use grammers_session::Session;

let bytes = base64::engine::general_purpose::STANDARD.decode(std::env::var("TG_SESSION_STRING")?)?;
let client = Client::connect(Config {{
    session: Session::load(&bytes)?,
    api_id,
    api_hash,
    params: Default::default(),
}}).await?;
let me = client.get_me().await?;
println!("Logged in as: {{}}", me.first_name());
"#
    );
    console::highlight("3. VALIDATE FROM THE COMMAND LINE");
    println!("\n  tgsession validate --file sessions.txt --json\n");
    console::rule();
}

fn show_security_practices() {
    console::banner("SECURITY BEST PRACTICES");
    console::warning("IMPORTANT SECURITY WARNINGS:");
    for (i, line) in [
        "Never share your session string publicly",
        "Session strings provide FULL access to your account",
        "Store session strings securely (encrypted files/environment variables)",
        "Regularly rotate/regenerate session strings",
        "Use different sessions for different applications",
        "Monitor your account for unauthorized access",
        "Keep your API credentials private",
        "Use 2FA on your Telegram account",
    ]
    .iter()
    .enumerate()
    {
        println!("{}. {}", i + 1, line);
    }
    println!();
    console::info("📝 BACKUP RECOMMENDATIONS:");
    for (i, line) in [
        "Save session strings to multiple secure locations",
        "Use encrypted storage solutions",
        "Keep backups of your API credentials",
        "Document which sessions are used for which purposes",
    ]
    .iter()
    .enumerate()
    {
        println!("{}. {}", i + 1, line);
    }
    console::rule();
}
