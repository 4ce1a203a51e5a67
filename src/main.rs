use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use funcionarios::config::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, HttpTimeouts, SupabaseConfig};
use funcionarios::notify::{Notifier, ToastEvent};
use funcionarios::shell::Console;
use funcionarios::state::employees::{EmployeeRegistry, EmployeeTable};
use funcionarios::state::session::SessionStore;
use funcionarios::supabase::{AuthApi, SupabaseClient};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("stdin read failed: {0}")]
    Stdin(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "funcionarios", about = "Cadastro de funcionários sobre Supabase")]
struct Cli {
    #[arg(long, env = "SUPABASE_URL")]
    url: Option<String>,

    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    key: Option<String>,

    #[arg(long, env = "SUPABASE_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    #[arg(long, env = "SUPABASE_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    /// Keeps the signed-in session between runs.
    #[arg(long, env = "SUPABASE_SESSION_FILE", default_value = ".funcionarios-session.json")]
    session_file: PathBuf,

    /// Keep the session in memory only.
    #[arg(long)]
    no_persist: bool,

    /// Route opened at startup, checked by the guard like any other.
    #[arg(long, default_value = "/")]
    start: String,
}

/// Build the remote clients. Missing or placeholder config is non-fatal.
fn connect(cli: &Cli) -> Option<SupabaseClient> {
    let timeouts = HttpTimeouts { request_secs: cli.request_timeout_secs, connect_secs: cli.connect_timeout_secs };
    let session_file = (!cli.no_persist).then(|| cli.session_file.clone());
    let config = match SupabaseConfig::from_values(cli.url.as_deref(), cli.key.as_deref(), timeouts) {
        Ok(config) => config.with_session_file(session_file),
        Err(e) => {
            tracing::warn!(error = %e, "Supabase not configured; auth and registry disabled");
            return None;
        }
    };
    match SupabaseClient::new(&config) {
        Ok(client) => {
            tracing::info!(url = %config.url, "Supabase client initialized");
            Some(client)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Supabase client creation failed; auth and registry disabled");
            None
        }
    }
}

async fn print_toasts(mut toasts: broadcast::Receiver<ToastEvent>) {
    loop {
        match toasts.recv().await {
            Ok(ToastEvent::Show(toast)) => println!("[{}] {}", toast.kind.label(), toast.message),
            Ok(ToastEvent::Clear) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "toast printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn prompt(console: &Console) {
    print!("{}", console.prompt());
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let client = connect(&cli);

    let auth = client.as_ref().map(|c| c.auth() as Arc<dyn AuthApi>);
    let table = client.as_ref().map(|c| c.rest() as Arc<dyn EmployeeTable>);

    let session = Arc::new(SessionStore::new(auth));
    let subscription = session.initialize_auth().await;
    let notifier = Notifier::new();
    let printer = tokio::spawn(print_toasts(notifier.subscribe()));

    let mut console = Console::new(Arc::clone(&session), EmployeeRegistry::new(table), notifier);
    let route = console.navigate(&cli.start).await.to_owned();
    tracing::info!(%route, "console ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(&console);
    while let Some(line) = lines.next_line().await? {
        let reply = console.execute(&line).await;
        tokio::task::yield_now().await;
        for text in &reply.lines {
            println!("{text}");
        }
        if reply.quit {
            break;
        }
        prompt(&console);
    }

    if let Some(subscription) = subscription {
        subscription.unsubscribe();
    }
    printer.abort();
    Ok(())
}
