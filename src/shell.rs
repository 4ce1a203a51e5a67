//! Line-oriented console over the session mirror and the employee registry.
//!
//! DESIGN
//! ======
//! Each input line is split into words (`tokenize`, honouring quotes) and
//! parsed with clap, so every command gets the same flag handling and usage
//! errors as a real CLI. [`Console::execute`] returns the lines to print;
//! failures also go out as toasts through the [`Notifier`].
//!
//! The console keeps a current route. Every navigation goes through the
//! [`RouteGuard`], and registry commands first re-check the current route,
//! so nothing touches employee data from a public route or without a
//! verified session.

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn};

use crate::employee::{Employee, EmployeeUpdate, NewEmployee};
use crate::guard::{HOME_ROUTE, LOGIN_ROUTE, Navigation, RouteGuard, is_public_route};
use crate::notify::Notifier;
use crate::state::employees::{EmployeeRegistry, RegistryError};
use crate::state::session::{SessionStore, SignUpOutcome};

const ENTITY: &str = "Funcionário";
const ENTITY_PLURAL: &str = "Funcionários";
const MAX_REDIRECTS: usize = 4;

pub const HELP: &str = "\
comandos:
  goto <rota>                               navega para uma rota
  login <email> <senha>                     entra com email e senha
  signup <email> <senha> [--name <nome>]    cria uma conta
  logout                                    encerra a sessão
  session                                   consulta a sessão no servidor
  whoami                                    mostra o usuário em cache
  list                                      lista os funcionários
  show <id>                                 mostra um funcionário
  create --nome <n> --cargo <c> --email <e> [--endereco <a>] [--salario <s>]
  update <id> [--nome] [--cargo] [--email] [--endereco] [--salario]
              [--clear-endereco] [--clear-salario]
  delete <id>                               exclui um funcionário
  help                                      mostra esta ajuda
  quit                                      sai";

// =============================================================================
// TOKENIZER
// =============================================================================

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ShellError {
    #[error("unterminated quote")]
    UnterminatedQuote,
}

/// Split a line on whitespace. Single or double quotes group words; a
/// backslash outside single quotes escapes the next character.
///
/// # Errors
///
/// Returns [`ShellError::UnterminatedQuote`] when a quote is left open.
pub fn tokenize(line: &str) -> Result<Vec<String>, ShellError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('\''), c) => current.push(c),
            (_, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(ShellError::UnterminatedQuote);
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

// =============================================================================
// COMMANDS
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "funcionarios", no_binary_name = true, disable_help_subcommand = true, disable_help_flag = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    Goto { path: String },
    Login { email: String, password: String },
    Signup {
        email: String,
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    Logout,
    Session,
    Whoami,
    #[command(alias = "ls")]
    List,
    Show { id: i64 },
    Create(CreateArgs),
    Update(UpdateArgs),
    #[command(alias = "rm")]
    Delete { id: i64 },
    Help,
    #[command(alias = "exit")]
    Quit,
}

#[derive(Args, Debug, PartialEq)]
struct CreateArgs {
    #[arg(long)]
    nome: String,
    #[arg(long)]
    cargo: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    endereco: Option<String>,
    #[arg(long)]
    salario: Option<f64>,
}

impl From<CreateArgs> for NewEmployee {
    fn from(args: CreateArgs) -> Self {
        Self { nome: args.nome, cargo: args.cargo, endereco: args.endereco, email: args.email, salario: args.salario }
    }
}

#[derive(Args, Debug, PartialEq)]
struct UpdateArgs {
    id: i64,
    #[arg(long)]
    nome: Option<String>,
    #[arg(long)]
    cargo: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long, conflicts_with = "clear_endereco")]
    endereco: Option<String>,
    #[arg(long, conflicts_with = "clear_salario")]
    salario: Option<f64>,
    #[arg(long)]
    clear_endereco: bool,
    #[arg(long)]
    clear_salario: bool,
}

impl UpdateArgs {
    fn changes(&self) -> EmployeeUpdate {
        EmployeeUpdate {
            nome: self.nome.clone(),
            cargo: self.cargo.clone(),
            email: self.email.clone(),
            endereco: if self.clear_endereco { Some(None) } else { self.endereco.clone().map(Some) },
            salario: if self.clear_salario { Some(None) } else { self.salario.map(Some) },
        }
    }
}

fn parse_line(words: &[String]) -> Result<Command, clap::Error> {
    Line::try_parse_from(words).map(|line| line.command)
}

// =============================================================================
// FORMATTING
// =============================================================================

#[must_use]
pub fn format_salary(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| format!("R$ {v:.2}"))
}

#[must_use]
pub fn format_row(employee: &Employee) -> String {
    format!(
        "{:>5}  {}  |  {}  |  {}  |  {}  |  {}",
        employee.id,
        employee.nome,
        employee.cargo,
        employee.email,
        employee.endereco.as_deref().unwrap_or("-"),
        format_salary(employee.salario),
    )
}

// =============================================================================
// CONSOLE
// =============================================================================

/// Output of one command.
#[derive(Debug, Default, PartialEq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Reply {
    fn line(text: impl Into<String>) -> Self {
        Self { lines: vec![text.into()], quit: false }
    }

    fn push(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }
}

pub struct Console {
    session: Arc<SessionStore>,
    registry: EmployeeRegistry,
    guard: RouteGuard,
    notifier: Notifier,
    route: String,
}

impl Console {
    #[must_use]
    pub fn new(session: Arc<SessionStore>, registry: EmployeeRegistry, notifier: Notifier) -> Self {
        let guard = RouteGuard::new(Arc::clone(&session));
        Self { session, registry, guard, notifier, route: LOGIN_ROUTE.to_owned() }
    }

    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    #[must_use]
    pub fn registry(&self) -> &EmployeeRegistry {
        &self.registry
    }

    #[must_use]
    pub fn prompt(&self) -> String {
        match self.session.current_user() {
            Some(user) => format!("{} {}> ", user.display_name(), self.route),
            None => format!("{}> ", self.route),
        }
    }

    /// Navigate to `path`, following guard redirects. Returns the route
    /// actually reached.
    pub async fn navigate(&mut self, path: &str) -> &str {
        let mut target = path.to_owned();
        for _ in 0..MAX_REDIRECTS {
            match self.guard.check(&target).await {
                Navigation::Permit => {
                    self.route = crate::guard::normalize_path(&target);
                    debug!(route = %self.route, "navigated");
                    return &self.route;
                }
                Navigation::Redirect { to, .. } => {
                    debug!(from = %target, %to, "navigation redirected");
                    target = to;
                }
            }
        }
        warn!(path, "redirect limit reached; staying on login");
        self.route = LOGIN_ROUTE.to_owned();
        &self.route
    }

    /// Run one input line.
    pub async fn execute(&mut self, input: &str) -> Reply {
        let words = match tokenize(input) {
            Ok(words) if words.is_empty() => return Reply::default(),
            Ok(words) => words,
            Err(e) => return Reply::line(format!("erro: {e}")),
        };
        match parse_line(&words) {
            Ok(command) => self.run(command).await,
            Err(e) => Reply { lines: e.render().to_string().lines().map(str::to_owned).collect(), quit: false },
        }
    }

    async fn run(&mut self, command: Command) -> Reply {
        match command {
            Command::Goto { path } => self.goto(&path).await,
            Command::Login { email, password } => self.login(&email, &password).await,
            Command::Signup { email, password, name } => self.signup(&email, &password, name.as_deref()).await,
            Command::Logout => self.logout().await,
            Command::Session => self.show_session().await,
            Command::Whoami => self.whoami(),
            Command::List => self.list().await,
            Command::Show { id } => self.show(id).await,
            Command::Create(args) => self.create(args.into()).await,
            Command::Update(args) => self.update(args.id, args.changes()).await,
            Command::Delete { id } => self.delete(id).await,
            Command::Help => Reply { lines: HELP.lines().map(str::to_owned).collect(), quit: false },
            Command::Quit => Reply { lines: Vec::new(), quit: true },
        }
    }

    // =========================================================================
    // SESSION COMMANDS
    // =========================================================================

    async fn goto(&mut self, path: &str) -> Reply {
        let requested = crate::guard::normalize_path(path);
        let reached = self.navigate(path).await.to_owned();
        if reached == requested {
            Reply::line(format!("rota: {reached}"))
        } else {
            Reply::line(format!("redirecionado para {reached}"))
        }
    }

    async fn login(&mut self, email: &str, password: &str) -> Reply {
        match self.session.login(email, password).await {
            Ok(user) => {
                info!(user_id = %user.id, "console login");
                self.notifier.success("Login realizado com sucesso!");
                let mut reply = Reply::line(format!("bem-vindo, {}", user.display_name()));
                let route = self.navigate(HOME_ROUTE).await.to_owned();
                reply.push(format!("rota: {route}"));
                reply
            }
            Err(e) => {
                let message = e.user_message();
                self.notifier.error(message.clone());
                Reply::line(format!("erro: {message}"))
            }
        }
    }

    async fn signup(&mut self, email: &str, password: &str, name: Option<&str>) -> Reply {
        match self.session.sign_up(email, password, name).await {
            Ok(outcome) => {
                self.notifier.success(outcome.message());
                let mut reply = Reply::line(outcome.message());
                if matches!(outcome, SignUpOutcome::SignedIn { .. }) {
                    let route = self.navigate(HOME_ROUTE).await.to_owned();
                    reply.push(format!("rota: {route}"));
                }
                reply
            }
            Err(e) => {
                let message = e.user_message();
                self.notifier.error(message.clone());
                Reply::line(format!("erro: {message}"))
            }
        }
    }

    async fn logout(&mut self) -> Reply {
        let mut reply = Reply::default();
        if let Err(e) = self.session.logout().await {
            reply.push(format!("aviso: {}", e.user_message()));
        }
        self.notifier.info("Sessão encerrada.");
        let route = self.navigate(LOGIN_ROUTE).await.to_owned();
        reply.push(format!("sessão encerrada; rota: {route}"));
        reply
    }

    async fn show_session(&mut self) -> Reply {
        match self.session.check_session().await {
            Some(session) => {
                let email = session.user.email.as_deref().unwrap_or("-");
                let expiry = session.expires_at.map_or_else(|| "-".to_owned(), |at| at.to_string());
                Reply::line(format!("sessão ativa: {email} (expira em {expiry})"))
            }
            None => Reply::line("nenhuma sessão ativa"),
        }
    }

    fn whoami(&self) -> Reply {
        match self.session.current_user() {
            Some(user) => Reply::line(format!(
                "{} <{}> id={}",
                user.display_name(),
                user.email.as_deref().unwrap_or("-"),
                user.id
            )),
            None => Reply::line("não autenticado"),
        }
    }

    // =========================================================================
    // REGISTRY COMMANDS
    // =========================================================================

    /// Re-run the guard on the current route. Registry commands run only
    /// when that lands on a protected route.
    async fn enter_registry(&mut self) -> Result<(), Reply> {
        let current = self.route.clone();
        if !is_public_route(self.navigate(&current).await) {
            return Ok(());
        }
        self.notifier.error_auth();
        Err(Reply::line(format!("acesso negado; faça login (rota: {})", self.route)))
    }

    fn registry_failure(&self, err: &RegistryError, fallback: fn(&Notifier, &str)) -> Reply {
        match err {
            RegistryError::Validation(_) => self.notifier.error_validation(),
            RegistryError::DuplicateEmail | RegistryError::NotFound(_) | RegistryError::NotConfigured => {
                self.notifier.error(err.user_message());
            }
            RegistryError::Remote(_) => fallback(&self.notifier, ENTITY),
        }
        Reply::line(format!("erro: {}", err.user_message()))
    }

    async fn list(&mut self) -> Reply {
        if let Err(denied) = self.enter_registry().await {
            return denied;
        }
        match self.registry.fetch().await {
            Ok(0) => Reply::line("nenhum funcionário cadastrado"),
            Ok(count) => {
                let mut reply = Reply::default();
                for employee in self.registry.items() {
                    reply.push(format_row(&employee));
                }
                reply.push(format!("{count} funcionário(s)"));
                reply
            }
            Err(e) => {
                self.notifier.error_load(ENTITY_PLURAL);
                Reply::line(format!("erro: {}", e.user_message()))
            }
        }
    }

    async fn show(&mut self, id: i64) -> Reply {
        if let Err(denied) = self.enter_registry().await {
            return denied;
        }
        if self.registry.get(id).is_none() {
            if let Err(e) = self.registry.fetch().await {
                self.notifier.error_load(ENTITY_PLURAL);
                return Reply::line(format!("erro: {}", e.user_message()));
            }
        }
        match self.registry.get(id) {
            Some(employee) => Reply::line(format_row(&employee)),
            None => Reply::line(format!("erro: {}", RegistryError::NotFound(id).user_message())),
        }
    }

    async fn create(&mut self, input: NewEmployee) -> Reply {
        if let Err(denied) = self.enter_registry().await {
            return denied;
        }
        match self.registry.create(input).await {
            Ok(employee) => {
                self.notifier.success_save(ENTITY);
                Reply::line(format!("criado: {}", format_row(&employee)))
            }
            Err(e) => self.registry_failure(&e, Notifier::error_save),
        }
    }

    async fn update(&mut self, id: i64, changes: EmployeeUpdate) -> Reply {
        if let Err(denied) = self.enter_registry().await {
            return denied;
        }
        match self.registry.update(id, changes).await {
            Ok(employee) => {
                self.notifier.success_update(ENTITY);
                Reply::line(format!("atualizado: {}", format_row(&employee)))
            }
            Err(e) => self.registry_failure(&e, Notifier::error_update),
        }
    }

    async fn delete(&mut self, id: i64) -> Reply {
        if let Err(denied) = self.enter_registry().await {
            return denied;
        }
        match self.registry.delete(id).await {
            Ok(()) => {
                self.notifier.success_delete(ENTITY);
                Reply::line(format!("excluído: {id}"))
            }
            Err(e) => self.registry_failure(&e, Notifier::error_delete),
        }
    }
}

#[cfg(test)]
#[path = "shell_test.rs"]
mod tests;
