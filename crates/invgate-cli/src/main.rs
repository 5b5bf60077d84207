//! `invgate`: command-line front end for the invgate session manager.
//!
//! # Usage
//!
//! ```
//! invgate --url http://localhost:8000/api/ login alice
//! invgate whoami
//! invgate status users
//! invgate --config ~/.config/invgate/config.toml logout
//! ```

mod config;

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use invgate_client::HttpBackend;
use invgate_core::{
  permission::{self, Role, Section},
  user::{UserKind, UserPatch, UserRecord},
};
use invgate_session::{GuardDecision, RouteGuard, Session, SessionView};
use invgate_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::{CliConfig, expand_tilde};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "invgate", version, about = "Session manager for the invgate backend")]
struct Cli {
  /// Path to a config file (api_url, store_path, timeout_secs).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the backend API. Overrides `api_url` / `INVGATE_API_URL`.
  #[arg(long)]
  url: Option<String>,

  /// Path of the session database. Overrides `store_path` /
  /// `INVGATE_STORE_PATH`.
  #[arg(long, value_name = "FILE")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Exchange credentials for a token and load the profile.
  Login {
    username: String,
    /// Password; read from stdin when absent.
    #[arg(long, env = "INVGATE_PASSWORD", hide_env_values = true)]
    password: Option<String>,
  },
  /// Forget the token and user.
  Logout,
  /// Show the signed-in user and their role.
  Whoami,
  /// Run the route guard for a section (or the landing page).
  Status {
    /// Section path segment, e.g. `users` or `imaging-requests`.
    #[arg(value_parser = parse_section)]
    section: Option<Section>,
  },
  /// List the sections the signed-in user can navigate to.
  Sections,
  /// Update the signed-in user's own profile.
  Profile(ProfileArgs),
}

#[derive(clap::Args, Debug, Default)]
struct ProfileArgs {
  #[arg(long)]
  email:     Option<String>,
  #[arg(long)]
  full_name: Option<String>,
  #[arg(long)]
  phone:     Option<String>,
  /// Staff only.
  #[arg(long)]
  position:  Option<String>,
  /// Staff only.
  #[arg(long)]
  area:      Option<String>,
  /// Staff only.
  #[arg(long)]
  location:  Option<String>,
  /// Doctors only.
  #[arg(long)]
  specialty: Option<String>,
}

fn parse_section(raw: &str) -> Result<Section, String> {
  let wanted = raw.trim_start_matches('/');
  Section::ALL
    .into_iter()
    .find(|s| s.path().trim_start_matches('/') == wanted)
    .ok_or_else(|| {
      let known: Vec<_> = Section::ALL
        .iter()
        .map(|s| s.path().trim_start_matches('/'))
        .collect();
      format!("unknown section `{raw}` (expected one of: {})", known.join(", "))
    })
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  // Flags override the config file and environment, which override defaults.
  let mut cfg = CliConfig::load(cli.config.as_deref())?;
  if let Some(url) = cli.url {
    cfg.api_url = url;
  }
  if let Some(store) = cli.store {
    cfg.store_path = store;
  }

  let store = open_store(&cfg.store_path).await?;
  let backend = HttpBackend::new(cfg.api()).context("failed to build HTTP client")?;

  match cli.command {
    Command::Login { username, password } => {
      let session = Session::restore(backend, store).await?;
      let password = match password {
        Some(p) => p,
        None => read_password()?,
      };
      let user = session.login(&username, &password).await?;
      println!("Signed in as {} ({})", user.display_name(), role_label(&user));
      println!("Landing page: {}", permission::landing_section(&user).path());
    }
    Command::Logout => {
      let session = Session::restore(backend, store).await?;
      session.logout().await?;
      println!("Signed out");
    }
    Command::Whoami => {
      let session = Session::start(backend, store).await?;
      let user = signed_in(&session.view())?;
      print_user(&user);
    }
    Command::Status { section } => {
      let session = Session::start(backend, store).await?;
      let view = session.view();
      let guard = RouteGuard::default();
      let decision = match section {
        Some(section) => guard.check_section(&view, section),
        None => guard.landing(&view),
      };
      println!("{}", describe(decision));
    }
    Command::Sections => {
      let session = Session::start(backend, store).await?;
      let user = signed_in(&session.view())?;
      for section in permission::visible_sections(&user) {
        println!("{:<18} {}", section.path(), section.title());
      }
    }
    Command::Profile(args) => {
      let session = Session::start(backend, store).await?;
      let user = signed_in(&session.view())?;
      let patch = profile_patch(&user, args)?;
      let user = session.save_profile(patch).await?;
      println!("Profile saved");
      print_user(&user);
    }
  }

  Ok(())
}

async fn open_store(path: &std::path::Path) -> Result<SqliteStore> {
  let path = expand_tilde(path);
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  SqliteStore::open(&path)
    .await
    .with_context(|| format!("failed to open session store at {path:?}"))
}

/// Read a password from stdin.
fn read_password() -> Result<String> {
  use std::io::{self, BufRead, Write};
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

// ─── Rendering ────────────────────────────────────────────────────────────────

fn signed_in(view: &SessionView) -> Result<std::sync::Arc<UserRecord>> {
  match view.user() {
    Some(user) => Ok(user.clone()),
    None => bail!("not signed in; run `invgate login <username>`"),
  }
}

fn role_label(user: &UserRecord) -> &'static str {
  match permission::role(user) {
    Role::Administrator => "administrator",
    Role::Doctor => "doctor",
    Role::Staff => "staff",
  }
}

fn print_user(user: &UserRecord) {
  println!("id:       {}", user.id);
  println!("username: {}", user.username);
  println!("name:     {}", user.display_name());
  println!("email:    {}", user.email.as_deref().unwrap_or("-"));
  println!("role:     {}", role_label(user));
  match &user.kind {
    UserKind::Doctor { doctor } => {
      println!("doctor:   {}", doctor.id);
      println!("specialty: {}", doctor.specialty.as_deref().unwrap_or("-"));
    }
    UserKind::Staff { profile } => {
      println!("position: {}", profile.position.as_deref().unwrap_or("-"));
      println!("area:     {}", profile.area.as_deref().unwrap_or("-"));
      if let Some(at) = profile.last_login_at {
        println!("last login: {}", at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"));
      }
    }
  }
}

fn describe(decision: GuardDecision) -> String {
  match decision {
    GuardDecision::Pending => "pending: session is still loading".to_string(),
    GuardDecision::Allow => "allow".to_string(),
    GuardDecision::Redirect { to, .. } => format!("redirect: {to}"),
  }
}

/// Merge the requested edits into the user's current records.
fn profile_patch(user: &UserRecord, args: ProfileArgs) -> Result<UserPatch> {
  let mut patch = UserPatch { email: args.email, ..Default::default() };
  match &user.kind {
    UserKind::Staff { profile } => {
      if args.specialty.is_some() {
        bail!("--specialty only applies to doctors");
      }
      let mut profile = profile.clone();
      let edits = [
        (&mut profile.full_name, args.full_name),
        (&mut profile.phone_number, args.phone),
        (&mut profile.position, args.position),
        (&mut profile.area, args.area),
        (&mut profile.location, args.location),
      ];
      let mut touched = false;
      for (field, value) in edits {
        if value.is_some() {
          *field = value;
          touched = true;
        }
      }
      if touched {
        patch.userprofile = Some(profile);
      }
    }
    UserKind::Doctor { doctor } => {
      if args.position.is_some() || args.area.is_some() || args.location.is_some() {
        bail!("--position, --area and --location only apply to staff");
      }
      let mut doctor = doctor.clone();
      let edits = [
        (&mut doctor.full_name, args.full_name),
        (&mut doctor.phone_number, args.phone),
        (&mut doctor.specialty, args.specialty),
      ];
      let mut touched = false;
      for (field, value) in edits {
        if value.is_some() {
          *field = value;
          touched = true;
        }
      }
      if touched {
        patch.doctor = Some(doctor);
      }
    }
  }
  if patch == UserPatch::default() {
    bail!("nothing to update");
  }
  Ok(patch)
}
