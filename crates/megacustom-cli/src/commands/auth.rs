//! Auth commands - login, session restore, account switching

use anyhow::Result;
use clap::Subcommand;
use tracing::info;

use megacustom_core::domain::newtypes::AccountId;
use megacustom_core::events::Event;

use crate::app::App;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Log in with email and password
    Login {
        email: String,
        /// Password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Restore the session stored for an account
    Restore { account_id: String },
    /// Log out and delete the stored session
    Logout { account_id: String },
    /// List registered accounts
    Accounts,
    /// Make another account the active one
    Switch { account_id: String },
}

impl AuthCommand {
    pub async fn execute(&self, app: &App, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        match self {
            AuthCommand::Login { email, password } => {
                let password = match password {
                    Some(p) => p.clone(),
                    None => rpassword_prompt()?,
                };
                let token = match app.client.login(email, &password).await {
                    Ok(token) => token,
                    Err(e) => {
                        app.events.publish(Event::LoginStatusChanged {
                            email: Some(email.clone()),
                            ok: false,
                        });
                        formatter.error(&format!("Login failed: {e}"));
                        return Ok(());
                    }
                };

                let id = {
                    let mut registry = app.registry.lock().unwrap();
                    let id = registry.register_existing(
                        email.clone(),
                        email.clone(),
                        std::sync::Arc::clone(&app.client),
                    );
                    registry.update_session(id, token.clone())?;
                    id
                };
                app.vault.store(id, &token)?;
                app.events.publish(Event::LoginStatusChanged {
                    email: Some(email.clone()),
                    ok: true,
                });
                info!(account = %id, "Logged in");
                formatter.success(&format!("Logged in as {email} (account {id})"));
            }
            AuthCommand::Restore { account_id } => {
                let id = AccountId::parse(account_id)?;
                app.vault.restore_session(id, app.client.as_ref()).await?;
                if let Some(account) = app.registry.lock().unwrap().get(id) {
                    app.events.publish(Event::SessionRestored {
                        email: account.email().to_string(),
                    });
                }
                formatter.success(&format!("Session restored for account {id}"));
            }
            AuthCommand::Logout { account_id } => {
                let id = AccountId::parse(account_id)?;
                app.registry.lock().unwrap().remove(id)?;
                if let Err(e) = app.vault.delete(id) {
                    formatter.warn(&format!("No stored session removed: {e}"));
                }
                app.events.publish(Event::LoginStatusChanged {
                    email: None,
                    ok: false,
                });
                formatter.success(&format!("Logged out account {id}"));
            }
            AuthCommand::Accounts => {
                let registry = app.registry.lock().unwrap();
                let active = registry.active().map(|a| a.id());
                if matches!(format, OutputFormat::Json) {
                    let accounts: Vec<serde_json::Value> = registry
                        .all()
                        .iter()
                        .map(|a| {
                            serde_json::json!({
                                "id": a.id().to_string(),
                                "email": a.email(),
                                "active": Some(a.id()) == active,
                            })
                        })
                        .collect();
                    formatter.print_json(&serde_json::json!({ "accounts": accounts }));
                } else if registry.is_empty() {
                    formatter.info("No accounts registered");
                } else {
                    for account in registry.all() {
                        let marker = if Some(account.id()) == active { "*" } else { " " };
                        println!("{marker} {} {}", account.id(), account.email());
                    }
                }
            }
            AuthCommand::Switch { account_id } => {
                let id = AccountId::parse(account_id)?;
                app.registry.lock().unwrap().switch(id)?;
                formatter.success(&format!("Active account is now {id}"));
            }
        }
        Ok(())
    }
}

/// Minimal hidden-input prompt; real terminals get no echo suppression here,
/// the GUI owns interactive credential entry
fn rpassword_prompt() -> Result<String> {
    use std::io::{BufRead, Write};
    print!("Password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}
