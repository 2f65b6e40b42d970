use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use lateral_addin_client::backend::BackendClient;
use lateral_addin_client::config::{Command, Config};
use lateral_addin_client::discovery::ServerDiscovery;
use lateral_addin_client::{LocalDocument, TaskPane};
use lateral_addin_core::ui::{Dropdown, UiEvent};
use lateral_addin_core::UploadTarget;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    let store = config
        .open_session_store()
        .context("Failed to open session store")?;
    let host = Arc::new(LocalDocument::new(&config.document));
    let mut pane = TaskPane::new(
        BackendClient::new(),
        ServerDiscovery::new(config.discovery_url.clone()),
        host.clone(),
        store,
    )
    .with_slice_size(config.slice_size);

    match config.command {
        Command::Discover { sub_domain } => {
            pane.handle(UiEvent::SubDomainChanged(sub_domain));
            for url in pane.fetch_servers().await? {
                println!("{}", url);
            }
        }

        Command::Login {
            server,
            sub_domain,
            production,
            username,
            password,
        } => {
            match (server, sub_domain) {
                (Some(server), _) => pane.use_server(server),
                (None, Some(sub_domain)) => {
                    pane.handle(UiEvent::SubDomainChanged(sub_domain));
                    let urls = pane.fetch_servers().await?;
                    if production {
                        if let Some(url) = urls.get(1) {
                            pane.handle(UiEvent::ServerSelected(url.clone()));
                        }
                    }
                }
                (None, None) => bail!("--server or --sub-domain is required"),
            }
            pane.handle(UiEvent::UsernameBlurred(username));
            pane.handle(UiEvent::PasswordBlurred(password));
            pane.authenticate().await?;
            println!("{}", pane.view().greeting);
        }

        Command::Logout => {
            pane.logout().await?;
            println!("Logged out");
        }

        Command::Whoami => match pane.restore_session().await? {
            Some(session) => println!("{} ({})", session.name, session.server),
            None => println!("Not logged in"),
        },

        Command::Templates => {
            require_login(&mut pane).await?;
            pane.refresh_templates().await?;
            print_options(&pane.ui().templates);
        }

        Command::Letters => {
            require_login(&mut pane).await?;
            pane.refresh_letters().await?;
            print_options(&pane.ui().letters);
        }

        Command::Variables => {
            require_login(&mut pane).await?;
            pane.refresh_variables().await?;
            print_options(&pane.ui().variables);
        }

        Command::UploadTemplate { name, template_id } => {
            require_login(&mut pane).await?;
            match (name, template_id) {
                (Some(name), _) => pane.handle(UiEvent::TemplateNameBlurred(name)),
                (None, Some(template_id)) => {
                    pane.refresh_templates().await?;
                    pane.handle(UiEvent::FromExistingTemplateToggled(true));
                    pane.handle(UiEvent::TemplateSelected(template_id.clone()));
                    ensure_selected(&pane.ui().templates, &template_id, "template")?;
                }
                (None, None) => bail!("--name or --template-id is required"),
            }
            let report = pane
                .save_to_server(UploadTarget::Template, Some(create_cancel_signal()))
                .await?;
            info!("Sent {} slices ({} bytes)", report.slices_sent, report.bytes_sent);
            print_status_log(&mut pane);
        }

        Command::UploadLetter { letter_id, case_id } => {
            require_login(&mut pane).await?;
            pane.refresh_letters().await?;
            pane.handle(UiEvent::LetterSelected(letter_id.clone()));
            ensure_selected(&pane.ui().letters, &letter_id, "letter")?;
            pane.handle(UiEvent::CaseIdBlurred(case_id));
            let report = pane
                .save_to_server(UploadTarget::Letter, Some(create_cancel_signal()))
                .await?;
            info!("Sent {} slices ({} bytes)", report.slices_sent, report.bytes_sent);
            print_status_log(&mut pane);
        }

        Command::LoadTemplate { template_id } => {
            require_login(&mut pane).await?;
            pane.refresh_templates().await?;
            pane.handle(UiEvent::TemplateSelected(template_id.clone()));
            ensure_selected(&pane.ui().templates, &template_id, "template")?;
            pane.load_template().await?;
            println!("Loaded template {} into {}", template_id, host.path().display());
        }

        Command::LoadLetter { letter_id, case_id } => {
            require_login(&mut pane).await?;
            pane.refresh_letters().await?;
            pane.handle(UiEvent::LetterSelected(letter_id.clone()));
            ensure_selected(&pane.ui().letters, &letter_id, "letter")?;
            pane.handle(UiEvent::CaseIdBlurred(case_id));
            pane.load_letter().await?;
            println!("Loaded letter {} into {}", letter_id, host.path().display());
        }

        Command::InsertVariable { variable_id } => {
            require_login(&mut pane).await?;
            pane.refresh_variables().await?;
            pane.handle(UiEvent::VariableSelected(variable_id.clone()));
            ensure_selected(&pane.ui().variables, &variable_id, "variable")?;
            pane.add_variable().await?;
            println!("{}", host.selection_text());
        }
    }

    Ok(())
}

async fn require_login(pane: &mut TaskPane) -> anyhow::Result<()> {
    if pane.restore_session().await?.is_none() {
        bail!("Not logged in. Run `lateral-addin login` first.");
    }
    Ok(())
}

fn ensure_selected(dropdown: &Dropdown, id: &str, kind: &str) -> anyhow::Result<()> {
    if dropdown.selected_id() != Some(id) {
        bail!("Unknown {} id: {}", kind, id);
    }
    Ok(())
}

fn print_options(dropdown: &Dropdown) {
    for option in &dropdown.options {
        println!("{}\t{}", option.id, option.label);
    }
}

fn print_status_log(pane: &mut TaskPane) {
    for status in pane.drain_status_log() {
        println!("{}", status.message);
    }
}

/// Turns true on Ctrl+C, which abandons the running upload including a slice
/// still in flight. A second Ctrl+C exits immediately.
fn create_cancel_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_err() {
            return;
        }
        info!("Received Ctrl+C, cancelling upload");
        let _ = tx.send(true);

        if signal::ctrl_c().await.is_ok() {
            warn!("Received second Ctrl+C, exiting");
            std::process::exit(130);
        }
    });

    rx
}
