use chatflow_client::api::{HttpChatApi, ModAction};
use chatflow_client::cli::Args;
use chatflow_client::commands::{Command, Composer, HELP};
use chatflow_client::config::Flavor;
use chatflow_client::render::TerminalView;
use chatflow_client::theme::Theme;
use chatflow_client::view::{ChatView, Notification};
use chatflow_client::ChatClient;
use clap::{CommandFactory, Parser};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        clap_complete::generate(shell, &mut Args::command(), "chatflow", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(&args.log_level);
    if args.no_color {
        colored::control::set_override(false);
    }

    let config = args.resolve_config()?;
    let base_url = args.resolve_base_url(&config);
    info!(base_url = %base_url, flavor = ?config.server.flavor, "starting");

    let api = Arc::new(HttpChatApi::new(base_url, &config.server));
    let view = Arc::new(TerminalView::default());
    let client = ChatClient::builder(config.clone())
        .api(api)
        .view(Arc::clone(&view) as Arc<dyn ChatView>)
        .build()?;

    match (config.server.flavor, args.user.as_deref()) {
        (Flavor::Token, Some(user)) => {
            let password = args.password.as_deref().unwrap_or_default();
            client.login(user, password).await;
        }
        (Flavor::Token, None) => {
            view.notify(Notification::info("Type /login <user> <password> to begin"));
        }
        (Flavor::Legacy, user) => {
            client.sign_in_as_guest(user).await;
        }
    }
    if let Some(room) = args.room.as_deref() {
        client.join_room(room).await;
    }

    run_repl(&client, &view).await?;

    client.shutdown().await;
    Ok(())
}

/// Read commands from stdin until `/quit` or EOF.
async fn run_repl(client: &ChatClient, view: &TerminalView) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut composer = Composer::default();

    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                view.notify(Notification::error(e.user_message("")));
                continue;
            }
        };
        debug!(?command, "command");

        match command {
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Login { user, password } => {
                client.login(&user, &password).await;
            }
            Command::Register {
                user,
                password,
                avatar,
            } => {
                client.register(&user, &password, &avatar).await;
            }
            Command::Guest(name) => {
                client.sign_in_as_guest(name.as_deref()).await;
            }
            Command::Logout => {
                client.logout().await;
            }
            Command::Join { room, password } => {
                client
                    .join_room_with_password(&room, password.as_deref())
                    .await;
            }
            Command::Leave => {
                if !client.leave_room().await {
                    view.notify(Notification::info("Not in a room"));
                }
            }
            Command::Rooms => client.show_rooms().await,
            Command::Create { name, password } => {
                client.create_room(&name, password.as_deref()).await;
            }
            Command::Dm(peer) => {
                client.open_dm(&peer).await;
            }
            Command::Back => {
                client.back_to_room().await;
            }
            Command::Reply { id, text } => {
                client.reply_to(&id, &text).await;
            }
            Command::Upload { path, caption } => {
                client.upload_file(&path, caption.as_deref()).await;
            }
            Command::Kick(user) => {
                client.moderate(ModAction::Kick, &user).await;
            }
            Command::Ban(user) => {
                client.moderate(ModAction::Ban, &user).await;
            }
            Command::ModLogs => {
                client.show_mod_logs().await;
            }
            Command::Mentions => {
                client.show_mentions().await;
            }
            Command::Clear => {
                client.clear_room().await;
            }
            Command::Theme(n) => match Theme::by_index(n) {
                Some(theme) => {
                    view.set_theme(theme);
                    view.notify(Notification::success(format!("Theme: {}", theme.name)));
                }
                None => view.notify(Notification::error("Themes are numbered 1 to 6")),
            },
            Command::Emoji(n) => match composer.insert_emoji(n) {
                Some(_) => view.notify(Notification::info(format!("Draft: {}", composer.draft()))),
                None => view.notify(Notification::error("No such emoji")),
            },
            Command::Say(text) => {
                let text = composer.take_with(&text);
                client.submit_line(&text).await;
            }
        }
    }
    Ok(())
}
