pub mod node;
pub mod options;
pub mod persist;
pub mod store;
pub mod tree;

use std::io::{self, Write};

use anyhow::Result;
use log::{debug, info, warn};

use crate::llm::{NarrationEngine, Role};
use crate::session::{NarratorTurn, Session, SessionError};
use crate::settings::{Axis, Settings, CREDENTIAL_KEY};
use crate::story::persist::SnapshotStore;

// ---------------------------------------------------------------------------
// Player input
// ---------------------------------------------------------------------------

/// One line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Quit,
    Help,
    Tree,
    Path,
    History,
    Reset,
    Set { name: String, value: String },
    /// Text to send to the narrator: a picked option or free-form writing.
    Say(String),
    Nothing,
}

/// Turn a line of input into a command. Bare numbers pick from `options`.
fn parse_command(line: &str, options: &[String]) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Nothing;
    }

    if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next().unwrap_or_default().trim();
        return match name.as_str() {
            "quit" | "exit" => Command::Quit,
            "tree" | "arbre" => Command::Tree,
            "path" => Command::Path,
            "history" => Command::History,
            "reset" => Command::Reset,
            "set" => {
                let mut kv = arg.splitn(2, char::is_whitespace);
                Command::Set {
                    name: kv.next().unwrap_or_default().to_string(),
                    value: kv.next().unwrap_or_default().trim().to_string(),
                }
            }
            _ => Command::Help,
        };
    }

    if let Ok(n) = line.parse::<usize>() {
        if let Some(option) = n.checked_sub(1).and_then(|i| options.get(i)) {
            return Command::Say(option.clone());
        }
    }
    Command::Say(line.to_string())
}

fn read_line() -> Result<Option<String>> {
    print!("\n> ");
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input))
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

const HELP: &str = "\
  1, 2, 3...           choisir une option proposée
  <texte libre>        écrire votre propre suite
  /tree                afficher l'arbre narratif
  /path                afficher le chemin parcouru
  /history             relire la conversation
  /set <réglage> <v>   changer un réglage (style, genre, relation, focalization,
                       person, tense, personality, openai_api_key)
  /reset               recommencer une nouvelle histoire
  /quit                quitter";

fn show_banner() {
    println!("\n========================================");
    println!("          CHAT LE FATALISTE");
    println!("========================================");
    println!("Une histoire écrite à quatre mains.\n");
    println!("{HELP}");
}

fn show_options(turn: &NarratorTurn) {
    if turn.options.is_empty() {
        println!("\n(Aucune option proposée : écrivez la suite vous-même.)");
        return;
    }
    println!("\nDirections possibles pour l'histoire :");
    for (i, option) in turn.options.iter().enumerate() {
        println!("  [{}] {}", i + 1, option);
    }
}

fn show_error(err: &SessionError) {
    match err {
        SessionError::MissingCredential => {
            println!("\n(Clé API manquante : utilisez /set openai_api_key <clé> ou OPENAI_API_KEY.)")
        }
        SessionError::Engine(e) => println!("\n(Erreur : {})", e.user_message()),
        other => println!("\n({other})"),
    }
}

/// Write one streamed chunk and push it to the terminal right away. Failures
/// are logged and otherwise ignored.
fn echo_chunk(out: &mut impl Write, piece: &str) {
    if let Err(e) = out.write_all(piece.as_bytes()).and_then(|()| out.flush()) {
        debug!("Could not echo narration chunk: {e}");
    }
}

/// Run one narration, echoing chunks as they stream in.
fn narrate<E: NarrationEngine, S: SnapshotStore>(
    session: &mut Session<E, S>,
    say: Option<&str>,
) {
    println!("\n[Narrateur] :");
    let mut stdout = io::stdout();
    let mut echo = |piece: &str| echo_chunk(&mut stdout, piece);
    let result = match say {
        Some(text) => session.submit(text, &mut echo),
        None => session.narrate_opening(&mut echo),
    };
    println!();

    match result {
        Ok(turn) => show_options(&turn),
        Err(e) => show_error(&e),
    }
}

fn show_path<E: NarrationEngine, S: SnapshotStore>(session: &Session<E, S>) {
    let tree = session.tree();
    let path = tree.path_to_current();
    if path.is_empty() {
        println!("{}", tree::EMPTY_OUTLINE);
        return;
    }
    for id in path {
        if let Some(node) = tree.get(&id) {
            if node.is_option {
                println!("  -> {}", node.content);
            } else {
                let first_line = node.content.lines().next().unwrap_or_default();
                println!("  {first_line}");
            }
        }
    }
}

fn show_history<E: NarrationEngine, S: SnapshotStore>(session: &Session<E, S>) {
    for turn in session.turns().iter().filter(|t| t.role != Role::System) {
        match turn.role {
            Role::User => println!("\n[Vous] : {}", turn.content),
            _ => println!("\n[Narrateur] : {}", turn.content),
        }
    }
}

fn apply_setting<E: NarrationEngine, S: SnapshotStore>(
    session: &mut Session<E, S>,
    settings: &mut Settings,
    name: &str,
    value: &str,
) {
    if name == CREDENTIAL_KEY {
        settings.set(CREDENTIAL_KEY, value);
        session.set_credential(settings.credential());
        println!("(Clé API enregistrée.)");
    } else if let Some(axis) = Axis::from_name(name) {
        let choice = settings.choose(axis, value);
        println!(
            "({} : {}. Prendra effet à la prochaine histoire, /reset.)",
            axis.label(),
            choice.value
        );
    } else {
        println!("(Réglage inconnu : {name})");
        return;
    }

    if let Err(e) = settings.save() {
        warn!("Could not save settings: {e:#}");
        println!("(Réglage appliqué mais non sauvegardé.)");
    }
}

// ---------------------------------------------------------------------------
// Public entry point: runs the story loop until the player quits
// ---------------------------------------------------------------------------

pub fn run<E: NarrationEngine, S: SnapshotStore>(
    session: &mut Session<E, S>,
    settings: &mut Settings,
) -> Result<()> {
    show_banner();
    narrate(session, None);

    while let Some(line) = read_line()? {
        let command = parse_command(&line, session.current_options());
        match command {
            Command::Quit => break,
            Command::Nothing => {}
            Command::Help => println!("{HELP}"),
            Command::Tree => println!("\n{}", session.tree().render_outline()),
            Command::Path => show_path(session),
            Command::History => show_history(session),
            Command::Set { name, value } => apply_setting(session, settings, &name, &value),
            Command::Reset => {
                info!("Player chose to restart");
                match session.restart(&settings.narrative()) {
                    Ok(()) => narrate(session, None),
                    Err(e) => show_error(&e),
                }
            }
            Command::Say(text) => {
                if session.tree().current_node().is_some() {
                    narrate(session, Some(&text));
                } else {
                    // The opening never arrived; ask for it again.
                    narrate(session, None);
                }
            }
        }
    }

    println!("À bientôt !");
    Ok(())
}
