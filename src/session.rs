use log::{debug, info, warn};
use thiserror::Error;

use crate::llm::{ChatMessage, EngineError, NarrationEngine, Role};
use crate::settings::NarrativeConfig;
use crate::story::node::NodeId;
use crate::story::options::extract_options;
use crate::story::persist::SnapshotStore;
use crate::story::store::DecisionTreeStore;
use crate::story::tree::DecisionTree;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no API key configured")]
    MissingCredential,
    #[error("a narration request is already in flight")]
    Busy,
    #[error("nothing to send")]
    EmptyInput,
    #[error("the story has already been opened")]
    AlreadyOpened,
    #[error("no narration request is pending")]
    NotAwaiting,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Where the controller is in the request/response cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    /// A request is out. `user_turn` is set when the request carries a user
    /// turn that must be withdrawn if it fails; `offered` holds the options
    /// to offer again in that case.
    AwaitingResponse { user_turn: bool, offered: Vec<String> },
}

/// Everything the narration engine needs for one request.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub messages: Vec<ChatMessage>,
}

/// A finished narrator turn as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarratorTurn {
    pub node_id: NodeId,
    pub text: String,
    pub options: Vec<String>,
}

/// Drives the chat: keeps the flat turn list sent to the engine and feeds
/// each completed narration into the decision tree.
pub struct Session<E, S> {
    engine: E,
    trees: DecisionTreeStore<S>,
    credential: Option<String>,
    /// Turn zero is always the hidden configuration turn.
    turns: Vec<ChatMessage>,
    options: Vec<String>,
    state: TurnState,
}

impl<E: NarrationEngine, S: SnapshotStore> Session<E, S> {
    /// Begin a fresh conversation. A tree left over from an earlier
    /// conversation is discarded so the new story cannot be grafted onto it.
    pub fn start(
        engine: E,
        mut trees: DecisionTreeStore<S>,
        narrative: &NarrativeConfig,
        credential: Option<String>,
    ) -> Self {
        if trees.has_story() {
            info!(
                "Discarding decision tree from previous session {}",
                trees.tree().session_id
            );
            trees.reset_decision_tree();
        }

        let mut session = Self {
            engine,
            trees,
            credential,
            turns: Vec::new(),
            options: Vec::new(),
            state: TurnState::Idle,
        };
        session.install_configuration(narrative);
        session
    }

    fn install_configuration(&mut self, narrative: &NarrativeConfig) {
        let turn = narrative.configuration_turn();
        debug!("Configuration turn:\n{}", turn.content);
        self.turns.push(turn);
        info!("Session {} started", self.trees.tree().session_id);
    }

    /// Clear the chat and the tree, then brief the narrator again.
    pub fn restart(&mut self, narrative: &NarrativeConfig) -> Result<(), SessionError> {
        if self.is_awaiting() {
            return Err(SessionError::Busy);
        }
        self.turns.clear();
        self.options.clear();
        self.trees.reset_decision_tree();
        self.install_configuration(narrative);
        Ok(())
    }

    pub fn set_credential(&mut self, credential: Option<String>) {
        self.credential = credential;
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn tree(&self) -> &DecisionTree {
        self.trees.tree()
    }

    /// Options offered by the latest narrator turn; empty while a request is
    /// in flight.
    pub fn current_options(&self) -> &[String] {
        &self.options
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, TurnState::AwaitingResponse { .. })
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        if self.is_awaiting() {
            return Err(SessionError::Busy);
        }
        if self.engine.requires_credential() && self.credential.is_none() {
            return Err(SessionError::MissingCredential);
        }
        Ok(())
    }

    /// Build the request for the narrator's opening turn.
    pub fn prepare_opening(&mut self) -> Result<TurnRequest, SessionError> {
        self.ensure_ready()?;
        if self.turns.len() > 1 || self.trees.has_story() {
            return Err(SessionError::AlreadyOpened);
        }
        self.state = TurnState::AwaitingResponse {
            user_turn: false,
            offered: Vec::new(),
        };
        Ok(TurnRequest {
            messages: self.turns.clone(),
        })
    }

    /// Record the user's choice or typed text and build the request that
    /// continues the story from it.
    pub fn prepare_submission(&mut self, text: &str) -> Result<TurnRequest, SessionError> {
        self.ensure_ready()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput);
        }

        info!("User turn: \"{text}\"");
        self.turns.push(ChatMessage::user(text));
        if self.trees.select_option(text).is_none() {
            debug!("No narrator message to choose from yet; tree unchanged");
        }
        self.state = TurnState::AwaitingResponse {
            user_turn: true,
            offered: std::mem::take(&mut self.options),
        };

        Ok(TurnRequest {
            messages: self.turns.clone(),
        })
    }

    /// Completion callback, fired once per request with the engine's outcome.
    pub fn complete_turn(
        &mut self,
        outcome: Result<String, EngineError>,
    ) -> Result<NarratorTurn, SessionError> {
        let TurnState::AwaitingResponse { user_turn, offered } =
            std::mem::replace(&mut self.state, TurnState::Idle)
        else {
            return Err(SessionError::NotAwaiting);
        };

        let raw = match outcome {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Narration failed ({}): {e}", e.status());
                if user_turn && self.turns.last().is_some_and(|t| t.role == Role::User) {
                    self.turns.pop();
                }
                self.options = offered;
                return Err(SessionError::Engine(e));
            }
        };

        let extraction = extract_options(&raw);
        if extraction.fell_back {
            debug!("Cleanup emptied the narration; keeping the raw text");
        }
        if extraction.options.is_empty() {
            info!("Narrator turn without options");
        }

        self.turns.push(ChatMessage::assistant(&extraction.text));
        let node_id = self
            .trees
            .add_narrator_message(&extraction.text, &extraction.options);
        self.options = extraction.options.clone();

        Ok(NarratorTurn {
            node_id,
            text: extraction.text,
            options: extraction.options,
        })
    }

    /// Ask the engine for the opening narration.
    pub fn narrate_opening(
        &mut self,
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<NarratorTurn, SessionError> {
        let request = self.prepare_opening()?;
        let outcome = self
            .engine
            .narrate(&request.messages, self.credential.as_deref(), on_chunk);
        self.complete_turn(outcome)
    }

    /// Send the user's choice or typed text and wait for the next narration.
    pub fn submit(
        &mut self,
        text: &str,
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<NarratorTurn, SessionError> {
        let request = self.prepare_submission(text)?;
        let outcome = self
            .engine
            .narrate(&request.messages, self.credential.as_deref(), on_chunk);
        self.complete_turn(outcome)
    }
}
