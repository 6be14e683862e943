use std::sync::Arc;

use timeline_core::{
    title_from, BranchType, Message, Node, NodeId, NodeMetadata, Timeline, TimelineError,
    TimelineEvent,
};
use timeline_llm::CompletionProvider;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::TurnConfig;
use crate::error::TurnError;
use crate::state::{TurnMode, TurnRequest, TurnState};

/// Drives one "send a message, wait for the reply, commit both" cycle
/// against a shared timeline.
///
/// The timeline lock is held only while the transcript is built and while
/// the finished turn is committed, never across the remote call. The remote
/// call runs in a task of its own; dropping the `submit` future cancels it,
/// and the task still settles the turn state.
#[derive(Clone)]
pub struct TurnWorkflow {
    timeline: Arc<Mutex<Timeline>>,
    llm: Arc<dyn CompletionProvider>,
    config: TurnConfig,
    state: Arc<RwLock<TurnState>>,
    cancel_token: Arc<Mutex<Option<CancellationToken>>>,
}

struct PreparedTurn {
    draft: String,
    anchor: NodeId,
    transcript: Vec<Message>,
    token: CancellationToken,
}

impl TurnWorkflow {
    pub fn new(
        timeline: Arc<Mutex<Timeline>>,
        llm: Arc<dyn CompletionProvider>,
        config: TurnConfig,
    ) -> Self {
        Self {
            timeline,
            llm,
            config,
            state: Arc::new(RwLock::new(TurnState::Idle)),
            cancel_token: Arc::new(Mutex::new(None)),
        }
    }

    pub fn timeline(&self) -> &Arc<Mutex<Timeline>> {
        &self.timeline
    }

    pub async fn state(&self) -> TurnState {
        self.state.read().await.clone()
    }

    /// Cancels the in-flight turn. Returns false when nothing was waiting.
    pub async fn stop(&self) -> bool {
        match self.cancel_token.lock().await.as_ref() {
            Some(token) => {
                token.cancel();
                log::info!("[{}] Turn cancellation requested", self.config.session_id);
                true
            }
            None => false,
        }
    }

    /// Returns the committed node. Its id is also the new cursor.
    pub async fn submit(&self, request: TurnRequest) -> Result<Node, TurnError> {
        let session_id = self.config.session_id.clone();
        let draft = request.content.trim().to_string();
        if draft.is_empty() {
            return Err(TurnError::EmptyInput);
        }

        let prepared = self.begin(draft, &request.mode).await?;
        log::info!(
            "[{}] Turn started at {} ({} messages in context)",
            session_id,
            prepared.anchor,
            prepared.transcript.len()
        );

        let draft = prepared.draft.clone();
        let abandon = prepared.token.clone().drop_guard();
        let workflow = self.clone();
        let joined = tokio::spawn(async move { workflow.drive(prepared, request.mode).await }).await;
        abandon.disarm();

        match joined {
            Ok(result) => result,
            Err(join_error) => {
                log::error!("[{}] Turn task failed: {}", session_id, join_error);
                let error = TurnError::Interrupted {
                    draft: draft.clone(),
                    reason: join_error.to_string(),
                };
                *self.cancel_token.lock().await = None;
                *self.state.write().await = TurnState::Failed {
                    draft,
                    reason: error.to_string(),
                };
                Err(error)
            }
        }
    }

    /// Claims the in-flight slot and captures the anchor and context.
    async fn begin(&self, draft: String, mode: &TurnMode) -> Result<PreparedTurn, TurnError> {
        let mut state = self.state.write().await;
        if state.is_in_flight() {
            return Err(TurnError::AlreadyInFlight);
        }

        let (anchor, transcript) = {
            let timeline = self.timeline.lock().await;
            let anchor = resolve_anchor(&timeline, mode)?;
            let mut transcript = timeline.transcript(anchor.as_str(), true)?;
            transcript.push(Message::user(draft.clone()));
            (anchor, transcript)
        };

        let token = CancellationToken::new();
        *self.cancel_token.lock().await = Some(token.clone());
        *state = TurnState::AwaitingCompletion {
            draft: draft.clone(),
            anchor: anchor.clone(),
        };

        Ok(PreparedTurn {
            draft,
            anchor,
            transcript,
            token,
        })
    }

    /// Waits for the reply or cancellation, commits, and settles the state.
    async fn drive(self, prepared: PreparedTurn, mode: TurnMode) -> Result<Node, TurnError> {
        let session_id = self.config.session_id.clone();
        let timer = Timer::new("completion");
        let outcome = tokio::select! {
            _ = prepared.token.cancelled() => Err(TurnError::Cancelled {
                draft: prepared.draft.clone(),
            }),
            reply = self.llm.complete(&prepared.transcript) => {
                reply.map_err(|source| TurnError::RemoteCompletionFailed {
                    draft: prepared.draft.clone(),
                    source,
                })
            }
        };
        timer.debug(&session_id);

        let result = match outcome {
            Ok(reply) => self.commit(&prepared, &mode, reply).await,
            Err(error) => Err(error),
        };

        *self.cancel_token.lock().await = None;
        match result {
            Ok(node) => {
                *self.state.write().await = TurnState::Committed {
                    node_id: node.id.clone(),
                };
                Ok(node)
            }
            Err(error) => {
                log::warn!("[{}] Turn failed: {}", session_id, error);
                *self.state.write().await = TurnState::Failed {
                    draft: prepared.draft.clone(),
                    reason: error.to_string(),
                };
                self.record_failure(&prepared.anchor, &error).await;
                Err(error)
            }
        }
    }

    /// Attaches the turn and persists it before the timeline lock is
    /// released, so stored state follows mutation order.
    async fn commit(
        &self,
        prepared: &PreparedTurn,
        mode: &TurnMode,
        reply: String,
    ) -> Result<Node, TurnError> {
        let messages = vec![
            Message::user(prepared.draft.clone()),
            Message::assistant(reply),
        ];
        let metadata = match mode {
            TurnMode::Continue => NodeMetadata::main_for(&messages),
            TurnMode::Branch | TurnMode::BranchFrom(_) => NodeMetadata::new(
                format!("branch-{}", &Uuid::new_v4().simple().to_string()[..8]),
                BranchType::Alternate,
                title_from(&prepared.draft),
            ),
        };
        let event_kind = metadata.branch_type;

        let mut timeline = self.timeline.lock().await;
        let node_id = timeline.append_at(prepared.anchor.as_str(), messages, Some(metadata))?;
        let node = timeline.lookup(node_id.as_str())?.clone();
        log::info!(
            "[{}] Turn committed as {} under {}",
            self.config.session_id,
            node_id,
            prepared.anchor
        );

        if let Some(storage) = self.config.storage.as_ref() {
            let event = match event_kind {
                BranchType::Main => TimelineEvent::NodeAppended {
                    node_id,
                    parent_id: prepared.anchor.clone(),
                },
                _ => TimelineEvent::BranchCreated {
                    node_id,
                    parent_id: prepared.anchor.clone(),
                },
            };
            if let Err(e) = storage
                .record(&self.config.session_id, &event, &timeline.snapshot())
                .await
            {
                log::warn!("[{}] Failed to persist turn: {}", self.config.session_id, e);
            }
        }

        Ok(node)
    }

    async fn record_failure(&self, anchor: &NodeId, error: &TurnError) {
        let Some(storage) = self.config.storage.as_ref() else {
            return;
        };
        let event = TimelineEvent::TurnFailed {
            anchor: anchor.clone(),
            message: error.to_string(),
        };
        let timeline = self.timeline.lock().await;
        if let Err(e) = storage
            .record(&self.config.session_id, &event, &timeline.snapshot())
            .await
        {
            log::warn!("[{}] Failed to record turn failure: {}", self.config.session_id, e);
        }
    }
}

fn resolve_anchor(timeline: &Timeline, mode: &TurnMode) -> Result<NodeId, TurnError> {
    match mode {
        TurnMode::Continue => Ok(timeline.current_node_id().clone()),
        // Re-asks the cursor's question, so the anchor may be root.
        TurnMode::Branch => timeline
            .lookup(timeline.current_node_id().as_str())?
            .parent_id
            .clone()
            .ok_or(TurnError::NoParentToBranch),
        TurnMode::BranchFrom(id) => {
            let anchor = timeline.lookup(id.as_str())?.id.clone();
            if anchor.is_root() && !timeline.config().allow_root_branch {
                return Err(TimelineError::RootBranchDisallowed.into());
            }
            Ok(anchor)
        }
    }
}

struct Timer {
    name: String,
    start: std::time::Instant,
}

impl Timer {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: std::time::Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    fn debug(&self, session_id: &str) {
        log::debug!(
            "[{}] {} completed in {}ms",
            session_id,
            self.name,
            self.elapsed_ms()
        );
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let elapsed = self.elapsed_ms();
        if elapsed > 1000 {
            log::warn!("{} took {}ms (slow!)", self.name, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use timeline_core::{JsonlStorage, Role, Storage, TimelineConfig, ROOT_ID};
    use timeline_llm::LLMError;
    use tokio::sync::Notify;

    use super::*;

    #[derive(Default)]
    struct ScriptedProvider {
        replies: std::sync::Mutex<VecDeque<Result<String, LLMError>>>,
        seen: std::sync::Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn replying(replies: Vec<Result<String, LLMError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: std::sync::Mutex::new(replies.into()),
                seen: Default::default(),
            })
        }

        fn last_request(&self) -> Vec<Message> {
            self.seen.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(&self, messages: &[Message]) -> timeline_llm::Result<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LLMError::EmptyResponse))
        }
    }

    /// Waits until released, so tests can act while a turn is in flight.
    #[derive(Default)]
    struct GatedProvider {
        release: Notify,
    }

    #[async_trait]
    impl CompletionProvider for GatedProvider {
        async fn complete(&self, _messages: &[Message]) -> timeline_llm::Result<String> {
            self.release.notified().await;
            Ok("late reply".to_string())
        }
    }

    fn shared(timeline: Timeline) -> Arc<Mutex<Timeline>> {
        Arc::new(Mutex::new(timeline))
    }

    fn seeded_timeline() -> (Timeline, NodeId) {
        let mut timeline = Timeline::default();
        let first = timeline
            .append(vec![Message::user("Hi"), Message::assistant("Hello")], None)
            .unwrap();
        (timeline, first)
    }

    async fn wait_until(workflow: &TurnWorkflow, done: impl Fn(&TurnState) -> bool) -> TurnState {
        for _ in 0..200 {
            let state = workflow.state().await;
            if done(&state) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("turn state never settled: {:?}", workflow.state().await);
    }

    async fn wait_for_in_flight(workflow: &TurnWorkflow) {
        wait_until(workflow, TurnState::is_in_flight).await;
    }

    #[tokio::test]
    async fn continue_commits_user_and_reply_as_one_node() {
        let provider = ScriptedProvider::replying(vec![Ok("Hello there".to_string())]);
        let timeline = shared(Timeline::default());
        let workflow = TurnWorkflow::new(timeline.clone(), provider.clone(), TurnConfig::new("s1"));

        let node = workflow
            .submit(TurnRequest::continue_with("  Hi  "))
            .await
            .unwrap();

        let sent = provider.last_request();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[1].content, "Hi");

        assert_eq!(node.parent_id, Some(NodeId::root()));
        assert_eq!(node.messages.len(), 2);
        assert_eq!(node.messages[1].content, "Hello there");
        assert_eq!(node.metadata.branch_type, BranchType::Main);
        let timeline = timeline.lock().await;
        assert_eq!(timeline.lookup(node.id.as_str()).unwrap(), &node);
        assert_eq!(timeline.current_node_id(), &node.id);
        assert_eq!(workflow.state().await, TurnState::Committed { node_id: node.id });
    }

    #[tokio::test]
    async fn branch_forks_from_cursor_parent() {
        let (mut seeded, first) = seeded_timeline();
        let second = seeded
            .append(vec![Message::user("Why?"), Message::assistant("Because.")], None)
            .unwrap();
        let provider = ScriptedProvider::replying(vec![Ok("Alternatively...".to_string())]);
        let timeline = shared(seeded);
        let workflow = TurnWorkflow::new(timeline.clone(), provider.clone(), TurnConfig::new("s1"));

        let node = workflow
            .submit(TurnRequest::new("Why not?", TurnMode::Branch))
            .await
            .unwrap();

        let sent: Vec<String> = provider
            .last_request()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(sent[1..], ["Hi", "Hello", "Why not?"]);

        let timeline = timeline.lock().await;
        assert_eq!(node.parent_id, Some(first.clone()));
        assert_eq!(node.metadata.branch_type, BranchType::Alternate);
        assert!(node.metadata.universe.starts_with("branch-"));
        assert_eq!(node.metadata.universe.len(), "branch-".len() + 8);
        assert_eq!(node.metadata.title, "Why not?...");
        assert_eq!(timeline.children(first.as_str()).unwrap().len(), 2);
        assert!(timeline.lookup(second.as_str()).is_ok());
        assert_eq!(timeline.current_node_id(), &node.id);
    }

    #[tokio::test]
    async fn branch_from_first_turn_forks_under_root() {
        let provider = ScriptedProvider::replying(vec![Ok("Hey".to_string())]);
        let (seeded, first) = seeded_timeline();
        let timeline = shared(seeded);
        let workflow = TurnWorkflow::new(timeline.clone(), provider.clone(), TurnConfig::new("s1"));

        let node = workflow
            .submit(TurnRequest::new("Hey instead", TurnMode::Branch))
            .await
            .unwrap();

        assert_eq!(node.parent_id, Some(NodeId::root()));
        assert_eq!(node.metadata.branch_type, BranchType::Alternate);
        let sent = provider.last_request();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].content, "Hey instead");
        let timeline = timeline.lock().await;
        assert_eq!(timeline.children(ROOT_ID).unwrap().len(), 2);
        assert!(timeline.lookup(first.as_str()).is_ok());
    }

    #[tokio::test]
    async fn branch_from_root_follows_root_branch_policy() {
        let provider = ScriptedProvider::replying(vec![Ok("Again".to_string())]);
        let (seeded, _) = seeded_timeline();
        let workflow = TurnWorkflow::new(shared(seeded), provider.clone(), TurnConfig::new("s1"));

        let error = workflow
            .submit(TurnRequest::new("Again", TurnMode::BranchFrom(NodeId::root())))
            .await
            .unwrap_err();
        assert!(matches!(error, TurnError::Timeline(TimelineError::RootBranchDisallowed)));
        assert_eq!(workflow.state().await, TurnState::Idle);
        assert!(provider.seen.lock().unwrap().is_empty());

        let timeline = shared(Timeline::new(TimelineConfig {
            allow_root_branch: true,
            ..Default::default()
        }));
        let workflow = TurnWorkflow::new(timeline.clone(), provider, TurnConfig::new("s2"));
        let node = workflow
            .submit(TurnRequest::new("Again", TurnMode::BranchFrom(NodeId::root())))
            .await
            .unwrap();
        assert_eq!(node.parent_id, Some(NodeId::root()));
    }

    #[tokio::test]
    async fn branch_with_cursor_on_root_has_no_parent() {
        let provider = ScriptedProvider::replying(Vec::new());
        let timeline = shared(Timeline::new(TimelineConfig {
            allow_root_branch: true,
            ..Default::default()
        }));
        let workflow = TurnWorkflow::new(timeline.clone(), provider.clone(), TurnConfig::new("s1"));

        let error = workflow
            .submit(TurnRequest::new("Hi", TurnMode::Branch))
            .await
            .unwrap_err();

        assert!(matches!(error, TurnError::NoParentToBranch));
        assert_eq!(workflow.state().await, TurnState::Idle);
        assert!(provider.seen.lock().unwrap().is_empty());
        assert_eq!(timeline.lock().await.node_count(), 1);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_remote_call() {
        let provider = ScriptedProvider::replying(Vec::new());
        let timeline = shared(Timeline::default());
        let workflow = TurnWorkflow::new(timeline.clone(), provider.clone(), TurnConfig::new("s1"));

        let error = workflow.submit(TurnRequest::continue_with("   ")).await.unwrap_err();

        assert!(matches!(error, TurnError::EmptyInput));
        assert!(provider.seen.lock().unwrap().is_empty());
        assert_eq!(timeline.lock().await.node_count(), 1);
    }

    #[tokio::test]
    async fn failed_completion_keeps_draft_and_creates_nothing() {
        let provider =
            ScriptedProvider::replying(vec![Err(LLMError::Api("HTTP 500: boom".to_string()))]);
        let timeline = shared(Timeline::default());
        let workflow = TurnWorkflow::new(timeline.clone(), provider, TurnConfig::new("s1"));

        let error = workflow
            .submit(TurnRequest::continue_with("Hi"))
            .await
            .unwrap_err();

        assert!(matches!(error, TurnError::RemoteCompletionFailed { .. }));
        assert_eq!(error.draft(), Some("Hi"));
        assert_eq!(timeline.lock().await.node_count(), 1);
        match workflow.state().await {
            TurnState::Failed { draft, reason } => {
                assert_eq!(draft, "Hi");
                assert!(reason.contains("boom"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_cancels_in_flight_turn() {
        let provider = Arc::new(GatedProvider::default());
        let timeline = shared(Timeline::default());
        let workflow = TurnWorkflow::new(timeline.clone(), provider, TurnConfig::new("s1"));

        let running = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.submit(TurnRequest::continue_with("Hi")).await })
        };
        wait_for_in_flight(&workflow).await;

        assert!(workflow.stop().await);
        let error = running.await.unwrap().unwrap_err();

        assert!(matches!(error, TurnError::Cancelled { ref draft } if draft == "Hi"));
        assert_eq!(timeline.lock().await.node_count(), 1);
        assert!(!workflow.stop().await);
    }

    #[tokio::test]
    async fn dropped_submission_releases_the_workflow() {
        let provider = Arc::new(GatedProvider::default());
        let timeline = shared(Timeline::default());
        let workflow = TurnWorkflow::new(timeline.clone(), provider.clone(), TurnConfig::new("s1"));

        let running = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.submit(TurnRequest::continue_with("Hi")).await })
        };
        wait_for_in_flight(&workflow).await;
        running.abort();
        assert!(running.await.unwrap_err().is_cancelled());

        let settled = wait_until(&workflow, |state| !state.is_in_flight()).await;
        assert!(matches!(settled, TurnState::Failed { ref draft, .. } if draft == "Hi"));
        assert_eq!(timeline.lock().await.node_count(), 1);
        assert!(!workflow.stop().await);

        provider.release.notify_one();
        let node = workflow
            .submit(TurnRequest::continue_with("Hi again"))
            .await
            .unwrap();
        assert_eq!(node.messages[0].content, "Hi again");
        assert_eq!(timeline.lock().await.node_count(), 2);
    }

    #[tokio::test]
    async fn second_submission_while_waiting_is_rejected() {
        let provider = Arc::new(GatedProvider::default());
        let timeline = shared(Timeline::default());
        let workflow = TurnWorkflow::new(timeline.clone(), provider.clone(), TurnConfig::new("s1"));

        let running = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.submit(TurnRequest::continue_with("Hi")).await })
        };
        wait_for_in_flight(&workflow).await;

        let error = workflow
            .submit(TurnRequest::continue_with("Hello?"))
            .await
            .unwrap_err();
        assert!(matches!(error, TurnError::AlreadyInFlight));

        provider.release.notify_one();
        running.await.unwrap().unwrap();
        assert_eq!(timeline.lock().await.node_count(), 2);
    }

    #[tokio::test]
    async fn reply_attaches_to_anchor_even_if_cursor_moved() {
        let provider = Arc::new(GatedProvider::default());
        let (seeded, first) = seeded_timeline();
        let timeline = shared(seeded);
        let workflow = TurnWorkflow::new(timeline.clone(), provider.clone(), TurnConfig::new("s1"));

        let running = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.submit(TurnRequest::continue_with("Next")).await })
        };
        wait_for_in_flight(&workflow).await;
        timeline.lock().await.navigate(ROOT_ID).unwrap();

        provider.release.notify_one();
        let node = running.await.unwrap().unwrap();

        assert_eq!(node.parent_id, Some(first));
        assert_eq!(timeline.lock().await.current_node_id(), &node.id);
    }

    #[tokio::test]
    async fn committed_turn_is_persisted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(JsonlStorage::new(temp_dir.path()));
        storage.init().await.unwrap();
        let provider = ScriptedProvider::replying(vec![Ok("Hello".to_string())]);
        let workflow = TurnWorkflow::new(
            shared(Timeline::default()),
            provider,
            TurnConfig::new("s1").with_storage(storage.clone()),
        );

        let node = workflow.submit(TurnRequest::continue_with("Hi")).await.unwrap();

        let snapshot = storage.load_snapshot("s1").await.unwrap().unwrap();
        assert_eq!(snapshot.state.current_node_id, node.id);
        assert_eq!(
            storage.load_events("s1").await.unwrap(),
            vec![TimelineEvent::NodeAppended {
                node_id: node.id,
                parent_id: NodeId::root()
            }]
        );
    }
}
