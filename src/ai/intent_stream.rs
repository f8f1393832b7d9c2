//! Streaming intent orchestration.
//!
//! Drives animation triggers from a token stream:
//! 1. every `feed` appends to the segment buffer and keyword-scans only the
//!    text that arrived since the last scan (plus the start of a word the
//!    chunk continues), firing immediately when the channel's gate is open;
//! 2. once a segment boundary shows up, a single background job drains
//!    completed segments and classifies them one by one with the model,
//!    in order;
//! 3. `flush` waits for that job and classifies whatever is left.
//!
//! At most one classification job exists per stream. A boundary that shows
//! up while the job runs is picked up by the job's next pass over the
//! buffer. Gates belong to the stream, not to a response: `reset` keeps them
//! so a clip that just played is not replayed by the next response.

use crate::ai::animation::{
    AnimationTrigger, Channel, ClassificationResult, Expression, Gesture, TriggerSource,
};
use crate::ai::classifier::HybridClassifier;
use crate::ai::cooldown::{Clock, CooldownGate, SystemClock};
use crate::ai::intent_config::IntentConfig;
use crate::ai::lexicon::{is_word_char, match_trigger};
use crate::ai::segment_buffer::{Segment, SegmentBuffer};
use crate::llm::provider::LlmProvider;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Receiver of permitted triggers (usually the renderer).
pub trait TriggerSink: Send + Sync {
    fn on_gesture(&self, gesture: Gesture);
    fn on_expression(&self, expression: Expression);
}

impl TriggerSink for UnboundedSender<AnimationTrigger> {
    fn on_gesture(&self, gesture: Gesture) {
        let _ = self.send(AnimationTrigger::Gesture(gesture));
    }

    fn on_expression(&self, expression: Expression) {
        let _ = self.send(AnimationTrigger::Expression(expression));
    }
}

/// Sink built from two closures.
pub struct FnSink<G, E> {
    gesture: G,
    expression: E,
}

impl<G, E> FnSink<G, E>
where
    G: Fn(Gesture) + Send + Sync,
    E: Fn(Expression) + Send + Sync,
{
    pub fn new(gesture: G, expression: E) -> Self {
        Self {
            gesture,
            expression,
        }
    }
}

impl<G, E> TriggerSink for FnSink<G, E>
where
    G: Fn(Gesture) + Send + Sync,
    E: Fn(Expression) + Send + Sync,
{
    fn on_gesture(&self, gesture: Gesture) {
        (self.gesture)(gesture)
    }

    fn on_expression(&self, expression: Expression) {
        (self.expression)(expression)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Nothing fed since construction or the last reset.
    Idle,
    Buffering,
    ClassifyingSegments,
}

struct StreamState {
    buffer: SegmentBuffer,
    scan_cursor: usize,
    seen: HashSet<String>,
    started: bool,
    /// Id of the job currently allowed to run; `None` when idle.
    active_job: Option<u64>,
    next_job_id: u64,
    job: Option<JoinHandle<()>>,
    generation: u64,
}

impl StreamState {
    /// Record a segment for classification. False if too short or a repeat.
    fn admit_segment(&mut self, segment: &Segment) -> bool {
        if segment.char_len() < self.buffer.min_chars() {
            return false;
        }
        if !self.seen.insert(segment.dedup_key().to_string()) {
            tracing::debug!("[Intent] Skipping repeated segment: {:?}", segment.dedup_key());
            return false;
        }
        true
    }
}

struct ChannelGates {
    gesture: CooldownGate,
    expression: CooldownGate,
}

impl ChannelGates {
    fn gate_mut(&mut self, channel: Channel) -> &mut CooldownGate {
        match channel {
            Channel::Gesture => &mut self.gesture,
            Channel::Expression => &mut self.expression,
        }
    }
}

struct Shared {
    config: IntentConfig,
    classifier: HybridClassifier,
    sink: Arc<dyn TriggerSink>,
    clock: Arc<dyn Clock>,
    state: Mutex<StreamState>,
    gates: Mutex<ChannelGates>,
}

/// Where the keyword scan of newly fed text begins: the cursor, or the start
/// of the word the cursor splits, so a chunk never starts a word on its own.
fn scan_start(text: &str, cursor: usize) -> usize {
    let (Some(head), Some(tail)) = (text.get(..cursor), text.get(cursor..)) else {
        return 0;
    };
    if !tail.chars().next().is_some_and(is_word_char) {
        return cursor;
    }
    head.char_indices()
        .rev()
        .take_while(|(_, c)| is_word_char(*c))
        .last()
        .map_or(cursor, |(i, _)| i)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn fast_scan(&self, text: &str) -> Vec<AnimationTrigger> {
        let mut hits = Vec::with_capacity(2);
        if let Some(m) = match_trigger(text, &self.config.gesture_lexicon) {
            tracing::debug!("[Intent] Keyword '{}' -> {}", m.matched_keyword, m.label);
            hits.push(AnimationTrigger::Gesture(m.label));
        }
        if let Some(m) = match_trigger(text, &self.config.expression_lexicon) {
            tracing::debug!("[Intent] Keyword '{}' -> {}", m.matched_keyword, m.label);
            hits.push(AnimationTrigger::Expression(m.label));
        }
        hits
    }

    /// Pass candidates through their channel gates, opening each gate that
    /// admits one. Returns the admitted triggers in candidate order.
    fn admit(
        &self,
        candidates: Vec<AnimationTrigger>,
        source: TriggerSource,
    ) -> Vec<AnimationTrigger> {
        if candidates.is_empty() {
            return candidates;
        }
        let now = self.clock.now_ms();
        let mut gates = lock(&self.gates);
        candidates
            .into_iter()
            .filter(|trigger| {
                let gate = gates.gate_mut(trigger.channel());
                if !gate.try_open(now) {
                    tracing::debug!(
                        source = ?source,
                        "[Intent] {} suppressed by cooldown",
                        trigger.label()
                    );
                    return false;
                }
                if self.config.block_during_playback {
                    gate.busy(now, now + trigger.default_duration_ms());
                }
                tracing::info!(
                    channel = ?trigger.channel(),
                    source = ?source,
                    "[Intent] Trigger {}",
                    trigger.label()
                );
                true
            })
            .collect()
    }

    fn dispatch(&self, triggers: Vec<AnimationTrigger>) {
        for trigger in triggers {
            match trigger {
                AnimationTrigger::Gesture(g) => self.sink.on_gesture(g),
                AnimationTrigger::Expression(e) => self.sink.on_expression(e),
            }
        }
    }

    /// Gate-check a slow-path result, but only if `still_current` holds for
    /// the stream state at admission time.
    fn admit_result_if(
        &self,
        result: ClassificationResult,
        still_current: impl FnOnce(&StreamState) -> bool,
    ) -> Vec<AnimationTrigger> {
        let mut candidates = Vec::with_capacity(2);
        if let Some(g) = result.gesture {
            candidates.push(AnimationTrigger::Gesture(g));
        }
        if let Some(e) = result.expression {
            candidates.push(AnimationTrigger::Expression(e));
        }
        if candidates.is_empty() {
            return candidates;
        }

        let state = lock(&self.state);
        if !still_current(&state) {
            tracing::debug!("[Intent] Dropping classification from a previous response");
            return Vec::new();
        }
        let admitted = self.admit(candidates, TriggerSource::Classifier);
        drop(state);
        admitted
    }
}

/// Clears the in-flight slot if a job unwinds before finishing normally.
struct JobGuard {
    shared: Arc<Shared>,
    job_id: u64,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.shared.state);
        if state.active_job == Some(self.job_id) {
            state.active_job = None;
            state.job = None;
        }
    }
}

async fn run_job(shared: Arc<Shared>, job_id: u64) {
    let _guard = JobGuard {
        shared: Arc::clone(&shared),
        job_id,
    };

    loop {
        let batch: Vec<Segment> = {
            let mut state = lock(&shared.state);
            if state.active_job != Some(job_id) {
                return;
            }
            if !state.buffer.has_boundary() {
                // Checked under the same lock `feed` uses to start jobs, so a
                // boundary cannot slip in between this check and going idle.
                state.active_job = None;
                state.job = None;
                return;
            }
            let (segments, tail) = state.buffer.extract_completed();
            state.buffer.replace(tail);
            state.scan_cursor = 0;
            let fresh: Vec<Segment> = segments
                .into_iter()
                .filter(|s| state.admit_segment(s))
                .collect();
            fresh
        };

        for segment in batch {
            let result = shared.classifier.classify_slow(segment.text()).await;
            let admitted =
                shared.admit_result_if(result, |state| state.active_job == Some(job_id));
            shared.dispatch(admitted);

            if lock(&shared.state).active_job != Some(job_id) {
                return;
            }
        }
    }
}

/// Per-response streaming orchestrator. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct IntentStream {
    shared: Arc<Shared>,
}

impl IntentStream {
    pub fn new(
        config: IntentConfig,
        provider: Arc<dyn LlmProvider>,
        sink: Arc<dyn TriggerSink>,
    ) -> Self {
        Self::with_clock(config, provider, sink, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(
        config: IntentConfig,
        provider: Arc<dyn LlmProvider>,
        sink: Arc<dyn TriggerSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let classifier = HybridClassifier::from_config(provider, &config);
        let state = StreamState {
            buffer: SegmentBuffer::with_key_chars(
                config.min_segment_chars,
                config.dedup_prefix_chars,
            ),
            scan_cursor: 0,
            seen: HashSet::new(),
            started: false,
            active_job: None,
            next_job_id: 0,
            job: None,
            generation: 0,
        };
        let gates = ChannelGates {
            gesture: CooldownGate::new(config.cooldown_ms(Channel::Gesture)),
            expression: CooldownGate::new(config.cooldown_ms(Channel::Expression)),
        };
        Self {
            shared: Arc::new(Shared {
                config,
                classifier,
                sink,
                clock,
                state: Mutex::new(state),
                gates: Mutex::new(gates),
            }),
        }
    }

    /// Accept one streamed chunk. Keyword triggers fire before this returns;
    /// model-backed classification runs on a background task and needs a
    /// tokio runtime (without one, segments wait for `flush`).
    pub fn feed(&self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        let shared = &self.shared;

        let admitted = {
            let mut guard = lock(&shared.state);
            let state = &mut *guard;
            state.started = true;
            state.buffer.append(chunk);

            let text = state.buffer.as_str();
            let candidates = shared.fast_scan(&text[scan_start(text, state.scan_cursor)..]);
            state.scan_cursor = state.buffer.len();

            let admitted = shared.admit(candidates, TriggerSource::Keyword);

            if state.active_job.is_none() && state.buffer.has_boundary() {
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        let job_id = state.next_job_id;
                        state.next_job_id += 1;
                        state.active_job = Some(job_id);
                        state.job = Some(runtime.spawn(run_job(Arc::clone(shared), job_id)));
                        tracing::debug!(job_id, "[Intent] Classification job started");
                    }
                    Err(_) => {
                        tracing::debug!("[Intent] No async runtime; segments wait for flush");
                    }
                }
            }
            admitted
        };

        shared.dispatch(admitted);
    }

    /// End of stream: wait for the running job, then classify the remaining
    /// buffered text as one final segment if it is long enough.
    pub async fn flush(&self) {
        let shared = &self.shared;

        loop {
            let job = lock(&shared.state).job.take();
            match job {
                Some(handle) => {
                    if let Err(e) = handle.await {
                        tracing::error!("[Intent] Classification job failed: {}", e);
                    }
                }
                None => break,
            }
        }

        let (segment, generation) = {
            let mut state = lock(&shared.state);
            let segment = state
                .buffer
                .flush()
                .filter(|segment| state.admit_segment(segment));
            state.scan_cursor = 0;
            (segment, state.generation)
        };

        if let Some(segment) = segment {
            let result = shared.classifier.classify_slow(segment.text()).await;
            let admitted = shared.admit_result_if(result, |state| state.generation == generation);
            shared.dispatch(admitted);
        }
    }

    /// Start a new response. Cooldown gates are kept.
    pub fn reset(&self) {
        let mut state = lock(&self.shared.state);
        state.buffer.clear();
        state.scan_cursor = 0;
        state.seen.clear();
        state.started = false;
        // A job still awaiting the model sees it is no longer active and
        // exits without emitting.
        state.active_job = None;
        state.job = None;
        state.generation += 1;
    }

    /// Start over completely, including both cooldown gates.
    pub fn full_reset(&self) {
        self.reset();
        let mut gates = lock(&self.shared.gates);
        gates.gesture.reset();
        gates.expression.reset();
    }

    /// The renderer reports how long the clip on `channel` actually plays;
    /// the channel stays blocked until it ends.
    pub fn report_playback(&self, channel: Channel, duration_ms: u64) {
        let now = self.shared.clock.now_ms();
        lock(&self.shared.gates)
            .gate_mut(channel)
            .busy(now, now.saturating_add(duration_ms));
    }

    pub fn phase(&self) -> StreamPhase {
        let state = lock(&self.shared.state);
        if state.active_job.is_some() {
            StreamPhase::ClassifyingSegments
        } else if state.started {
            StreamPhase::Buffering
        } else {
            StreamPhase::Idle
        }
    }

    pub fn is_classifying(&self) -> bool {
        lock(&self.shared.state).active_job.is_some()
    }

    pub fn buffered_text(&self) -> String {
        lock(&self.shared.state).buffer.as_str().to_string()
    }
}
