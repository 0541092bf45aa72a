//! In-memory fakes for the external collaborators in [`crate::traits`].
//!
//! Exercised by this crate's own test suite and exported behind the
//! `testing` feature so a downstream host can drive [`crate::subscriber::Subscriber`]
//! and [`crate::notifier::Notifier`] deterministically without a real SIP
//! stack, mirroring the surrounding codebase's practice of shipping fakes
//! for its own dialog/transaction layers alongside the real implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::events::{NotifierListener, SubscribeAction, SubscriberListener};
use crate::termination::{NotifierTerminationCode, SubscriberTerminationCode};
use crate::traits::{
    Credential, DialogHandle, DialogId, HeaderPair, InboundRequest, InboundResponse, TimerId, TimerService,
    TransactionSink, UserAgentDialogs,
};

/// A fake inbound request/response body callers can build inline in tests.
pub struct FakeRequest {
    method: String,
    headers: Vec<HeaderPair>,
    body: Vec<u8>,
    call_id: String,
    cseq: u32,
    to_tag: Option<String>,
    replies: Mutex<Vec<(u16, Option<String>)>>,
}

impl FakeRequest {
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            call_id: "test-call-id".to_string(),
            cseq: 1,
            to_tag: None,
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>, content_type: &str) -> Self {
        self.body = body;
        self.with_header("Content-Type", content_type)
    }

    pub fn replies(&self) -> Vec<(u16, Option<String>)> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl InboundRequest for FakeRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn call_id(&self) -> &str {
        &self.call_id
    }

    fn cseq(&self) -> u32 {
        self.cseq
    }

    fn to_tag(&self) -> Option<&str> {
        self.to_tag.as_deref()
    }

    fn get_header(&self, name: &str) -> Option<String> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone())
    }

    fn get_headers(&self, name: &str) -> Vec<String> {
        self.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone()).collect()
    }

    async fn reply(&self, status_code: u16, reason: Option<&str>, _extra_headers: &[HeaderPair]) {
        self.replies.lock().unwrap().push((status_code, reason.map(str::to_string)));
    }
}

/// A fake response used to drive `on_subscribe_response`/`on_notify_response`.
pub struct FakeResponse {
    pub status_code: u16,
    pub headers: Vec<HeaderPair>,
    pub to_tag: Option<String>,
    pub record_route: Vec<String>,
}

impl FakeResponse {
    pub fn new(status_code: u16) -> Self {
        Self { status_code, headers: Vec::new(), to_tag: None, record_route: Vec::new() }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_to_tag(mut self, tag: &str) -> Self {
        self.to_tag = Some(tag.to_string());
        self
    }
}

impl InboundResponse for FakeResponse {
    fn status_code(&self) -> u16 {
        self.status_code
    }

    fn get_header(&self, name: &str) -> Option<String> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone())
    }

    fn get_headers(&self, name: &str) -> Vec<String> {
        self.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone()).collect()
    }

    fn to_tag(&self) -> Option<&str> {
        self.to_tag.as_deref()
    }

    fn record_route(&self) -> Vec<String> {
        self.record_route.clone()
    }
}

/// Records every SUBSCRIBE sent at the UA level (no dialog yet).
#[derive(Default)]
pub struct FakeTransactionSink {
    sent: Mutex<Vec<(String, Vec<HeaderPair>)>>,
}

impl FakeTransactionSink {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl TransactionSink for FakeTransactionSink {
    async fn send_subscribe(&self, target: &str, headers: &[HeaderPair], _body: Option<Vec<u8>>, _credential: Option<&Credential>) {
        self.sent.lock().unwrap().push((target.to_string(), headers.to_vec()));
    }
}

/// A fake established dialog, tracked by call-id in [`FakeEnv`] so tests can
/// assert on in-dialog sends across a `Subscriber`/`Notifier`'s lifetime.
pub struct FakeDialogHandle {
    id: DialogId,
    route_set: Mutex<Vec<String>>,
    sent: Mutex<Vec<(String, Vec<HeaderPair>)>>,
    terminated: Mutex<bool>,
}

impl FakeDialogHandle {
    pub fn new(id: DialogId) -> Self {
        Self { id, route_set: Mutex::new(Vec::new()), sent: Mutex::new(Vec::new()), terminated: Mutex::new(false) }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn is_terminated(&self) -> bool {
        *self.terminated.lock().unwrap()
    }
}

#[async_trait]
impl DialogHandle for FakeDialogHandle {
    fn id(&self) -> &DialogId {
        &self.id
    }

    fn route_set(&self) -> Vec<String> {
        self.route_set.lock().unwrap().clone()
    }

    fn set_route_set(&self, route_set: Vec<String>) {
        *self.route_set.lock().unwrap() = route_set;
    }

    async fn send_request(&self, method: &str, _body: Option<Vec<u8>>, extra_headers: &[HeaderPair]) {
        self.sent.lock().unwrap().push((method.to_string(), extra_headers.to_vec()));
    }

    async fn terminate(&self) {
        *self.terminated.lock().unwrap() = true;
    }
}

/// Records dialog table register/destroy calls.
#[derive(Default)]
pub struct FakeUserAgentDialogs {
    registered: Mutex<Vec<DialogId>>,
    destroyed: Mutex<Vec<DialogId>>,
}

impl FakeUserAgentDialogs {
    pub fn registered_count(&self) -> usize {
        self.registered.lock().unwrap().len()
    }

    pub fn destroyed_count(&self) -> usize {
        self.destroyed.lock().unwrap().len()
    }
}

#[async_trait]
impl UserAgentDialogs for FakeUserAgentDialogs {
    async fn register_dialog(&self, id: &DialogId) {
        self.registered.lock().unwrap().push(id.clone());
    }

    async fn destroy_dialog(&self, id: &DialogId) {
        self.destroyed.lock().unwrap().push(id.clone());
    }
}

/// Allocates [`TimerId`]s; firing is driven explicitly by tests calling
/// `on_timer_fired` rather than by wall-clock elapse, keeping tests fast and
/// deterministic.
#[derive(Default)]
pub struct FakeTimerService {
    next_id: AtomicU64,
    cancelled: Mutex<Vec<TimerId>>,
}

impl FakeTimerService {
    pub fn is_cancelled(&self, id: TimerId) -> bool {
        self.cancelled.lock().unwrap().contains(&id)
    }
}

#[async_trait]
impl TimerService for FakeTimerService {
    async fn schedule(&self, _delay: Duration) -> TimerId {
        TimerId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn cancel(&self, id: TimerId) {
        self.cancelled.lock().unwrap().push(id);
    }
}

/// Bundles the four collaborator fakes plus a registry of dialogs handed out
/// by [`FakeEnv::dialog`], so tests can look up in-dialog send counts by
/// call-id after a `Subscriber`/`Notifier` has bound one internally.
pub struct FakeEnv {
    timers: Arc<FakeTimerService>,
    transaction: Arc<FakeTransactionSink>,
    ua: Arc<FakeUserAgentDialogs>,
    dialogs: Mutex<HashMap<String, Arc<FakeDialogHandle>>>,
    next_tag: AtomicU16,
}

impl FakeEnv {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            timers: Arc::new(FakeTimerService::default()),
            transaction: Arc::new(FakeTransactionSink::default()),
            ua: Arc::new(FakeUserAgentDialogs::default()),
            dialogs: Mutex::new(HashMap::new()),
            next_tag: AtomicU16::new(1),
        })
    }

    pub fn timers(&self) -> Arc<dyn TimerService> {
        self.timers.clone()
    }

    pub fn transaction(&self) -> Arc<FakeTransactionSink> {
        self.transaction.clone()
    }

    pub fn ua(&self) -> Arc<dyn UserAgentDialogs> {
        self.ua.clone()
    }

    pub fn fake_ua(&self) -> Arc<FakeUserAgentDialogs> {
        self.ua.clone()
    }

    pub fn fake_timers(&self) -> Arc<FakeTimerService> {
        self.timers.clone()
    }

    /// Allocate a fresh remote tag, the way a dialog layer would when
    /// building a server dialog from an inbound SUBSCRIBE.
    pub fn next_local_tag(&self) -> String {
        format!("tag-{}", self.next_tag.fetch_add(1, Ordering::SeqCst))
    }

    pub fn dialog(&self, call_id: &str, local_tag: &str, remote_tag: &str) -> Arc<dyn DialogHandle> {
        let handle = Arc::new(FakeDialogHandle::new(DialogId::new(call_id, local_tag, remote_tag)));
        self.dialogs.lock().unwrap().insert(call_id.to_string(), handle.clone());
        handle
    }

    pub fn dialog_sent_count(&self, call_id: &str) -> usize {
        self.dialogs.lock().unwrap().get(call_id).map(|d| d.sent_count()).unwrap_or(0)
    }

    pub fn dialog_is_terminated(&self, call_id: &str) -> bool {
        self.dialogs.lock().unwrap().get(call_id).map(|d| d.is_terminated()).unwrap_or(false)
    }
}

/// Records every [`SubscriberListener`] callback for assertions.
#[derive(Default)]
pub struct RecordingSubscriberListener {
    dialog_created: Mutex<u32>,
    active: Mutex<u32>,
    notify: Mutex<u32>,
    terminated: Mutex<Vec<(SubscriberTerminationCode, Option<String>, Option<u32>)>>,
}

impl RecordingSubscriberListener {
    pub fn notify_count(&self) -> u32 {
        *self.notify.lock().unwrap()
    }

    pub fn active_count(&self) -> u32 {
        *self.active.lock().unwrap()
    }

    pub fn dialog_created_count(&self) -> u32 {
        *self.dialog_created.lock().unwrap()
    }

    pub fn terminated_count(&self) -> usize {
        self.terminated.lock().unwrap().len()
    }

    pub fn terminated_code(&self) -> Option<SubscriberTerminationCode> {
        self.terminated.lock().unwrap().last().map(|(c, _, _)| *c)
    }
}

impl SubscriberListener for RecordingSubscriberListener {
    fn dialog_created(&self) {
        *self.dialog_created.lock().unwrap() += 1;
    }

    fn active(&self) {
        *self.active.lock().unwrap() += 1;
    }

    fn notify(&self, _is_final: bool, _request: &dyn InboundRequest, _body: &[u8], _content_type: &str) {
        *self.notify.lock().unwrap() += 1;
    }

    fn terminated(&self, code: SubscriberTerminationCode, reason: Option<&str>, retry_after: Option<u32>) {
        self.terminated.lock().unwrap().push((code, reason.map(str::to_string), retry_after));
    }
}

/// Records every [`NotifierListener`] callback for assertions.
#[derive(Default)]
pub struct RecordingNotifierListener {
    subscribe: Mutex<Vec<bool>>,
    terminated: Mutex<Vec<(NotifierTerminationCode, bool)>>,
    next_action: Mutex<Option<SubscribeAction>>,
}

impl RecordingNotifierListener {
    pub fn subscribe_count(&self) -> usize {
        self.subscribe.lock().unwrap().len()
    }

    pub fn last_is_unsubscribe(&self) -> Option<bool> {
        self.subscribe.lock().unwrap().last().copied()
    }

    pub fn terminated_count(&self) -> usize {
        self.terminated.lock().unwrap().len()
    }

    pub fn terminated_code(&self) -> Option<NotifierTerminationCode> {
        self.terminated.lock().unwrap().last().map(|(c, _)| *c)
    }

    pub fn last_send_final_notify(&self) -> Option<bool> {
        self.terminated.lock().unwrap().last().map(|(_, f)| *f)
    }

    /// Arrange for the next `subscribe()` callback to return this action —
    /// used to simulate an application calling `terminate()` from inside its
    /// `subscribe` handler.
    pub fn set_next_action(&self, action: SubscribeAction) {
        *self.next_action.lock().unwrap() = Some(action);
    }
}

impl NotifierListener for RecordingNotifierListener {
    fn subscribe(&self, is_unsubscribe: bool, _request: &dyn InboundRequest, _body: &[u8], _content_type: &str) -> SubscribeAction {
        self.subscribe.lock().unwrap().push(is_unsubscribe);
        self.next_action.lock().unwrap().take().unwrap_or(SubscribeAction::None)
    }

    fn terminated(&self, code: NotifierTerminationCode, send_final_notify: bool) {
        self.terminated.lock().unwrap().push((code, send_final_notify));
    }
}

