//! Notifier state machine (`spec.md` §4.2).

use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::NotifierConfig;
use crate::error::{EventCoreError, EventCoreResult};
use crate::event::EventHeader;
use crate::events::{NotifierListener, SubscribeAction};
use crate::subscription_state::{SubscriptionState, TerminationReason};
use crate::termination::NotifierTerminationCode;
use crate::traits::{DialogHandle, HeaderPair, InboundRequest, InboundResponse, TimerId, TimerService, UserAgentDialogs};

/// States a [`Notifier`] passes through (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierState {
    Pending,
    Active,
    Terminated,
}

/// Server side of an RFC 6665 subscription dialog.
pub struct Notifier {
    config: NotifierConfig,
    event: EventHeader,
    state: NotifierState,
    expires: u32,
    expiry_deadline: Option<Instant>,
    dialog: Arc<dyn DialogHandle>,
    initial_request: Option<Arc<dyn InboundRequest>>,
    expiry_timer: Option<TimerId>,
    terminated_flag: bool,
    final_notify_sent: bool,
    first_notify_response: bool,
    pending_termination: Option<(Option<TerminationReason>, Option<u32>)>,

    timers: Arc<dyn TimerService>,
    ua: Arc<dyn UserAgentDialogs>,
    listener: Arc<dyn NotifierListener>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("config", &self.config)
            .field("event", &self.event)
            .field("state", &self.state)
            .field("expires", &self.expires)
            .field("expiry_deadline", &self.expiry_deadline)
            .field("expiry_timer", &self.expiry_timer)
            .field("terminated_flag", &self.terminated_flag)
            .field("final_notify_sent", &self.final_notify_sent)
            .field("first_notify_response", &self.first_notify_response)
            .field("pending_termination", &self.pending_termination)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    /// Construct a notifier from an already-accepted inbound SUBSCRIBE and
    /// its corresponding (already built) server dialog. Building the dialog
    /// itself — which can fail if the SUBSCRIBE carries no Contact — is a
    /// host responsibility (`spec.md` §4.2): a host whose dialog
    /// construction fails should never reach this constructor and should
    /// surface [`EventCoreError::DialogConstructionFailed`] itself.
    #[instrument(skip_all)]
    pub fn new(
        initial_request: Arc<dyn InboundRequest>,
        dialog: Arc<dyn DialogHandle>,
        config: NotifierConfig,
        pending: bool,
        timers: Arc<dyn TimerService>,
        ua: Arc<dyn UserAgentDialogs>,
        listener: Arc<dyn NotifierListener>,
    ) -> EventCoreResult<Self> {
        config.validate()?;
        let event_value = initial_request
            .get_header("Event")
            .ok_or_else(|| EventCoreError::InvalidConfig("initial SUBSCRIBE missing Event header".into()))?;
        let event = config
            .parse_event(&event_value)
            .ok_or_else(|| EventCoreError::InvalidConfig("initial SUBSCRIBE has malformed Event header".into()))?;
        let expires = config.clamp_expires(
            initial_request
                .get_header("Expires")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or_else(|| config.default_expires()),
        );

        Ok(Self {
            config,
            event,
            state: if pending { NotifierState::Pending } else { NotifierState::Active },
            expires,
            expiry_deadline: None,
            dialog,
            initial_request: Some(initial_request),
            expiry_timer: None,
            terminated_flag: false,
            final_notify_sent: false,
            first_notify_response: true,
            pending_termination: None,
            timers,
            ua,
            listener,
        })
    }

    pub fn state(&self) -> NotifierState {
        self.state
    }

    pub fn event(&self) -> &EventHeader {
        &self.event
    }

    /// Re-enter request handling with the captured initial SUBSCRIBE, so the
    /// first `subscribe` event reaches the application after it has had a
    /// chance to register its listener (`spec.md` §4.2 "start()").
    pub async fn start(&mut self) {
        if let Some(request) = self.initial_request.take() {
            self.ua.register_dialog(self.dialog.id()).await;
            self.handle_subscribe(request.as_ref()).await;
        }
    }

    /// `setActiveState()` — pending → active; no-op otherwise.
    pub fn set_active_state(&mut self) {
        if self.state == NotifierState::Pending {
            self.state = NotifierState::Active;
        }
    }

    fn remaining_expires(&self) -> u32 {
        match self.expiry_deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()).as_secs() as u32,
            None => self.expires,
        }
    }

    fn compose_subscription_state(&self) -> SubscriptionState {
        match self.state {
            NotifierState::Pending => SubscriptionState::Pending,
            NotifierState::Active => SubscriptionState::Active { expires: Some(self.remaining_expires()) },
            NotifierState::Terminated => {
                let (reason, retry_after) = self.pending_termination.unwrap_or((None, None));
                SubscriptionState::Terminated { reason, retry_after }
            }
        }
    }

    /// `notify(body?)` — `spec.md` §4.2. Idempotent no-op once the final
    /// NOTIFY has been sent.
    #[instrument(skip(self, body))]
    pub async fn notify(&mut self, body: Option<Vec<u8>>) {
        if self.final_notify_sent {
            warn!("notify() called after final NOTIFY already sent, ignoring");
            return;
        }
        let sub_state = self.compose_subscription_state();
        let mut headers: Vec<HeaderPair> = vec![
            ("Event".to_string(), self.event.to_string()),
            ("Subscription-State".to_string(), sub_state.to_header_value()),
        ];
        if let Some(contact) = &self.config.contact {
            headers.push(("Contact".to_string(), contact.clone()));
        }
        if body.is_some() && !body.as_ref().unwrap().is_empty() {
            headers.push(("Content-Type".to_string(), self.config.content_type.clone()));
        }
        headers.extend(self.config.extra_headers.iter().cloned());

        self.dialog.send_request("NOTIFY", body, &headers).await;

        if self.state == NotifierState::Terminated {
            self.final_notify_sent = true;
        }
    }

    /// `terminate(body?, reason?, retry_after?)` — `spec.md` §4.2.
    ///
    /// Sets state before composing the Subscription-State header (per the
    /// `spec.md` §9 open-question #2 resolution: the later revision "sets
    /// state=terminated first, then composes Subscription-State" so the
    /// final NOTIFY carries `reason=` without a stray `expires=`).
    pub async fn terminate(&mut self, body: Option<Vec<u8>>, reason: Option<TerminationReason>, retry_after: Option<u32>) {
        self.finalize(NotifierTerminationCode::SendFinalNotify, body, reason, retry_after).await;
    }

    async fn finalize(
        &mut self,
        code: NotifierTerminationCode,
        body: Option<Vec<u8>>,
        reason: Option<TerminationReason>,
        retry_after: Option<u32>,
    ) {
        if self.terminated_flag {
            return;
        }
        self.state = NotifierState::Terminated;
        self.pending_termination = Some((reason, retry_after));
        self.notify(body).await;
        self.dialog_terminated(code).await;
    }

    /// Inbound SUBSCRIBE dispatched by the dialog layer.
    #[instrument(skip(self, request))]
    pub async fn receive_request(&mut self, request: &dyn InboundRequest) {
        if self.terminated_flag {
            return;
        }
        self.handle_subscribe(request).await;
    }

    async fn handle_subscribe(&mut self, request: &dyn InboundRequest) {
        if request.method() != "SUBSCRIBE" {
            request.reply(405, Some("Method Not Allowed"), &[]).await;
            return;
        }

        let expires = self.config.clamp_expires(
            request
                .get_header("Expires")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or_else(|| self.config.default_expires()),
        );
        self.expires = expires;

        let mut reply_headers = vec![("Expires".to_string(), expires.to_string())];
        if let Some(contact) = &self.config.contact {
            reply_headers.push(("Contact".to_string(), contact.clone()));
        }
        request.reply(200, None, &reply_headers).await;

        if expires > 0 {
            self.rearm_expiry_timer(expires).await;
        } else {
            self.cancel_expiry_timer().await;
        }

        let is_unsubscribe = expires == 0;
        let body = request.body();
        let content_type = request.get_header("Content-Type").unwrap_or_default();
        let action = self.listener.subscribe(is_unsubscribe, request, body, &content_type);

        match action {
            SubscribeAction::Terminate { body, reason, retry_after } => {
                self.finalize(NotifierTerminationCode::SendFinalNotify, body, reason, retry_after).await;
            }
            SubscribeAction::None if is_unsubscribe => {
                self.dialog_terminated(NotifierTerminationCode::ReceiveUnsubscribe).await;
            }
            SubscribeAction::None => {}
        }
    }

    async fn rearm_expiry_timer(&mut self, expires: u32) {
        self.cancel_expiry_timer().await;
        self.expiry_deadline = Some(Instant::now() + Duration::from_secs(expires as u64));
        trace!(expires, "arming subscription expiry timer");
        self.expiry_timer = Some(self.timers.schedule(Duration::from_secs(expires as u64)).await);
    }

    async fn cancel_expiry_timer(&mut self) {
        if let Some(id) = self.expiry_timer.take() {
            self.timers.cancel(id).await;
        }
    }

    /// Dispatch a fired timer; a stale id is a no-op per `spec.md` §5.
    pub async fn on_timer_fired(&mut self, id: TimerId) {
        if self.terminated_flag || Some(id) != self.expiry_timer {
            return;
        }
        self.expiry_timer = None;
        debug!("subscription expiry timer fired with no refresh, sending final NOTIFY");
        self.finalize(NotifierTerminationCode::SubscriptionExpired, None, Some(TerminationReason::Timeout), None)
            .await;
    }

    /// Callback: a response to an outbound NOTIFY arrived.
    pub async fn on_notify_response(&mut self, response: &dyn InboundResponse) {
        if self.terminated_flag {
            return;
        }
        let status = response.status_code();
        if self.first_notify_response && (200..300).contains(&status) {
            self.first_notify_response = false;
            let mut route_set: Vec<String> = response.record_route();
            route_set.reverse();
            self.dialog.set_route_set(route_set);
            return;
        }
        if status == 401 || status == 407 {
            self.dialog_terminated(NotifierTerminationCode::NotifyFailedAuthentication).await;
        } else if status >= 300 {
            self.dialog_terminated(NotifierTerminationCode::NotifyNonOkResponse).await;
        }
    }

    pub async fn on_notify_timeout(&mut self) {
        self.dialog_terminated(NotifierTerminationCode::NotifyResponseTimeout).await;
    }

    pub async fn on_notify_transport_error(&mut self) {
        self.dialog_terminated(NotifierTerminationCode::NotifyTransportError).await;
    }

    pub async fn on_notify_dialog_error(&mut self) {
        self.dialog_terminated(NotifierTerminationCode::NotifyNonOkResponse).await;
    }

    /// Single idempotent termination funnel (`spec.md` §4.3). Unlike the
    /// subscriber, the notifier tears its dialog down immediately — there is
    /// no late-NOTIFY window to protect on the sending side.
    async fn dialog_terminated(&mut self, code: NotifierTerminationCode) {
        if self.terminated_flag {
            return;
        }
        self.terminated_flag = true;
        self.state = NotifierState::Terminated;
        info!(%code, "notifier terminated");

        self.cancel_expiry_timer().await;
        self.dialog.terminate().await;
        self.ua.destroy_dialog(self.dialog.id()).await;

        self.listener.terminated(code, code.send_final_notify());
    }
}
