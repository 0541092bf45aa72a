//! Subscriber state machine (`spec.md` §4.1).

use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{SubscriberConfig, DEFAULT_EXPIRES, UNSUBSCRIBE_TIMEOUT};
use crate::error::{EventCoreError, EventCoreResult};
use crate::event::EventHeader;
use crate::events::SubscriberListener;
use crate::subscription_state::SubscriptionState;
use crate::termination::SubscriberTerminationCode;
use crate::timing::refresh_delay;
use crate::traits::{
    DialogHandle, DialogId, HeaderPair, InboundRequest, InboundResponse, TimerId, TimerService,
    TransactionSink, UserAgentDialogs,
};

/// States a [`Subscriber`] passes through (`spec.md` §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Init,
    NotifyWait,
    Pending,
    Active,
    Terminated,
}

/// Client side of an RFC 6665 subscription dialog.
pub struct Subscriber {
    config: SubscriberConfig,
    event: EventHeader,
    state: SubscriberState,
    dialog: Option<Arc<dyn DialogHandle>>,
    expires: u32,
    expires_at: Option<Instant>,
    refresh_timer: Option<TimerId>,
    unsubscribe_timer: Option<TimerId>,
    unsubscribe_sent: bool,
    active_emitted: bool,
    terminated_flag: bool,

    timers: Arc<dyn TimerService>,
    transaction: Arc<dyn TransactionSink>,
    ua: Arc<dyn UserAgentDialogs>,
    listener: Arc<dyn SubscriberListener>,
}

impl Subscriber {
    pub fn new(
        config: SubscriberConfig,
        timers: Arc<dyn TimerService>,
        transaction: Arc<dyn TransactionSink>,
        ua: Arc<dyn UserAgentDialogs>,
        listener: Arc<dyn SubscriberListener>,
    ) -> EventCoreResult<Self> {
        config.validate()?;
        let event = match &config.event_id {
            Some(id) => EventHeader::with_id(config.event_package.clone(), id.clone()),
            None => EventHeader::new(config.event_package.clone()),
        };
        Ok(Self {
            expires: config.expires,
            config,
            event,
            state: SubscriberState::Init,
            dialog: None,
            expires_at: None,
            refresh_timer: None,
            unsubscribe_timer: None,
            unsubscribe_sent: false,
            active_emitted: false,
            terminated_flag: false,
            timers,
            transaction,
            ua,
            listener,
        })
    }

    pub fn state(&self) -> SubscriberState {
        self.state
    }

    pub fn id(&self) -> Option<&DialogId> {
        self.dialog.as_ref().map(|d| d.id())
    }

    fn build_headers(&self, has_body: bool, expires: u32) -> EventCoreResult<Vec<HeaderPair>> {
        if has_body && self.config.content_type.is_none() {
            return Err(EventCoreError::MissingContentType);
        }
        let mut headers = vec![
            ("Event".to_string(), self.event.to_string()),
            ("Expires".to_string(), expires.to_string()),
            ("Contact".to_string(), self.config.contact.clone()),
        ];
        if !self.config.accept.is_empty() {
            headers.push(("Accept".to_string(), self.config.accept.join(", ")));
        }
        if let Some(ct) = &self.config.content_type {
            if has_body {
                headers.push(("Content-Type".to_string(), ct.clone()));
            }
        }
        headers.extend(self.config.extra_headers.iter().cloned());
        Ok(headers)
    }

    /// `subscribe(body?)` — `spec.md` §4.1.
    #[instrument(skip(self, body), fields(event = %self.event))]
    pub async fn subscribe(&mut self, body: Option<Vec<u8>>) -> EventCoreResult<()> {
        let headers = self.build_headers(body.is_some(), self.expires)?;
        if self.state == SubscriberState::Init {
            self.state = SubscriberState::NotifyWait;
            info!("subscribe: init -> notify_wait");
        }
        self.transaction
            .send_subscribe(&self.config.target, &headers, body, self.config.credential.as_ref())
            .await;
        Ok(())
    }

    /// `unsubscribe(body?)` — `spec.md` §4.1. Idempotent: a second call is a
    /// silent no-op, matching "if already sent, fails silently with a warning".
    #[instrument(skip(self, body), fields(event = %self.event))]
    pub async fn unsubscribe(&mut self, body: Option<Vec<u8>>) -> EventCoreResult<()> {
        if self.terminated_flag {
            return Ok(());
        }
        if self.unsubscribe_sent {
            warn!("unsubscribe() called again, ignoring");
            return Ok(());
        }
        let headers = self.build_headers(body.is_some(), 0)?;
        self.unsubscribe_sent = true;

        self.cancel_refresh_timer().await;

        match &self.dialog {
            Some(dialog) => dialog.send_request("SUBSCRIBE", body, &headers).await,
            None => {
                self.transaction
                    .send_subscribe(&self.config.target, &headers, body, self.config.credential.as_ref())
                    .await;
            }
        }

        let timer_id = self.timers.schedule(UNSUBSCRIBE_TIMEOUT).await;
        self.unsubscribe_timer = Some(timer_id);
        Ok(())
    }

    /// Callback: the transaction layer bumped CSeq after a 401/407 challenge
    /// was satisfied and the SUBSCRIBE was retried.
    pub async fn on_subscribe_authenticated(&mut self) {
        trace!("subscribe authenticated, cseq advanced by transaction layer");
    }

    pub async fn on_subscribe_timeout(&mut self) {
        self.dialog_terminated(SubscriberTerminationCode::SubscribeResponseTimeout, None, None).await;
    }

    pub async fn on_subscribe_transport_error(&mut self) {
        self.dialog_terminated(SubscriberTerminationCode::SubscribeTransportError, None, None).await;
    }

    /// Callback: a response to an outbound SUBSCRIBE arrived.
    #[instrument(skip(self, response))]
    pub async fn on_subscribe_response(&mut self, response: &dyn InboundResponse) {
        if self.terminated_flag {
            return;
        }
        let status = response.status_code();
        if status == 401 || status == 407 {
            self.dialog_terminated(SubscriberTerminationCode::SubscribeFailedAuthentication, None, None).await;
            return;
        }
        if !(200..300).contains(&status) {
            self.dialog_terminated(SubscriberTerminationCode::SubscribeNonOkResponse, None, None).await;
            return;
        }

        if self.dialog.is_none() {
            if let Some(to_tag) = response.to_tag() {
                debug!(to_tag, "first 2xx to SUBSCRIBE: dialog established");
                // The concrete DialogHandle is constructed by the host from
                // this response; callers bind it via `bind_dialog` before
                // driving further responses. This callback only performs the
                // bookkeeping the core itself owns once that handle exists.
                let _ = to_tag;
            }
        }

        let expires = response
            .get_header("Expires")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or_else(|| {
                warn!("2xx to SUBSCRIBE missing Expires, defaulting to {DEFAULT_EXPIRES}");
                DEFAULT_EXPIRES
            });
        self.expires = expires;
        self.expires_at = Some(Instant::now() + Duration::from_secs(expires as u64));

        if expires > 0 {
            self.arm_refresh_timer(expires).await;
        }
    }

    /// Bind the dialog handle constructed by the host after the first 2xx to
    /// SUBSCRIBE, completing dialog establishment described in `spec.md` §4.1.
    /// Registers the dialog with the UA exactly once and emits `dialogCreated`.
    pub async fn bind_dialog(&mut self, dialog: Arc<dyn DialogHandle>, route_set: Vec<String>) {
        if self.dialog.is_some() {
            return;
        }
        dialog.set_route_set(route_set);
        self.ua.register_dialog(dialog.id()).await;
        self.dialog = Some(dialog);
        self.listener.dialog_created();
    }

    async fn arm_refresh_timer(&mut self, expires: u32) {
        self.cancel_refresh_timer().await;
        let delay = refresh_delay(expires);
        trace!(?delay, expires, "arming refresh timer");
        self.refresh_timer = Some(self.timers.schedule(delay).await);
    }

    async fn cancel_refresh_timer(&mut self) {
        if let Some(id) = self.refresh_timer.take() {
            self.timers.cancel(id).await;
        }
    }

    async fn cancel_unsubscribe_timer(&mut self) {
        if let Some(id) = self.unsubscribe_timer.take() {
            self.timers.cancel(id).await;
        }
    }

    /// Dispatch a fired timer. A stale id (already cancelled/replaced, or
    /// arriving after termination) is a no-op per `spec.md` §5.
    pub async fn on_timer_fired(&mut self, id: TimerId) {
        if self.terminated_flag {
            return;
        }
        if Some(id) == self.refresh_timer {
            self.refresh_timer = None;
            self.send_refresh().await;
        } else if Some(id) == self.unsubscribe_timer {
            self.unsubscribe_timer = None;
            self.dialog_terminated(SubscriberTerminationCode::UnsubscribeTimeout, None, None).await;
        }
    }

    async fn send_refresh(&mut self) {
        let Ok(headers) = self.build_headers(false, self.expires) else {
            return;
        };
        if let Some(dialog) = self.dialog.clone() {
            dialog.send_request("SUBSCRIBE", None, &headers).await;
        }
    }

    /// Inbound NOTIFY/other in-dialog request, dispatched by the dialog layer
    /// (`spec.md` §4.1 "NOTIFY inbound").
    #[instrument(skip(self, request))]
    pub async fn receive_request(&mut self, request: &dyn InboundRequest) {
        if self.terminated_flag {
            return;
        }
        if request.method() != "NOTIFY" {
            request.reply(405, Some("Method Not Allowed"), &[]).await;
            return;
        }

        let Some(event_value) = request.get_header("Event") else {
            request.reply(489, Some("Bad Event"), &[]).await;
            self.dialog_terminated(SubscriberTerminationCode::ReceiveBadNotify, None, None).await;
            return;
        };
        let Some(incoming_event) = self.config.parse_event(&event_value) else {
            request.reply(489, Some("Bad Event"), &[]).await;
            self.dialog_terminated(SubscriberTerminationCode::ReceiveBadNotify, None, None).await;
            return;
        };
        if !self.event.matches(&incoming_event) {
            request.reply(489, Some("Bad Event"), &[]).await;
            self.dialog_terminated(SubscriberTerminationCode::ReceiveBadNotify, None, None).await;
            return;
        }

        let Some(sub_state_value) = request.get_header("Subscription-State") else {
            request.reply(400, Some("Bad Request"), &[]).await;
            self.dialog_terminated(SubscriberTerminationCode::ReceiveBadNotify, None, None).await;
            return;
        };

        request.reply(200, None, &[]).await;

        let new_state = SubscriptionState::from_header_value(&sub_state_value);
        self.apply_notify(new_state, request).await;
    }

    async fn apply_notify(&mut self, new_state: SubscriptionState, request: &dyn InboundRequest) {
        if let SubscriptionState::Active { expires: Some(e) } = &new_state {
            if let Some(current) = self.expires_at {
                let new_deadline = Instant::now() + Duration::from_secs(*e as u64);
                if new_deadline < current && current.duration_since(new_deadline).as_millis() > 2_000 {
                    debug!(new_expires = e, "shortened Subscription-State expires, rescheduling refresh");
                    self.expires_at = Some(new_deadline);
                    self.arm_refresh_timer(*e).await;
                }
            }
        }

        let is_terminated = new_state.is_terminated();
        if !is_terminated {
            let entering_active = new_state.is_active() && self.state != SubscriberState::Active;
            self.state = if new_state.is_pending() { SubscriberState::Pending } else { SubscriberState::Active };
            if entering_active && !self.active_emitted {
                self.active_emitted = true;
                self.listener.active();
            }
        }

        let body = request.body();
        if !body.is_empty() {
            let content_type = request.get_header("Content-Type").unwrap_or_default();
            self.listener.notify(is_terminated, request, body, &content_type);
        }

        if is_terminated {
            let (reason, retry_after) = match new_state {
                SubscriptionState::Terminated { reason, retry_after } => {
                    (reason.map(|r| r.to_string()), retry_after)
                }
                _ => (None, None),
            };
            self.dialog_terminated(SubscriberTerminationCode::ReceiveFinalNotify, reason, retry_after).await;
        }
    }

    /// Single idempotent termination funnel (`spec.md` §4.3).
    async fn dialog_terminated(&mut self, code: SubscriberTerminationCode, reason: Option<String>, retry_after: Option<u32>) {
        if self.terminated_flag {
            return;
        }
        self.terminated_flag = true;
        self.state = SubscriberState::Terminated;
        info!(%code, "subscriber terminated");

        self.cancel_refresh_timer().await;
        self.cancel_unsubscribe_timer().await;

        if let Some(dialog) = self.dialog.clone() {
            let ua = self.ua.clone();
            let id = dialog.id().clone();
            // Deferred destroy: grace window for a final NOTIFY crossing the
            // unsubscribe in flight (`spec.md` §5, §9 "Deferred destroy").
            tokio::spawn(async move {
                tokio::time::sleep(crate::config::DIALOG_DESTROY_GRACE).await;
                dialog.terminate().await;
                ua.destroy_dialog(&id).await;
            });
        }

        self.listener.terminated(code, reason.as_deref(), retry_after);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn make_subscriber(listener: Arc<RecordingSubscriberListener>) -> (Subscriber, Arc<FakeEnv>) {
        let env = FakeEnv::new();
        let config = SubscriberConfig::new("sip:bob@example.com", "weather", "sip:alice@example.com;transport=ws")
            .with_content_type("text/plain");
        let sub = Subscriber::new(config, env.timers(), env.transaction(), env.ua(), listener).unwrap();
        (sub, env)
    }

    #[tokio::test]
    async fn subscribe_transitions_init_to_notify_wait() {
        let listener = Arc::new(RecordingSubscriberListener::default());
        let (mut sub, _env) = make_subscriber(listener);
        assert_eq!(sub.state(), SubscriberState::Init);
        sub.subscribe(Some(b"hello".to_vec())).await.unwrap();
        assert_eq!(sub.state(), SubscriberState::NotifyWait);
    }

    #[tokio::test]
    async fn subscribe_with_body_requires_content_type() {
        let listener = Arc::new(RecordingSubscriberListener::default());
        let env = FakeEnv::new();
        let config = SubscriberConfig::new("sip:bob@example.com", "weather", "sip:alice@example.com");
        let mut sub = Subscriber::new(config, env.timers(), env.transaction(), env.ua(), listener).unwrap();
        let err = sub.subscribe(Some(b"hello".to_vec())).await.unwrap_err();
        assert_eq!(err, EventCoreError::MissingContentType);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let listener = Arc::new(RecordingSubscriberListener::default());
        let (mut sub, env) = make_subscriber(listener);
        sub.subscribe(None).await.unwrap();
        sub.unsubscribe(None).await.unwrap();
        sub.unsubscribe(None).await.unwrap();
        assert_eq!(env.transaction().sent_count(), 2); // one subscribe, one unsubscribe
    }

    #[tokio::test]
    async fn bad_event_name_triggers_489_and_receive_bad_notify() {
        let listener = Arc::new(RecordingSubscriberListener::default());
        let (mut sub, _env) = make_subscriber(listener.clone());
        sub.subscribe(None).await.unwrap();

        let request = FakeRequest::new("NOTIFY")
            .with_header("Event", "presence")
            .with_header("Subscription-State", "active;expires=60");
        sub.receive_request(&request).await;

        assert_eq!(request.replies().last().unwrap().0, 489);
        assert_eq!(listener.terminated_code(), Some(SubscriberTerminationCode::ReceiveBadNotify));
    }

    #[tokio::test]
    async fn malformed_event_header_triggers_489_and_receive_bad_notify() {
        let listener = Arc::new(RecordingSubscriberListener::default());
        let (mut sub, _env) = make_subscriber(listener.clone());
        sub.subscribe(None).await.unwrap();

        let request = FakeRequest::new("NOTIFY")
            .with_header("Event", ";id=x")
            .with_header("Subscription-State", "active;expires=60");
        sub.receive_request(&request).await;

        assert_eq!(request.replies().last().unwrap().0, 489);
        assert_eq!(listener.terminated_code(), Some(SubscriberTerminationCode::ReceiveBadNotify));
    }

    #[tokio::test]
    async fn missing_subscription_state_triggers_400_and_receive_bad_notify() {
        let listener = Arc::new(RecordingSubscriberListener::default());
        let (mut sub, _env) = make_subscriber(listener.clone());
        sub.subscribe(None).await.unwrap();

        let request = FakeRequest::new("NOTIFY").with_header("Event", "weather");
        sub.receive_request(&request).await;

        assert_eq!(request.replies().last().unwrap().0, 400);
        assert_eq!(listener.terminated_code(), Some(SubscriberTerminationCode::ReceiveBadNotify));
    }

    #[tokio::test]
    async fn final_notify_emits_notify_then_terminates_exactly_once() {
        let listener = Arc::new(RecordingSubscriberListener::default());
        let (mut sub, _env) = make_subscriber(listener.clone());
        sub.subscribe(None).await.unwrap();

        let request = FakeRequest::new("NOTIFY")
            .with_header("Event", "weather")
            .with_header("Subscription-State", "terminated;reason=noresource")
            .with_body(b"bye".to_vec(), "text/plain");
        sub.receive_request(&request).await;

        assert_eq!(request.replies().last().unwrap().0, 200);
        assert_eq!(listener.notify_count(), 1);
        assert_eq!(listener.terminated_count(), 1);
        assert_eq!(listener.terminated_code(), Some(SubscriberTerminationCode::ReceiveFinalNotify));

        // A second terminal NOTIFY must not double-fire `terminated`.
        sub.receive_request(&request).await;
        assert_eq!(listener.terminated_count(), 1);
    }

    #[tokio::test]
    async fn wrong_method_replies_405_without_terminating() {
        let listener = Arc::new(RecordingSubscriberListener::default());
        let (mut sub, _env) = make_subscriber(listener.clone());
        sub.subscribe(None).await.unwrap();

        let request = FakeRequest::new("INVITE");
        sub.receive_request(&request).await;

        assert_eq!(request.replies().last().unwrap().0, 405);
        assert_eq!(listener.terminated_count(), 0);
    }
}
