//! End-to-end scenarios driving `Subscriber` and `Notifier` together through
//! the fakes in `test_support`, one state machine playing the SUBSCRIBE/NOTIFY
//! peer of the other by hand (there is no shared transport in these tests).

use std::sync::Arc;

use sip_event_core::test_support::{FakeEnv, FakeRequest, RecordingNotifierListener, RecordingSubscriberListener};
use sip_event_core::{
    NotifierConfig, NotifierState, NotifierTerminationCode, SubscriberConfig, SubscriberState, SubscriberTerminationCode,
};

#[tokio::test]
async fn happy_path_weather_subscription_reaches_active_and_delivers_notify() {
    let env = FakeEnv::new();
    let sub_listener = Arc::new(RecordingSubscriberListener::default());
    let config = SubscriberConfig::new("sip:weather-service@example.com", "weather", "sip:alice@example.com;transport=ws")
        .with_content_type("application/weather+xml");
    let mut subscriber =
        sip_event_core::Subscriber::new(config, env.timers(), env.transaction(), env.ua(), sub_listener.clone()).unwrap();

    subscriber.subscribe(None).await.unwrap();
    assert_eq!(subscriber.state(), SubscriberState::NotifyWait);
    assert_eq!(env.transaction().sent_count(), 1);

    let notify = FakeRequest::new("NOTIFY")
        .with_header("Event", "weather")
        .with_header("Subscription-State", "active;expires=3600")
        .with_body(b"<weather>sunny</weather>".to_vec(), "application/weather+xml");
    subscriber.receive_request(&notify).await;

    assert_eq!(notify.replies().last().unwrap().0, 200);
    assert_eq!(sub_listener.active_count(), 1);
    assert_eq!(sub_listener.notify_count(), 1);
    assert_eq!(sub_listener.terminated_count(), 0);
}

#[tokio::test]
async fn fetch_subscribe_answers_with_final_notify_and_no_active_state() {
    let env = FakeEnv::new();
    let listener = Arc::new(RecordingNotifierListener::default());
    let request = Arc::new(
        FakeRequest::new("SUBSCRIBE")
            .with_header("Event", "weather")
            .with_header("Expires", "0"),
    );
    let dialog = env.dialog("fetch-call", "local-1", "remote-1");
    let config = NotifierConfig::new("application/weather+xml");
    let mut notifier = sip_event_core::Notifier::new(request, dialog, config, false, env.timers(), env.ua(), listener.clone()).unwrap();

    notifier.start().await;

    assert_eq!(listener.last_is_unsubscribe(), Some(true));
    assert_eq!(listener.terminated_code(), Some(NotifierTerminationCode::ReceiveUnsubscribe));
    assert_eq!(notifier.state(), NotifierState::Terminated);
}

#[tokio::test]
async fn bad_event_header_on_notify_terminates_with_receive_bad_notify() {
    let env = FakeEnv::new();
    let listener = Arc::new(RecordingSubscriberListener::default());
    let config = SubscriberConfig::new("sip:bob@example.com", "weather", "sip:alice@example.com");
    let mut subscriber = sip_event_core::Subscriber::new(config, env.timers(), env.transaction(), env.ua(), listener.clone()).unwrap();
    subscriber.subscribe(None).await.unwrap();

    let mismatched = FakeRequest::new("NOTIFY")
        .with_header("Event", "presence")
        .with_header("Subscription-State", "active;expires=60");
    subscriber.receive_request(&mismatched).await;

    assert_eq!(mismatched.replies().last().unwrap().0, 489);
    assert_eq!(listener.terminated_code(), Some(SubscriberTerminationCode::ReceiveBadNotify));
}

#[tokio::test]
async fn unsubscribe_timeout_fires_without_a_final_notify() {
    let env = FakeEnv::new();
    let listener = Arc::new(RecordingSubscriberListener::default());
    let config = SubscriberConfig::new("sip:bob@example.com", "weather", "sip:alice@example.com");
    let mut subscriber = sip_event_core::Subscriber::new(config, env.timers(), env.transaction(), env.ua(), listener.clone()).unwrap();
    subscriber.subscribe(None).await.unwrap();
    subscriber.unsubscribe(None).await.unwrap();

    // `unsubscribe()` is the first and only timer this scenario arms
    // (no SUBSCRIBE response ever arrives to arm a refresh timer), so the
    // fake timer service's first allocated id is the unsubscribe timeout.
    subscriber.on_timer_fired(sip_event_core::traits::TimerId(0)).await;

    assert_eq!(listener.terminated_code(), Some(SubscriberTerminationCode::UnsubscribeTimeout));
}

#[tokio::test]
async fn notifier_expiry_without_refresh_sends_final_notify_and_terminates() {
    let env = FakeEnv::new();
    let listener = Arc::new(RecordingNotifierListener::default());
    let request = Arc::new(
        FakeRequest::new("SUBSCRIBE")
            .with_header("Event", "weather")
            .with_header("Expires", "3600"),
    );
    let dialog = env.dialog("expiry-call", "local-1", "remote-1");
    let config = NotifierConfig::new("application/weather+xml").with_contact("sip:notifier@example.com");
    let mut notifier = sip_event_core::Notifier::new(request, dialog, config, false, env.timers(), env.ua(), listener.clone()).unwrap();
    notifier.start().await;

    // `start()` arms exactly one timer in this scenario (the expiry timer),
    // and a fresh `FakeTimerService` allocates ids starting at 0.
    notifier.on_timer_fired(sip_event_core::traits::TimerId(0)).await;

    assert_eq!(listener.terminated_code(), Some(NotifierTerminationCode::SubscriptionExpired));
    assert_eq!(listener.last_send_final_notify(), Some(true));
    assert_eq!(notifier.state(), NotifierState::Terminated);
    assert!(env.dialog_is_terminated("expiry-call"));
}
