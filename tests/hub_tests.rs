mod common;

use common::{TestApp, spawn_app};
use huddle::client::api::{ApiClient, NewMessage};
use huddle::client::feed::ChannelFeed;
use huddle::client::hub::{Backoff, HubClient, forward_to_feed};
use huddle::client::poller::{poll_once, spawn_poller};
use huddle::client::presentation::ConnectionStatus;
use huddle::websocket::events::ServerMessage;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn next_matching<F>(rx: &mut mpsc::UnboundedReceiver<ServerMessage>, mut pred: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("hub event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for hub event")
}

async fn joined_client(addr: SocketAddr, channel_id: &str) -> (HubClient, mpsc::UnboundedReceiver<ServerMessage>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = HubClient::connect(format!("ws://{addr}/hubs/chat"), tx, Backoff::default());
    client.join(channel_id);

    let expected = channel_id.to_string();
    next_matching(&mut rx, |e| matches!(e, ServerMessage::Joined { channel_id } if *channel_id == expected)).await;
    assert_eq!(*client.status().borrow(), ConnectionStatus::Connected);

    (client, rx)
}

fn text(channel_id: &str, author_id: &str, content: &str) -> NewMessage {
    NewMessage {
        channel_id: channel_id.to_string(),
        author_id: author_id.to_string(),
        content: Some(content.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_members_of_a_channel_receive_new_messages() {
    let app = spawn_app().await;
    let author = app.create_user("alice").await;
    let server = app.create_server("Guild", &author).await;
    let general = app.create_channel(&server, "general").await;
    let random = app.create_channel(&server, "random").await;

    let addr = serve(&app).await;
    let (first, mut first_rx) = joined_client(addr, &general).await;
    let (second, mut second_rx) = joined_client(addr, &general).await;
    let (outsider, mut outsider_rx) = joined_client(addr, &random).await;

    let api = ApiClient::new(format!("http://{addr}"));
    let sent = api.send_message(&text(&general, &author, "hello")).await.unwrap();

    for rx in [&mut first_rx, &mut second_rx] {
        let event = next_matching(rx, |e| matches!(e, ServerMessage::NewMessage { .. })).await;
        let ServerMessage::NewMessage { message } = event else {
            unreachable!()
        };
        assert_eq!(message.message.id, sent.message.id);
        assert_eq!(message.author_username, "alice");
    }

    // a message in another channel is the first thing the outsider hears about
    let other = api.send_message(&text(&random, &author, "elsewhere")).await.unwrap();
    let event = next_matching(&mut outsider_rx, |e| matches!(e, ServerMessage::NewMessage { .. })).await;
    let ServerMessage::NewMessage { message } = event else {
        unreachable!()
    };
    assert_eq!(message.message.id, other.message.id);

    first.shutdown().await;
    second.shutdown().await;
    outsider.shutdown().await;
}

#[tokio::test]
async fn test_pushed_deletes_reach_the_feed() {
    let app = spawn_app().await;
    let author = app.create_user("bob").await;
    let server = app.create_server("Guild", &author).await;
    let general = app.create_channel(&server, "general").await;

    let addr = serve(&app).await;
    let (tx, rx) = mpsc::unbounded_channel();
    let client = HubClient::connect(format!("ws://{addr}/hubs/chat"), tx, Backoff::default());
    client.join(&general);

    let feed = Arc::new(Mutex::new(ChannelFeed::new(general.clone())));
    let forwarder = forward_to_feed(rx, feed.clone());

    // wait until the join has landed before sending
    tokio::time::timeout(WAIT, async {
        while app.state.hub.group_size(&general).await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let api = ApiClient::new(format!("http://{addr}"));
    let sent = api.send_message(&text(&general, &author, "oops")).await.unwrap();

    wait_for_len(&feed, 1).await;
    api.delete_message(&sent.message.id).await.unwrap();
    wait_for_len(&feed, 0).await;

    client.shutdown().await;
    forwarder.await.unwrap();
}

async fn wait_for_len(feed: &Mutex<ChannelFeed>, len: usize) {
    tokio::time::timeout(WAIT, async {
        while feed.lock().await.len() != len {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("feed never reached the expected length");
}

#[tokio::test]
async fn test_polling_recovers_missed_pushes_without_duplicates() {
    let app = spawn_app().await;
    let author = app.create_user("carol").await;
    let server = app.create_server("Guild", &author).await;
    let general = app.create_channel(&server, "general").await;

    let addr = serve(&app).await;
    let api = ApiClient::new(format!("http://{addr}"));

    // nobody is listening, so these pushes are lost
    let first = api.send_message(&text(&general, &author, "one")).await.unwrap();
    let second = api.send_message(&text(&general, &author, "two")).await.unwrap();

    let feed = Arc::new(Mutex::new(ChannelFeed::new(general.clone())));
    assert_eq!(poll_once(&api, &feed).await.unwrap(), 2);
    assert_eq!(poll_once(&api, &feed).await.unwrap(), 0);

    // a push that arrives late changes nothing
    assert!(!feed.lock().await.apply(&ServerMessage::NewMessage {
        message: second.clone()
    }));

    let cancel = CancellationToken::new();
    let poller = spawn_poller(
        Arc::new(api.clone()),
        feed.clone(),
        Duration::from_millis(50),
        cancel.clone(),
    );

    let third = api.send_message(&text(&general, &author, "three")).await.unwrap();
    wait_for_len(&feed, 3).await;

    cancel.cancel();
    poller.await.unwrap();

    let ids = feed
        .lock()
        .await
        .messages()
        .iter()
        .map(|m| m.message.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![first.message.id, second.message.id, third.message.id]);
}

#[tokio::test]
async fn test_client_sign_in_and_browse() {
    let app = spawn_app().await;
    let author = app.create_user("dana").await;
    let server = app.create_server("Guild", &author).await;
    app.create_channel(&server, "general").await;

    let addr = serve(&app).await;
    let api = ApiClient::new(format!("http://{addr}"));

    let session = api.sign_in("dana", "password").await.unwrap();
    assert_eq!(session.user_id(), author);
    assert!(!session.is_admin());

    let api = api.with_session(&session);
    let servers = api.user_servers(session.user_id()).await.unwrap();
    assert_eq!(servers.len(), 1);

    let channels = api.server_channels(&servers[0].id).await.unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].name, "general");

    let err = api.sign_in("dana", "wrong").await.unwrap_err();
    assert!(matches!(
        err,
        huddle::client::ClientError::Api { status: 401, .. }
    ));
}
