//! Full protocol over real sockets on the loopback interface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use twophase_coordinator::{CoordinatorConfig, CoordinatorState};
use twophase_core::Event;
use twophase_messages::{ParticipantRequest, Request, Response};
use twophase_participant::ParticipantState;
use twophase_production::{
    serve, ClientService, CoordinatorService, DeliveredResult, ParticipantService, ResultMonitor, Runner, Transport,
    TransportConfig,
};
use twophase_types::{ClientEndpoint, ClientId, KvStore, MessageId, TransactionMessage};

fn transport() -> Transport {
    Transport::new(
        TransportConfig::default()
            .with_connect_timeout(Duration::from_millis(200))
            .with_request_timeout(Duration::from_millis(500)),
    )
}

async fn start_coordinator() -> SocketAddr {
    let config = CoordinatorConfig::default()
        .with_vote_timeout(Duration::from_millis(200))
        .with_ack_timeout(Duration::from_millis(500))
        .with_recovery_settle_delay(Duration::from_millis(300));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let runner = Runner::new(CoordinatorState::new(config), transport(), None);
    tokio::spawn(serve(listener, Arc::new(CoordinatorService::new(runner.sender()))));
    tokio::spawn(runner.run());
    addr
}

async fn start_participant(coordinator: SocketAddr) -> (SocketAddr, Arc<KvStore>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let store = Arc::new(KvStore::new());
    let state = ParticipantState::with_store(addr, Arc::clone(&store));
    let id = state.id().clone();
    let runner = Runner::new(state, transport(), Some(coordinator));
    let events = runner.sender();
    tokio::spawn(serve(
        listener,
        Arc::new(ParticipantService::new(id, Arc::clone(&store), events.clone())),
    ));
    tokio::spawn(runner.run());
    events.send(Event::Started).await.unwrap();
    (addr, store)
}

async fn start_client() -> (ClientEndpoint, Arc<ResultMonitor>, mpsc::UnboundedReceiver<DeliveredResult>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = ClientEndpoint::new(ClientId::random(), listener.local_addr().unwrap());
    let monitor = Arc::new(ResultMonitor::new(Duration::from_secs(5)));
    let (results, rx) = mpsc::unbounded_channel();
    tokio::spawn(serve(listener, Arc::new(ClientService::new(Arc::clone(&monitor), results))));
    (endpoint, monitor, rx)
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_put_replicates_over_tcp() {
    let coordinator = start_coordinator().await;
    let mut participants = Vec::new();
    for _ in 0..3 {
        participants.push(start_participant(coordinator).await);
    }
    // Registration resolves each participant before it joins.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let (endpoint, monitor, mut results) = start_client().await;
    let message = TransactionMessage::put(MessageId::random(), "color", "blue", endpoint.client_id);
    monitor.track(&message, participants[0].0);
    let response = transport()
        .request(
            participants[0].0,
            &Request::from(ParticipantRequest::Put {
                message: message.clone(),
                client: endpoint,
            }),
        )
        .await
        .unwrap();
    assert_eq!(response, Response::Ack);

    let delivered = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivered.message_id, message.id());
    assert_eq!(delivered.result, "key: color value: blue has been stored");
    assert!(monitor.is_empty());

    for (_, store) in &participants {
        let store = Arc::clone(store);
        assert!(wait_until(|| store.get("color").as_deref() == Some("blue")).await);
    }

    let read = transport()
        .request(
            participants[2].0,
            &Request::from(ParticipantRequest::Get {
                client_id: endpoint.client_id,
                key: "color".into(),
            }),
        )
        .await
        .unwrap();
    assert_eq!(read, Response::Value(Some("blue".into())));
}

#[tokio::test]
async fn test_illegal_delete_reports_not_found() {
    let coordinator = start_coordinator().await;
    let (participant, store) = start_participant(coordinator).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let (endpoint, _monitor, mut results) = start_client().await;
    let message = TransactionMessage::delete(MessageId::random(), "ghost", endpoint.client_id);
    transport()
        .request(
            participant,
            &Request::from(ParticipantRequest::Delete {
                message,
                client: endpoint,
            }),
        )
        .await
        .unwrap();

    let delivered = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivered.result, "key: ghost is not found");
    assert!(store.is_empty());
}
