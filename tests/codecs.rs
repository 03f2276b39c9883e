mod common;

use common::*;
use gameping::protocols::bedrock::BedrockCodec;
use gameping::protocols::java::JavaCodec;
use gameping::protocols::quake3::Quake3Codec;
use gameping::protocols::source::SourceCodec;
use gameping::protocols::tcp::{TcpCodec, OPEN_PORT_NOTE};
use gameping::protocols::teamspeak::TeamSpeakCodec;
use gameping::protocols::{Codec, ProbeTarget};
use gameping::{ProbeStage, QueryError};
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_millis(500);

fn target(port: u16) -> ProbeTarget {
    ProbeTarget::new("127.0.0.1", port)
}

#[tokio::test]
async fn source_reads_info_reply() {
    let addr = udp_server(|request| {
        assert_eq!(request.len(), 25);
        Some(a2s_info_reply("Test Server", "de_inferno", "Counter-Strike 2", 7, 32))
    })
    .await;

    let status = SourceCodec::new(TIMEOUT).probe(&target(addr.port())).await.unwrap();
    assert_eq!(status.hostname.as_deref(), Some("Test Server"));
    assert_eq!(status.map.as_deref(), Some("de_inferno"));
    assert_eq!(status.players, 7);
    assert_eq!(status.max_players, 32);
}

#[tokio::test]
async fn source_answers_challenge() {
    let addr = udp_server(|request| {
        if request.len() == 25 {
            Some(vec![0xFF, 0xFF, 0xFF, 0xFF, 0x41, 1, 2, 3, 4])
        } else if request.ends_with(&[1, 2, 3, 4]) {
            Some(a2s_info_reply("Challenged", "map", "game", 1, 2))
        } else {
            None
        }
    })
    .await;

    let status = SourceCodec::new(TIMEOUT).probe(&target(addr.port())).await.unwrap();
    assert_eq!(status.hostname.as_deref(), Some("Challenged"));
}

#[tokio::test]
async fn source_truncated_reply_is_malformed() {
    let addr = udp_server(|_| {
        let mut reply = a2s_info_reply("Name", "map", "game", 1, 2);
        reply.truncate(12);
        Some(reply)
    })
    .await;

    let err = SourceCodec::new(TIMEOUT).probe(&target(addr.port())).await.unwrap_err();
    assert!(matches!(err, QueryError::MalformedResponse(_)), "{:?}", err);
}

#[tokio::test]
async fn silent_udp_server_times_out_on_schedule() {
    let socket = silent_udp().await;
    let port = socket.local_addr().unwrap().port();

    let started = Instant::now();
    let err = SourceCodec::new(Duration::from_millis(200))
        .probe(&target(port))
        .await
        .unwrap_err();
    assert_eq!(err, QueryError::Timeout(ProbeStage::AwaitingResponse));
    assert!(started.elapsed() < Duration::from_millis(1200));
}

#[tokio::test]
async fn java_reads_status() {
    let addr = minecraft_server(
        r#"{"description":{"text":"§aHello","extra":[{"text":" §lWorld"}]},"players":{"online":5,"max":50},"version":{"name":"1.21"}}"#,
    )
    .await;

    let status = JavaCodec::new(TIMEOUT).probe(&target(addr.port())).await.unwrap();
    assert_eq!(status.hostname.as_deref(), Some("Hello World"));
    assert_eq!(status.players, 5);
    assert_eq!(status.max_players, 50);
    assert_eq!(status.version.as_deref(), Some("1.21"));
}

#[tokio::test]
async fn java_silent_server_times_out() {
    let addr = silent_tcp().await;
    let started = Instant::now();
    let err = JavaCodec::new(Duration::from_millis(200))
        .probe(&target(addr.port()))
        .await
        .unwrap_err();
    assert_eq!(err, QueryError::Timeout(ProbeStage::AwaitingResponse));
    assert!(started.elapsed() < Duration::from_millis(1200));
}

#[tokio::test]
async fn java_refused_connection() {
    let port = closed_port().await;
    let err = JavaCodec::new(TIMEOUT).probe(&target(port)).await.unwrap_err();
    assert!(matches!(err, QueryError::ConnectionFailed(_)), "{:?}", err);
}

#[tokio::test]
async fn bedrock_reads_pong() {
    let addr = udp_server(|request| {
        assert_eq!(request[0], 0x01);
        Some(bedrock_pong("MCPE;Bedrock Test;594;1.20.10;3;30;1;My World;Survival"))
    })
    .await;

    let status = BedrockCodec::new(TIMEOUT).probe(&target(addr.port())).await.unwrap();
    assert_eq!(status.hostname.as_deref(), Some("Bedrock Test"));
    assert_eq!(status.players, 3);
    assert_eq!(status.max_players, 30);
    assert_eq!(status.map.as_deref(), Some("My World"));
    assert_eq!(status.version.as_deref(), Some("1.20.10"));
}

#[tokio::test]
async fn teamspeak_reads_serverinfo() {
    let addr = teamspeak_server(
        "virtualserver_name=Voice\\sChat virtualserver_clientsonline=4 virtualserver_maxclients=100",
    )
    .await;

    let status = TeamSpeakCodec::new(TIMEOUT).probe(&target(addr.port())).await.unwrap();
    assert_eq!(status.hostname.as_deref(), Some("Voice Chat"));
    assert_eq!(status.players, 4);
    assert_eq!(status.max_players, 100);
}

#[tokio::test]
async fn quake3_reads_status() {
    let addr = udp_server(|request| {
        assert_eq!(request, b"\xFF\xFF\xFF\xFFgetstatus\n");
        Some(
            b"\xFF\xFF\xFF\xFFstatusResponse\n\\sv_hostname\\Arena\\mapname\\q3dm6\\sv_maxclients\\12\n3 40 \"one\"\n"
                .to_vec(),
        )
    })
    .await;

    let status = Quake3Codec::new(TIMEOUT).probe(&target(addr.port())).await.unwrap();
    assert_eq!(status.hostname.as_deref(), Some("Arena"));
    assert_eq!(status.map.as_deref(), Some("q3dm6"));
    assert_eq!(status.players, 1);
    assert_eq!(status.max_players, 12);
}

#[tokio::test]
async fn tcp_check_open_and_closed() {
    let open = silent_tcp().await;
    let status = TcpCodec::new(TIMEOUT).probe(&target(open.port())).await.unwrap();
    assert_eq!(status.players, 0);
    assert_eq!(status.max_players, 0);
    assert_eq!(status.note.as_deref(), Some(OPEN_PORT_NOTE));

    let port = closed_port().await;
    let err = TcpCodec::new(TIMEOUT).probe(&target(port)).await.unwrap_err();
    assert_eq!(err, QueryError::PortClosed(port));
}
