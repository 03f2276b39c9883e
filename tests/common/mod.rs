#![allow(dead_code)]

use gameping::config::Config;
use gameping::protocols::java::write_string;
use gameping::QueryEngine;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UdpSocket};

pub fn a2s_info_reply(name: &str, map: &str, game: &str, players: u8, max: u8) -> Vec<u8> {
    let mut packet = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x49, 17];
    for s in [name, map, "folder", game] {
        packet.extend_from_slice(s.as_bytes());
        packet.push(0);
    }
    packet.extend_from_slice(&730u16.to_le_bytes());
    packet.push(players);
    packet.push(max);
    packet
}

pub fn bedrock_pong(motd: &str) -> Vec<u8> {
    let mut packet = vec![0x1C];
    packet.extend_from_slice(&0u64.to_be_bytes());
    packet.extend_from_slice(&7u64.to_be_bytes());
    packet.extend_from_slice(&gameping::protocols::bedrock::MAGIC);
    packet.extend_from_slice(&(motd.len() as u16).to_be_bytes());
    packet.extend_from_slice(motd.as_bytes());
    packet
}

/// Answers every datagram with whatever `respond` returns.
pub async fn udp_server<F>(respond: F) -> SocketAddr
where
    F: Fn(&[u8]) -> Option<Vec<u8>> + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        loop {
            let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            if let Some(reply) = respond(&buf[..n]) {
                let _ = socket.send_to(&reply, peer).await;
            }
        }
    });
    addr
}

/// A UDP socket that never answers. Keep it alive for the test's duration.
pub async fn silent_udp() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

/// A TCP port that accepts and then says nothing.
pub async fn silent_tcp() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

/// A port nobody listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub async fn minecraft_server(json: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 512];
                if stream.read(&mut buf).await.unwrap_or(0) == 0 {
                    return;
                }
                let mut body = vec![0x00];
                body.extend(write_string(json));
                let mut packet = gameping::protocols::java::write_varint(body.len() as i32);
                packet.extend(body);
                let _ = stream.write_all(&packet).await;
                // drain until the client hangs up so unread bytes never cause a reset
                while stream.read(&mut buf).await.unwrap_or(0) > 0 {}
            });
        }
    });
    addr
}

pub async fn teamspeak_server(serverinfo: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let _ = write
                    .write_all(b"TS3\n\rWelcome to the TeamSpeak 3 ServerQuery interface.\n\r")
                    .await;
                let mut lines = BufReader::new(read).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let reply = match line.trim() {
                        "use sid=1" => "error id=0 msg=ok\n\r".to_string(),
                        "serverinfo" => format!("{}\n\rerror id=0 msg=ok\n\r", serverinfo),
                        _ => "error id=256 msg=command\\snot\\sfound\n\r".to_string(),
                    };
                    if write.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

/// Minimal HTTP/1.1 server answering every request with `status` and `body`.
/// Returns its base URL and a request counter.
pub async fn http_server(status: u16, body: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    let n = stream.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    request.extend_from_slice(&buf[..n]);
                    if request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    (format!("http://{}", addr), hits)
}

pub fn test_config(socket_timeout_ms: u64) -> Config {
    let mut config = Config::default();
    config.engine.socket_timeout_ms = socket_timeout_ms;
    config.engine.http_timeout_ms = 1000;
    config.engine.http_total_timeout_ms = 2000;
    config.engine.query_deadline_ms = 5000;
    config
}

pub fn engine_with(config: &Config) -> QueryEngine {
    QueryEngine::from_config(config).unwrap()
}
