//! Integration tests for the snake client against a fake TCP server
//!
//! These tests run a whole session over a real socket: handshake, streamed
//! entities, move commands, history recording and disconnect.

use snake_client::history::MemoryHistory;
use snake_client::network::{Session, SessionConfig, SessionError};
use snake_client::world::World;
use snake_shared::Direction;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

/// Accepts a single client and runs the server half of the handshake.
struct FakeServer {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl FakeServer {
    async fn accept(listener: TcpListener, player_id: i32, world_size: i32) -> (Self, String) {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, writer) = stream.into_split();
        let mut server = FakeServer {
            lines: BufReader::new(read).lines(),
            writer,
        };

        let name = server.next_line().await.unwrap();
        server.send(&player_id.to_string()).await;
        server.send(&world_size.to_string()).await;
        (server, name)
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    async fn next_line(&mut self) -> Option<String> {
        timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("timed out waiting for the client")
            .unwrap()
    }
}

async fn listen() -> (TcpListener, SessionConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, SessionConfig::new("127.0.0.1", port, "Bob"))
}

async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..400 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("condition was not reached in time");
}

fn snake_line(id: i32, score: i32, died: bool, alive: bool, dc: bool, join: bool) -> String {
    serde_json::json!({
        "snake": id,
        "name": format!("player{}", id),
        "body": [{"X": 0, "Y": 0}, {"X": 0, "Y": 120}],
        "dir": {"X": 0, "Y": 1},
        "score": score,
        "died": died,
        "alive": alive,
        "dc": dc,
        "join": join,
    })
    .to_string()
}

/// SESSION LIFECYCLE TESTS
mod session_tests {
    use super::*;

    /// Tests the full snake lifecycle over a real connection
    #[tokio::test]
    async fn snake_lifecycle_over_tcp() {
        let (listener, config) = listen().await;
        let server = tokio::spawn(FakeServer::accept(listener, 7, 1200));

        let world = Arc::new(World::new());
        let history = MemoryHistory::new();
        let session = Session::connect(&config, Arc::clone(&world), Box::new(history.clone()))
            .await
            .unwrap();
        let (mut server, name) = server.await.unwrap();

        assert_eq!(name, "Bob");
        assert_eq!(session.player_id(), 7);
        assert_eq!(world.world_size(), Some(1200));

        server.send(&snake_line(7, 0, false, true, false, true)).await;
        wait_until(|| world.contains_snake(7)).await;
        assert_eq!(world.player().map(|s| s.max_score), Some(0));

        server.send(&snake_line(7, 3, false, true, false, false)).await;
        wait_until(|| world.player().map(|s| s.score) == Some(3)).await;
        assert_eq!(world.player().map(|s| s.max_score), Some(3));

        server.send(&snake_line(7, 3, true, false, false, false)).await;
        wait_until(|| world.dead_snakes().contains_key(&7)).await;
        assert!(!world.snakes().contains_key(&7));
        assert_eq!(world.player().map(|s| s.alive), Some(false));

        server.send(&snake_line(7, 0, false, true, false, false)).await;
        wait_until(|| world.snakes().contains_key(&7)).await;
        assert!(!world.dead_snakes().contains_key(&7));
        assert_eq!(world.player().map(|s| s.max_score), Some(3));

        server.send(&snake_line(7, 0, false, true, true, false)).await;
        wait_until(|| !world.contains_snake(7)).await;
        assert!(world.player().is_none());

        session.disconnect().await;

        let games = history.games();
        assert_eq!(games.len(), 1);
        let players = history.players(games[0].id);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].player_id, 7);
        assert_eq!(players[0].name, "player7");
        assert_eq!(players[0].max_score, 3);
        assert!(players[0].leave.is_some());
    }

    /// Tests walls and powerups streamed between snake frames
    #[tokio::test]
    async fn static_and_transient_entities() {
        let (listener, config) = listen().await;
        let server = tokio::spawn(FakeServer::accept(listener, 1, 900));

        let world = Arc::new(World::new());
        let session = Session::connect(&config, Arc::clone(&world), Box::new(MemoryHistory::new()))
            .await
            .unwrap();
        let (mut server, _) = server.await.unwrap();

        for id in 0..3 {
            let wall = serde_json::json!({
                "wall": id,
                "p1": {"X": -450, "Y": id * 100},
                "p2": {"X": 450, "Y": id * 100},
            });
            server.send(&wall.to_string()).await;
        }
        server
            .send(r#"{"wall":0,"p1":{"X":1,"Y":1},"p2":{"X":2,"Y":2}}"#)
            .await;
        server.send(r#"{"power":2,"loc":{"X":5,"Y":5},"died":false}"#).await;
        server.send(r#"{"power":4,"loc":{"X":8,"Y":8},"died":false}"#).await;
        server.send(r#"{"power":2,"loc":{"X":5,"Y":5},"died":true}"#).await;
        server.send("{ broken").await;
        server.send(&snake_line(1, 0, false, true, false, true)).await;

        wait_until(|| world.contains_snake(1)).await;

        let snapshot = world.snapshot();
        assert_eq!(snapshot.walls.len(), 3);
        let first = snapshot.walls.iter().find(|w| w.id == 0).unwrap();
        assert_eq!(first.p1.x, -450);
        assert_eq!(snapshot.powerups.len(), 1);
        assert!(snapshot.powerups.contains_key(&4));

        session.disconnect().await;
    }

    /// Tests that every snake still held gets a leave when the client quits
    #[tokio::test]
    async fn disconnect_records_game_end_and_leaves() {
        let (listener, config) = listen().await;
        let server = tokio::spawn(FakeServer::accept(listener, 2, 900));

        let world = Arc::new(World::new());
        let history = MemoryHistory::new();
        let session = Session::connect(&config, Arc::clone(&world), Box::new(history.clone()))
            .await
            .unwrap();
        let (mut server, _) = server.await.unwrap();

        server.send(&snake_line(1, 5, false, true, false, true)).await;
        server.send(&snake_line(2, 0, false, true, false, true)).await;
        server.send(&snake_line(3, 0, true, false, false, false)).await;
        wait_until(|| world.contains_snake(1) && world.contains_snake(2) && world.contains_snake(3))
            .await;

        session.disconnect().await;
        assert_eq!(server.next_line().await, None);

        let games = history.games();
        let end = games[0].end.expect("game end recorded");
        let players = history.players(games[0].id);
        assert_eq!(players.len(), 3);
        for row in &players {
            assert_eq!(row.leave, Some(end));
        }
        assert_eq!(
            players.iter().find(|row| row.player_id == 1).unwrap().max_score,
            5
        );
    }
}

/// COMMAND AND FAILURE TESTS
mod transport_tests {
    use super::*;

    /// Tests that move commands reach the server as JSON lines
    #[tokio::test]
    async fn move_commands_reach_server() {
        let (listener, config) = listen().await;
        let server = tokio::spawn(FakeServer::accept(listener, 1, 900));

        let world = Arc::new(World::new());
        let session = Session::connect(&config, world, Box::new(MemoryHistory::new()))
            .await
            .unwrap();
        let (mut server, _) = server.await.unwrap();

        session.move_right();
        session.move_down();
        session.send_move(Direction::Left);
        session.move_up();

        let mut received = Vec::new();
        for _ in 0..4 {
            let line = server.next_line().await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&line).unwrap();
            received.push(value["moving"].as_str().unwrap().to_string());
        }
        assert_eq!(received, vec!["right", "down", "left", "up"]);

        session.disconnect().await;
    }

    /// Tests that a refused connection surfaces as an error
    #[tokio::test]
    async fn connect_failure_is_reported() {
        let (listener, config) = listen().await;
        drop(listener);

        let world = Arc::new(World::new());
        let result =
            Session::connect(&config, Arc::clone(&world), Box::new(MemoryHistory::new())).await;

        assert!(matches!(result, Err(SessionError::Connect { .. })));
        assert_eq!(world.player_id(), None);
    }

    /// Tests that a server going away leaves the last world state readable
    #[tokio::test]
    async fn server_shutdown_keeps_stale_world() {
        let (listener, config) = listen().await;
        let server = tokio::spawn(FakeServer::accept(listener, 4, 900));

        let world = Arc::new(World::new());
        let session = Session::connect(&config, Arc::clone(&world), Box::new(MemoryHistory::new()))
            .await
            .unwrap();
        let (mut server, _) = server.await.unwrap();

        server.send(&snake_line(4, 2, false, true, false, true)).await;
        wait_until(|| world.contains_snake(4)).await;
        drop(server);

        wait_until(|| !session.is_receiving()).await;
        assert_eq!(world.player().map(|s| s.score), Some(2));

        for _ in 0..10 {
            session.move_left();
        }
        session.disconnect().await;
    }
}
