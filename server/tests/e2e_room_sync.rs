use std::{net::SocketAddr, sync::Arc, time::Duration};

use comms::{
    command::{self, UserCommand},
    event::{Event, Member, RoomStateReplyEvent},
    problem::{Problem, StarterSnippet},
    transport::client::{split_tcp_stream, CommandWriter, EventStream},
};
use server::{room_manager::RoomManager, session};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{tcp::OwnedWriteHalf, TcpListener, TcpStream},
    sync::broadcast,
    time::timeout,
};
use tokio_stream::StreamExt;

/// Binds the server to an ephemeral port and runs its accept loop in the
/// background. The returned sender keeps the shutdown channel open for the
/// lifetime of the test.
async fn spawn_server() -> (SocketAddr, broadcast::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("could not bind to an ephemeral port");
    let addr = listener
        .local_addr()
        .expect("could not read the bound address");
    let room_manager = Arc::new(RoomManager::new());
    let (quit_tx, quit_rx) = broadcast::channel::<()>(1);

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };

            tokio::spawn(session::handle_session(
                Arc::clone(&room_manager),
                quit_rx.resubscribe(),
                socket,
            ));
        }
    });

    (addr, quit_tx)
}

struct TestClient {
    events: EventStream,
    commands: CommandWriter<OwnedWriteHalf>,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr)
            .await
            .expect("could not connect to the server");
        let (events, commands) = split_tcp_stream(stream);

        TestClient { events, commands }
    }

    async fn send(&mut self, command: UserCommand) {
        self.commands
            .write(&command)
            .await
            .expect("could not send the command");
    }

    async fn join(&mut self, room: &str, user_id: &str, user_name: &str) {
        self.send(UserCommand::JoinRoom(command::JoinRoomCommand {
            room: String::from(room),
            user_id: String::from(user_id),
            user_name: String::from(user_name),
        }))
        .await;
    }

    async fn next_event(&mut self) -> Event {
        timeout(Duration::from_secs(1), self.events.next())
            .await
            .expect("timed out waiting for an event")
            .expect("server closed the connection")
            .expect("could not parse the event")
    }

    async fn expect_room_state(&mut self) -> RoomStateReplyEvent {
        match self.next_event().await {
            Event::RoomState(snapshot) => snapshot,
            event => panic!("expected a room snapshot, received {:?}", event),
        }
    }

    async fn expect_user_joined(&mut self) -> Vec<Member> {
        match self.next_event().await {
            Event::UserJoined(event) => event.members,
            event => panic!("expected a join announcement, received {:?}", event),
        }
    }

    async fn expect_user_left(&mut self) -> Vec<Member> {
        match self.next_event().await {
            Event::UserLeft(event) => event.members,
            event => panic!("expected a leave announcement, received {:?}", event),
        }
    }

    async fn expect_silence(&mut self) {
        if let Ok(event) = timeout(Duration::from_millis(250), self.events.next()).await {
            panic!("expected no event, received {:?}", event);
        }
    }

    /// Read and discard buffered events until the stream stays quiet for
    /// half a second
    async fn drain_backlog(&mut self) {
        while let Ok(Some(_)) = timeout(Duration::from_millis(500), self.events.next()).await {}
    }
}

fn member_names(members: &[Member]) -> Vec<&str> {
    members
        .iter()
        .map(|member| member.user_name.as_str())
        .collect()
}

fn two_sum() -> Problem {
    Problem {
        id: "p1".into(),
        title: "Two Sum".into(),
        description: "Find two numbers adding up to the target.".into(),
        starter_snippets: vec![
            StarterSnippet {
                language: "python".into(),
                code: "def two_sum(nums, target):\n    pass\n".into(),
            },
            StarterSnippet {
                language: "javascript".into(),
                code: "function twoSum(nums, target) {}\n".into(),
            },
        ],
    }
}

#[tokio::test]
async fn join_delivers_the_snapshot_to_the_joiner_only() {
    let (addr, _quit_tx) = spawn_server().await;

    let mut alice = TestClient::connect(addr).await;
    alice.join("r1", "u1", "Alice").await;

    let snapshot = alice.expect_room_state().await;
    assert_eq!(snapshot.room, "r1");
    assert_eq!(snapshot.code, "");
    assert_eq!(snapshot.language, "javascript");
    assert_eq!(snapshot.active_problem_id, None);
    assert_eq!(snapshot.problem, None);

    assert_eq!(member_names(&alice.expect_user_joined().await), vec!["Alice"]);

    let mut bob = TestClient::connect(addr).await;
    bob.join("r1", "u2", "Bob").await;

    // The joiner receives the snapshot followed by the announcement
    bob.expect_room_state().await;
    assert_eq!(
        member_names(&bob.expect_user_joined().await),
        vec!["Alice", "Bob"]
    );

    // The member already in the room sees the announcement and nothing else
    assert_eq!(
        member_names(&alice.expect_user_joined().await),
        vec!["Alice", "Bob"]
    );
    alice.expect_silence().await;
}

#[tokio::test]
async fn the_same_user_on_two_connections_counts_as_two_members() {
    let (addr, _quit_tx) = spawn_server().await;

    let mut laptop = TestClient::connect(addr).await;
    laptop.join("r1", "u1", "Alice").await;
    laptop.expect_room_state().await;

    let members = laptop.expect_user_joined().await;
    let laptop_color = members[0].color.clone();

    let mut tablet = TestClient::connect(addr).await;
    tablet.join("r1", "u1", "Alice").await;
    tablet.expect_room_state().await;

    // Each connection is a member entry of its own, with its own color
    let members = tablet.expect_user_joined().await;
    assert_eq!(member_names(&members), vec!["Alice", "Alice"]);
    assert!(members.iter().all(|member| member.user_id == "u1"));
    assert_ne!(members[0].color, members[1].color);

    assert_eq!(
        member_names(&laptop.expect_user_joined().await),
        vec!["Alice", "Alice"]
    );

    // Closing one of the two connections removes only its entry
    drop(tablet);

    let members = laptop.expect_user_left().await;
    assert_eq!(member_names(&members), vec!["Alice"]);
    assert_eq!(members[0].user_id, "u1");
    assert_eq!(members[0].color, laptop_color);
    laptop.expect_silence().await;
}

#[tokio::test]
async fn state_changes_are_broadcast_to_everyone_but_the_sender() {
    let (addr, _quit_tx) = spawn_server().await;

    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    let mut carol = TestClient::connect(addr).await;

    alice.join("r1", "u1", "Alice").await;
    alice.expect_room_state().await;
    alice.expect_user_joined().await;

    bob.join("r1", "u2", "Bob").await;
    bob.expect_room_state().await;
    bob.expect_user_joined().await;
    alice.expect_user_joined().await;

    carol.join("r1", "u3", "Carol").await;
    carol.expect_room_state().await;
    carol.expect_user_joined().await;
    alice.expect_user_joined().await;
    bob.expect_user_joined().await;

    alice
        .send(UserCommand::CodeChange(command::CodeChangeCommand {
            room: "r1".into(),
            code: "let x = 1;".into(),
            user_id: "u1".into(),
        }))
        .await;

    for client in [&mut bob, &mut carol] {
        match client.next_event().await {
            Event::CodeChange(event) => {
                assert_eq!(event.room, "r1");
                assert_eq!(event.code, "let x = 1;");
            }
            event => panic!("expected the code change, received {:?}", event),
        }
    }

    bob.send(UserCommand::LanguageChange(command::LanguageChangeCommand {
        room: "r1".into(),
        language: "python".into(),
        user_id: "u2".into(),
    }))
    .await;

    for client in [&mut alice, &mut carol] {
        match client.next_event().await {
            Event::LanguageChange(event) => assert_eq!(event.language, "python"),
            event => panic!("expected the language change, received {:?}", event),
        }
    }

    carol
        .send(UserCommand::ProblemChange(command::ProblemChangeCommand {
            room: "r1".into(),
            problem: two_sum(),
            user_id: "u3".into(),
        }))
        .await;

    for client in [&mut alice, &mut bob] {
        match client.next_event().await {
            Event::ProblemChange(event) => assert_eq!(event.problem.id, "p1"),
            event => panic!("expected the problem change, received {:?}", event),
        }
    }

    // None of the originators hear their own change back
    alice.expect_silence().await;
    bob.expect_silence().await;
    carol.expect_silence().await;
}

#[tokio::test]
async fn full_collaboration_scenario() {
    let (addr, _quit_tx) = spawn_server().await;

    let mut alice = TestClient::connect(addr).await;
    alice.join("r1", "u1", "Alice").await;

    let snapshot = alice.expect_room_state().await;
    assert_eq!(snapshot.code, "");
    assert_eq!(snapshot.language, "javascript");
    assert_eq!(snapshot.problem, None);

    let members = alice.expect_user_joined().await;
    assert_eq!(member_names(&members), vec!["Alice"]);
    let alice_color = members[0].color.clone();

    let mut bob = TestClient::connect(addr).await;
    bob.join("r1", "u2", "Bob").await;

    let snapshot = bob.expect_room_state().await;
    assert_eq!(snapshot.code, "");
    assert_eq!(snapshot.language, "javascript");

    assert_eq!(
        member_names(&bob.expect_user_joined().await),
        vec!["Alice", "Bob"]
    );

    let members = alice.expect_user_joined().await;
    assert_eq!(member_names(&members), vec!["Alice", "Bob"]);
    // Colors stay stable across announcements and differ between members
    assert_eq!(members[0].color, alice_color);
    assert_ne!(members[0].color, members[1].color);

    alice
        .send(UserCommand::CodeChange(command::CodeChangeCommand {
            room: "r1".into(),
            code: "let x = 1;".into(),
            user_id: "u1".into(),
        }))
        .await;

    match bob.next_event().await {
        Event::CodeChange(event) => assert_eq!(event.code, "let x = 1;"),
        event => panic!("expected the code change, received {:?}", event),
    }
    alice.expect_silence().await;

    // Bob drops the connection without an explicit leave
    drop(bob);

    let members = alice.expect_user_left().await;
    assert_eq!(member_names(&members), vec!["Alice"]);
    assert_eq!(members[0].color, alice_color);

    // A later joiner observes the code the store kept
    let mut carol = TestClient::connect(addr).await;
    carol.join("r1", "u3", "Carol").await;

    let snapshot = carol.expect_room_state().await;
    assert_eq!(snapshot.code, "let x = 1;");

    assert_eq!(
        member_names(&carol.expect_user_joined().await),
        vec!["Alice", "Carol"]
    );
    assert_eq!(
        member_names(&alice.expect_user_joined().await),
        vec!["Alice", "Carol"]
    );
}

#[tokio::test]
async fn the_room_resets_once_the_last_member_leaves() {
    let (addr, _quit_tx) = spawn_server().await;

    let mut alice = TestClient::connect(addr).await;
    alice.join("r1", "u1", "Alice").await;
    alice.expect_room_state().await;
    alice.expect_user_joined().await;

    alice
        .send(UserCommand::CodeChange(command::CodeChangeCommand {
            room: "r1".into(),
            code: "let x = 1;".into(),
            user_id: "u1".into(),
        }))
        .await;
    alice
        .send(UserCommand::LeaveRoom(command::LeaveRoomCommand {
            room: "r1".into(),
            user_id: "u1".into(),
        }))
        .await;

    // Commands from one connection apply in order, so the rejoin below can
    // only be processed after the leave emptied the room
    alice.join("r1", "u1", "Alice").await;

    let snapshot = alice.expect_room_state().await;
    assert_eq!(snapshot.code, "");
    assert_eq!(snapshot.language, "javascript");
    assert_eq!(member_names(&alice.expect_user_joined().await), vec!["Alice"]);
    alice.expect_silence().await;
}

#[tokio::test]
async fn language_change_applies_the_starter_snippet_in_the_store() {
    let (addr, _quit_tx) = spawn_server().await;

    let mut alice = TestClient::connect(addr).await;
    alice.join("r1", "u1", "Alice").await;
    alice.expect_room_state().await;
    alice.expect_user_joined().await;

    let mut bob = TestClient::connect(addr).await;
    bob.join("r1", "u2", "Bob").await;
    bob.expect_room_state().await;
    bob.expect_user_joined().await;
    alice.expect_user_joined().await;

    alice
        .send(UserCommand::ProblemChange(command::ProblemChangeCommand {
            room: "r1".into(),
            problem: two_sum(),
            user_id: "u1".into(),
        }))
        .await;
    match bob.next_event().await {
        Event::ProblemChange(event) => assert_eq!(event.problem.id, "p1"),
        event => panic!("expected the problem change, received {:?}", event),
    }

    alice
        .send(UserCommand::LanguageChange(command::LanguageChangeCommand {
            room: "r1".into(),
            language: "python".into(),
            user_id: "u1".into(),
        }))
        .await;
    match bob.next_event().await {
        Event::LanguageChange(event) => assert_eq!(event.language, "python"),
        event => panic!("expected the language change, received {:?}", event),
    }

    // The snapshot a later joiner receives reflects the snippet selection
    let mut carol = TestClient::connect(addr).await;
    carol.join("r1", "u3", "Carol").await;

    let snapshot = carol.expect_room_state().await;
    assert_eq!(snapshot.language, "python");
    assert_eq!(snapshot.code, "def two_sum(nums, target):\n    pass\n");
    assert_eq!(snapshot.active_problem_id.as_deref(), Some("p1"));
    carol.expect_user_joined().await;
    alice.expect_user_joined().await;
    bob.expect_user_joined().await;

    // Switching to a language the problem has no snippet for keeps the code
    bob.send(UserCommand::LanguageChange(command::LanguageChangeCommand {
        room: "r1".into(),
        language: "ruby".into(),
        user_id: "u2".into(),
    }))
    .await;
    match alice.next_event().await {
        Event::LanguageChange(event) => assert_eq!(event.language, "ruby"),
        event => panic!("expected the language change, received {:?}", event),
    }
    match carol.next_event().await {
        Event::LanguageChange(event) => assert_eq!(event.language, "ruby"),
        event => panic!("expected the language change, received {:?}", event),
    }

    let mut dave = TestClient::connect(addr).await;
    dave.join("r1", "u4", "Dave").await;

    let snapshot = dave.expect_room_state().await;
    assert_eq!(snapshot.language, "ruby");
    assert_eq!(snapshot.code, "def two_sum(nums, target):\n    pass\n");
}

#[tokio::test]
async fn rejoining_the_same_room_yields_a_fresh_snapshot() {
    let (addr, _quit_tx) = spawn_server().await;

    let mut alice = TestClient::connect(addr).await;
    alice.join("r1", "u1", "Alice").await;
    alice.expect_room_state().await;
    alice.expect_user_joined().await;

    let mut bob = TestClient::connect(addr).await;
    bob.join("r1", "u2", "Bob").await;
    bob.expect_room_state().await;
    bob.expect_user_joined().await;
    alice.expect_user_joined().await;

    bob.send(UserCommand::CodeChange(command::CodeChangeCommand {
        room: "r1".into(),
        code: "let y = 2;".into(),
        user_id: "u2".into(),
    }))
    .await;
    match alice.next_event().await {
        Event::CodeChange(event) => assert_eq!(event.code, "let y = 2;"),
        event => panic!("expected the code change, received {:?}", event),
    }

    // A second join from the same connection leaves and joins fresh
    alice.join("r1", "u1", "Alice").await;

    let snapshot = alice.expect_room_state().await;
    assert_eq!(snapshot.code, "let y = 2;");
    assert_eq!(
        member_names(&alice.expect_user_joined().await),
        vec!["Bob", "Alice"]
    );

    assert_eq!(member_names(&bob.expect_user_left().await), vec!["Bob"]);
    assert_eq!(
        member_names(&bob.expect_user_joined().await),
        vec!["Bob", "Alice"]
    );
}

#[tokio::test]
async fn a_stalled_member_still_receives_later_broadcasts() {
    // Enough edits to overflow the room's broadcast buffer while the stalled
    // member's connection sits unread
    const LARGE_EDITS: usize = 20;
    const LARGE_EDIT_LEN: usize = 1024 * 1024;
    const SMALL_EDITS: usize = 300;

    let (addr, _quit_tx) = spawn_server().await;

    let mut alice = TestClient::connect(addr).await;
    alice.join("r1", "u1", "Alice").await;
    alice.expect_room_state().await;
    alice.expect_user_joined().await;

    let mut bob = TestClient::connect(addr).await;
    bob.join("r1", "u2", "Bob").await;
    bob.expect_room_state().await;
    bob.expect_user_joined().await;
    alice.expect_user_joined().await;

    let mut carol = TestClient::connect(addr).await;
    carol.join("r1", "u3", "Carol").await;
    carol.expect_room_state().await;
    carol.expect_user_joined().await;
    alice.expect_user_joined().await;
    bob.expect_user_joined().await;

    // Alice stops reading while Bob floods the room
    let flood = tokio::spawn(async move {
        let large_edit = "x".repeat(LARGE_EDIT_LEN);

        for _ in 0..LARGE_EDITS {
            bob.send(UserCommand::CodeChange(command::CodeChangeCommand {
                room: "r1".into(),
                code: large_edit.clone(),
                user_id: "u2".into(),
            }))
            .await;
        }
        for n in 0..SMALL_EDITS {
            bob.send(UserCommand::CodeChange(command::CodeChangeCommand {
                room: "r1".into(),
                code: format!("let x = {};", n),
                user_id: "u2".into(),
            }))
            .await;
        }

        bob
    });

    // Carol reads along live, once she has seen every edit the store has
    // applied them all
    for _ in 0..LARGE_EDITS + SMALL_EDITS {
        match carol.next_event().await {
            Event::CodeChange(_) => {}
            event => panic!("expected a code change, received {:?}", event),
        }
    }
    let mut bob = flood.await.expect("the flooding task panicked");

    // Alice empties what her connection buffered. The broadcasts the room
    // overwrote in the meantime are gone, the feed itself is not.
    alice.drain_backlog().await;

    bob.send(UserCommand::CodeChange(command::CodeChangeCommand {
        room: "r1".into(),
        code: "let caught_up = true;".into(),
        user_id: "u2".into(),
    }))
    .await;

    loop {
        match alice.next_event().await {
            Event::CodeChange(event) if event.code == "let caught_up = true;" => break,
            _ => {}
        }
    }
}

#[tokio::test]
async fn malformed_lines_do_not_end_the_session() {
    let (addr, _quit_tx) = spawn_server().await;

    let mut stream = TcpStream::connect(addr)
        .await
        .expect("could not connect to the server");
    stream
        .write_all(b"this is not a command\r\n")
        .await
        .expect("could not write the malformed line");

    let join = serde_json::to_string(&UserCommand::JoinRoom(command::JoinRoomCommand {
        room: "r1".into(),
        user_id: "u1".into(),
        user_name: "Alice".into(),
    }))
    .expect("could not serialize the join command");
    stream
        .write_all(format!("{}\r\n", join).as_bytes())
        .await
        .expect("could not write the join command");

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .expect("could not read the reply");

    let event: Event = serde_json::from_str(line.trim_end()).expect("could not parse the reply");
    assert!(matches!(event, Event::RoomState(_)));
}
