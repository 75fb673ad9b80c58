use comms::{
    event::{Event, Member},
    problem::{Problem, DEFAULT_LANGUAGE},
};

#[derive(Debug, Clone)]
pub enum ServerConnectionStatus {
    Uninitialized,
    Connecting,
    Connected { addr: String },
    Errored { err: String },
}

/// Local copy of the room this client is currently part of
#[derive(Debug, Clone)]
pub struct RoomView {
    pub room: String,
    pub code: String,
    pub language: String,
    pub active_problem_id: Option<String>,
    pub active_problem: Option<Problem>,
    pub members: Vec<Member>,
    /// Whether the room snapshot has arrived since joining
    pub has_synced: bool,
}

impl RoomView {
    fn new(room: &str) -> Self {
        RoomView {
            room: String::from(room),
            code: String::new(),
            language: String::from(DEFAULT_LANGUAGE),
            active_problem_id: None,
            active_problem: None,
            members: Vec::new(),
            has_synced: false,
        }
    }

    /// Mirrors the server side snippet selection so the editor content lines
    /// up without the broadcasts having to carry the code again
    fn load_starter_snippet(&mut self) {
        if let Some(snippet) = self
            .active_problem
            .as_ref()
            .and_then(|problem| problem.snippet_for(&self.language))
        {
            self.code = String::from(snippet);
        }
    }

    fn set_code(&mut self, code: String) {
        self.code = code;
    }

    fn set_language(&mut self, language: String) {
        self.language = language;
        self.load_starter_snippet();
    }

    fn set_problem(&mut self, problem: Problem) {
        self.active_problem_id = Some(problem.id.clone());
        self.active_problem = Some(problem);
        self.load_starter_snippet();
    }
}

/// State handles the client side view of the synchronization session
#[derive(Debug, Clone)]
pub struct State {
    pub server_connection_status: ServerConnectionStatus,
    /// The identity announced at the last join
    pub user_id: String,
    pub user_name: String,
    /// The room this client is currently in, if any
    pub active_room: Option<RoomView>,
}

impl Default for State {
    fn default() -> Self {
        State {
            server_connection_status: ServerConnectionStatus::Uninitialized,
            user_id: String::new(),
            user_name: String::new(),
            active_room: None,
        }
    }
}

impl State {
    pub fn handle_server_event(&mut self, event: &Event) {
        // A snapshot replaces the local copy wholesale, member lists arrive
        // with the join announcement that follows it
        if let Event::RoomState(event) = event {
            self.active_room = Some(RoomView {
                room: event.room.clone(),
                code: event.code.clone(),
                language: event.language.clone(),
                active_problem_id: event.active_problem_id.clone(),
                active_problem: event.problem.clone(),
                members: Vec::new(),
                has_synced: true,
            });

            return;
        }

        let Some(room_view) = self.active_room.as_mut() else {
            return;
        };

        match event {
            Event::UserJoined(event) if event.room == room_view.room => {
                room_view.members = event.members.clone();
            }
            Event::UserLeft(event) if event.room == room_view.room => {
                room_view.members = event.members.clone();
            }
            Event::CodeChange(event) if event.room == room_view.room => {
                room_view.set_code(event.code.clone());
            }
            Event::LanguageChange(event) if event.room == room_view.room => {
                room_view.set_language(event.language.clone());
            }
            Event::ProblemChange(event) if event.room == room_view.room => {
                room_view.set_problem(event.problem.clone());
            }
            _ => (),
        }
    }

    /// Notes which room was asked for, the authoritative content arrives with
    /// the next snapshot
    pub fn begin_join(&mut self, room: &str, user_id: &str, user_name: &str) {
        self.user_id = String::from(user_id);
        self.user_name = String::from(user_name);
        self.active_room = Some(RoomView::new(room));
    }

    pub fn clear_active_room(&mut self) {
        self.active_room = None;
    }

    /// Applies our own edit locally, the server echoes it to everyone else
    pub fn apply_local_code_edit(&mut self, code: String) {
        if let Some(room_view) = self.active_room.as_mut() {
            room_view.set_code(code);
        }
    }

    pub fn apply_local_language_selection(&mut self, language: String) {
        if let Some(room_view) = self.active_room.as_mut() {
            room_view.set_language(language);
        }
    }

    pub fn apply_local_problem_selection(&mut self, problem: Problem) {
        if let Some(room_view) = self.active_room.as_mut() {
            room_view.set_problem(problem);
        }
    }

    pub fn mark_connection_request_start(&mut self) {
        self.server_connection_status = ServerConnectionStatus::Connecting;
    }

    /// Processes the result of a connection request to change the state of the application
    pub fn process_connection_request_result(&mut self, result: anyhow::Result<String>) {
        self.server_connection_status = match result {
            Ok(addr) => ServerConnectionStatus::Connected { addr },
            Err(err) => ServerConnectionStatus::Errored {
                err: err.to_string(),
            },
        }
    }
}
