use comms::problem::Problem;

/// Actions the surrounding application feeds into the state store
#[derive(Debug, Clone)]
pub enum Action {
    ConnectToServerRequest {
        addr: String,
    },
    DisconnectFromServer,
    JoinRoom {
        room: String,
        user_id: String,
        user_name: String,
    },
    LeaveRoom,
    EditCode {
        code: String,
    },
    SelectLanguage {
        language: String,
    },
    SelectProblem {
        problem: Problem,
    },
    Exit,
}
